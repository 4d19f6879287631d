//! # Serial-attached HTTP transfer pipeline
//!
//! A host talks to the device over a serial link and asks it to perform HTTP
//! GET, POST or HEAD requests. The response (or a byte count when it goes to
//! a file) is streamed back over the same link:
//!
//! ```text
//!  host ──▶ Request ──▶ Executor ──▶ Pipeline ──▶ engine ──▶ Transport
//!                       (queue)      (retries,     (hooks)     (HTTP/TLS)
//!                                     timeouts)       │
//!                                                     ▼
//!  host ◀──────── +LEN:5000,  +POST:1024,<bytes> ... SEND OK
//! ```
//!
//! ## Serial framing
//!
//! | Situation | Bytes on the link |
//! |-----------|-------------------|
//! | body to serial | `+LEN:<n>,\r\n` then `+POST:<k>,<k bytes>` per chunk, then `SEND OK\r\n` |
//! | body to file | `+SAVED:<n>\r\n` then `SEND OK\r\n` |
//! | HEAD | `+HEADERS:\r\n`, one `+HDR:<line>\r\n` per header, `SEND OK\r\n` |
//! | captured cookie | `+COOKIE:<name=value; ...>\r\n` |
//! | verbose trace | `+VERBOSE:<* / < / > / << / >> ><line>\r\n` |
//! | failure | `SEND FAIL\r\n` |
//!
//! Every request ends with exactly one `SEND OK` or `SEND FAIL`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bncurl::network::IoPort;
//! use bncurl::network::error::Error as NetError;
//! use bncurl::network::transport::{Exchange, Handler, Transport};
//! use bncurl::storage::StdFileSystem;
//! use bncurl::transfer::{Config, Context, Executor, Pipeline, Request};
//! use std::sync::Arc;
//!
//! # struct Stack;
//! # impl Transport for Stack {
//! #     fn perform(&mut self, _: &Exchange<'_>, _: &mut dyn Handler) -> Result<u16, NetError> {
//! #         Err(NetError::Connect)
//! #     }
//! # }
//! let ctx = Arc::new(Context::new());
//! let pipeline = Pipeline::new(
//!     Config::default(),
//!     Arc::clone(&ctx),
//!     Stack,
//!     IoPort::new(std::io::stdout()),
//!     StdFileSystem::new(),
//! )
//! .unwrap();
//! let executor = Executor::spawn(pipeline).unwrap();
//!
//! let request = Request::get("http://example.com/").build().unwrap();
//! let report = executor.execute(request);
//! println!("{:?} {:?}", report, ctx.last_operation());
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Pipeline configuration
pub mod config;

/// Cookie capture, jar and Netscape cookie files
pub mod cookies;

mod engine;

/// Error taxonomy
pub mod error;

/// Worker thread and submission queue
pub mod executor;

/// Serial framing protocol
pub mod framing;

/// Request orchestration: planning, retries, final status
pub mod pipeline;

/// Progress snapshots and the stop flag
pub mod progress;

/// Validated request descriptors
pub mod request;

/// Linear-backoff retry controller
pub mod retry;

/// Shared state for status queries
pub mod status;

/// Timeout budgets and the HEAD length probe
pub mod timeout;

pub use config::{Config, ConfigError};
pub use cookies::{Cookie, CookieJar};
pub use error::{Error, ValidationError};
pub use executor::{Executor, State, Ticket};
pub use framing::{FrameError, Framer};
pub use pipeline::{Pipeline, Report, USER_AGENT};
pub use progress::{CancelFlag, Direction, ProgressSnapshot};
pub use request::{ByteRange, Request, RequestBuilder, Sink, Upload};
pub use status::{Context, LastOperation};
pub use timeout::TimeoutPolicy;
