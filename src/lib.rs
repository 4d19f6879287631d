//! # bncurl - HTTP transfers over a serial command link
//!
//! The device side of an AT-style `BNCURL` command: a host asks for an HTTP
//! GET, POST or HEAD, the device performs it and streams the result back over
//! the serial link in a length-prefixed, chunked framing.
//!
//! ## Features
//!
//! ### Transfer pipeline
//! - Validated, immutable request descriptors
//! - Single worker thread with a bounded FIFO submission queue
//! - Linear-backoff retries for resolve, connect, timeout and partial-body failures
//! - Timeout budgets scaled to the expected transfer size, with a HEAD probe
//!   for the length of GET targets
//! - Serial framing (`+LEN`, `+POST`, `SEND OK` / `SEND FAIL`), file sinks,
//!   resumable range downloads, cookie capture and Netscape cookie files
//! - Progress and last-operation queries, cooperative stop
//!
//! ### Capabilities
//! - [`network::transport::Transport`]: the HTTP/TLS client stack
//! - [`network::Write`]: the serial byte stream
//! - [`storage::FileSystem`]: the mounted filesystem
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! bncurl = "0.1.0"
//! ```
//!
//! See the [`transfer`] module for a complete example.
//!
//! ## Optional Features
//!
//! - `defmt`: Enable defmt formatting of error types for embedded debugging

#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

/// Capabilities for reaching the network and the serial link.
///
/// Defines the transport callback contract the transfer engine is driven by,
/// HTTP header-line helpers, and the serial [`network::Write`] trait.
pub mod network;

/// Filesystem capability for file sinks, file uploads and cookie files.
pub mod storage;

/// The transfer pipeline: requests, executor, retries, framing and status.
pub mod transfer;
