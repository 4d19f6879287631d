//! # Network capabilities consumed by the transfer pipeline
//!
//! The pipeline never speaks HTTP or TLS itself. It drives two injected
//! capabilities instead:
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │     transfer::engine     │
//!                 └──────────────────────────┘
//!                    │                    │
//!        Exchange +  │                    │  framed bytes
//!        &mut Handler│                    │  (+LEN / +POST / SEND OK)
//!                    ▼                    ▼
//!        ┌───────────────────┐   ┌───────────────────┐
//!        │ transport::       │   │ Write (serial     │
//!        │ Transport         │   │ byte stream)      │
//!        └───────────────────┘   └───────────────────┘
//!          HTTP/TLS stack           UART, USB CDC, ...
//! ```
//!
//! - [`transport::Transport`] performs one HTTP exchange and calls back into a
//!   [`transport::Handler`] for every header line, body slice, upload read,
//!   progress tick and debug trace.
//! - [`Write`] is the narrow serial link the response body is framed onto.
//!
//! Any [`std::io::Write`] can be used as a serial link through [`IoPort`].

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Common error types for transport operations
pub mod error;

/// HTTP method and header-line helpers
pub mod http;

/// The HTTP transport capability and its callback contract
pub mod transport;

/// Re-exports of common traits
pub mod prelude {
    pub use super::Write;
    pub use super::transport::{Handler, Transport};
}

/// A serial byte stream.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the stream, returning how many bytes were accepted
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

impl<W: Write + ?Sized> Write for &mut W {
    type Error = W::Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }
}

/// Adapts a [`std::io::Write`] (a serial device file, stdout, a socket) into
/// a [`Write`] serial stream.
#[derive(Debug)]
pub struct IoPort<W> {
    inner: W,
}

impl<W: std::io::Write> IoPort<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Borrow the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: std::io::Write> Write for IoPort<W> {
    type Error = std::io::ErrorKind;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        loop {
            match self.inner.write(buf) {
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                other => return other.map_err(|e| e.kind()),
            }
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.inner.flush().map_err(|e| e.kind())
    }
}
