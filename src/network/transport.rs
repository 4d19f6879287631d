//! # HTTP transport capability
//!
//! A [`Transport`] performs exactly one HTTP exchange described by an
//! [`Exchange`] and reports everything it sees through a [`Handler`]. The
//! handler contract mirrors the callback style of embedded HTTP stacks:
//!
//! | Hook | Called with | Return value |
//! |------|-------------|--------------|
//! | [`Handler::header`] | one raw response header line, status lines included | `false` aborts |
//! | [`Handler::body`] | the next slice of the response body | fewer bytes than given aborts |
//! | [`Handler::upload`] | a buffer to fill with request body bytes | `Some(0)` once exhausted, `None` aborts |
//! | [`Handler::progress`] | periodic byte counters | [`Flow::Abort`] aborts |
//! | [`Handler::debug`] | wire trace, only when [`Exchange::verbose`] is set | - |
//!
//! An abort requested by a hook must surface as [`Error::WriteAborted`],
//! [`Error::ReadAborted`] or [`Error::Aborted`] respectively. Redirects are
//! followed internally; the header hook sees the status line of every
//! response in the chain.

use super::error::Error;
use super::http::Method;
use core::time::Duration;

/// Timeout budgets for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Budget for establishing the connection (including TLS).
    pub connect: Duration,
    /// Budget for the whole exchange.
    pub total: Duration,
    /// Longest tolerated period without any data moving.
    pub stall: Duration,
}

/// Byte counters handed to [`Handler::progress`].
///
/// A total of zero means the transport does not know it (yet).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub download_total: u64,
    pub download_now: u64,
    pub upload_total: u64,
    pub upload_now: u64,
}

/// Return value of [`Handler::progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Abort,
}

/// Kind of a wire trace fragment handed to [`Handler::debug`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugKind {
    /// Informational text from the transport.
    Text,
    HeaderIn,
    HeaderOut,
    DataIn,
    DataOut,
    SslDataIn,
    SslDataOut,
}

impl DebugKind {
    /// Trace prefix for this kind, `None` for encrypted payload which is
    /// never traced.
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            DebugKind::Text => Some("* "),
            DebugKind::HeaderIn => Some("< "),
            DebugKind::HeaderOut => Some("> "),
            DebugKind::DataIn => Some("<< "),
            DebugKind::DataOut => Some(">> "),
            DebugKind::SslDataIn | DebugKind::SslDataOut => None,
        }
    }
}

/// Everything a transport needs to perform one exchange.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    pub method: Method,
    pub url: &'a str,
    /// Request header lines in `Name: value` form, in send order.
    pub headers: &'a [String],
    /// Size of the request body for POST, so the transport can announce it.
    pub upload_len: Option<u64>,
    pub timeouts: Timeouts,
    pub user_agent: &'a str,
    pub max_redirects: u32,
    /// Emit [`Handler::debug`] traces.
    pub verbose: bool,
    /// PEM or DER trust anchors for `https` targets.
    pub trust: Option<&'a [u8]>,
}

/// Callbacks invoked by a [`Transport`] while an exchange is in flight.
pub trait Handler {
    /// One raw response header line, including its trailing CRLF.
    fn header(&mut self, line: &[u8]) -> bool;

    /// The next slice of the response body. Returns how many bytes were
    /// consumed.
    fn body(&mut self, data: &[u8]) -> usize;

    /// Fills `buf` with request body bytes.
    fn upload(&mut self, buf: &mut [u8]) -> Option<usize>;

    /// Periodic progress notification.
    fn progress(&mut self, progress: Progress) -> Flow;

    /// Wire trace fragment.
    fn debug(&mut self, _kind: DebugKind, _data: &[u8]) {}
}

/// A blocking HTTP(S) client stack.
pub trait Transport {
    /// Performs one exchange, driving `handler`, and returns the final
    /// response status code.
    fn perform(
        &mut self,
        exchange: &Exchange<'_>,
        handler: &mut dyn Handler,
    ) -> Result<u16, Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn perform(
        &mut self,
        exchange: &Exchange<'_>,
        handler: &mut dyn Handler,
    ) -> Result<u16, Error> {
        (**self).perform(exchange, handler)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn perform(
        &mut self,
        exchange: &Exchange<'_>,
        handler: &mut dyn Handler,
    ) -> Result<u16, Error> {
        (**self).perform(exchange, handler)
    }
}
