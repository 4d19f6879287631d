//! Error taxonomy of the transfer pipeline

use crate::network;
use core::fmt;

/// Why a [`Request`](super::Request) was rejected before it was queued.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ValidationError {
    /// The URL is empty, has no host, or is longer than allowed.
    InvalidUrl,
    /// The URL scheme is neither `http` nor `https`.
    UnsupportedScheme,
    /// POST was requested without an upload source.
    MissingUpload,
    /// GET or HEAD was given an upload source.
    UnexpectedUpload,
    /// The in-memory upload exceeds the supported size.
    UploadTooLarge,
    /// A byte range was given without a file sink.
    RangeWithoutFile,
    /// A byte range was given for a method other than GET.
    RangeNotAllowed,
    /// A byte range is malformed or has `start > end`.
    InvalidRange,
    /// More custom headers than supported.
    TooManyHeaders,
    /// A header is not of the form `Name: value`, is too long, or contains a
    /// line break.
    InvalidHeader,
    /// A file path is empty, relative or too long.
    InvalidPath,
    /// The server-response timeout is outside the supported range.
    InvalidTimeout,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ValidationError::InvalidUrl => "invalid URL",
            ValidationError::UnsupportedScheme => "URL scheme must be http or https",
            ValidationError::MissingUpload => "POST requires an upload source",
            ValidationError::UnexpectedUpload => "upload source is only valid with POST",
            ValidationError::UploadTooLarge => "upload buffer too large",
            ValidationError::RangeWithoutFile => "byte range requires a file sink",
            ValidationError::RangeNotAllowed => "byte range is only valid with GET",
            ValidationError::InvalidRange => "invalid byte range",
            ValidationError::TooManyHeaders => "too many headers",
            ValidationError::InvalidHeader => "invalid header",
            ValidationError::InvalidPath => "invalid file path",
            ValidationError::InvalidTimeout => "timeout out of range",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ValidationError {}

#[cfg(feature = "defmt")]
impl defmt::Format for ValidationError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ValidationError::InvalidUrl => defmt::write!(f, "InvalidUrl"),
            ValidationError::UnsupportedScheme => defmt::write!(f, "UnsupportedScheme"),
            ValidationError::MissingUpload => defmt::write!(f, "MissingUpload"),
            ValidationError::UnexpectedUpload => defmt::write!(f, "UnexpectedUpload"),
            ValidationError::UploadTooLarge => defmt::write!(f, "UploadTooLarge"),
            ValidationError::RangeWithoutFile => defmt::write!(f, "RangeWithoutFile"),
            ValidationError::RangeNotAllowed => defmt::write!(f, "RangeNotAllowed"),
            ValidationError::InvalidRange => defmt::write!(f, "InvalidRange"),
            ValidationError::TooManyHeaders => defmt::write!(f, "TooManyHeaders"),
            ValidationError::InvalidHeader => defmt::write!(f, "InvalidHeader"),
            ValidationError::InvalidPath => defmt::write!(f, "InvalidPath"),
            ValidationError::InvalidTimeout => defmt::write!(f, "InvalidTimeout"),
        }
    }
}

/// Final outcome of a failed request.
///
/// Only [`Error::Resolve`], [`Error::Connect`], [`Error::Timeout`] and
/// [`Error::PartialBody`] are transient; the retry controller absorbs them
/// until its attempts run out. Everything else ends the request at once.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The request was rejected before it was queued.
    Validation(ValidationError),
    /// Name resolution failed.
    Resolve,
    /// The connection could not be established.
    Connect,
    /// A timeout budget expired.
    Timeout,
    /// The body ended before the announced length was delivered.
    PartialBody,
    /// The server never declared a body length, so nothing could be framed.
    LengthUnknown,
    /// The serial link or the output file rejected a write.
    SinkWrite,
    /// The upload file could not be read.
    UploadRead,
    /// The transfer was stopped on request.
    Cancelled,
    /// The submission queue is at capacity.
    QueueFull,
    /// The server answered with a non-2xx status.
    HttpStatus(u16),
    /// Any other, non-retryable transport failure.
    Transport(network::error::Error),
    /// The executor shut down before the request completed.
    Shutdown,
    /// The caller stopped waiting on a ticket; the request may still run.
    WaitTimeout,
}

impl Error {
    /// `true` for failure classes worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Resolve | Error::Connect | Error::Timeout | Error::PartialBody
        )
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<network::error::Error> for Error {
    fn from(err: network::error::Error) -> Self {
        use network::error::Error as Net;
        match err {
            Net::Resolve => Error::Resolve,
            Net::Connect => Error::Connect,
            Net::Timeout => Error::Timeout,
            Net::PartialBody => Error::PartialBody,
            other => Error::Transport(other),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(e) => write!(f, "invalid request: {e}"),
            Error::Resolve => f.write_str("could not resolve host"),
            Error::Connect => f.write_str("connection failed"),
            Error::Timeout => f.write_str("operation timed out"),
            Error::PartialBody => f.write_str("body ended before the announced length"),
            Error::LengthUnknown => f.write_str("server did not declare a content length"),
            Error::SinkWrite => f.write_str("output write failed"),
            Error::UploadRead => f.write_str("upload source read failed"),
            Error::Cancelled => f.write_str("transfer cancelled"),
            Error::QueueFull => f.write_str("transfer queue is full"),
            Error::HttpStatus(code) => write!(f, "server answered HTTP {code}"),
            Error::Transport(e) => write!(f, "transport failure: {e:?}"),
            Error::Shutdown => f.write_str("executor shut down"),
            Error::WaitTimeout => f.write_str("gave up waiting for the result"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Validation(e) => defmt::write!(f, "Validation({})", e),
            Error::Resolve => defmt::write!(f, "Resolve"),
            Error::Connect => defmt::write!(f, "Connect"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::PartialBody => defmt::write!(f, "PartialBody"),
            Error::LengthUnknown => defmt::write!(f, "LengthUnknown"),
            Error::SinkWrite => defmt::write!(f, "SinkWrite"),
            Error::UploadRead => defmt::write!(f, "UploadRead"),
            Error::Cancelled => defmt::write!(f, "Cancelled"),
            Error::QueueFull => defmt::write!(f, "QueueFull"),
            Error::HttpStatus(code) => defmt::write!(f, "HttpStatus({})", code),
            Error::Transport(e) => defmt::write!(f, "Transport({})", e),
            Error::Shutdown => defmt::write!(f, "Shutdown"),
            Error::WaitTimeout => defmt::write!(f, "WaitTimeout"),
        }
    }
}
