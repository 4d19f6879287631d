//! Common error types for transport operations

/// A common error type for transport operations.
///
/// This enum classifies why a single HTTP exchange driven by a
/// [`Transport`](super::transport::Transport) did not complete. It is kept
/// small and `Copy` so that it can cross the worker boundary unchanged.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The host name could not be resolved.
    Resolve,
    /// A connection to the remote host could not be established.
    Connect,
    /// A connect, total or stall timeout expired.
    Timeout,
    /// The connection closed before the declared body was delivered.
    PartialBody,
    /// The TLS handshake or certificate verification failed.
    Tls,
    /// The header or body hook refused the data it was handed.
    WriteAborted,
    /// The upload hook reported a read failure.
    ReadAborted,
    /// The progress hook requested an abort.
    Aborted,
    /// The redirect limit was exceeded.
    TooManyRedirects,
    /// A protocol-specific error occurred.
    ProtocolError,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Resolve => defmt::write!(f, "Resolve"),
            Error::Connect => defmt::write!(f, "Connect"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::PartialBody => defmt::write!(f, "PartialBody"),
            Error::Tls => defmt::write!(f, "Tls"),
            Error::WriteAborted => defmt::write!(f, "WriteAborted"),
            Error::ReadAborted => defmt::write!(f, "ReadAborted"),
            Error::Aborted => defmt::write!(f, "Aborted"),
            Error::TooManyRedirects => defmt::write!(f, "TooManyRedirects"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
        }
    }
}
