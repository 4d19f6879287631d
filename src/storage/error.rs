//! Common error types for storage operations

/// A common error type for storage operations.
///
/// This enum defines a set of common errors that can occur when working with
/// a mounted filesystem. It is designed to be simple and portable so that
/// RAM-backed test filesystems and real ones can share it.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The path does not name an existing file.
    NotFound,
    /// The path is empty, relative or otherwise unusable.
    InvalidPath,
    /// A file could not be opened or created.
    OpenError,
    /// An error occurred during a read operation.
    ReadError,
    /// An error occurred during a write operation.
    WriteError,
    /// A directory could not be created.
    DirectoryError,
    /// The underlying medium is full.
    NoSpace,
}

impl Error {
    pub(crate) fn from_io(err: &std::io::Error, fallback: Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound,
            std::io::ErrorKind::StorageFull => Error::NoSpace,
            _ => fallback,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotFound => defmt::write!(f, "NotFound"),
            Error::InvalidPath => defmt::write!(f, "InvalidPath"),
            Error::OpenError => defmt::write!(f, "OpenError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::DirectoryError => defmt::write!(f, "DirectoryError"),
            Error::NoSpace => defmt::write!(f, "NoSpace"),
        }
    }
}
