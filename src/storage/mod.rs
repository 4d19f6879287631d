//! # Filesystem capability
//!
//! Downloads saved to disk, file-backed uploads and cookie jars all go
//! through the [`FileSystem`] trait. The pipeline only needs a handful of
//! path-based operations, so the trait stays small enough to implement on top
//! of FAT on an SD card, LittleFS on SPI flash, or `std::fs`.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │               transfer::engine                │
//! │   file sink    upload source    cookie jar    │
//! └───────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌───────────────────────────────────────────────┐
//! │  FileSystem: create_dir_all / open / create / │
//! │  append / len / truncate                      │
//! └───────────────────────────────────────────────┘
//!          │                          │
//!          ▼                          ▼
//! ┌─────────────────┐       ┌───────────────────┐
//! │  StdFileSystem  │       │  vendor FS driver │
//! └─────────────────┘       └───────────────────┘
//! ```
//!
//! Paths are absolute, `/`-separated strings such as `/sdcard/Download/a.bin`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use bncurl::storage::{FileSystem, StdFileSystem, WriteFile};
//!
//! let mut fs = StdFileSystem::with_root("/mnt");
//! fs.create_dir_all("/sdcard/Download").unwrap();
//! let mut file = fs.create("/sdcard/Download/hello.txt").unwrap();
//! file.write_all(b"hello").unwrap();
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Common error types for storage operations
pub mod error;

/// [`FileSystem`] on top of `std::fs`
pub mod fs;

pub use fs::StdFileSystem;

/// Re-exports of common traits for convenient importing
pub mod prelude {
    pub use super::{FileSystem, ReadFile, WriteFile};
}

/// A file opened for reading.
pub trait ReadFile {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read up to `buf.len()` bytes; `Ok(0)` means end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// A file opened for writing.
pub trait WriteFile {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write all of `bytes` at the current position.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
    /// Flush buffered data to the medium.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// A mounted, path-addressed filesystem.
pub trait FileSystem {
    /// Associated error type
    type Error: core::fmt::Debug;
    type Reader: ReadFile;
    type Writer: WriteFile;

    /// Create a directory and all of its missing parents.
    fn create_dir_all(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Open an existing file for reading.
    fn open(&mut self, path: &str) -> Result<Self::Reader, Self::Error>;

    /// Create a file, truncating it if it exists.
    fn create(&mut self, path: &str) -> Result<Self::Writer, Self::Error>;

    /// Open a file for appending, creating it if needed.
    fn append(&mut self, path: &str) -> Result<Self::Writer, Self::Error>;

    /// Size of a file in bytes, `None` if it does not exist.
    fn len(&mut self, path: &str) -> Result<Option<u64>, Self::Error>;

    /// Cut an existing file down to `len` bytes.
    fn truncate(&mut self, path: &str, len: u64) -> Result<(), Self::Error>;
}

/// Directory part of an absolute path, `None` for files directly under `/`.
pub fn parent(path: &str) -> Option<&str> {
    let idx = path.rfind('/')?;
    (idx > 0).then(|| &path[..idx])
}

/// Creates the parent directory of `path` when it has one.
pub fn ensure_parent<F: FileSystem>(fs: &mut F, path: &str) -> Result<(), F::Error> {
    match parent(path) {
        Some(dir) => fs.create_dir_all(dir),
        None => Ok(()),
    }
}

/// Error from [`read_to_end`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ReadToEndError<E> {
    /// The filesystem or the file failed.
    Storage(E),
    /// The file is larger than the given limit.
    TooLarge,
}

/// Replaces the contents of `path` with `bytes`, creating parent
/// directories as needed.
pub fn write_file<F: FileSystem>(
    fs: &mut F,
    path: &str,
    bytes: &[u8],
) -> Result<(), FileError<F>> {
    ensure_parent(fs, path).map_err(FileError::Fs)?;
    let mut file = fs.create(path).map_err(FileError::Fs)?;
    file.write_all(bytes).map_err(FileError::Write)?;
    file.flush().map_err(FileError::Write)
}

/// Reads a whole file, refusing files longer than `limit` bytes.
pub fn read_to_end<F: FileSystem>(
    fs: &mut F,
    path: &str,
    limit: usize,
) -> Result<std::vec::Vec<u8>, ReadToEndError<FileError<F>>> {
    let mut file = fs
        .open(path)
        .map_err(|e| ReadToEndError::Storage(FileError::Fs(e)))?;
    let mut out = std::vec::Vec::new();
    let mut buf = [0u8; 512];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| ReadToEndError::Storage(FileError::Read(e)))?;
        if n == 0 {
            return Ok(out);
        }
        if out.len() + n > limit {
            return Err(ReadToEndError::TooLarge);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

/// Either a filesystem-level or a file-level failure.
pub enum FileError<F: FileSystem> {
    Fs(F::Error),
    Read(<F::Reader as ReadFile>::Error),
    Write(<F::Writer as WriteFile>::Error),
}

impl<F: FileSystem> core::fmt::Debug for FileError<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FileError::Fs(e) => f.debug_tuple("Fs").field(e).finish(),
            FileError::Read(e) => f.debug_tuple("Read").field(e).finish(),
            FileError::Write(e) => f.debug_tuple("Write").field(e).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_of_paths() {
        assert_eq!(parent("/sdcard/Download/a.bin"), Some("/sdcard/Download"));
        assert_eq!(parent("/sdcard/a.bin"), Some("/sdcard"));
        assert_eq!(parent("/a.bin"), None);
        assert_eq!(parent("a.bin"), None);
    }
}
