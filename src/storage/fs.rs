use super::error::Error;
use super::{FileSystem, ReadFile, WriteFile};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;

/// [`FileSystem`] backed by `std::fs`.
///
/// Absolute paths are resolved against an optional root directory, so that
/// `/sdcard/Download/a.bin` can live under a mount point or a scratch
/// directory in tests.
#[derive(Debug, Clone, Default)]
pub struct StdFileSystem {
    root: Option<PathBuf>,
}

impl StdFileSystem {
    /// Paths are used as given.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Paths are resolved below `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, Error> {
        if !path.starts_with('/') || path.split('/').any(|part| part == "..") {
            return Err(Error::InvalidPath);
        }
        Ok(match &self.root {
            Some(root) => root.join(path.trim_start_matches('/')),
            None => PathBuf::from(path),
        })
    }
}

/// A file opened through [`StdFileSystem`].
#[derive(Debug)]
pub struct StdFile {
    file: File,
}

impl ReadFile for StdFile {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.file
            .read(buf)
            .map_err(|e| Error::from_io(&e, Error::ReadError))
    }
}

impl WriteFile for StdFile {
    type Error = Error;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.file
            .write_all(bytes)
            .map_err(|e| Error::from_io(&e, Error::WriteError))
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.file
            .flush()
            .map_err(|e| Error::from_io(&e, Error::WriteError))
    }
}

impl FileSystem for StdFileSystem {
    type Error = Error;
    type Reader = StdFile;
    type Writer = StdFile;

    fn create_dir_all(&mut self, path: &str) -> Result<(), Self::Error> {
        fs::create_dir_all(self.resolve(path)?).map_err(|_| Error::DirectoryError)
    }

    fn open(&mut self, path: &str) -> Result<Self::Reader, Self::Error> {
        let file = File::open(self.resolve(path)?)
            .map_err(|e| Error::from_io(&e, Error::OpenError))?;
        Ok(StdFile { file })
    }

    fn create(&mut self, path: &str) -> Result<Self::Writer, Self::Error> {
        let file = File::create(self.resolve(path)?)
            .map_err(|e| Error::from_io(&e, Error::OpenError))?;
        Ok(StdFile { file })
    }

    fn append(&mut self, path: &str) -> Result<Self::Writer, Self::Error> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.resolve(path)?)
            .map_err(|e| Error::from_io(&e, Error::OpenError))?;
        Ok(StdFile { file })
    }

    fn len(&mut self, path: &str) -> Result<Option<u64>, Self::Error> {
        match fs::metadata(self.resolve(path)?) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(_) => Err(Error::ReadError),
        }
    }

    fn truncate(&mut self, path: &str, len: u64) -> Result<(), Self::Error> {
        let file = OpenOptions::new()
            .write(true)
            .open(self.resolve(path)?)
            .map_err(|e| Error::from_io(&e, Error::OpenError))?;
        file.set_len(len)
            .map_err(|e| Error::from_io(&e, Error::WriteError))
    }
}
