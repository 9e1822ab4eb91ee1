use std::{
    fs::{self, File},
    io::{self, Cursor, Read},
    path::{Path, PathBuf},
};

use bytespool_common::{Result, error::Error};

/// A sequential reader over a backing file that can purge the file once
/// reading is done.
///
/// When constructed with `purge_on_drop` set, dropping the reader closes the
/// file handle and then makes a best-effort attempt to delete the file. An
/// already absent file counts as success, and a failed deletion is logged
/// rather than surfaced, so dropping the reader never fails.
#[derive(Debug)]
pub struct PurgingFileReader {
    file: Option<File>,
    path: PathBuf,
    purge_on_drop: bool,
}

impl PurgingFileReader {
    /// Opens the file at `path` for sequential reading.
    ///
    /// # Arguments
    ///
    /// * `path` - The file to read.
    /// * `purge_on_drop` - When `true`, attempts to delete the file when the
    ///   reader is dropped.
    pub fn open(path: impl Into<PathBuf>, purge_on_drop: bool) -> Result<PurgingFileReader> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| Error::io("open spool file", e))?;
        Ok(PurgingFileReader {
            file: Some(file),
            path,
            purge_on_drop,
        })
    }

    /// Returns the path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for PurgingFileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.file {
            Some(file) => file.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for PurgingFileReader {
    fn drop(&mut self) {
        // Close the handle first: some platforms refuse to delete an open file.
        drop(self.file.take());
        if !self.purge_on_drop {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => (),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (),
            Err(e) => log::warn!("failed to purge spool file {}: {e}", self.path.display()),
        }
    }
}

/// A single-pass reader over the bytes stored in a spool, either from an
/// in-memory snapshot or from the backing file.
#[derive(Debug)]
pub struct SpoolReader(ReaderInner);

#[derive(Debug)]
enum ReaderInner {
    Memory(Cursor<Vec<u8>>),
    File(PurgingFileReader),
}

impl SpoolReader {
    pub(crate) fn from_memory(buffer: Vec<u8>) -> SpoolReader {
        SpoolReader(ReaderInner::Memory(Cursor::new(buffer)))
    }

    pub(crate) fn from_file(reader: PurgingFileReader) -> SpoolReader {
        SpoolReader(ReaderInner::File(reader))
    }

    /// Returns `true` when the reader serves from an in-memory snapshot rather
    /// than a backing file.
    pub fn is_in_memory(&self) -> bool {
        matches!(self.0, ReaderInner::Memory(_))
    }

    /// Returns the path of the backing file, or `None` when the payload is
    /// served from memory.
    pub fn path(&self) -> Option<&Path> {
        match &self.0 {
            ReaderInner::Memory(_) => None,
            ReaderInner::File(reader) => Some(reader.path()),
        }
    }
}

impl Read for SpoolReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.0 {
            ReaderInner::Memory(cursor) => cursor.read(buf),
            ReaderInner::File(reader) => reader.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io, io::Read};

    use bytespool_common::error::ErrorKind;

    use super::PurgingFileReader;

    #[test]
    fn test_read_and_purge_on_drop() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("payload.tmp");
        fs::write(&path, b"0123456789")?;

        let mut reader = PurgingFileReader::open(&path, true)?;
        assert_eq!(reader.path(), path);
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        assert_eq!(payload, b"0123456789");
        assert!(path.exists());

        drop(reader);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_file_kept_without_purge_flag() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("payload.tmp");
        fs::write(&path, b"abc")?;

        let reader = PurgingFileReader::open(&path, false)?;
        drop(reader);
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_purge_tolerates_missing_file() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("payload.tmp");
        fs::write(&path, b"abc")?;

        let reader = PurgingFileReader::open(&path, true)?;
        fs::remove_file(&path)?;
        drop(reader);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_open_missing_file_fails() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("absent.tmp");
        let err = PurgingFileReader::open(&path, false).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io { .. }));
        Ok(())
    }
}
