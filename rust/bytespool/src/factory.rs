use std::{
    env, fs,
    path::{Path, PathBuf},
};

use bytespool_common::{Result, error::Error};
use uuid::Uuid;

use crate::spool::FileSpool;

/// Default in-memory threshold for factory-created spools, 10 KiB.
pub const DEFAULT_THRESHOLD: u64 = 10240;

/// Hands out configured storage engines.
pub trait StorageFactory: Send + Sync + 'static {
    /// Creates a spool with the factory's default settings and a generated
    /// backing file name.
    ///
    /// # Returns
    ///
    /// A `Result` containing the new [`FileSpool`] on success.
    fn create(&self) -> Result<FileSpool>;

    /// Creates a spool over a caller-chosen backing file and threshold,
    /// keeping the factory's remaining defaults.
    ///
    /// # Arguments
    ///
    /// * `path` - The backing file for the new spool.
    /// * `threshold` - The in-memory threshold in bytes.
    fn create_at(&self, path: &Path, threshold: u64) -> Result<FileSpool>;
}

/// A [`StorageFactory`] that places backing files in a dedicated spool
/// directory, using collision-resistant generated names.
///
/// The directory is created eagerly at factory construction. Delete-on-close
/// and delete-on-dispose defaults set on the factory are applied to every
/// spool it creates.
#[derive(Debug)]
pub struct SpoolFactory {
    dir: PathBuf,
    threshold: u64,
    delete_on_close: bool,
    delete_on_dispose: bool,
}

impl SpoolFactory {
    /// Creates a factory rooted at `dir`, creating the directory if needed.
    ///
    /// Failure to create the directory is a configuration error.
    pub fn new(dir: impl Into<PathBuf>, threshold: u64) -> Result<SpoolFactory> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::config(format!(
                "unable to create spool directory {}: {e}",
                dir.display()
            ))
        })?;
        log::debug!("spool directory: {}", dir.display());
        Ok(SpoolFactory {
            dir,
            threshold,
            delete_on_close: false,
            delete_on_dispose: false,
        })
    }

    /// Creates a factory rooted at a `bytespool` subdirectory of the OS
    /// temporary directory.
    pub fn in_os_temp(threshold: u64) -> Result<SpoolFactory> {
        SpoolFactory::new(env::temp_dir().join("bytespool"), threshold)
    }

    /// Makes every created spool delete its backing file once its reader is
    /// dropped.
    pub fn delete_on_close(mut self) -> SpoolFactory {
        self.delete_on_close = true;
        self
    }

    /// Makes every created spool delete its backing file when disposed.
    pub fn delete_on_dispose(mut self) -> SpoolFactory {
        self.delete_on_dispose = true;
        self
    }

    /// Returns the factory's spool directory.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn generate_file_path(&self) -> PathBuf {
        self.dir.join(format!("spool-{}.tmp", Uuid::new_v4()))
    }

    fn configure(&self, path: PathBuf, threshold: u64) -> Result<FileSpool> {
        let mut builder = FileSpool::deferred(path, threshold);
        if self.delete_on_close {
            builder = builder.delete_on_close();
        }
        if self.delete_on_dispose {
            builder = builder.delete_on_dispose();
        }
        builder.create()
    }
}

impl StorageFactory for SpoolFactory {
    fn create(&self) -> Result<FileSpool> {
        self.configure(self.generate_file_path(), self.threshold)
    }

    fn create_at(&self, path: &Path, threshold: u64) -> Result<FileSpool> {
        self.configure(path.to_path_buf(), threshold)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io, io::Read};

    use bytespool_common::error::ErrorKind;

    use super::{DEFAULT_THRESHOLD, SpoolFactory, StorageFactory};
    use crate::Dispose;

    #[test]
    fn test_factory_creates_directory() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let spool_dir = dir.path().join("nested").join("spools");
        let factory = SpoolFactory::new(&spool_dir, DEFAULT_THRESHOLD)?;
        assert!(spool_dir.is_dir());
        assert_eq!(factory.path(), spool_dir);
        Ok(())
    }

    #[test]
    fn test_factory_rejects_uncreatable_directory() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let obstacle = dir.path().join("occupied");
        fs::write(&obstacle, b"not a directory")?;

        let err = SpoolFactory::new(obstacle.join("spools"), DEFAULT_THRESHOLD).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Configuration { .. }));
        Ok(())
    }

    #[test]
    fn test_created_spools_use_distinct_files() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let factory = SpoolFactory::new(dir.path().join("spools"), 0)?;

        let first = factory.create()?;
        let second = factory.create()?;
        assert_ne!(first.path(), second.path());
        assert!(first.path().exists());
        assert!(second.path().exists());
        assert!(first.path().starts_with(factory.path()));
        Ok(())
    }

    #[test]
    fn test_factory_threshold_applies_to_created_spools() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let factory = SpoolFactory::new(dir.path().join("spools"), 4)?;

        let mut spool = factory.create()?;
        spool.write_bytes(&[0; 4])?;
        assert!(spool.is_in_memory());
        spool.write_byte(1)?;
        assert!(!spool.is_in_memory());
        Ok(())
    }

    #[test]
    fn test_delete_on_close_propagates() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let factory = SpoolFactory::new(dir.path().join("spools"), 2)?.delete_on_close();

        let mut spool = factory.create()?;
        spool.write_bytes(b"payload")?;
        spool.close()?;
        let path = spool.path().to_path_buf();
        assert!(path.exists());

        let mut reader = spool.reader()?;
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        drop(reader);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_delete_on_dispose_propagates() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let factory = SpoolFactory::new(dir.path().join("spools"), 2)?.delete_on_dispose();

        let mut spool = factory.create()?;
        spool.write_bytes(b"payload")?;
        let path = spool.path().to_path_buf();
        assert!(path.exists());

        assert!(spool.dispose());
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_create_at_uses_caller_path() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let factory = SpoolFactory::new(dir.path().join("spools"), DEFAULT_THRESHOLD)?;
        let path = dir.path().join("explicit.tmp");

        let mut spool = factory.create_at(&path, 2)?;
        spool.write_bytes(b"abc")?;
        assert_eq!(spool.path(), path);
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_default_threshold_boundary() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let factory = SpoolFactory::new(dir.path().join("spools"), DEFAULT_THRESHOLD)?;

        let mut spool = factory.create()?;
        spool.write_bytes(&vec![0u8; 10240])?;
        assert!(spool.is_in_memory());
        spool.write_byte(1)?;
        assert!(!spool.is_in_memory());
        Ok(())
    }
}
