use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    mem,
    path::{Path, PathBuf},
};

use bytespool_common::{Result, error::Error};

use crate::Dispose;
use crate::reader::{PurgingFileReader, SpoolReader};

/// Read/write phase of a [`FileSpool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Accepting writes, not yet readable.
    Write,
    /// Closed for writing, readable.
    Read,
    /// Disposed, permanently unusable.
    Dismissed,
}

/// Backing medium currently holding the spooled bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Memory,
    Disk,
}

#[derive(Debug)]
enum State {
    /// Accepting writes into the memory buffer.
    Buffering(Vec<u8>),
    /// Accepting writes into the open disk channel.
    Spilled(File),
    /// Closed for writing, payload still in memory.
    SealedMemory(Vec<u8>),
    /// Closed for writing, payload in the backing file.
    SealedDisk,
    /// The reader has been taken, payload no longer owned by the spool.
    Drained(StorageMode),
    Dismissed(StorageMode),
}

/// A sequential byte sink that buffers in memory while the payload stays at or
/// below a configured threshold, and switches to a backing file the moment a
/// write would cross it.
///
/// A spool starts in the [`Write`](Status::Write) phase, accepting bytes and
/// rejecting read access. Once all the data has been written, [`close`]
/// switches it to the [`Read`](Status::Read) phase, after which [`reader`]
/// hands out a single [`SpoolReader`] over the stored bytes. Neither the
/// producer nor the consumer needs to know which medium ended up holding the
/// payload.
///
/// [`dispose`](Dispose::dispose) tears the spool down from any phase,
/// optionally deleting the backing file, and never fails. Dropping an
/// undisposed spool performs the same best-effort cleanup.
///
/// [`close`]: FileSpool::close
/// [`reader`]: FileSpool::reader
#[derive(Debug)]
pub struct FileSpool {
    path: PathBuf,
    threshold: u64,
    max_capacity: Option<u64>,
    delete_on_close: bool,
    delete_on_dispose: bool,
    written: u64,
    state: State,
}

impl FileSpool {
    /// Starts building a spool that keeps data in memory until it grows beyond
    /// `threshold` bytes, then spills it to the file at `path`.
    ///
    /// A threshold of zero writes straight to the file.
    pub fn deferred(path: impl Into<PathBuf>, threshold: u64) -> SpoolBuilder {
        SpoolBuilder {
            path: path.into(),
            threshold,
            append: false,
            max_capacity: None,
            delete_on_close: false,
            delete_on_dispose: false,
        }
    }

    /// Starts building a spool that always writes to the file at `path`.
    ///
    /// When `append` is set, existing file contents are preserved and new
    /// bytes are appended, which is useful for resuming an earlier write.
    pub fn direct(path: impl Into<PathBuf>, append: bool) -> SpoolBuilder {
        SpoolBuilder {
            path: path.into(),
            threshold: 0,
            append,
            max_capacity: None,
            delete_on_close: false,
            delete_on_dispose: false,
        }
    }

    /// Writes a single byte.
    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    /// Writes the entire buffer, either into the memory buffer or into the
    /// backing file.
    ///
    /// The write is all-or-nothing with respect to the configured maximum
    /// capacity: a call that would exceed it fails without committing any of
    /// its bytes.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.ensure_writable("write")?;
        self.ensure_capacity(buf.len() as u64)?;
        if self.check_threshold(buf.len())? {
            self.memory_buffer()?.extend_from_slice(buf);
        } else {
            self.disk_channel()?
                .write_all(buf)
                .map_err(|e| Error::io("write to spool file", e))?;
        }
        self.written += buf.len() as u64;
        Ok(())
    }

    /// Flushes the disk channel. A no-op while the payload is in memory.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_writable("flush")?;
        if let State::Spilled(file) = &mut self.state {
            file.flush().map_err(|e| Error::io("flush spool file", e))?;
        }
        Ok(())
    }

    /// Ends the write phase and makes the spool readable.
    ///
    /// An open disk channel is flushed and closed. The transition to the read
    /// phase happens regardless, so a flush failure leaves the spool readable.
    /// Closing an already closed spool is a no-op; closing a disposed one is
    /// an error.
    pub fn close(&mut self) -> Result<()> {
        match mem::replace(&mut self.state, State::SealedDisk) {
            State::Buffering(buffer) => {
                self.state = State::SealedMemory(buffer);
                Ok(())
            }
            State::Spilled(mut file) => file.flush().map_err(|e| Error::io("flush spool file", e)),
            state @ (State::SealedMemory(_) | State::SealedDisk | State::Drained(_)) => {
                self.state = state;
                Ok(())
            }
            state @ State::Dismissed(_) => {
                self.state = state;
                Err(Error::invalid_state("close", "dismissed"))
            }
        }
    }

    /// Takes the single reader over the stored bytes.
    ///
    /// Valid only after [`close`](FileSpool::close), and at most once: the
    /// in-memory payload moves into the reader, and a file-backed reader owns
    /// the delete-on-close decision for the backing file. If opening the
    /// backing file fails the spool is left unchanged and the call can be
    /// retried.
    pub fn reader(&mut self) -> Result<SpoolReader> {
        match mem::replace(&mut self.state, State::Drained(StorageMode::Memory)) {
            State::SealedMemory(buffer) => Ok(SpoolReader::from_memory(buffer)),
            State::SealedDisk => match PurgingFileReader::open(&self.path, self.delete_on_close) {
                Ok(reader) => {
                    self.state = State::Drained(StorageMode::Disk);
                    Ok(SpoolReader::from_file(reader))
                }
                Err(e) => {
                    self.state = State::SealedDisk;
                    Err(e)
                }
            },
            state => {
                self.state = state;
                Err(Error::invalid_state("reader", self.state_label()))
            }
        }
    }

    /// Returns `true` while the payload is held in memory.
    pub fn is_in_memory(&self) -> bool {
        self.mode() == StorageMode::Memory
    }

    /// Returns the backing medium currently (or last) holding the payload.
    pub fn mode(&self) -> StorageMode {
        match self.state {
            State::Buffering(_) | State::SealedMemory(_) => StorageMode::Memory,
            State::Spilled(_) | State::SealedDisk => StorageMode::Disk,
            State::Drained(mode) | State::Dismissed(mode) => mode,
        }
    }

    /// Returns the current phase of the spool.
    pub fn status(&self) -> Status {
        match self.state {
            State::Buffering(_) | State::Spilled(_) => Status::Write,
            State::SealedMemory(_) | State::SealedDisk | State::Drained(_) => Status::Read,
            State::Dismissed(_) => Status::Dismissed,
        }
    }

    /// Returns the number of bytes accepted by this spool so far.
    ///
    /// In append mode this counts only the bytes written through the spool,
    /// not any pre-existing file content.
    pub fn current_size(&self) -> u64 {
        self.written
    }

    /// Returns the path of the backing file, whether or not it has been
    /// created yet.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_writable(&self, operation: &str) -> Result<()> {
        match self.status() {
            Status::Write => Ok(()),
            _ => Err(Error::invalid_state(operation, self.state_label())),
        }
    }

    fn ensure_capacity(&self, requested: u64) -> Result<()> {
        if let Some(capacity) = self.max_capacity {
            if self.written + requested > capacity {
                return Err(Error::capacity_exceeded(capacity, self.written, requested));
            }
        }
        Ok(())
    }

    /// Decides where the next `incoming` bytes go: `true` for the memory
    /// buffer, `false` for the disk channel, switching to the file first if
    /// this write is the one that crosses the threshold.
    fn check_threshold(&mut self, incoming: usize) -> Result<bool> {
        if let State::Buffering(buffer) = &self.state {
            if (buffer.len() + incoming) as u64 <= self.threshold {
                return Ok(true);
            }
        }
        if self.is_in_memory() {
            self.switch_to_file()?;
        }
        Ok(false)
    }

    /// One-time migration: opens the backing file (truncating), flushes the
    /// whole memory buffer into it and discards the buffer. On failure the
    /// buffer is left intact and the spool stays in memory mode.
    fn switch_to_file(&mut self) -> Result<()> {
        log::debug!("switching to file {}", self.path.display());
        let mut file = File::create(&self.path).map_err(|e| Error::io("create spool file", e))?;
        if let State::Buffering(buffer) = &self.state {
            file.write_all(buffer)
                .map_err(|e| Error::io("spill buffered data", e))?;
        }
        self.state = State::Spilled(file);
        Ok(())
    }

    fn memory_buffer(&mut self) -> Result<&mut Vec<u8>> {
        let state = self.state_label();
        match &mut self.state {
            State::Buffering(buffer) => Ok(buffer),
            _ => Err(Error::invalid_state("write", state)),
        }
    }

    fn disk_channel(&mut self) -> Result<&mut File> {
        let state = self.state_label();
        match &mut self.state {
            State::Spilled(file) => Ok(file),
            _ => Err(Error::invalid_state("write", state)),
        }
    }

    fn state_label(&self) -> &'static str {
        match self.state {
            State::Buffering(_) | State::Spilled(_) => "write",
            State::SealedMemory(_) | State::SealedDisk => "read",
            State::Drained(_) => "drained",
            State::Dismissed(_) => "dismissed",
        }
    }

    /// Best-effort removal of the backing file. Returns `true` iff the file
    /// does not exist afterwards.
    fn cleanup_backing_file(&self) -> bool {
        if !self.path.exists() {
            return true;
        }
        if !self.delete_on_dispose {
            return false;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                log::warn!("failed to delete spool file {}: {e}", self.path.display());
                false
            }
        }
    }
}

impl Dispose for FileSpool {
    fn dispose(&mut self) -> bool {
        let mode = self.mode();
        // The transition comes first; dropping the old state closes any open
        // channel and frees any buffered payload.
        drop(mem::replace(&mut self.state, State::Dismissed(mode)));
        self.cleanup_backing_file()
    }
}

impl Drop for FileSpool {
    fn drop(&mut self) {
        if !matches!(self.state, State::Dismissed(_)) {
            self.dispose();
        }
    }
}

impl io::Write for FileSpool {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        FileSpool::flush(self)?;
        Ok(())
    }
}

/// Configuration for a [`FileSpool`], finalized by a single
/// [`create`](SpoolBuilder::create) call.
///
/// All settings live on the builder and the builder is consumed, so a spool
/// cannot be reconfigured once it has accepted its first byte.
pub struct SpoolBuilder {
    path: PathBuf,
    threshold: u64,
    append: bool,
    max_capacity: Option<u64>,
    delete_on_close: bool,
    delete_on_dispose: bool,
}

impl SpoolBuilder {
    /// Caps the total number of bytes the spool will ever accept.
    ///
    /// Zero is rejected at [`create`](SpoolBuilder::create); leaving the cap
    /// unset means unbounded.
    pub fn max_capacity(mut self, capacity: u64) -> SpoolBuilder {
        self.max_capacity = Some(capacity);
        self
    }

    /// Deletes the backing file once the reader handed out by
    /// [`FileSpool::reader`] is dropped.
    pub fn delete_on_close(mut self) -> SpoolBuilder {
        self.delete_on_close = true;
        self
    }

    /// Deletes the backing file when the spool is disposed (or dropped
    /// undisposed).
    pub fn delete_on_dispose(mut self) -> SpoolBuilder {
        self.delete_on_dispose = true;
        self
    }

    /// Validates the configuration and creates the spool.
    ///
    /// With a threshold of zero the disk channel is opened immediately,
    /// honoring the append flag; otherwise no file is touched until the
    /// threshold is crossed.
    pub fn create(self) -> Result<FileSpool> {
        if self.max_capacity == Some(0) {
            return Err(Error::config("max capacity must be positive"));
        }
        let state = if self.threshold == 0 {
            State::Spilled(self.open_channel()?)
        } else {
            State::Buffering(Vec::new())
        };
        Ok(FileSpool {
            path: self.path,
            threshold: self.threshold,
            max_capacity: self.max_capacity,
            delete_on_close: self.delete_on_close,
            delete_on_dispose: self.delete_on_dispose,
            written: 0,
            state,
        })
    }

    fn open_channel(&self) -> Result<File> {
        let mut options = OpenOptions::new();
        if self.append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        options
            .create(true)
            .open(&self.path)
            .map_err(|e| Error::io("create spool file", e))
    }
}
