//! Threshold-spooling byte storage:
//! - `FileSpool`: a sequential byte sink that buffers in memory while the payload
//!   stays below a configurable threshold and switches to a backing file the
//!   moment a write would cross it.
//! - `SpoolReader` / `PurgingFileReader`: single-pass readers over the stored
//!   bytes, optionally deleting the backing file when dropped.
//! - `SpoolFactory`: hands out configured spools with generated temp-file names.
//!
//! A spool is written, closed, then read exactly once; the producer and the
//! consumer never observe which medium holds the bytes.

pub mod factory;
pub mod reader;
pub mod spool;

pub use bytespool_common::{
    Result,
    error::{Error, ErrorKind},
};
pub use factory::{DEFAULT_THRESHOLD, SpoolFactory, StorageFactory};
pub use reader::{PurgingFileReader, SpoolReader};
pub use spool::{FileSpool, SpoolBuilder, Status, StorageMode};

/// Best-effort teardown for storage objects whose cleanup must never fail.
///
/// Disposal is meant for error paths and final cleanup: it releases the
/// object's resources from whatever state it was left in, swallowing internal
/// failures instead of raising them.
pub trait Dispose {
    /// Dismisses the object, closing any open channels quietly and deleting
    /// the backing file when so configured. The object is permanently
    /// unusable afterwards.
    ///
    /// # Returns
    ///
    /// `true` if and only if no backing file exists after the attempt, either
    /// because none was ever created or because it was deleted; `false` when
    /// the file remains on disk.
    fn dispose(&mut self) -> bool;
}
