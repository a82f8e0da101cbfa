//! Persistent file areas: uploads, conversion outputs, download archives.

pub mod filesystem;

pub use filesystem::FileStorage;

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::StorageError;
use crate::job::{ConvertedFileRecord, FileRecord};

/// Counters from an age-based sweep of the storage roots.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupStats {
    pub files_removed: u64,
    pub bytes_freed: u64,
}

pub trait Storage: Send + Sync {
    /// Persists upload bytes under a collision-free stored name and
    /// returns the resulting record.
    fn save_upload(&self, bytes: &[u8], name: &str) -> Result<FileRecord, StorageError>;

    /// Reserves an output path for converting `file` to `target_ext`.
    fn allocate_output_path(
        &self,
        file: &FileRecord,
        target_ext: &str,
    ) -> Result<PathBuf, StorageError>;

    /// Bundles converted outputs into a download archive. `None` when
    /// there is nothing to bundle.
    fn archive_results(
        &self,
        job_id: &str,
        files: &[ConvertedFileRecord],
    ) -> Result<Option<PathBuf>, StorageError>;

    /// Removes stored files older than `max_age` from every root.
    fn reap_older_than(&self, max_age: Duration) -> Result<CleanupStats, StorageError>;
}
