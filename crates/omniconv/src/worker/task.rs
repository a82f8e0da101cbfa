//! Units of work exchanged with the pool.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::job::{ConversionFailure, ConversionOptions, ConvertedFileRecord, FileRecord};

/// One file conversion handed to a worker.
#[derive(Debug)]
pub struct FileTask {
    pub file: FileRecord,
    /// Resolved target extension, lowercase without the dot.
    pub target_ext: String,
    pub output_path: PathBuf,
    pub options: ConversionOptions,
    /// Set when the job is cancelled; pending tasks skip their engine.
    pub cancel: Arc<AtomicBool>,
    /// Set when the run hit a fatal error; pending tasks skip and the
    /// coordinator records them as system failures.
    pub abort: Arc<AtomicBool>,
}

/// Why a task never reached its engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Cancelled,
    Aborted,
}

/// What a worker reports back. `Started` precedes exactly one terminal
/// outcome per executed task; skipped tasks emit no `Started`.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Started { file_name: String },
    Success { record: ConvertedFileRecord },
    Failure { failure: ConversionFailure, secs: f64 },
    Skipped { file_name: String, reason: SkipReason },
}
