//! Job data model: the per-batch state machine and the records it owns.

pub mod manager;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConvertError;
use crate::formats::FileCategory;

pub use manager::{JobManager, JobSummary, ManagerStatistics};

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ─── Status ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Expired
        )
    }

    /// The state machine. Expiry is reachable from every state because the
    /// reaper runs on wall-clock age alone.
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        if to == JobStatus::Expired {
            return *self != JobStatus::Expired;
        }
        matches!(
            (self, to),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Cancelled)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── File records ───────────────────────────────────────────────────────────

/// A validated input file. Immutable once attached to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub original_name: String,
    pub stored_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub extension: String,
    pub category: FileCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Per-file target override; takes precedence over the job-level target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_format: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// One successful conversion output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedFileRecord {
    /// Inherited from the source [`FileRecord`].
    pub id: String,
    /// User-facing name: source stem with the target extension.
    pub original_name: String,
    pub stored_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub extension: String,
    pub converted_at: DateTime<Utc>,
    pub conversion_secs: f64,
    pub engine: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
}

/// One failed file. Never silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionFailure {
    pub file_name: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub failed_at: DateTime<Utc>,
}

impl ConversionFailure {
    pub fn from_error(file_name: impl Into<String>, error: &ConvertError) -> Self {
        Self {
            file_name: file_name.into(),
            error: error.to_string(),
            code: Some(error.code().to_string()),
            failed_at: Utc::now(),
        }
    }
}

// ─── Progress ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_remaining_secs: Option<f64>,
}

impl Progress {
    fn new(total: usize, done: usize) -> Self {
        Self {
            current: done,
            total,
            percentage: percentage(done, total),
            current_file: None,
            estimated_remaining_secs: None,
        }
    }

    fn update(&mut self, done: usize, elapsed_secs: f64) {
        self.current = done;
        self.percentage = percentage(done, self.total);
        let remaining = if done > 0 {
            elapsed_secs * (self.total - done) as f64 / done as f64
        } else {
            0.0
        };
        self.estimated_remaining_secs = Some(round2(remaining));
    }
}

fn percentage(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = round2(done as f64 / total as f64 * 100.0);
    // 100 is reserved for a fully attempted batch.
    if done < total && pct >= 100.0 {
        99.99
    } else {
        pct
    }
}

// ─── Options ────────────────────────────────────────────────────────────────

/// Optional conversion knobs. Absent fields mean "use engine default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    /// Output width and height in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<(u32, u32)>,
    /// Target bitrate, e.g. `"192k"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    /// Format-specific knobs engines may consult (`crf`, `sampleRate`, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ConversionOptions {
    pub fn is_empty(&self) -> bool {
        self.quality.is_none()
            && self.resolution.is_none()
            && self.bitrate.is_none()
            && self.frame_rate.is_none()
            && self.codec.is_none()
            && self.extra.is_empty()
    }
}

// ─── Job ────────────────────────────────────────────────────────────────────

/// One batch conversion request. Mutated only through [`JobManager`]
/// operations, which apply each change atomically and bump `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_format: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Validated input files, in submission order.
    pub files: Vec<FileRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub converted_files: Vec<ConvertedFileRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ConversionFailure>,
    #[serde(default)]
    pub options: ConversionOptions,
    pub progress: Progress,
    /// Submitted file count, including files rejected at validation.
    /// Fixed at creation.
    pub total_files: usize,
    pub completed_files: usize,
    pub failed_files: usize,
    /// Summed per-file conversion seconds across all attempts.
    pub processing_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a queued job from validated files plus the failures recorded
    /// for submissions that did not pass validation.
    pub fn new(
        files: Vec<FileRecord>,
        validation_failures: Vec<ConversionFailure>,
        target_format: Option<String>,
        options: ConversionOptions,
    ) -> Self {
        let now = Utc::now();
        let total_files = files.len() + validation_failures.len();
        let failed_files = validation_failures.len();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Queued,
            target_format,
            created_at: now,
            updated_at: now,
            files,
            converted_files: Vec::new(),
            errors: validation_failures,
            options,
            progress: Progress::new(total_files, failed_files),
            total_files,
            completed_files: 0,
            failed_files,
            processing_secs: 0.0,
            archive_path: None,
            expires_at: None,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// True once every submitted file has a recorded outcome.
    pub fn fully_attempted(&self) -> bool {
        self.completed_files + self.failed_files == self.total_files
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub(crate) fn transition(&mut self, to: JobStatus) -> Result<(), crate::error::JobError> {
        if !self.status.can_transition_to(to) {
            return Err(crate::error::JobError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        self.touch();
        Ok(())
    }

    pub(crate) fn record_success(&mut self, record: ConvertedFileRecord, batch_elapsed_secs: f64) {
        // A result landing after the job has settled (cancelled, most
        // commonly) is discarded, not merged.
        if self.status.is_terminal() {
            return;
        }
        self.processing_secs = round2(self.processing_secs + record.conversion_secs);
        self.converted_files.push(record);
        self.completed_files = self.converted_files.len();
        self.progress
            .update(self.completed_files + self.failed_files, batch_elapsed_secs);
        self.touch();
    }

    pub(crate) fn record_failure(
        &mut self,
        failure: ConversionFailure,
        attempt_secs: f64,
        batch_elapsed_secs: f64,
    ) {
        if self.status.is_terminal() {
            return;
        }
        self.processing_secs = round2(self.processing_secs + attempt_secs);
        self.errors.push(failure);
        self.failed_files = self.errors.len();
        self.progress
            .update(self.completed_files + self.failed_files, batch_elapsed_secs);
        self.touch();
    }

    pub(crate) fn set_current_file(&mut self, name: Option<String>) {
        self.progress.current_file = name;
        self.touch();
    }
}
