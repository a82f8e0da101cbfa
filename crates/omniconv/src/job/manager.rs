//! In-memory job table with optional write-through persistence.
//!
//! The cache is the source of truth while the process is alive; every
//! mutation is applied under an exclusive lock and then mirrored to the
//! database (when one is attached) so jobs survive restarts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::Serialize;

use crate::db::{job_repo, Database, DatabaseError};
use crate::error::JobError;
use crate::job::{
    ConversionFailure, ConversionOptions, ConvertedFileRecord, FileRecord, Job, JobStatus,
};

/// Condensed listing view of a job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub status: JobStatus,
    pub total_files: usize,
    pub completed_files: usize,
    pub failed_files: usize,
    /// Percentage of submitted files converted successfully, one decimal.
    pub success_rate: f64,
    pub total_input_bytes: u64,
    pub total_output_bytes: u64,
    /// Overall size reduction across successful conversions, in percent.
    pub compression_ratio: f64,
    pub has_errors: bool,
    pub download_available: bool,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl JobSummary {
    pub fn from_job(job: &Job) -> Self {
        let success_rate = if job.total_files == 0 {
            0.0
        } else {
            let rate = job.completed_files as f64 / job.total_files as f64 * 100.0;
            (rate * 10.0).round() / 10.0
        };

        let total_input_bytes: u64 = job.files.iter().map(|f| f.size).sum();
        let total_output_bytes: u64 = job.converted_files.iter().map(|f| f.size).sum();

        // Ratio compares converted outputs against their own sources, so a
        // job with failures is not skewed by bytes that never converted.
        let converted_input: u64 = job
            .converted_files
            .iter()
            .filter_map(|c| job.files.iter().find(|f| f.id == c.id))
            .map(|f| f.size)
            .sum();

        Self {
            id: job.id.clone(),
            status: job.status,
            total_files: job.total_files,
            completed_files: job.completed_files,
            failed_files: job.failed_files,
            success_rate,
            total_input_bytes,
            total_output_bytes,
            compression_ratio: crate::engine::compression_ratio(
                converted_input,
                total_output_bytes,
            ),
            has_errors: job.has_errors(),
            download_available: job.archive_path.is_some(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Aggregate counters over every job the manager currently tracks.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStatistics {
    pub total_jobs: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total_files: usize,
    pub converted_files: usize,
    pub failed_files: usize,
}

/// Thread-safe job table.
pub struct JobManager {
    db: RwLock<Option<Database>>,
    jobs: RwLock<HashMap<String, Job>>,
    /// Cooperative cancellation flags for jobs currently being processed.
    cancel_flags: RwLock<HashMap<String, Arc<AtomicBool>>>,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            db: RwLock::new(None),
            jobs: RwLock::new(HashMap::new()),
            cancel_flags: RwLock::new(HashMap::new()),
        }
    }

    // ─── Database attachment ────────────────────────────────────────────────

    /// Attaches a database for write-through persistence.
    pub fn set_database(&self, db: Database) {
        let mut guard = match self.db.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Database lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *guard = Some(db);
    }

    fn database(&self) -> Option<Database> {
        let guard = match self.db.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Database lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.clone()
    }

    /// Reloads unfinished jobs plus recent history into the cache.
    /// Returns how many jobs were loaded.
    pub fn load_from_database(&self) -> Result<usize, DatabaseError> {
        let Some(db) = self.database() else {
            return Ok(0);
        };

        let mut loaded = 0;
        let mut jobs = self.write_jobs();

        for status in [JobStatus::Queued, JobStatus::Processing] {
            for row in job_repo::load_by_status(&db, status.as_str())? {
                if let Some(job) = row_to_job(&row) {
                    if !jobs.contains_key(&job.id) {
                        jobs.insert(job.id.clone(), job);
                        loaded += 1;
                    }
                }
            }
        }

        for row in job_repo::load_recent(&db, 100)? {
            if let Some(job) = row_to_job(&row) {
                if job.status != JobStatus::Expired && !jobs.contains_key(&job.id) {
                    jobs.insert(job.id.clone(), job);
                    loaded += 1;
                }
            }
        }

        log::info!("Loaded {} jobs from database", loaded);
        Ok(loaded)
    }

    // ─── Lifecycle operations ───────────────────────────────────────────────

    /// Creates a queued job and returns a snapshot of it.
    pub fn create(
        &self,
        files: Vec<FileRecord>,
        validation_failures: Vec<ConversionFailure>,
        target_format: Option<String>,
        options: ConversionOptions,
        retention: chrono::Duration,
    ) -> Job {
        let mut job = Job::new(files, validation_failures, target_format, options);
        job.expires_at = Some(job.created_at + retention);
        let snapshot = job.clone();

        log::info!(
            "Created job {} ({} files, {} rejected at validation)",
            job.id,
            job.files.len(),
            job.failed_files
        );

        self.write_jobs().insert(job.id.clone(), job);
        self.persist(&snapshot);
        snapshot
    }

    /// Returns a snapshot of a job, falling back to the database for jobs
    /// no longer cached.
    pub fn get(&self, id: &str) -> Option<Job> {
        if let Some(job) = self.read_jobs().get(id) {
            return Some(job.clone());
        }

        let db = self.database()?;
        match job_repo::find_by_id(&db, id) {
            Ok(Some(row)) => row_to_job(&row),
            Ok(None) => None,
            Err(e) => {
                log::error!("Database lookup for job {} failed: {}", id, e);
                None
            }
        }
    }

    /// Lists jobs newest first, optionally filtered by status.
    pub fn list(&self, status: Option<JobStatus>, limit: usize) -> Vec<JobSummary> {
        let jobs = self.read_jobs();
        let mut selected: Vec<&Job> = jobs
            .values()
            .filter(|job| status.map_or(true, |s| job.status == s))
            .collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        selected
            .into_iter()
            .take(limit)
            .map(JobSummary::from_job)
            .collect()
    }

    /// Moves a queued job into processing and hands out its cancel flag.
    pub fn begin_processing(&self, id: &str) -> Result<Job, JobError> {
        let snapshot = self.with_job_mut(id, |job| job.transition(JobStatus::Processing))?;

        self.write_flags()
            .insert(id.to_string(), Arc::new(AtomicBool::new(false)));
        log::info!(
            "Job {} processing ({} files)",
            snapshot.id,
            snapshot.files.len()
        );
        Ok(snapshot)
    }

    /// The cooperative cancel flag for a job currently being processed.
    pub fn cancel_flag(&self, id: &str) -> Option<Arc<AtomicBool>> {
        self.read_flags().get(id).cloned()
    }

    pub fn record_file_success(
        &self,
        id: &str,
        record: ConvertedFileRecord,
        batch_elapsed_secs: f64,
    ) -> Result<Job, JobError> {
        self.with_job_mut(id, |job| {
            job.record_success(record, batch_elapsed_secs);
            Ok(())
        })
    }

    pub fn record_file_failure(
        &self,
        id: &str,
        failure: ConversionFailure,
        attempt_secs: f64,
        batch_elapsed_secs: f64,
    ) -> Result<Job, JobError> {
        self.with_job_mut(id, |job| {
            job.record_failure(failure, attempt_secs, batch_elapsed_secs);
            Ok(())
        })
    }

    pub fn set_current_file(&self, id: &str, name: Option<String>) -> Result<Job, JobError> {
        self.with_job_mut(id, |job| {
            job.set_current_file(name);
            Ok(())
        })
    }

    /// Settles the terminal status after a processing run. Cancelled jobs
    /// keep their status; otherwise one success is enough for COMPLETED.
    pub fn finalize_run(
        &self,
        id: &str,
        archive_path: Option<PathBuf>,
    ) -> Result<Job, JobError> {
        let snapshot = self.with_job_mut(id, |job| {
            if job.status == JobStatus::Processing {
                let to = if job.completed_files > 0 {
                    JobStatus::Completed
                } else {
                    JobStatus::Failed
                };
                job.transition(to)?;
            }
            if archive_path.is_some() {
                job.archive_path = archive_path;
            }
            job.set_current_file(None);
            Ok(())
        })?;

        self.write_flags().remove(id);
        log::info!(
            "Job {} finished as {} ({}/{} converted)",
            snapshot.id,
            snapshot.status,
            snapshot.completed_files,
            snapshot.total_files
        );
        Ok(snapshot)
    }

    /// Cancels a queued or processing job. Files not yet started observe
    /// the cancel flag and are skipped; a file already in flight runs to
    /// completion but its result is discarded.
    pub fn cancel(&self, id: &str) -> Result<Job, JobError> {
        let snapshot = self.with_job_mut(id, |job| job.transition(JobStatus::Cancelled))?;

        if let Some(flag) = self.cancel_flag(id) {
            flag.store(true, Ordering::Relaxed);
        }
        log::info!("Job {} cancelled", id);
        Ok(snapshot)
    }

    /// Expires jobs past their retention window and drops them from the
    /// cache. Returns how many were reaped.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let expired_ids: Vec<String> = self
            .read_jobs()
            .values()
            .filter(|job| job.expires_at.map_or(false, |at| at < now))
            .map(|job| job.id.clone())
            .collect();

        let mut reaped = 0;
        for id in expired_ids {
            let result = self.with_job_mut(&id, |job| job.transition(JobStatus::Expired));
            match result {
                Ok(_) => {
                    self.write_jobs().remove(&id);
                    self.write_flags().remove(&id);
                    reaped += 1;
                }
                Err(e) => log::warn!("Could not expire job {}: {}", id, e),
            }
        }

        if reaped > 0 {
            log::info!("Expired {} jobs", reaped);
        }
        reaped
    }

    pub fn statistics(&self) -> ManagerStatistics {
        let jobs = self.read_jobs();
        let mut stats = ManagerStatistics {
            total_jobs: jobs.len(),
            ..Default::default()
        };
        for job in jobs.values() {
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
                JobStatus::Expired => {}
            }
            stats.total_files += job.total_files;
            stats.converted_files += job.completed_files;
            stats.failed_files += job.failed_files;
        }
        stats
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    /// Applies a mutation under the exclusive lock, persists the result,
    /// and returns the updated snapshot.
    fn with_job_mut<F>(&self, id: &str, f: F) -> Result<Job, JobError>
    where
        F: FnOnce(&mut Job) -> Result<(), JobError>,
    {
        let snapshot = {
            let mut jobs = self.write_jobs();
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| JobError::NotFound(id.to_string()))?;
            f(job)?;
            job.clone()
        };
        self.persist(&snapshot);
        Ok(snapshot)
    }

    /// Write-through mirror. Persistence failures are logged, not
    /// propagated; the cache stays authoritative.
    fn persist(&self, job: &Job) {
        let Some(db) = self.database() else {
            return;
        };
        let Some(row) = job_to_row(job) else {
            return;
        };
        if let Err(e) = job_repo::upsert(&db, &row) {
            log::error!("Failed to persist job {}: {}", job.id, e);
        }
    }

    fn read_jobs(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Job>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job table lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_jobs(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Job>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job table lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn read_flags(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<AtomicBool>>> {
        match self.cancel_flags.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Cancel flag lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_flags(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<AtomicBool>>> {
        match self.cancel_flags.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Cancel flag lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

fn job_to_row(job: &Job) -> Option<job_repo::JobRow> {
    match serde_json::to_string(job) {
        Ok(document) => Some(job_repo::JobRow {
            id: job.id.clone(),
            status: job.status.to_string(),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            document,
        }),
        Err(e) => {
            log::error!("Failed to serialize job {}: {}", job.id, e);
            None
        }
    }
}

fn row_to_job(row: &job_repo::JobRow) -> Option<Job> {
    match serde_json::from_str(&row.document) {
        Ok(job) => Some(job),
        Err(e) => {
            log::error!("Failed to deserialize job {}: {}", row.id, e);
            None
        }
    }
}
