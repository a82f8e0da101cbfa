//! Batch coordination.
//!
//! [`BatchCoordinator::run`] drives one job end to end: it transitions the
//! job to processing, fans its files out to the worker pool, applies every
//! outcome to the job from this single thread, archives the outputs and
//! finalizes the status. Workers never touch the [`JobManager`] or the
//! [`Storage`] backend.

pub mod progress;

pub use progress::{BroadcastProgress, NoopProgress, ProgressReporter};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::info_span;

use crate::broadcast::JobEvent;
use crate::engine::Dispatcher;
use crate::error::{ConvertError, DispatchError, JobError, Result};
use crate::job::{
    round2, ConversionFailure, ConvertedFileRecord, FileRecord, Job, JobManager, JobStatus,
};
use crate::sanitize::redact_filename;
use crate::storage::Storage;
use crate::worker::{FileOutcome, FileTask, SkipReason, WorkerPool};

// ─── Batch Report ───────────────────────────────────────────────────────────

/// Summary handed back once a batch run has settled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub job_id: String,
    pub status: JobStatus,
    pub total_files: usize,
    pub completed_files: usize,
    pub failed_files: usize,
    /// Wall-clock seconds for the whole run.
    pub total_secs: f64,
    /// Mean conversion seconds per attempted file. Zero when nothing ran.
    pub average_secs_per_file: f64,
    pub converted_files: Vec<ConvertedFileRecord>,
    pub errors: Vec<ConversionFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
}

impl BatchReport {
    fn from_job(job: &Job, total_secs: f64) -> Self {
        let attempted = job.completed_files + job.failed_files;
        let average_secs_per_file = if attempted > 0 {
            round2(job.processing_secs / attempted as f64)
        } else {
            0.0
        };
        Self {
            job_id: job.id.clone(),
            status: job.status,
            total_files: job.total_files,
            completed_files: job.completed_files,
            failed_files: job.failed_files,
            total_secs,
            average_secs_per_file,
            converted_files: job.converted_files.clone(),
            errors: job.errors.clone(),
            archive_path: job.archive_path.clone(),
        }
    }
}

// ─── Coordinator ────────────────────────────────────────────────────────────

pub struct BatchCoordinator {
    dispatcher: Arc<Dispatcher>,
    manager: Arc<JobManager>,
    storage: Arc<dyn Storage>,
    reporter: Arc<dyn ProgressReporter>,
    workers_per_job: usize,
}

impl BatchCoordinator {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        manager: Arc<JobManager>,
        storage: Arc<dyn Storage>,
        reporter: Arc<dyn ProgressReporter>,
        workers_per_job: usize,
    ) -> Self {
        Self {
            dispatcher,
            manager,
            storage,
            reporter,
            workers_per_job: workers_per_job.max(1),
        }
    }

    /// Runs every file of the job through the worker pool and returns the
    /// settled report. Files that cannot even be handed to a worker (no
    /// target format, no output slot) are recorded as failures without
    /// blocking the rest of the batch.
    pub fn run(&self, job_id: &str) -> Result<BatchReport> {
        let _span = info_span!("batch", job_id = %job_id).entered();

        let snapshot = match self.manager.begin_processing(job_id) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // A job cancelled while still queued is a client action,
                // not an internal fault.
                if matches!(e, JobError::InvalidTransition { .. })
                    && self
                        .manager
                        .get(job_id)
                        .map_or(false, |j| j.status == JobStatus::Cancelled)
                {
                    return Err(DispatchError::Cancelled.into());
                }
                return Err(e.into());
            }
        };
        self.emit(&snapshot);

        let cancel = self
            .manager
            .cancel_flag(job_id)
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
        let abort = Arc::new(AtomicBool::new(false));
        let started = Instant::now();

        let mut pool = WorkerPool::new(Arc::clone(&self.dispatcher), self.workers_per_job);
        let submitted = self.submit_tasks(job_id, &snapshot, &mut pool, &cancel, &abort, started)?;
        pool.close();
        log::debug!(
            "Job {}: submitted {} of {} files",
            job_id,
            submitted,
            snapshot.files.len()
        );

        // Single writer: all job mutations for this run happen on this
        // thread, in outcome arrival order.
        while let Some(outcome) = pool.recv_result() {
            self.apply_outcome(job_id, outcome, started, &abort);
        }
        pool.wait();

        let job = self
            .manager
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        let archive_path = if job.completed_files > 0 {
            match self.storage.archive_results(job_id, &job.converted_files) {
                Ok(path) => path,
                Err(e) => {
                    // The conversions themselves succeeded; a missing
                    // archive only degrades the bundled download.
                    log::warn!("Could not archive results for job {}: {}", job_id, e);
                    None
                }
            }
        } else {
            None
        };

        let finalized = self.manager.finalize_run(job_id, archive_path)?;
        self.emit(&finalized);

        let total_secs = round2(started.elapsed().as_secs_f64());
        log::info!(
            "Job {} {}: {}/{} converted, {} failed in {:.2}s",
            finalized.id,
            finalized.status,
            finalized.completed_files,
            finalized.total_files,
            finalized.failed_files,
            total_secs
        );
        Ok(BatchReport::from_job(&finalized, total_secs))
    }

    /// Builds one task per file and hands them to the pool. A file without a
    /// resolvable target becomes a failure right here and the batch moves on;
    /// a storage failure is batch-fatal and fails every remaining file too.
    fn submit_tasks(
        &self,
        job_id: &str,
        snapshot: &Job,
        pool: &mut WorkerPool,
        cancel: &Arc<AtomicBool>,
        abort: &Arc<AtomicBool>,
        started: Instant,
    ) -> Result<usize> {
        let mut submitted = 0usize;
        for (index, file) in snapshot.files.iter().enumerate() {
            let target = file
                .target_format
                .as_deref()
                .or(snapshot.target_format.as_deref());
            let target = match target {
                Some(target) => target.to_string(),
                None => {
                    let error = ConvertError::from(DispatchError::MissingTargetFormat);
                    self.record_failure(job_id, file.original_name.clone(), &error, started, abort);
                    continue;
                }
            };

            let output_path = match self.storage.allocate_output_path(file, &target) {
                Ok(path) => path,
                Err(e) => {
                    let error = ConvertError::from(e);
                    self.record_failure(job_id, file.original_name.clone(), &error, started, abort);
                    self.fail_remaining(job_id, &snapshot.files[index + 1..], started, abort);
                    return Ok(submitted);
                }
            };

            let task = FileTask {
                file: file.clone(),
                target_ext: target,
                output_path,
                options: snapshot.options.clone(),
                cancel: Arc::clone(cancel),
                abort: Arc::clone(abort),
            };
            pool.submit(task)?;
            submitted += 1;
        }
        Ok(submitted)
    }

    /// Marks every file in `files` as failed with a system error. Used when
    /// storage goes away mid-submission; files already handed to workers
    /// still finish and are reported.
    fn fail_remaining(
        &self,
        job_id: &str,
        files: &[FileRecord],
        started: Instant,
        abort: &AtomicBool,
    ) {
        for file in files {
            let failure = ConversionFailure {
                file_name: file.original_name.clone(),
                error: "Storage unavailable".to_string(),
                code: Some("SYSTEM_ERROR".to_string()),
                failed_at: Utc::now(),
            };
            let elapsed = round2(started.elapsed().as_secs_f64());
            match self.manager.record_file_failure(job_id, failure, 0.0, elapsed) {
                Ok(snapshot) => self.emit(&snapshot),
                Err(e) => {
                    self.note_manager_error(job_id, e, abort);
                    return;
                }
            }
        }
    }

    /// Applies one worker outcome to the job. Manager errors flip the abort
    /// flag instead of propagating so the drain loop always runs dry.
    fn apply_outcome(
        &self,
        job_id: &str,
        outcome: FileOutcome,
        started: Instant,
        abort: &AtomicBool,
    ) {
        let elapsed = round2(started.elapsed().as_secs_f64());
        match outcome {
            FileOutcome::Started { file_name } => {
                match self.manager.set_current_file(job_id, Some(file_name)) {
                    Ok(snapshot) => self.emit(&snapshot),
                    Err(e) => self.note_manager_error(job_id, e, abort),
                }
            }
            FileOutcome::Success { record } => {
                match self.manager.record_file_success(job_id, record, elapsed) {
                    Ok(snapshot) => self.emit(&snapshot),
                    Err(e) => self.note_manager_error(job_id, e, abort),
                }
            }
            FileOutcome::Failure { failure, secs } => {
                match self.manager.record_file_failure(job_id, failure, secs, elapsed) {
                    Ok(snapshot) => self.emit(&snapshot),
                    Err(e) => self.note_manager_error(job_id, e, abort),
                }
            }
            FileOutcome::Skipped {
                file_name,
                reason: SkipReason::Cancelled,
            } => {
                // Cancelled files stay unprocessed; the job keeps whatever
                // finished before the flag was raised.
                log::debug!("Skipped '{}' after cancellation", redact_filename(&file_name));
            }
            FileOutcome::Skipped {
                file_name,
                reason: SkipReason::Aborted,
            } => {
                let failure = ConversionFailure {
                    file_name,
                    error: "Processing aborted".to_string(),
                    code: Some("SYSTEM_ERROR".to_string()),
                    failed_at: Utc::now(),
                };
                if let Ok(snapshot) =
                    self.manager.record_file_failure(job_id, failure, 0.0, elapsed)
                {
                    self.emit(&snapshot);
                }
            }
        }
    }

    fn record_failure(
        &self,
        job_id: &str,
        file_name: String,
        error: &ConvertError,
        started: Instant,
        abort: &AtomicBool,
    ) {
        let failure = ConversionFailure::from_error(file_name, error);
        let elapsed = round2(started.elapsed().as_secs_f64());
        match self.manager.record_file_failure(job_id, failure, 0.0, elapsed) {
            Ok(snapshot) => self.emit(&snapshot),
            Err(e) => self.note_manager_error(job_id, e, abort),
        }
    }

    fn note_manager_error(&self, job_id: &str, error: JobError, abort: &AtomicBool) {
        log::error!(
            "Job {}: {}; aborting remaining files",
            job_id,
            error
        );
        abort.store(true, Ordering::Relaxed);
    }

    fn emit(&self, job: &Job) {
        self.reporter.report(JobEvent::from_job(job));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineRegistry;
    use crate::error::{StorageError, ValidationError};
    use crate::job::{ConversionOptions, FileRecord};
    use crate::storage::{CleanupStats, FileStorage};
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CollectingReporter {
        events: Mutex<Vec<JobEvent>>,
    }

    impl CollectingReporter {
        fn snapshot(&self) -> Vec<JobEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressReporter for CollectingReporter {
        fn report(&self, event: JobEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    struct Harness {
        manager: Arc<JobManager>,
        storage: Arc<FileStorage>,
        reporter: Arc<CollectingReporter>,
        coordinator: BatchCoordinator,
    }

    fn harness(temp: &TempDir) -> Harness {
        let storage = Arc::new(
            FileStorage::new(temp.path().join("uploads"), temp.path().join("outputs")).unwrap(),
        );
        let manager = Arc::new(JobManager::new());
        let reporter = Arc::new(CollectingReporter::default());
        let registry = EngineRegistry::with_default_engines(Duration::from_secs(30));
        let coordinator = BatchCoordinator::new(
            Arc::new(Dispatcher::new(registry)),
            Arc::clone(&manager),
            storage.clone(),
            reporter.clone(),
            2,
        );
        Harness {
            manager,
            storage,
            reporter,
            coordinator,
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([80, 90, 100]));
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn upload_png(storage: &FileStorage, name: &str) -> FileRecord {
        storage.save_upload(&png_bytes(), name).unwrap()
    }

    fn retention() -> chrono::Duration {
        chrono::Duration::hours(1)
    }

    #[test]
    fn test_batch_converts_all_files() {
        let temp = TempDir::new().unwrap();
        let h = harness(&temp);
        let files = vec![
            upload_png(&h.storage, "a.png"),
            upload_png(&h.storage, "b.png"),
            upload_png(&h.storage, "c.png"),
        ];
        let job = h.manager.create(
            files,
            vec![],
            Some("bmp".to_string()),
            ConversionOptions::default(),
            retention(),
        );

        let report = h.coordinator.run(&job.id).unwrap();

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.total_files, 3);
        assert_eq!(report.completed_files, 3);
        assert_eq!(report.failed_files, 0);
        assert_eq!(report.converted_files.len(), 3);
        assert!(report.errors.is_empty());
        let archive = report.archive_path.expect("archive created");
        assert!(archive.exists());

        let job = h.manager.get(&job.id).unwrap();
        assert_eq!(job.converted_files.len(), 3);
        for converted in &job.converted_files {
            assert!(converted.path.exists());
            assert!(converted.original_name.ends_with(".bmp"));
        }
    }

    #[test]
    fn test_validation_rejects_count_toward_totals() {
        let temp = TempDir::new().unwrap();
        let h = harness(&temp);
        let files = vec![
            upload_png(&h.storage, "ok1.png"),
            upload_png(&h.storage, "ok2.png"),
        ];
        let rejected = ConversionFailure::from_error(
            "evil.exe",
            &ValidationError::DangerousExtension {
                ext: "exe".to_string(),
            }
            .into(),
        );
        let job = h.manager.create(
            files,
            vec![rejected],
            Some("bmp".to_string()),
            ConversionOptions::default(),
            retention(),
        );

        let report = h.coordinator.run(&job.id).unwrap();

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.total_files, 3);
        assert_eq!(report.completed_files, 2);
        assert_eq!(report.failed_files, 1);
    }

    #[test]
    fn test_all_failures_mark_job_failed() {
        let temp = TempDir::new().unwrap();
        let h = harness(&temp);
        let corrupt = h
            .storage
            .save_upload(b"not really an image", "corrupt.png")
            .unwrap();
        let job = h.manager.create(
            vec![corrupt],
            vec![],
            Some("bmp".to_string()),
            ConversionOptions::default(),
            retention(),
        );

        let report = h.coordinator.run(&job.id).unwrap();

        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.completed_files, 0);
        assert_eq!(report.failed_files, 1);
        assert!(report.archive_path.is_none());

        let job = h.manager.get(&job.id).unwrap();
        assert_eq!(job.errors.len(), 1);
        assert_eq!(job.errors[0].code.as_deref(), Some("ENGINE_FAILED"));
    }

    #[test]
    fn test_per_file_target_overrides_job_target() {
        let temp = TempDir::new().unwrap();
        let h = harness(&temp);
        let mut with_override = upload_png(&h.storage, "override.png");
        with_override.target_format = Some("bmp".to_string());
        let without = upload_png(&h.storage, "plain.png");
        let job = h.manager.create(
            vec![with_override, without],
            vec![],
            None,
            ConversionOptions::default(),
            retention(),
        );

        let report = h.coordinator.run(&job.id).unwrap();

        // The file without any target cannot be dispatched.
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.completed_files, 1);
        assert_eq!(report.failed_files, 1);

        let job = h.manager.get(&job.id).unwrap();
        assert_eq!(
            job.errors[0].code.as_deref(),
            Some("MISSING_TARGET_FORMAT")
        );
        assert!(job.converted_files[0].original_name.ends_with(".bmp"));
    }

    #[test]
    fn test_category_mismatch_recorded_per_file() {
        let temp = TempDir::new().unwrap();
        let h = harness(&temp);
        let file = upload_png(&h.storage, "photo.png");
        let job = h.manager.create(
            vec![file],
            vec![],
            Some("mp3".to_string()),
            ConversionOptions::default(),
            retention(),
        );

        let report = h.coordinator.run(&job.id).unwrap();

        assert_eq!(report.status, JobStatus::Failed);
        let job = h.manager.get(&job.id).unwrap();
        assert_eq!(job.errors[0].code.as_deref(), Some("CATEGORY_MISMATCH"));
    }

    #[test]
    fn test_cancelled_job_refuses_to_run() {
        let temp = TempDir::new().unwrap();
        let h = harness(&temp);
        let file = upload_png(&h.storage, "photo.png");
        let job = h.manager.create(
            vec![file],
            vec![],
            Some("bmp".to_string()),
            ConversionOptions::default(),
            retention(),
        );
        h.manager.cancel(&job.id).unwrap();

        let err = h.coordinator.run(&job.id).unwrap_err();
        assert_eq!(err.code(), "CANCELLED");

        let job = h.manager.get(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.completed_files, 0);
    }

    #[test]
    fn test_unknown_job_is_not_found() {
        let temp = TempDir::new().unwrap();
        let h = harness(&temp);
        let err = h.coordinator.run("no-such-job").unwrap_err();
        assert_eq!(err.code(), "SYSTEM_ERROR");
    }

    #[test]
    fn test_events_track_progress_to_completion() {
        let temp = TempDir::new().unwrap();
        let h = harness(&temp);
        let files = vec![
            upload_png(&h.storage, "a.png"),
            upload_png(&h.storage, "b.png"),
        ];
        let job = h.manager.create(
            files,
            vec![],
            Some("bmp".to_string()),
            ConversionOptions::default(),
            retention(),
        );

        h.coordinator.run(&job.id).unwrap();

        let events = h.reporter.snapshot();
        assert!(events.len() >= 2);
        assert_eq!(events[0].status, JobStatus::Processing);
        assert!(events.iter().any(|e| e.current_file.is_some()));

        let last = events.last().unwrap();
        assert_eq!(last.status, JobStatus::Completed);
        assert_eq!(last.percentage, 100.0);
        assert_eq!(last.completed_files, 2);
    }

    #[test]
    fn test_report_averages_over_attempted_files() {
        let temp = TempDir::new().unwrap();
        let h = harness(&temp);
        let file = upload_png(&h.storage, "single.png");
        let job = h.manager.create(
            vec![file],
            vec![],
            Some("bmp".to_string()),
            ConversionOptions::default(),
            retention(),
        );

        let report = h.coordinator.run(&job.id).unwrap();

        assert!(report.total_secs >= 0.0);
        assert!(report.average_secs_per_file >= 0.0);
    }

    /// Delegates to [`FileStorage`] but rejects output allocation once its
    /// budget runs out.
    struct FlakyStorage {
        inner: Arc<FileStorage>,
        allocations_left: AtomicUsize,
    }

    impl Storage for FlakyStorage {
        fn save_upload(
            &self,
            bytes: &[u8],
            name: &str,
        ) -> std::result::Result<FileRecord, StorageError> {
            self.inner.save_upload(bytes, name)
        }

        fn allocate_output_path(
            &self,
            file: &FileRecord,
            target_ext: &str,
        ) -> std::result::Result<PathBuf, StorageError> {
            let left = self.allocations_left.load(Ordering::SeqCst);
            if left == 0 {
                return Err(StorageError::WriteFile {
                    path: PathBuf::from("/dev/full"),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.allocations_left.store(left - 1, Ordering::SeqCst);
            self.inner.allocate_output_path(file, target_ext)
        }

        fn archive_results(
            &self,
            job_id: &str,
            files: &[ConvertedFileRecord],
        ) -> std::result::Result<Option<PathBuf>, StorageError> {
            self.inner.archive_results(job_id, files)
        }

        fn reap_older_than(
            &self,
            max_age: Duration,
        ) -> std::result::Result<CleanupStats, StorageError> {
            self.inner.reap_older_than(max_age)
        }
    }

    #[test]
    fn test_storage_failure_fails_remaining_files() {
        let temp = TempDir::new().unwrap();
        let file_storage = Arc::new(
            FileStorage::new(temp.path().join("uploads"), temp.path().join("outputs")).unwrap(),
        );
        let flaky = Arc::new(FlakyStorage {
            inner: file_storage.clone(),
            allocations_left: AtomicUsize::new(1),
        });
        let manager = Arc::new(JobManager::new());
        let registry = EngineRegistry::with_default_engines(Duration::from_secs(30));
        let coordinator = BatchCoordinator::new(
            Arc::new(Dispatcher::new(registry)),
            Arc::clone(&manager),
            flaky,
            Arc::new(CollectingReporter::default()),
            2,
        );

        let files = vec![
            upload_png(&file_storage, "a.png"),
            upload_png(&file_storage, "b.png"),
            upload_png(&file_storage, "c.png"),
        ];
        let job = manager.create(
            files,
            vec![],
            Some("bmp".to_string()),
            ConversionOptions::default(),
            retention(),
        );

        let report = coordinator.run(&job.id).unwrap();

        // The first file was handed to a worker before storage gave out
        // and still converts.
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.completed_files, 1);
        assert_eq!(report.failed_files, 2);

        let job = manager.get(&job.id).unwrap();
        assert!(job
            .errors
            .iter()
            .all(|e| e.code.as_deref() == Some("SYSTEM_ERROR")));
        assert_eq!(job.errors[0].file_name, "b.png");
        assert!(job.errors[0].error.contains("disk full"));
        assert_eq!(job.errors[1].file_name, "c.png");
        assert_eq!(job.errors[1].error, "Storage unavailable");
    }

    /// Cancels the job through the manager the first time an event shows a
    /// converted file, mimicking a client hitting cancel mid-run.
    struct CancelOnFirstSuccess {
        manager: Arc<JobManager>,
        fired: AtomicBool,
    }

    impl ProgressReporter for CancelOnFirstSuccess {
        fn report(&self, event: JobEvent) {
            if event.completed_files >= 1 && !self.fired.swap(true, Ordering::SeqCst) {
                let _ = self.manager.cancel(&event.job_id);
            }
        }
    }

    #[test]
    fn test_cancel_after_first_file_stops_the_batch() {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(
            FileStorage::new(temp.path().join("uploads"), temp.path().join("outputs")).unwrap(),
        );
        let manager = Arc::new(JobManager::new());
        let reporter = Arc::new(CancelOnFirstSuccess {
            manager: Arc::clone(&manager),
            fired: AtomicBool::new(false),
        });
        let registry = EngineRegistry::with_default_engines(Duration::from_secs(30));
        // One worker keeps completions sequential, so the cancel lands
        // right after the first file.
        let coordinator = BatchCoordinator::new(
            Arc::new(Dispatcher::new(registry)),
            Arc::clone(&manager),
            storage.clone(),
            reporter,
            1,
        );

        let files: Vec<FileRecord> = (0..5)
            .map(|i| upload_png(&storage, &format!("f{}.png", i)))
            .collect();
        let job = manager.create(
            files,
            vec![],
            Some("bmp".to_string()),
            ConversionOptions::default(),
            retention(),
        );

        let report = coordinator.run(&job.id).unwrap();

        assert_eq!(report.status, JobStatus::Cancelled);
        let job = manager.get(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        // Whatever was in flight when the flag rose is discarded, so only
        // the file that finished first is ever recorded.
        assert_eq!(job.converted_files.len() + job.errors.len(), 1);
        assert_eq!(job.completed_files, 1);
    }
}
