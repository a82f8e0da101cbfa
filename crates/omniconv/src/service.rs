//! High-level facade over the whole conversion stack.
//!
//! [`ConversionService`] wires validation, storage, the engine registry,
//! job bookkeeping and batch coordination together from one [`Config`].
//! Callers hand it raw uploads and job ids; everything else stays internal.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::batch::{BatchCoordinator, BatchReport, BroadcastProgress};
use crate::broadcast::{JobEvent, JobEventBroadcaster};
use crate::config::Config;
use crate::db::Database;
use crate::engine::{
    Dispatcher, EngineAvailability, EngineRegistry, SupportedConversion,
};
use crate::error::{JobError, Result};
use crate::formats::FileCategory;
use crate::job::{
    ConversionFailure, ConversionOptions, Job, JobManager, JobStatus, JobSummary,
    ManagerStatistics,
};
use crate::storage::{FileStorage, Storage};
use crate::validate::FormatValidator;

/// Listing cap applied when the caller does not pass one.
const DEFAULT_LIST_LIMIT: usize = 50;

/// One file in an upload submission.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
    /// Per-file target override; wins over the job-level target.
    pub target_format: Option<String>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            target_format: None,
        }
    }
}

/// Counts from one retention sweep.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub jobs_expired: usize,
    pub files_removed: u64,
    pub bytes_freed: u64,
}

pub struct ConversionService {
    config: Config,
    validator: FormatValidator,
    manager: Arc<JobManager>,
    storage: Arc<dyn Storage>,
    dispatcher: Arc<Dispatcher>,
    coordinator: BatchCoordinator,
    broadcaster: JobEventBroadcaster,
}

impl ConversionService {
    /// Builds the full stack from configuration. Opens the job database
    /// when one is configured and restores any persisted jobs.
    pub fn from_config(config: Config) -> Result<Self> {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::from_config(&config)?);
        let manager = Arc::new(JobManager::new());

        if let Some(path) = &config.database_path {
            let db = Database::open(Path::new(path))?;
            manager.set_database(db);
            let restored = manager.load_from_database()?;
            if restored > 0 {
                log::info!("Restored {} jobs from database", restored);
            }
        }

        let registry = EngineRegistry::with_default_engines(config.conversion_timeout());
        let dispatcher = Arc::new(Dispatcher::new(registry));
        let broadcaster = JobEventBroadcaster::default();
        let reporter = Arc::new(BroadcastProgress::new(broadcaster.clone()));
        let coordinator = BatchCoordinator::new(
            Arc::clone(&dispatcher),
            Arc::clone(&manager),
            Arc::clone(&storage),
            reporter,
            config.workers_per_job,
        );
        let validator = FormatValidator::from_config(&config);

        Ok(Self {
            config,
            validator,
            manager,
            storage,
            dispatcher,
            coordinator,
            broadcaster,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validates a submission, stores the accepted files and queues a job.
    /// Per-file validation or storage problems become failure records on
    /// the job; only batch-level limits reject the submission outright.
    pub fn create_job(
        &self,
        uploads: Vec<Upload>,
        target_format: Option<String>,
        options: ConversionOptions,
    ) -> Result<Job> {
        let pairs: Vec<(&str, &[u8])> = uploads
            .iter()
            .map(|u| (u.name.as_str(), u.bytes.as_slice()))
            .collect();
        let validation = self.validator.validate_batch(&pairs)?;

        let mut files = Vec::with_capacity(validation.valid_count);
        let mut failures = Vec::new();
        for (upload, checked) in uploads.iter().zip(validation.files.iter()) {
            match &checked.result {
                Ok(_) => match self.storage.save_upload(&upload.bytes, &upload.name) {
                    Ok(mut record) => {
                        record.target_format = upload.target_format.clone();
                        files.push(record);
                    }
                    Err(e) => {
                        log::error!(
                            "Could not store upload '{}': {}",
                            crate::sanitize::redact_filename(&upload.name),
                            e
                        );
                        failures.push(ConversionFailure {
                            file_name: upload.name.clone(),
                            error: e.to_string(),
                            code: Some("SYSTEM_ERROR".to_string()),
                            failed_at: Utc::now(),
                        });
                    }
                },
                Err(e) => {
                    failures.push(ConversionFailure {
                        file_name: upload.name.clone(),
                        error: e.to_string(),
                        code: Some(e.code().to_string()),
                        failed_at: Utc::now(),
                    });
                }
            }
        }

        Ok(self.manager.create(
            files,
            failures,
            target_format,
            options,
            self.config.retention(),
        ))
    }

    /// Runs a queued job to completion on the calling thread.
    pub fn run_job(&self, job_id: &str) -> Result<BatchReport> {
        self.coordinator.run(job_id)
    }

    pub fn get_job(&self, job_id: &str) -> Result<Job> {
        self.manager
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()).into())
    }

    /// Lists job summaries, newest first, optionally filtered by status.
    pub fn list_jobs(&self, status: Option<JobStatus>, limit: Option<usize>) -> Vec<JobSummary> {
        self.manager.list(status, limit.unwrap_or(DEFAULT_LIST_LIMIT))
    }

    pub fn cancel_job(&self, job_id: &str) -> Result<Job> {
        Ok(self.manager.cancel(job_id)?)
    }

    /// Every conversion pair the registered engines claim, optionally
    /// narrowed to sources in one category.
    pub fn supported_conversions(
        &self,
        category: Option<FileCategory>,
    ) -> Vec<SupportedConversion> {
        self.dispatcher.registry().supported_conversions(category)
    }

    pub fn engine_availability(&self) -> Vec<EngineAvailability> {
        self.dispatcher.registry().availability()
    }

    /// Expires jobs past retention and reaps stored files older than the
    /// retention window.
    pub fn cleanup_expired(&self) -> Result<CleanupReport> {
        let jobs_expired = self.manager.cleanup_expired();
        let max_age =
            std::time::Duration::from_secs(self.config.retention_hours.saturating_mul(3600));
        let stats = self.storage.reap_older_than(max_age)?;
        if jobs_expired > 0 || stats.files_removed > 0 {
            log::info!(
                "Cleanup: {} jobs expired, {} files removed ({} bytes)",
                jobs_expired,
                stats.files_removed,
                stats.bytes_freed
            );
        }
        Ok(CleanupReport {
            jobs_expired,
            files_removed: stats.files_removed,
            bytes_freed: stats.bytes_freed,
        })
    }

    /// Live job events for streaming to clients.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.broadcaster.subscribe()
    }

    pub fn statistics(&self) -> ManagerStatistics {
        self.manager.statistics()
    }
}
