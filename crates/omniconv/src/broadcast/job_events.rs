//! Job event broadcaster for real-time status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{Job, JobStatus};

/// Snapshot of a job pushed to subscribers whenever its state moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: String,
    pub status: JobStatus,
    /// Files attempted so far, including validation rejects.
    pub current: usize,
    pub total: usize,
    pub percentage: f64,
    /// File a worker is on right now, when one is in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
    pub completed_files: usize,
    pub failed_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_remaining_secs: Option<f64>,
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            current: job.progress.current,
            total: job.progress.total,
            percentage: job.progress.percentage,
            current_file: job.progress.current_file.clone(),
            completed_files: job.completed_files,
            failed_files: job.failed_files,
            estimated_remaining_secs: job.progress.estimated_remaining_secs,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcasts job events for streaming.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl JobEventBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: JobEvent) {
        // A send with zero receivers is not an error.
        let _ = self.sender.send(event);
    }

    /// Opens a new subscription stream.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ConversionOptions;

    #[test]
    fn test_event_snapshots_job_counters() {
        let job = Job::new(
            vec![],
            vec![],
            Some("png".to_string()),
            ConversionOptions::default(),
        );
        let event = JobEvent::from_job(&job);

        assert_eq!(event.job_id, job.id);
        assert_eq!(event.status, JobStatus::Queued);
        assert_eq!(event.current, 0);
        assert_eq!(event.total, 0);
        assert_eq!(event.completed_files, 0);
        assert_eq!(event.failed_files, 0);
    }

    #[test]
    fn test_subscribers_receive_events() {
        let broadcaster = JobEventBroadcaster::new(16);
        let mut receiver = broadcaster.subscribe();

        let job = Job::new(vec![], vec![], None, ConversionOptions::default());
        broadcaster.send(JobEvent::from_job(&job));

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.job_id, job.id);
    }

    #[test]
    fn test_send_without_subscribers_is_dropped() {
        let broadcaster = JobEventBroadcaster::default();
        assert_eq!(broadcaster.receiver_count(), 0);

        let job = Job::new(vec![], vec![], None, ConversionOptions::default());
        // Must not error or panic with nobody listening.
        broadcaster.send(JobEvent::from_job(&job));
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let job = Job::new(vec![], vec![], None, ConversionOptions::default());
        let event = JobEvent::from_job(&job);
        let json = serde_json::to_value(&event).unwrap();

        assert!(json.get("jobId").is_some());
        assert!(json.get("completedFiles").is_some());
        assert!(json.get("job_id").is_none());
    }
}
