use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::engine::Dispatcher;
use crate::error::WorkerError;
use crate::job::{round2, ConversionFailure};
use crate::worker::task::{FileOutcome, FileTask, SkipReason};

pub struct WorkerPool {
    task_sender: Option<Sender<FileTask>>,
    result_receiver: Receiver<FileOutcome>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// # Panics
    /// `worker_count` must be at least 1.
    pub fn new(dispatcher: Arc<Dispatcher>, worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (task_sender, task_receiver) = bounded::<FileTask>(worker_count * 2);
        // Results are unbounded so workers never block behind a slow
        // consumer while tasks are still being submitted.
        let (result_sender, result_receiver) = unbounded::<FileOutcome>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let task_rx = task_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_dispatcher = Arc::clone(&dispatcher);

            let handle = thread::spawn(move || {
                run_worker(
                    worker_id,
                    task_rx,
                    result_tx,
                    shutdown_flag,
                    worker_dispatcher,
                );
            });

            workers.push(handle);
        }

        info!("Started {} conversion workers", worker_count);

        Self {
            task_sender: Some(task_sender),
            result_receiver,
            workers,
            shutdown,
        }
    }

    pub fn submit(&self, task: FileTask) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        match &self.task_sender {
            Some(sender) => sender.send(task).map_err(|_| WorkerError::ChannelClosed),
            None => Err(WorkerError::ChannelClosed),
        }
    }

    /// Signals that no further tasks will arrive. Workers drain the
    /// queue and exit; the result channel disconnects once they do.
    pub fn close(&mut self) {
        self.task_sender.take();
    }

    /// Blocks for the next outcome. `None` once every worker has exited.
    pub fn recv_result(&self) -> Option<FileOutcome> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn wait(mut self) {
        self.task_sender.take();

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        debug!("All workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    task_receiver: Receiver<FileTask>,
    result_sender: Sender<FileOutcome>,
    shutdown: Arc<AtomicBool>,
    dispatcher: Arc<Dispatcher>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match task_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(task) => {
                let outcome = execute(task, &dispatcher, &result_sender);
                if let Err(e) = result_sender.send(outcome) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} task channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Runs one task to a terminal outcome. `Started` goes out before the
/// engine is invoked so observers can attribute in-flight work.
fn execute(task: FileTask, dispatcher: &Dispatcher, results: &Sender<FileOutcome>) -> FileOutcome {
    if task.cancel.load(Ordering::Relaxed) {
        return FileOutcome::Skipped {
            file_name: task.file.original_name,
            reason: SkipReason::Cancelled,
        };
    }
    if task.abort.load(Ordering::Relaxed) {
        return FileOutcome::Skipped {
            file_name: task.file.original_name,
            reason: SkipReason::Aborted,
        };
    }

    let _ = results.send(FileOutcome::Started {
        file_name: task.file.original_name.clone(),
    });

    let started = Instant::now();
    match dispatcher.dispatch(&task.file, &task.target_ext, &task.output_path, &task.options) {
        Ok(record) => FileOutcome::Success { record },
        Err(error) => {
            let failure = ConversionFailure::from_error(task.file.original_name.clone(), &error);
            FileOutcome::Failure {
                failure,
                secs: round2(started.elapsed().as_secs_f64()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineRegistry;
    use crate::formats::FileCategory;
    use crate::job::{ConversionOptions, FileRecord};
    use chrono::Utc;
    use std::path::Path;

    fn dispatcher() -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(EngineRegistry::with_default_engines(
            Duration::from_secs(30),
        )))
    }

    fn task_for(
        dir: &Path,
        input_name: &str,
        bytes_are_png: bool,
        cancel: Arc<AtomicBool>,
        abort: Arc<AtomicBool>,
    ) -> FileTask {
        let input = dir.join(input_name);
        if bytes_are_png {
            image::RgbImage::from_pixel(3, 3, image::Rgb([10, 20, 30]))
                .save(&input)
                .unwrap();
        } else {
            std::fs::write(&input, b"not an image").unwrap();
        }

        FileTask {
            file: FileRecord {
                id: "f1".to_string(),
                original_name: input_name.to_string(),
                stored_name: format!("f1_{}", input_name),
                path: input,
                size: 100,
                extension: "png".to_string(),
                category: FileCategory::Image,
                mime_type: None,
                checksum: None,
                target_format: None,
                uploaded_at: Utc::now(),
            },
            target_ext: "bmp".to_string(),
            output_path: dir.join("out.bmp"),
            options: ConversionOptions::default(),
            cancel,
            abort,
        }
    }

    fn drain(pool: &WorkerPool) -> Vec<FileOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = pool.recv_result() {
            outcomes.push(outcome);
        }
        outcomes
    }

    #[test]
    fn test_pool_lifecycle() {
        let pool = WorkerPool::new(dispatcher(), 2);
        assert!(!pool.is_shutdown());

        pool.shutdown();
        assert!(pool.is_shutdown());

        pool.wait();
    }

    #[test]
    fn test_task_runs_to_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = WorkerPool::new(dispatcher(), 2);

        let cancel = Arc::new(AtomicBool::new(false));
        let abort = Arc::new(AtomicBool::new(false));
        pool.submit(task_for(dir.path(), "photo.png", true, cancel, abort))
            .unwrap();
        pool.close();

        let outcomes = drain(&pool);
        pool.wait();

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(&outcomes[0], FileOutcome::Started { file_name } if file_name == "photo.png"));
        match &outcomes[1] {
            FileOutcome::Success { record } => {
                assert_eq!(record.extension, "bmp");
                assert!(record.path.exists());
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_task_skips_without_starting() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = WorkerPool::new(dispatcher(), 1);

        let cancel = Arc::new(AtomicBool::new(true));
        let abort = Arc::new(AtomicBool::new(false));
        pool.submit(task_for(dir.path(), "photo.png", true, cancel, abort))
            .unwrap();
        pool.close();

        let outcomes = drain(&pool);
        pool.wait();

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            &outcomes[0],
            FileOutcome::Skipped {
                reason: SkipReason::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn test_aborted_task_reports_abort_reason() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = WorkerPool::new(dispatcher(), 1);

        let cancel = Arc::new(AtomicBool::new(false));
        let abort = Arc::new(AtomicBool::new(true));
        pool.submit(task_for(dir.path(), "photo.png", true, cancel, abort))
            .unwrap();
        pool.close();

        let outcomes = drain(&pool);
        pool.wait();

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            &outcomes[0],
            FileOutcome::Skipped {
                reason: SkipReason::Aborted,
                ..
            }
        ));
    }

    #[test]
    fn test_failed_conversion_keeps_machine_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = WorkerPool::new(dispatcher(), 1);

        let cancel = Arc::new(AtomicBool::new(false));
        let abort = Arc::new(AtomicBool::new(false));
        pool.submit(task_for(dir.path(), "broken.png", false, cancel, abort))
            .unwrap();
        pool.close();

        let outcomes = drain(&pool);
        pool.wait();

        assert_eq!(outcomes.len(), 2);
        match &outcomes[1] {
            FileOutcome::Failure { failure, secs } => {
                assert_eq!(failure.code.as_deref(), Some("ENGINE_FAILED"));
                assert!(*secs >= 0.0);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_submit_after_close_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = WorkerPool::new(dispatcher(), 1);
        pool.close();

        let cancel = Arc::new(AtomicBool::new(false));
        let abort = Arc::new(AtomicBool::new(false));
        let err = pool
            .submit(task_for(dir.path(), "photo.png", true, cancel, abort))
            .unwrap_err();
        assert!(matches!(err, WorkerError::ChannelClosed));

        pool.wait();
    }
}
