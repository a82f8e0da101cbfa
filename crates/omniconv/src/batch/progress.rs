use crate::broadcast::{JobEvent, JobEventBroadcaster};

/// Sink for job events emitted while a batch runs.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: JobEvent);
}

/// Reporter that discards every event. Used where nobody is listening.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: JobEvent) {}
}

/// Bridges batch events to the broadcast channel.
pub struct BroadcastProgress {
    broadcaster: JobEventBroadcaster,
}

impl BroadcastProgress {
    pub fn new(broadcaster: JobEventBroadcaster) -> Self {
        Self { broadcaster }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: JobEvent) {
        self.broadcaster.send(event);
    }
}
