//! Thread pool that runs file conversions off the coordinating thread.

pub mod pool;
pub mod task;

pub use pool::WorkerPool;
pub use task::{FileOutcome, FileTask, SkipReason};
