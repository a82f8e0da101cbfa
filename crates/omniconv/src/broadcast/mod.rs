//! Broadcasting of job lifecycle events.
//!
//! Events can be fanned out to any integration that wants live batch
//! progress, desktop shells and SSE endpoints alike.

pub mod job_events;

pub use job_events::{JobEvent, JobEventBroadcaster};
