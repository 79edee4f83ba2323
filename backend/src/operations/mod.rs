//! Operations scheduling: duration-based completion of farm jobs

pub mod queue;

pub use queue::{CompletionQueue, JobId, PendingJob};
