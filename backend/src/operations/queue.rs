//! Completion queue
//!
//! Turns "start job of duration D" into exactly one "job finished"
//! notification at `submit time + D`.
//!
//! Jobs are kept in a binary min-heap keyed by their *absolute* completion
//! time, so nothing has to be rewritten when the clock moves; only the root is
//! ever inspected. Jobs completing at the same instant (within
//! [`TIME_EPSILON`](crate::core::TIME_EPSILON)) come out in one batch, ordered
//! by submission.

use crate::core::SimTime;
use crate::error::{ConfigurationError, StateError};
use crate::models::{Ack, AckOrder};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tracing::debug;

/// Identifier assigned at submission; increases monotonically
pub type JobId = u64;

/// A job waiting for its completion time
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJob {
    pub id: JobId,
    pub activity: String,
    pub resource: String,
    pub completion_time: SimTime,
    pub outcome: AckOrder,
}

impl PendingJob {
    /// Acknowledgement to send back to the decision maker
    pub fn ack(&self) -> Ack {
        Ack {
            resource: Some(self.resource.clone()),
            activity: self.activity.clone(),
            order: self.outcome,
        }
    }
}

/// Heap entry ordered by (completion time, submission order)
#[derive(Debug, Clone, PartialEq)]
struct Scheduled(PendingJob);

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .completion_time
            .cmp(&other.0.completion_time)
            .then_with(|| self.0.id.cmp(&other.0.id))
    }
}

/// Min-priority-queue of pending jobs
///
/// # Example
/// ```
/// use agrisim_core::operations::CompletionQueue;
/// use agrisim_core::SimTime;
///
/// let mut queue = CompletionQueue::new();
/// queue.submit(SimTime::new(10.0), "Seed_WW_p0", "p0", 5.0).unwrap();
///
/// assert_eq!(queue.time_advance(SimTime::new(10.0)), SimTime::new(5.0));
///
/// let batch = queue.advance_to(SimTime::new(15.0)).unwrap();
/// assert_eq!(batch.len(), 1);
/// assert_eq!(batch[0].resource, "p0");
/// assert!(queue.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CompletionQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_id: JobId,
}

impl CompletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a job that completes successfully after `duration`
    ///
    /// Zero is a legal duration (same-instant completion). Negative or
    /// non-finite durations are configuration errors.
    pub fn submit(
        &mut self,
        now: SimTime,
        activity: &str,
        resource: &str,
        duration: f64,
    ) -> Result<JobId, ConfigurationError> {
        self.submit_with_outcome(now, activity, resource, duration, AckOrder::Done)
    }

    pub fn submit_with_outcome(
        &mut self,
        now: SimTime,
        activity: &str,
        resource: &str,
        duration: f64,
        outcome: AckOrder,
    ) -> Result<JobId, ConfigurationError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(ConfigurationError::InvalidDuration {
                activity: activity.to_string(),
                duration,
            });
        }

        let id = self.next_id;
        self.next_id += 1;

        let completion_time = now + duration;
        debug!(
            job = id,
            activity,
            resource,
            %now,
            %completion_time,
            "job submitted"
        );

        self.heap.push(Reverse(Scheduled(PendingJob {
            id,
            activity: activity.to_string(),
            resource: resource.to_string(),
            completion_time,
            outcome,
        })));

        Ok(id)
    }

    /// Pop every job completing at `now`
    ///
    /// The batch is in completion order, ties by submission order. Afterwards
    /// only strictly-future jobs remain. A job whose completion time was
    /// skipped over is a protocol violation.
    pub fn advance_to(&mut self, now: SimTime) -> Result<Vec<PendingJob>, StateError> {
        let mut batch = Vec::new();

        while let Some(Reverse(Scheduled(job))) = self.heap.peek() {
            if !job.completion_time.approx_le(now) {
                break;
            }
            if !job.completion_time.approx_eq(now) {
                return Err(StateError::MissedCompletion {
                    activity: job.activity.clone(),
                    due: job.completion_time,
                    now,
                });
            }

            if let Some(Reverse(Scheduled(job))) = self.heap.pop() {
                debug!(job = job.id, activity = %job.activity, resource = %job.resource, %now, "job completed");
                batch.push(job);
            }
        }

        Ok(batch)
    }

    /// Jobs that [`advance_to`](Self::advance_to) would return at `now`,
    /// without removing them
    pub fn due(&self, now: SimTime) -> Vec<&PendingJob> {
        let mut due: Vec<&PendingJob> = self
            .heap
            .iter()
            .map(|Reverse(Scheduled(job))| job)
            .filter(|job| job.completion_time.approx_eq(now))
            .collect();
        due.sort_by(|a, b| {
            a.completion_time
                .cmp(&b.completion_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        due
    }

    /// Earliest completion time, or `INFINITY` when empty
    pub fn next_event_time(&self) -> SimTime {
        self.heap
            .peek()
            .map(|Reverse(Scheduled(job))| job.completion_time)
            .unwrap_or(SimTime::INFINITY)
    }

    /// Time remaining from `now` until the next completion
    pub fn time_advance(&self, now: SimTime) -> SimTime {
        self.next_event_time().remaining_from(now)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
