//! Durable-queue seam for request-path side effects.
//!
//! The queue decouples enrollment creation from notification work.
//! Delivery is at-least-once: a worker may see a job more than once, so
//! job execution must tolerate duplicates. Enqueue failures are the
//! publisher's problem to log; they never propagate to the request
//! that triggered the job.

mod worker;

pub use worker::EmailWorker;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Job name for enrollment notification emails.
pub const SEND_EMAIL_JOB: &str = "send_email";

#[derive(Debug, Error)]
pub enum JobQueueError {
    /// The bounded queue is at capacity.
    #[error("Job queue full")]
    Full,

    /// The consumer side has shut down.
    #[error("Job queue closed")]
    Closed,
}

/// A unit of deferred side-effect work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            payload,
            enqueued_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Push a job without blocking the caller.
    fn enqueue(&self, job: Job) -> Result<(), JobQueueError>;

    /// Pull the next job, waiting until one is available.
    /// Returns `None` once the queue is closed and drained.
    async fn dequeue(&self) -> Option<Job>;
}

/// In-process queue over a bounded channel. The bound makes
/// backpressure explicit: when the worker falls behind, enqueue fails
/// fast instead of buffering without limit.
pub struct MemoryJobQueue {
    tx: mpsc::Sender<Job>,
    rx: Mutex<mpsc::Receiver<Job>>,
}

impl MemoryJobQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    fn enqueue(&self, job: Job) -> Result<(), JobQueueError> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(job_name = %job.name, job_id = %job.id, "Job queue full, job dropped");
                Err(JobQueueError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::warn!(job_name = %job.name, job_id = %job.id, "Job queue closed, job dropped");
                Err(JobQueueError::Closed)
            }
        }
    }

    async fn dequeue(&self) -> Option<Job> {
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_enqueue_dequeue() {
        let queue = MemoryJobQueue::new(8);
        queue
            .enqueue(Job::new(SEND_EMAIL_JOB, json!({"student_id": "s1"})))
            .unwrap();

        let job = queue.dequeue().await.unwrap();
        assert_eq!(job.name, SEND_EMAIL_JOB);
        assert_eq!(job.payload["student_id"], "s1");
    }

    #[tokio::test]
    async fn test_enqueue_full_fails_fast() {
        let queue = MemoryJobQueue::new(1);
        queue.enqueue(Job::new(SEND_EMAIL_JOB, json!({}))).unwrap();

        let result = queue.enqueue(Job::new(SEND_EMAIL_JOB, json!({})));
        assert!(matches!(result, Err(JobQueueError::Full)));
    }

    #[tokio::test]
    async fn test_dequeue_preserves_order() {
        let queue = MemoryJobQueue::new(8);
        for i in 0..3 {
            queue
                .enqueue(Job::new(SEND_EMAIL_JOB, json!({ "seq": i })))
                .unwrap();
        }

        for i in 0..3 {
            let job = queue.dequeue().await.unwrap();
            assert_eq!(job.payload["seq"], i);
        }
    }
}
