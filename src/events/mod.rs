//! Post-commit enrollment events.
//!
//! Events travel over an explicit bounded channel instead of a global
//! emitter, so ordering and backpressure are visible design choices. A
//! dispatch task bridges events to the job queue: each
//! `enrollment.created` event becomes one `send_email` job. The whole
//! path is fire-and-forget relative to the request: a full channel or
//! unreachable queue is logged and never rolls back the enrollment.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::jobs::{Job, JobQueue, SEND_EMAIL_JOB};

/// Payload of the `enrollment.created` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentCreated {
    pub student_id: Uuid,
    pub course_id: Uuid,
}

/// Publisher handle held by the enrollment service.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<EnrollmentCreated>,
}

impl EventPublisher {
    /// Publish without blocking. Failure is logged and swallowed; the
    /// committed enrollment must not fail because of it.
    pub fn publish(&self, event: EnrollmentCreated) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::warn!(error = %e, "Failed to publish enrollment.created event");
        }
    }
}

/// Dispatch task receiving enrollment events and enqueueing jobs.
pub struct EventDispatcher {
    rx: mpsc::Receiver<EnrollmentCreated>,
    queue: Arc<dyn JobQueue>,
    shutdown: broadcast::Receiver<()>,
}

impl EventDispatcher {
    /// Build a publisher/dispatcher pair over a bounded channel.
    pub fn new(
        capacity: usize,
        queue: Arc<dyn JobQueue>,
        shutdown: broadcast::Receiver<()>,
    ) -> (EventPublisher, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            EventPublisher { tx },
            Self {
                rx,
                queue,
                shutdown,
            },
        )
    }

    pub async fn run(mut self) {
        tracing::info!("Event dispatcher started");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Event dispatcher received shutdown signal");
                    break;
                }
                event = self.rx.recv() => {
                    match event {
                        Some(event) => self.handle(event),
                        None => {
                            tracing::info!("Event channel closed, dispatcher exiting");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Event dispatcher stopped");
    }

    fn handle(&self, event: EnrollmentCreated) {
        let payload = match serde_json::to_value(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize enrollment event");
                return;
            }
        };

        if let Err(e) = self.queue.enqueue(Job::new(SEND_EMAIL_JOB, payload)) {
            tracing::warn!(
                error = %e,
                student_id = %event.student_id,
                course_id = %event.course_id,
                "Failed to enqueue send_email job"
            );
        } else {
            tracing::debug!(
                student_id = %event.student_id,
                course_id = %event.course_id,
                "Enqueued send_email job for enrollment"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::MemoryJobQueue;

    #[tokio::test]
    async fn test_event_becomes_send_email_job() {
        let queue = Arc::new(MemoryJobQueue::new(8));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (publisher, dispatcher) =
            EventDispatcher::new(8, queue.clone() as Arc<dyn JobQueue>, shutdown_rx);

        let handle = tokio::spawn(dispatcher.run());

        let event = EnrollmentCreated {
            student_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
        };
        publisher.publish(event.clone());

        let job = queue.dequeue().await.unwrap();
        assert_eq!(job.name, SEND_EMAIL_JOB);
        let round_trip: EnrollmentCreated = serde_json::from_value(job.payload).unwrap();
        assert_eq!(round_trip.student_id, event.student_id);
        assert_eq!(round_trip.course_id, event.course_id);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_to_full_channel_does_not_panic() {
        let queue = Arc::new(MemoryJobQueue::new(1));
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        // Dispatcher never runs, so the channel fills up
        let (publisher, _dispatcher) =
            EventDispatcher::new(1, queue as Arc<dyn JobQueue>, shutdown_rx);

        for _ in 0..5 {
            publisher.publish(EnrollmentCreated {
                student_id: Uuid::new_v4(),
                course_id: Uuid::new_v4(),
            });
        }
    }
}
