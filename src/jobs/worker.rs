use std::sync::Arc;

use tokio::sync::broadcast;

use crate::events::EnrollmentCreated;

use super::{Job, JobQueue, SEND_EMAIL_JOB};

/// Background worker draining the job queue.
///
/// Executes notification side effects off the request path. Execution
/// failure is logged, not retried; retry policy belongs to real queue
/// infrastructure, not this worker.
pub struct EmailWorker {
    queue: Arc<dyn JobQueue>,
    shutdown: broadcast::Receiver<()>,
}

impl EmailWorker {
    pub fn new(queue: Arc<dyn JobQueue>, shutdown: broadcast::Receiver<()>) -> Self {
        Self { queue, shutdown }
    }

    pub async fn run(mut self) {
        tracing::info!("Email worker started");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Email worker received shutdown signal");
                    break;
                }
                job = self.queue.dequeue() => {
                    match job {
                        Some(job) => self.process(job).await,
                        None => {
                            tracing::info!("Job queue closed, email worker exiting");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Email worker stopped");
    }

    async fn process(&self, job: Job) {
        match job.name.as_str() {
            SEND_EMAIL_JOB => match serde_json::from_value::<EnrollmentCreated>(job.payload.clone()) {
                Ok(event) => {
                    tracing::info!(
                        job_id = %job.id,
                        student_id = %event.student_id,
                        course_id = %event.course_id,
                        "Sending enrollment email"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        job_id = %job.id,
                        error = %e,
                        "Malformed send_email payload, job skipped"
                    );
                }
            },
            other => {
                tracing::warn!(job_id = %job.id, job_name = %other, "Unknown job name, skipped");
            }
        }
    }
}
