use anyhow::Result;
use tokio::sync::mpsc;

use crate::db::entities::jobs::JobType;

/// Message sent to the job queue
#[derive(Debug, Clone)]
pub struct JobMessage {
    pub job_id: i32,
    pub job_type: JobType,
    pub playlist_id: Option<i32>,
}

/// Job queue for async background task processing
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<JobMessage>,
}

impl JobQueue {
    /// Create a new job queue and return (queue, receiver)
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Submit a job to the queue
    pub fn submit(&self, message: JobMessage) -> Result<()> {
        let job_id = message.job_id;
        let job_type = message.job_type;

        self.sender
            .send(message)
            .map_err(|e| anyhow::anyhow!("Failed to submit job: {}", e))?;

        tracing::info!("Job {} ({:?}) submitted to queue", job_id, job_type);

        Ok(())
    }
}
