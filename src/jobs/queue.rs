use super::Job;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Hands jobs to whatever executes them.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), anyhow::Error>;
}

/// Enqueues jobs gathered during a request after its transaction committed.
/// Failures are logged; the request has already succeeded.
pub async fn dispatch(queue: &dyn JobQueue, jobs: Vec<Job>) {
    for job in jobs {
        let name = job.name();
        if let Err(e) = queue.enqueue(job).await {
            log::warn!("Failed to enqueue {} job: {:?}", name, e);
        }
    }
}

/// In-process queue drained by a tokio task.
#[derive(Clone)]
pub struct LocalQueue {
    sender: mpsc::UnboundedSender<Job>,
}

impl LocalQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (LocalQueue { sender }, receiver)
    }
}

#[async_trait]
impl JobQueue for LocalQueue {
    async fn enqueue(&self, job: Job) -> Result<(), anyhow::Error> {
        log::debug!("Queueing {} job locally", job.name());
        self.sender
            .send(job)
            .map_err(|e| anyhow::anyhow!("Local job queue closed: {}", e))
    }
}

/// Spawns the worker loop of a local queue; each job runs on its own task.
pub fn spawn_local_worker(
    runner: Arc<super::JobRunner>,
    queue: Arc<dyn JobQueue>,
    mut receiver: mpsc::UnboundedReceiver<Job>,
) {
    tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            let runner = Arc::clone(&runner);
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let follow_ups = runner.execute(&job).await;
                dispatch(queue.as_ref(), follow_ups).await;
            });
        }
        log::info!("Local job worker stopped");
    });
}
