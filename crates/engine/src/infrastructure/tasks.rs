//! Bounded fire-and-forget work.
//!
//! Advisory probes and overlay broadcasts run here so signal handling never
//! waits on them. A semaphore caps how many run at once; failures are logged
//! and dropped.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

#[derive(Clone)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    semaphore: Arc<Semaphore>,
}

impl BackgroundTasks {
    pub fn new(limit: usize) -> Self {
        Self {
            tracker: TaskTracker::new(),
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    /// Spawn `work`, logging an error result under `label`.
    pub fn spawn<F, E>(&self, label: &'static str, work: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        self.tracker.spawn(async move {
            // Wait for capacity inside the task so the caller never blocks
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(task = label, error = %e, "Background task dropped");
                    return;
                }
            };

            if let Err(e) = work.await {
                tracing::warn!(task = label, error = %e, "Background task failed");
            }
        });
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for everything spawned so far, then keep accepting work.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stop accepting new work and wait for what is running.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.semaphore.close();
    }
}
