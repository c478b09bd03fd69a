use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error};

pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs work outside the request that scheduled it.
pub trait TaskQueue: Send + Sync {
    /// Schedules `job` to start once `delay` has elapsed. Never blocks on the job.
    fn enqueue_after(&self, delay: Duration, job: Job);
}

/// Spawns each job onto the current tokio runtime and keeps the handles so
/// a short-lived process can wait for outstanding work before exiting.
#[derive(Default)]
pub struct TokioTaskQueue {
    jobs: Mutex<JoinSet<()>>,
}

impl TokioTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for every job enqueued so far, including ones enqueued by the
    /// jobs themselves while draining.
    pub async fn drain(&self) {
        loop {
            let mut jobs = {
                let mut guard = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                std::mem::take(&mut *guard)
            };
            if jobs.is_empty() {
                return;
            }
            debug!(pending = jobs.len(), "draining background jobs");
            while let Some(outcome) = jobs.join_next().await {
                if let Err(e) = outcome {
                    error!("background job failed: {e}");
                }
            }
        }
    }
}

impl TaskQueue for TokioTaskQueue {
    fn enqueue_after(&self, delay: Duration, job: Job) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while let Some(outcome) = jobs.try_join_next() {
            if let Err(e) = outcome {
                error!("background job failed: {e}");
            }
        }
        jobs.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            job.await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn drain_waits_for_delayed_jobs() {
        let queue = TokioTaskQueue::new();
        let done = Arc::new(AtomicUsize::new(0));

        for delay in [0, 5, 20] {
            let done = done.clone();
            queue.enqueue_after(
                Duration::from_millis(delay),
                Box::pin(async move {
                    done.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        queue.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn enqueue_reaps_finished_jobs() {
        let queue = TokioTaskQueue::new();
        for _ in 0..3 {
            queue.enqueue_after(Duration::ZERO, Box::pin(async {}));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        queue.enqueue_after(Duration::ZERO, Box::pin(async {}));
        assert_eq!(queue.jobs.lock().unwrap().len(), 1);
        queue.drain().await;
    }

    #[tokio::test]
    async fn drain_on_empty_queue_returns() {
        TokioTaskQueue::new().drain().await;
    }
}
