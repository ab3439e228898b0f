//! Bounded pool of upload workers.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Runs at most `size` jobs at a time on the tokio runtime. Extra jobs wait
/// for a free slot in spawn order.
#[derive(Clone)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            slots: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Idle workers right now.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Queues `job`. Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, job: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let slots = self.slots.clone();
        tokio::spawn(async move {
            // The semaphore is never closed.
            let Ok(_permit) = slots.acquire_owned().await else {
                return;
            };
            job.await;
        })
    }

    /// Like [`spawn`](Self::spawn), but drops `job` without running it if
    /// `cancel` fires while it is still waiting for a slot.
    pub fn spawn_cancellable<F>(&self, cancel: CancellationToken, job: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let slots = self.slots.clone();
        tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                permit = slots.acquire_owned() => permit,
            };
            let Ok(_permit) = permit else {
                return;
            };
            job.await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_size() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                pool.spawn(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn cancelled_job_leaves_the_queue() {
        let pool = WorkerPool::new(1);
        let (release, hold) = tokio::sync::oneshot::channel::<()>();
        let busy = pool.spawn(async move {
            let _ = hold.await;
        });

        let ran = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let queued = {
            let ran = ran.clone();
            pool.spawn_cancellable(cancel.clone(), async move {
                ran.fetch_add(1, Ordering::SeqCst);
            })
        };
        cancel.cancel();
        tokio::time::timeout(Duration::from_millis(500), queued)
            .await
            .expect("queued job should return once cancelled")
            .unwrap();

        release.send(()).unwrap();
        busy.await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn zero_size_means_one() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }
}
