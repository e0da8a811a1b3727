use std::future::Future;
use std::sync::Mutex;

use tokio::task::JoinHandle;
use tracing::{debug_span, error, Instrument};

/// Fire-and-forget tasks spawned during startup.
///
/// Nothing waits on an individual task; `wait_idle` exists so the binary and
/// tests can tell when the whole pipeline has settled.
#[derive(Default)]
pub struct BackgroundTasks {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task.instrument(debug_span!("task", name)));
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handle);
    }

    /// Wait until every task, including ones spawned by other tasks, finished.
    pub async fn wait_idle(&self) {
        loop {
            let batch = std::mem::take(
                &mut *self
                    .handles
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            );
            if batch.is_empty() {
                return;
            }

            for handle in batch {
                if let Err(e) = handle.await {
                    if e.is_panic() {
                        error!("Background task panicked: {}", e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_wait_idle_covers_nested_spawns() {
        let tasks = Arc::new(BackgroundTasks::new());
        let done = Arc::new(AtomicUsize::new(0));

        let inner_tasks = tasks.clone();
        let counter = done.clone();
        tasks.spawn("outer", async move {
            let nested = counter.clone();
            inner_tasks.spawn("inner", async move {
                tokio::task::yield_now().await;
                nested.fetch_add(1, Ordering::SeqCst);
            });
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tasks.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_stop_others() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        tasks.spawn("boom", async { panic!("boom") });
        let counter = done.clone();
        tasks.spawn("ok", async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tasks.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
