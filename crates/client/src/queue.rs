//! FIFO task serializer with concurrency exactly 1.
//!
//! Consumer-negotiation rounds must never interleave: each round reads
//! and mutates the shared consumer table and the receive-lane version
//! counter across several suspension points. The queue runs one task's
//! future to completion, however many awaits it contains, before the
//! next task is dequeued.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Task {
    label: &'static str,
    future: TaskFuture,
    done: oneshot::Sender<()>,
}

/// Handle to a running work queue. Cheap to clone; the queue stops once
/// every handle is dropped and the backlog is drained, or immediately
/// on [`WorkQueue::close`].
#[derive(Clone)]
pub struct WorkQueue {
    task_tx: mpsc::UnboundedSender<Task>,
    shutdown_tx: mpsc::Sender<()>,
}

impl WorkQueue {
    /// Start the queue loop. `task_timeout` bounds each task's run
    /// time; a task exceeding it is dropped and the loop moves on.
    pub fn new(task_timeout: Option<Duration>) -> Self {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        tokio::spawn(queue_loop(task_rx, shutdown_rx, task_timeout));
        Self {
            task_tx,
            shutdown_tx,
        }
    }

    /// Append a task. Tasks start strictly in `run` order, one at a
    /// time. The returned receiver resolves when the task has run to
    /// completion; it errs if the task was dropped by timeout or
    /// shutdown instead.
    pub fn run<F>(&self, label: &'static str, future: F) -> oneshot::Receiver<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (done, done_rx) = oneshot::channel();
        let task = Task {
            label,
            future: Box::pin(future),
            done,
        };
        if self.task_tx.send(task).is_err() {
            debug!(label, "work queue is closed, dropping task");
        }
        done_rx
    }

    /// Stop the loop: the running task is cancelled at its next
    /// suspension point and queued tasks are dropped.
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn queue_loop(
    mut task_rx: mpsc::UnboundedReceiver<Task>,
    mut shutdown_rx: mpsc::Receiver<()>,
    task_timeout: Option<Duration>,
) {
    loop {
        let Task {
            label,
            future,
            done,
        } = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            task = task_rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        debug!(label, "running queued task");
        let shut_down = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => true,
            completed = run_task(future, label, task_timeout) => {
                if completed {
                    // The caller may not be waiting; that is fine.
                    let _ = done.send(());
                }
                false
            }
        };
        if shut_down {
            break;
        }
    }
    debug!("work queue stopped");
}

/// Drive one task, honoring the per-task timeout. Returns whether the
/// task ran to completion (a timed-out task did not).
async fn run_task(future: TaskFuture, label: &'static str, task_timeout: Option<Duration>) -> bool {
    match task_timeout {
        Some(limit) => {
            let completed = tokio::time::timeout(limit, future).await.is_ok();
            if !completed {
                warn!(label, ?limit, "queued task timed out, dropping it");
            }
            completed
        }
        None => {
            future.await;
            true
        }
    }
}
