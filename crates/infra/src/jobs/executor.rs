//! Bounded background task queue.
//!
//! Work that must not delay a response (cache population, TTL refresh) is
//! submitted here instead of being spawned ad hoc. Each task runs under its
//! own deadline, unrelated to the request that submitted it.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Notify, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

struct Task {
    name: &'static str,
    fut: TaskFuture,
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct BackgroundQueueConfig {
    /// Maximum number of queued (not yet running) tasks
    pub capacity: usize,
    /// Maximum concurrently running tasks
    pub concurrency: usize,
    /// Deadline applied to every task
    pub task_timeout: Duration,
    /// Name for logging
    pub name: String,
}

impl Default for BackgroundQueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            concurrency: 16,
            task_timeout: Duration::from_secs(5),
            name: "background-queue".to_string(),
        }
    }
}

impl BackgroundQueueConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("background queue is full")]
    Full,

    #[error("background queue is shut down")]
    Closed,
}

/// Queue runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub dropped: u64,
    pub pending: usize,
}

#[derive(Debug, Default)]
struct Shared {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    dropped: AtomicU64,
    pending: AtomicUsize,
    idle: Notify,
}

impl Shared {
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn snapshot(&self) -> QueueStats {
        QueueStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Acquire),
        }
    }
}

/// Releases a pending slot even if the task panics.
struct PendingGuard(Arc<Shared>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.finish_one();
    }
}

/// Cloneable submission side of the queue.
#[derive(Clone)]
pub struct BackgroundQueue {
    tx: mpsc::Sender<Task>,
    shared: Arc<Shared>,
}

impl core::fmt::Debug for BackgroundQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BackgroundQueue")
            .field("stats", &self.shared.snapshot())
            .finish()
    }
}

/// Lifecycle handle of a running queue worker.
#[derive(Debug)]
pub struct BackgroundQueueHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl BackgroundQueueHandle {
    /// Stop accepting work, run everything already queued, and wait for it.
    pub async fn shutdown(mut self) -> QueueStats {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
        self.shared.snapshot()
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.snapshot()
    }
}

impl BackgroundQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn start(config: BackgroundQueueConfig) -> (BackgroundQueue, BackgroundQueueHandle) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let shared = Arc::new(Shared::default());

        let join = tokio::spawn(worker_loop(rx, shutdown_rx, shared.clone(), config));

        (
            BackgroundQueue {
                tx,
                shared: shared.clone(),
            },
            BackgroundQueueHandle {
                shutdown: Some(shutdown_tx),
                join: Some(join),
                shared,
            },
        )
    }

    /// Enqueue a task without waiting. A full or closed queue drops it.
    pub fn submit<F>(&self, name: &'static str, fut: F) -> Result<(), QueueError>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);

        let task = Task {
            name,
            fut: Box::pin(fut),
        };

        match self.tx.try_send(task) {
            Ok(()) => {
                self.shared.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                self.shared.finish_one();
                match err {
                    mpsc::error::TrySendError::Full(_) => Err(QueueError::Full),
                    mpsc::error::TrySendError::Closed(_) => Err(QueueError::Closed),
                }
            }
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.snapshot()
    }

    /// Resolve once no submitted task is queued or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

async fn worker_loop(
    mut rx: mpsc::Receiver<Task>,
    mut shutdown_rx: oneshot::Receiver<()>,
    shared: Arc<Shared>,
    config: BackgroundQueueConfig,
) {
    info!(queue = %config.name, capacity = config.capacity, concurrency = config.concurrency, "background queue started");

    let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut running = JoinSet::new();
    // A dropped handle leaves the worker running until every sender is gone.
    let mut shutdown_armed = true;

    loop {
        tokio::select! {
            task = rx.recv() => match task {
                Some(task) => run_task(&mut running, &permits, &shared, &config, task).await,
                None => break,
            },
            signal = &mut shutdown_rx, if shutdown_armed => {
                shutdown_armed = false;
                if signal.is_ok() {
                    debug!(queue = %config.name, "draining background queue");
                    rx.close();
                    while let Some(task) = rx.recv().await {
                        run_task(&mut running, &permits, &shared, &config, task).await;
                    }
                    break;
                }
            },
            Some(_) = running.join_next(), if !running.is_empty() => {}
        }
    }

    while running.join_next().await.is_some() {}

    info!(queue = %config.name, stats = ?shared.snapshot(), "background queue stopped");
}

async fn run_task(
    running: &mut JoinSet<()>,
    permits: &Arc<Semaphore>,
    shared: &Arc<Shared>,
    config: &BackgroundQueueConfig,
    task: Task,
) {
    let guard = PendingGuard(shared.clone());

    let permit = match permits.clone().acquire_owned().await {
        Ok(p) => p,
        Err(_) => return,
    };

    let shared = shared.clone();
    let timeout = config.task_timeout;
    let queue = config.name.clone();

    running.spawn(async move {
        let _permit = permit;
        let _guard = guard;

        match tokio::time::timeout(timeout, task.fut).await {
            Ok(Ok(())) => {
                shared.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                warn!(queue = %queue, task = task.name, error = %e, "background task failed");
            }
            Err(_) => {
                shared.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(queue = %queue, task = task.name, timeout_ms = timeout.as_millis() as u64, "background task timed out");
            }
        }
    });
}
