//! Per-user session workers
//!
//! Each user gets a worker task that owns a queue of inbound updates, so one
//! user's updates are handled strictly in arrival order while different
//! users progress concurrently.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::Controller;
pub use traits::*;

use crate::state_machine::Inbound;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const WORKER_QUEUE_CAPACITY: usize = 32;

/// Handle to a running user worker
struct WorkerHandle {
    id: u64,
    tx: mpsc::Sender<Inbound>,
    /// Cancelled once the worker has handled its last update
    finished: CancellationToken,
}

type Workers = Arc<RwLock<HashMap<u64, WorkerHandle>>>;

/// Routes inbound updates to per-user workers
pub struct SessionManager<T, A, P>
where
    T: Transport + 'static,
    A: Analyzer + 'static,
    P: PdfRenderer + 'static,
{
    controller: Arc<Controller<T, A, P>>,
    workers: Workers,
    idle_timeout: Duration,
    next_worker_id: AtomicU64,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl<T, A, P> SessionManager<T, A, P>
where
    T: Transport + 'static,
    A: Analyzer + 'static,
    P: PdfRenderer + 'static,
{
    pub fn new(controller: Controller<T, A, P>, idle_timeout: Duration) -> Self {
        Self {
            controller: Arc::new(controller),
            workers: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
            next_worker_id: AtomicU64::new(1),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Queue an update on its user's worker, starting one if needed
    pub async fn dispatch(&self, inbound: Inbound) {
        if self.shutdown.is_cancelled() {
            tracing::warn!(user_id = inbound.user_id, "Dropping update during shutdown");
            return;
        }

        let user_id = inbound.user_id;
        let tx = self.get_or_spawn(user_id).await;
        let Err(mpsc::error::SendError(inbound)) = tx.send(inbound).await else {
            return;
        };

        // The worker retired between lookup and send; its successor takes over
        let tx = self.get_or_spawn(user_id).await;
        if tx.send(inbound).await.is_err() {
            tracing::error!(user_id, "Failed to queue update for worker");
        }
    }

    /// Number of live workers
    #[cfg(test)]
    pub async fn active_workers(&self) -> usize {
        self.workers.read().await.len()
    }

    /// Stop accepting work and wait for in-flight updates to finish
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("All session workers stopped");
    }

    async fn get_or_spawn(&self, user_id: u64) -> mpsc::Sender<Inbound> {
        if let Some(handle) = self.workers.read().await.get(&user_id) {
            if !handle.tx.is_closed() {
                return handle.tx.clone();
            }
        }

        let mut workers = self.workers.write().await;
        // Double-check after acquiring the write lock
        let predecessor = match workers.get(&user_id) {
            Some(handle) if !handle.tx.is_closed() => return handle.tx.clone(),
            // Still draining: the successor starts once it is done
            Some(handle) => Some(handle.finished.clone()),
            None => None,
        };

        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(WORKER_QUEUE_CAPACITY);
        let finished = CancellationToken::new();
        workers.insert(
            user_id,
            WorkerHandle {
                id,
                tx: tx.clone(),
                finished: finished.clone(),
            },
        );

        let worker = Worker {
            user_id,
            id,
            controller: Arc::clone(&self.controller),
            workers: Arc::clone(&self.workers),
            idle_timeout: self.idle_timeout,
            shutdown: self.shutdown.clone(),
            predecessor,
            finished,
        };
        self.tracker.spawn(worker.run(rx));
        tracing::debug!(user_id, worker_id = id, "Started session worker");

        tx
    }
}

struct Worker<T, A, P>
where
    T: Transport + 'static,
    A: Analyzer + 'static,
    P: PdfRenderer + 'static,
{
    user_id: u64,
    id: u64,
    controller: Arc<Controller<T, A, P>>,
    workers: Workers,
    idle_timeout: Duration,
    shutdown: CancellationToken,
    predecessor: Option<CancellationToken>,
    finished: CancellationToken,
}

impl<T, A, P> Worker<T, A, P>
where
    T: Transport + 'static,
    A: Analyzer + 'static,
    P: PdfRenderer + 'static,
{
    async fn run(self, mut rx: mpsc::Receiver<Inbound>) {
        if let Some(predecessor) = &self.predecessor {
            predecessor.cancelled().await;
        }

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                next = tokio::time::timeout(self.idle_timeout, rx.recv()) => match next {
                    Ok(Some(inbound)) => self.controller.handle(inbound).await,
                    Ok(None) => break,
                    Err(_) => {
                        tracing::debug!(user_id = self.user_id, worker_id = self.id, "Session worker idle");
                        break;
                    }
                },
            }
        }

        // Updates queued before the close are still handled in order
        rx.close();
        while let Some(inbound) = rx.recv().await {
            self.controller.handle(inbound).await;
        }

        self.finished.cancel();
        self.retire().await;
    }

    async fn retire(&self) {
        let mut workers = self.workers.write().await;
        if workers.get(&self.user_id).is_some_and(|h| h.id == self.id) {
            workers.remove(&self.user_id);
        }
    }
}
