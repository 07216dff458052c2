//! The executor pool: bounded concurrent runners that dispatch work items
//! and hand the resulting envelope to the submitter.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, Mutex};
use workbridge_core::WorkRequest;

use crate::dispatch::{dispatch, WorkerRegistry};
use crate::submitter::Submitter;

/// Hands work items from the poller to a fixed-size pool of runner tasks.
///
/// Runners share one receiver behind a mutex — a common pool-from-one-channel
/// idiom when the channel itself (not per-runner state) is the thing being
/// fanned out. A runner never releases the item's credit directly; the
/// submitter's tracker owns that once `submitter.submit` is called.
pub struct ExecutorPool {
    sender: mpsc::Sender<WorkRequest>,
    executing_count: Arc<AtomicI64>,
}

impl ExecutorPool {
    pub fn spawn(
        pool_size: usize,
        registry: Arc<RwLock<WorkerRegistry>>,
        submitter: Arc<Submitter>,
        executing_count: Arc<AtomicI64>,
    ) -> (Self, Vec<tokio::task::JoinHandle<()>>) {
        let capacity = pool_size * 2;
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let mut handles = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let receiver = Arc::clone(&receiver);
            let registry = Arc::clone(&registry);
            let submitter = Arc::clone(&submitter);
            let executing_count = Arc::clone(&executing_count);
            handles.push(tokio::spawn(async move {
                run_runner(receiver, registry, submitter, executing_count).await;
            }));
        }

        (Self { sender, executing_count }, handles)
    }

    /// Hands a work item off to the pool. Backpressures (awaits) if every
    /// runner and the channel buffer are saturated.
    pub async fn dispatch(&self, request: WorkRequest) {
        if self.sender.send(request).await.is_err() {
            tracing::error!("executor pool channel closed, dropping work item");
        }
    }

    pub fn executing_count(&self) -> i64 {
        self.executing_count.load(Ordering::Relaxed)
    }
}

async fn run_runner(
    receiver: Arc<Mutex<mpsc::Receiver<WorkRequest>>>,
    registry: Arc<RwLock<WorkerRegistry>>,
    submitter: Arc<Submitter>,
    executing_count: Arc<AtomicI64>,
) {
    loop {
        let request = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(request) = request else {
            break; // sender dropped, pool is shutting down
        };

        let worker = registry
            .read()
            .expect("worker registry lock poisoned")
            .lookup(&request.step_namespace, &request.step_name);
        let Some(worker) = worker else {
            tracing::warn!(
                namespace = %request.step_namespace,
                name = %request.step_name,
                "no worker registered for this identity, dropping work item"
            );
            executing_count.fetch_sub(1, Ordering::Relaxed);
            continue;
        };

        let response = dispatch(&worker, &request).await;
        submitter.submit(response, Arc::clone(&worker.poll_state));
        executing_count.fetch_sub(1, Ordering::Relaxed);
    }
}
