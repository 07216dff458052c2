//! The polling loop: per-round credit acquisition, a single batched poll
//! call, and reconciliation of credits the server didn't fill.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use workbridge_core::{ClientConfig, StepSize, WorkRequest};

use crate::dispatch::{Worker, WorkerRegistry};
use crate::executor::ExecutorPool;
use crate::submitter::Submitter;
use crate::transport::Transport;

const POLL_PATH: &str = "api/clients/poll";
const MIN_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(20);
const TELEMETRY_INTERVAL: Duration = Duration::from_secs(10);

pub struct Poller {
    config: Arc<ClientConfig>,
    transport: Transport,
    registry: Arc<RwLock<WorkerRegistry>>,
    executor: Arc<ExecutorPool>,
    submitter: Arc<Submitter>,
    executing_count: Arc<AtomicI64>,
    disable_running_worker_logs: bool,
    stop: Arc<AtomicBool>,
    last_telemetry: Mutex<Instant>,
}

impl Poller {
    pub fn new(
        config: Arc<ClientConfig>,
        transport: Transport,
        registry: Arc<RwLock<WorkerRegistry>>,
        executor: Arc<ExecutorPool>,
        submitter: Arc<Submitter>,
        executing_count: Arc<AtomicI64>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let disable_running_worker_logs =
            std::env::var("DISABLE_RUNNING_WORKER_LOGS").as_deref() == Ok("true");
        Self {
            config,
            transport,
            registry,
            executor,
            submitter,
            executing_count,
            disable_running_worker_logs,
            stop,
            last_telemetry: Mutex::new(Instant::now() - TELEMETRY_INTERVAL),
        }
    }

    pub async fn run(&self) {
        let mut retry_count: u32 = 0;
        while !self.stop.load(Ordering::Relaxed) {
            let requested: Vec<(Arc<Worker>, u32)> = {
                let registry = self.registry.read().expect("worker registry lock poisoned");
                registry
                    .values()
                    .filter_map(|worker| {
                        let size = worker.poll_state.acquire_max_available();
                        (size > 0).then(|| (Arc::clone(worker), size))
                    })
                    .collect()
            };

            if requested.is_empty() {
                tokio::time::sleep(self.config.delay()).await;
                continue;
            }

            match self.poll_once(&requested).await {
                Ok(()) => retry_count = 0,
                Err(err) => {
                    tracing::warn!(error = %err, "poll failed, releasing reserved credits");
                    release_all(&requested);
                    retry_count += 1;
                    tokio::time::sleep(backoff_for(retry_count)).await;
                    continue;
                }
            }

            self.maybe_log_telemetry(&requested);
            tokio::time::sleep(self.config.delay()).await;
        }
    }

    async fn poll_once(&self, requested: &[(Arc<Worker>, u32)]) -> Result<(), String> {
        let step_sizes: Vec<StepSize> = requested
            .iter()
            .map(|(worker, size)| StepSize {
                namespace: worker.namespace.clone(),
                name: worker.name.clone(),
                size: *size,
            })
            .collect();
        let body = serde_json::to_value(&step_sizes).map_err(|err| err.to_string())?;

        let response = self
            .transport
            .post_json(
                POLL_PATH,
                &[("size", self.config.work_request_batch_size.to_string())],
                &body,
            )
            .await
            .map_err(|err| err.to_string())?;

        if !response.is_success() {
            return Err(format!("server returned status {}", response.status));
        }

        let work_requests: Vec<WorkRequest> = response.json().map_err(|err| err.to_string())?;

        let mut received_counts: HashMap<String, u32> = HashMap::new();
        for request in &work_requests {
            *received_counts.entry(request.identity_key()).or_insert(0) += 1;
        }
        self.executing_count.fetch_add(work_requests.len() as i64, Ordering::Relaxed);

        for (worker, requested_size) in requested {
            let received = received_counts.get(&worker.identity_key()).copied().unwrap_or(0);
            if *requested_size > received {
                worker.poll_state.release(requested_size - received);
            }
        }

        for request in work_requests {
            self.executor.dispatch(request).await;
        }

        Ok(())
    }

    fn maybe_log_telemetry(&self, requested: &[(Arc<Worker>, u32)]) {
        if self.disable_running_worker_logs {
            return;
        }
        let mut last = self.last_telemetry.lock().expect("telemetry lock poisoned");
        if last.elapsed() < TELEMETRY_INTERVAL {
            return;
        }
        *last = Instant::now();
        drop(last);

        let polled: Vec<String> = requested
            .iter()
            .map(|(worker, size)| format!("{}={}", worker.identity_key(), size))
            .collect();
        tracing::info!(polled = %polled.join(","), "poll round requested sizes");

        for (worker, requested_size) in requested {
            tracing::info!(
                worker = %worker.identity_key(),
                available = worker.poll_state.total() - worker.poll_state.in_progress(),
                requested = requested_size,
                total = worker.poll_state.total(),
                "worker credit snapshot"
            );
        }
        tracing::info!(
            executing = self.executing_count.load(Ordering::Relaxed),
            tracked = self.submitter.tracker_count(),
            "poller summary"
        );
    }
}

fn release_all(requested: &[(Arc<Worker>, u32)]) {
    for (worker, size) in requested {
        worker.poll_state.release(*size);
    }
}

fn backoff_for(retry_count: u32) -> Duration {
    let shift = (retry_count - 1).min(10);
    MIN_BACKOFF.checked_mul(1u32 << shift).unwrap_or(MAX_BACKOFF).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_cap() {
        assert_eq!(backoff_for(1), Duration::from_millis(100));
        assert_eq!(backoff_for(2), Duration::from_millis(200));
        assert_eq!(backoff_for(3), Duration::from_millis(400));
        assert_eq!(backoff_for(20), MAX_BACKOFF);
    }
}
