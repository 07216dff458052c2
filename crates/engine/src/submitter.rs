//! The result submission pipeline: bounded main/retry queues, batch posting,
//! response reconciliation, and stale-tracker reaping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use workbridge_core::{ClientConfig, ClientSubmitResult, PollState, Queue, WorkResponse};

use crate::transport::Transport;

const BULK_RESULTS_PATH: &str = "api/clients/bulkResults";
const QUEUE_CAPACITY: usize = 50_000;
const IDLE_BACKOFF: Duration = Duration::from_millis(200);
const TRANSIENT_BACKOFF_MIN: Duration = Duration::from_millis(100);
const TRANSIENT_BACKOFF_MAX: Duration = Duration::from_secs(5);
const REAPER_TICK: Duration = Duration::from_secs(5);
const STALE_THRESHOLD_MILLIS: i64 = 10 * 60 * 1000;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

struct Tracker {
    retry_count: u32,
    queued_time_millis: i64,
    poll_state: Arc<PollState>,
}

/// Owns the two submission queues, the in-flight tracker, and the reaper.
///
/// Credit ownership: once `submit` accepts a response, the credit belongs to
/// the tracker entry. Only [`Submitter`]'s own reconciliation and reaper
/// paths release it, and always by removing the tracker first so a credit
/// is never released twice.
pub struct Submitter {
    config: Arc<ClientConfig>,
    transport: Transport,
    main_queue: Arc<Queue<WorkResponse>>,
    retry_queue: Arc<Queue<WorkResponse>>,
    tracker: Arc<Mutex<HashMap<String, Tracker>>>,
    disabled: bool,
    stop: Arc<AtomicBool>,
}

impl Submitter {
    pub fn new(config: Arc<ClientConfig>, transport: Transport) -> Self {
        let disabled = std::env::var("DISABLE_SUBMIT_CLIENT").as_deref() == Ok("true");
        Self {
            config,
            transport,
            main_queue: Arc::new(Queue::new(QUEUE_CAPACITY)),
            retry_queue: Arc::new(Queue::new(QUEUE_CAPACITY)),
            tracker: Arc::new(Mutex::new(HashMap::new())),
            disabled,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of trackers currently in flight (for telemetry).
    pub fn tracker_count(&self) -> usize {
        self.tracker.lock().expect("tracker lock poisoned").len()
    }

    /// Enqueues `response` for submission, recording a tracker against
    /// `poll_state`. If the submitter is disabled, the credit is released
    /// immediately and nothing is enqueued (draining mode).
    pub fn submit(&self, response: WorkResponse, poll_state: Arc<PollState>) {
        if self.disabled {
            poll_state.release(poll_state.total());
            return;
        }

        let step_id = response.step_id.clone();
        self.tracker.lock().expect("tracker lock poisoned").insert(
            step_id,
            Tracker { retry_count: 0, queued_time_millis: now_millis(), poll_state },
        );

        if !self.main_queue.put(response) {
            tracing::warn!("submitter main queue full, response dropped (stale reaper will recover its credit)");
        }
    }

    /// Spawns the batch-poster worker pool and the stale-entry reaper.
    /// Workers are split roughly two-thirds main / one-third retry with a
    /// floor of [`ClientConfig::MIN_SUBMIT_WORKERS`] total.
    pub fn spawn(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let total = ClientConfig::MIN_SUBMIT_WORKERS;
        let main_workers = (total * 2).div_ceil(3);
        let retry_workers = total.saturating_sub(main_workers).max(1);

        let mut handles = Vec::with_capacity(main_workers + retry_workers + 1);
        for _ in 0..main_workers {
            let submitter = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                submitter.run_batch_loop(Arc::clone(&submitter.main_queue)).await;
            }));
        }
        for _ in 0..retry_workers {
            let submitter = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                submitter.run_batch_loop(Arc::clone(&submitter.retry_queue)).await;
            }));
        }
        let submitter = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            submitter.run_reaper().await;
        }));
        handles
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    async fn run_batch_loop(&self, queue: Arc<Queue<WorkResponse>>) {
        let mut backoff = TRANSIENT_BACKOFF_MIN;
        while !self.stop.load(Ordering::Relaxed) {
            let batch = queue.drain_up_to(self.config.response_submit_batch_size);
            if batch.is_empty() {
                tokio::time::sleep(IDLE_BACKOFF).await;
                continue;
            }

            match self.post_batch(&batch).await {
                Ok(results) => {
                    backoff = TRANSIENT_BACKOFF_MIN;
                    for item in &batch {
                        self.reconcile(item, results.get(&item.step_id));
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, batch_size = batch.len(), "bulk results submit failed, retrying");
                    for item in &batch {
                        self.on_batch_failure(item);
                    }
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(TRANSIENT_BACKOFF_MAX);
                }
            }
        }
    }

    async fn post_batch(
        &self,
        batch: &[WorkResponse],
    ) -> Result<HashMap<String, ClientSubmitResult>, String> {
        let body = serde_json::to_value(batch).map_err(|err| err.to_string())?;
        let response = self
            .transport
            .post_json(BULK_RESULTS_PATH, &[], &body)
            .await
            .map_err(|err| err.to_string())?;
        if !response.is_success() {
            return Err(format!("server returned status {}", response.status));
        }
        response
            .json::<HashMap<String, ClientSubmitResult>>()
            .map_err(|err| err.to_string())
    }

    /// Reconciles one item against its server-reported result (or absence
    /// of one) per the permanent/transient/retry-cap classification.
    fn reconcile(&self, item: &WorkResponse, result: Option<&ClientSubmitResult>) {
        match result {
            Some(result) if !result.has_error() => self.release_tracker(&item.step_id),
            Some(result) => self.classify_error(item, &result.error_message),
            None => self.classify_error(item, ""),
        }
    }

    fn on_batch_failure(&self, item: &WorkResponse) {
        self.retry_or_give_up(item, None);
    }

    fn classify_error(&self, item: &WorkResponse, error_message: &str) {
        let permanent = !error_message.is_empty()
            && self
                .config
                .permanent_error_keywords
                .iter()
                .any(|keyword| error_message.contains(keyword.as_str()));
        if permanent {
            tracing::warn!(step_id = %item.step_id, error = error_message, "permanent submit error, dropping");
            self.release_tracker(&item.step_id);
        } else {
            self.retry_or_give_up(item, Some(error_message));
        }
    }

    fn retry_or_give_up(&self, item: &WorkResponse, error_message: Option<&str>) {
        let mut tracker = self.tracker.lock().expect("tracker lock poisoned");
        let Some(entry) = tracker.get_mut(&item.step_id) else {
            return; // already reaped
        };
        if entry.retry_count < self.config.max_submit_attempts {
            entry.retry_count += 1;
            drop(tracker);
            if !self.retry_queue.put(item.clone()) {
                tracing::warn!(step_id = %item.step_id, "retry queue full, response dropped");
            }
        } else {
            tracing::warn!(step_id = %item.step_id, error = error_message.unwrap_or_default(), "max submit retries reached, dropping");
            let entry = tracker.remove(&item.step_id).expect("checked above");
            drop(tracker);
            entry.poll_state.release(1);
        }
    }

    fn release_tracker(&self, step_id: &str) {
        let mut tracker = self.tracker.lock().expect("tracker lock poisoned");
        if let Some(entry) = tracker.remove(step_id) {
            drop(tracker);
            entry.poll_state.release(1);
        }
    }

    async fn run_reaper(&self) {
        let mut ticker = tokio::time::interval(REAPER_TICK);
        while !self.stop.load(Ordering::Relaxed) {
            ticker.tick().await;
            let now = now_millis();
            let stale: Vec<(String, Arc<PollState>)> = {
                let tracker = self.tracker.lock().expect("tracker lock poisoned");
                tracker
                    .iter()
                    .filter(|(_, entry)| now - entry.queued_time_millis > STALE_THRESHOLD_MILLIS)
                    .map(|(step_id, entry)| (step_id.clone(), Arc::clone(&entry.poll_state)))
                    .collect()
            };
            if stale.is_empty() {
                continue;
            }
            let mut tracker = self.tracker.lock().expect("tracker lock poisoned");
            for (step_id, poll_state) in &stale {
                if tracker.remove(step_id).is_some() {
                    poll_state.release(1);
                }
            }
            drop(tracker);
            tracing::warn!(count = stale.len(), "stale submit trackers reaped");
        }
    }
}
