//! Worker registration: publishes the set of supported handlers to the
//! server and retries indefinitely until it is accepted.

use std::sync::RwLock;
use std::time::Duration;

use workbridge_core::RegisteredWorker;

use crate::dispatch::WorkerRegistry;
use crate::transport::Transport;

const REGISTER_PATH: &str = "api/clients/register";
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Publishes every registered worker to the server, retrying forever on
/// transport or non-200 failure. Returns the raw response body on success.
pub async fn renew_registration(
    transport: &Transport,
    org_id: &str,
    registry: &RwLock<WorkerRegistry>,
) -> serde_json::Value {
    let entries: Vec<RegisteredWorker> = {
        let registry = registry.read().expect("worker registry lock poisoned");
        registry
            .values()
            .map(|worker| RegisteredWorker::new(org_id, worker.namespace.clone(), worker.name.clone()))
            .collect()
    };
    let body = serde_json::to_value(&entries).expect("registered worker list always serializes");

    loop {
        match transport.put_json(REGISTER_PATH, &body).await {
            Ok(response) if response.is_success() => {
                tracing::info!(count = entries.len(), "workers registered");
                return response
                    .json::<serde_json::Value>()
                    .unwrap_or(serde_json::Value::Null);
            }
            Ok(response) => {
                tracing::warn!(status = %response.status, "registration rejected, retrying");
            }
            Err(err) => {
                tracing::warn!(error = %err, "registration transport failure, retrying");
            }
        }
        tokio::time::sleep(RETRY_DELAY).await;
    }
}
