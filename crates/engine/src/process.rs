//! Peripheral one-shot process/search RPCs.
//!
//! These sit beside the worker-polling core and share only the transport —
//! no polling, credit, or retry-queue behavior attaches to them.

use workbridge_core::WorkbridgeError;

use crate::transport::Transport;

/// Thin client for the orchestration server's synchronous process
/// operations: start, inspect, and search. Each call is a single
/// request with the transport's own transient-error retry and no further
/// application-level retry policy.
pub struct ProcessClient {
    transport: Transport,
}

impl ProcessClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Starts a process by name with the given input, returning the
    /// server's response body verbatim.
    pub async fn start_process(
        &self,
        name: &str,
        namespace: &str,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, WorkbridgeError> {
        let body = serde_json::json!({
            "name": name,
            "namespace": namespace,
            "input": input,
        });
        let response = self.transport.post_json("api/processes/start", &[], &body).await?;
        if !response.is_success() {
            return Err(WorkbridgeError::ServerStatus {
                status: response.status.as_u16(),
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        response.json()
    }

    /// Fetches the current state of a previously started process.
    pub async fn get_process(&self, process_id: &str) -> Result<serde_json::Value, WorkbridgeError> {
        let response = self
            .transport
            .get("api/processes/get", &[("processId", process_id.to_string())])
            .await?;
        if !response.is_success() {
            return Err(WorkbridgeError::ServerStatus {
                status: response.status.as_u16(),
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        response.json()
    }

    /// Searches processes matching a free-text query.
    pub async fn search_processes(&self, query: &str) -> Result<serde_json::Value, WorkbridgeError> {
        let response = self
            .transport
            .get("api/search/processes", &[("query", query.to_string())])
            .await?;
        if !response.is_success() {
            return Err(WorkbridgeError::ServerStatus {
                status: response.status.as_u16(),
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        response.json()
    }
}
