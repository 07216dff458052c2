//! Wire types shared between the poller, dispatcher, and submitter.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Separator used to build a worker's identity key from `(namespace, name)`.
pub const IDENTITY_SEP: &str = "/";

/// Builds the identity key used throughout the SDK to address a worker.
pub fn identity_key(namespace: &str, name: &str) -> String {
    format!("{namespace}{IDENTITY_SEP}{name}")
}

/// A unit of work offered by the server for one poll round.
///
/// Immutable once received: nothing downstream of the poller mutates a
/// `WorkRequest`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkRequest {
    pub process_id: String,
    pub step_id: String,
    #[serde(default)]
    pub step_execution_id: i64,
    pub step_name: String,
    pub step_namespace: String,
    #[serde(default)]
    pub input_param: serde_json::Value,
    /// Opaque scheduling metadata the server attaches; round-tripped verbatim.
    #[serde(flatten)]
    pub scheduling: HashMap<String, serde_json::Value>,
}

impl WorkRequest {
    /// The `(namespace, name)` identity key for the worker this request targets.
    pub fn identity_key(&self) -> String {
        identity_key(&self.step_namespace, &self.step_name)
    }
}

/// The payload a handler hands back to the dispatcher.
///
/// A handler may return this directly (treated as the authoritative
/// envelope) or return a raw value, which the dispatcher wraps via
/// [`StepResult::from_value`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StepResult {
    pub result: serde_json::Value,
    #[serde(default)]
    pub keep_running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reschedule_after_seconds: Option<i64>,
}

impl StepResult {
    /// Wraps a raw handler return value as a completed step result.
    pub fn from_value(value: serde_json::Value) -> Self {
        Self {
            result: value,
            keep_running: false,
            reschedule_after_seconds: None,
        }
    }

    /// Whether the handler asked for the step to be rescheduled rather than
    /// completed (both `keep_running` and a positive reschedule delay set).
    pub fn wants_reschedule(&self) -> bool {
        self.keep_running && self.reschedule_after_seconds.is_some()
    }
}

/// Status of a submitted step, as reported to the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkStatus {
    Completed,
    Failed,
    Running,
}

/// The envelope submitted back to the server for one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkResponse {
    pub process_id: String,
    pub step_id: String,
    #[serde(default)]
    pub step_execution_id: i64,
    pub output: serde_json::Map<String, serde_json::Value>,
    pub status: WorkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reschedule_after_seconds: Option<i64>,
    pub started_at: i64,
}

/// The per-worker request for the next poll round: identity plus count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepSize {
    pub namespace: String,
    pub name: String,
    pub size: u32,
}

/// Per-step reply nested inside a bulk submission response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClientSubmitResult {
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub error_message: String,
}

impl ClientSubmitResult {
    /// Whether the server reported an error for this step.
    pub fn has_error(&self) -> bool {
        !self.error_message.is_empty()
    }
}

/// A worker registration entry as sent to `api/clients/register`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredWorker {
    pub org_id: String,
    pub namespace: String,
    pub step_type: &'static str,
    pub name: String,
}

impl RegisteredWorker {
    pub fn new(org_id: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            namespace: namespace.into(),
            step_type: "WORKER",
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_joins_namespace_and_name() {
        assert_eq!(identity_key("default", "echo"), "default/echo");
    }

    #[test]
    fn work_response_round_trips_through_json() {
        let response = WorkResponse {
            process_id: "p1".into(),
            step_id: "s1".into(),
            step_execution_id: 7,
            output: serde_json::Map::from_iter([("result".to_string(), serde_json::json!(3))]),
            status: WorkStatus::Completed,
            reschedule_after_seconds: None,
            started_at: 1234,
        };
        let json = serde_json::to_string(&response).unwrap();
        let back: WorkResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(response, back);
    }

    #[test]
    fn step_result_wants_reschedule_requires_both_fields() {
        let mut sr = StepResult {
            result: serde_json::json!("x"),
            keep_running: true,
            reschedule_after_seconds: None,
        };
        assert!(!sr.wants_reschedule());
        sr.reschedule_after_seconds = Some(5);
        assert!(sr.wants_reschedule());
    }
}
