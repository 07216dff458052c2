//! Pure factory functions turning a handler outcome into a wire [`WorkResponse`].

use serde_json::{Map, Value};
use workbridge_core::{StepResult, WorkRequest, WorkResponse, WorkStatus};

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Coerces a handler's result payload into an output mapping.
///
/// An object is passed through as-is (JSON object keys are always strings,
/// so the source's non-string-key filtering never triggers here). `null`
/// becomes an empty mapping. Anything else — a primitive or a sequence — is
/// wrapped under the literal key `"result"`.
fn coerce_output(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("result".to_string(), other.clone());
            map
        }
    }
}

/// Builds a COMPLETED response from a successful handler result.
pub fn success(request: &WorkRequest, step_result: &StepResult) -> WorkResponse {
    WorkResponse {
        process_id: request.process_id.clone(),
        step_id: request.step_id.clone(),
        step_execution_id: request.step_execution_id,
        output: coerce_output(&step_result.result),
        status: WorkStatus::Completed,
        reschedule_after_seconds: None,
        started_at: now_millis(),
    }
}

/// Builds a RUNNING response: the same coercion as [`success`], but the
/// server is told to reschedule the step.
pub fn running(request: &WorkRequest, step_result: &StepResult) -> WorkResponse {
    WorkResponse {
        process_id: request.process_id.clone(),
        step_id: request.step_id.clone(),
        step_execution_id: request.step_execution_id,
        output: coerce_output(&step_result.result),
        status: WorkStatus::Running,
        reschedule_after_seconds: step_result.reschedule_after_seconds,
        started_at: now_millis(),
    }
}

/// Builds a FAILED response from an error message.
///
/// If the message itself parses as JSON, the parsed value is nested under
/// `"error"`; otherwise the raw text is used.
pub fn fail(request: &WorkRequest, error_message: &str) -> WorkResponse {
    let inner = serde_json::from_str::<Value>(error_message)
        .unwrap_or_else(|_| Value::String(error_message.to_string()));
    let mut output = Map::new();
    output.insert("error".to_string(), inner);
    WorkResponse {
        process_id: request.process_id.clone(),
        step_id: request.step_id.clone(),
        step_execution_id: request.step_execution_id,
        output,
        status: WorkStatus::Failed,
        reschedule_after_seconds: None,
        started_at: now_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request() -> WorkRequest {
        WorkRequest {
            process_id: "p1".into(),
            step_id: "s1".into(),
            step_execution_id: 9,
            step_name: "echo".into(),
            step_namespace: "default".into(),
            input_param: Value::Null,
            scheduling: HashMap::new(),
        }
    }

    #[test]
    fn success_on_mapping_passes_through() {
        let result = StepResult::from_value(serde_json::json!({"a": 1, "b": 2}));
        let response = success(&request(), &result);
        assert_eq!(response.output.get("a"), Some(&serde_json::json!(1)));
        assert_eq!(response.status, WorkStatus::Completed);
        assert_eq!(response.process_id, "p1");
        assert_eq!(response.step_execution_id, 9);
    }

    #[test]
    fn success_on_primitive_wraps_under_result() {
        let result = StepResult::from_value(serde_json::json!(42));
        let response = success(&request(), &result);
        assert_eq!(response.output.get("result"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn success_on_sequence_wraps_under_result() {
        let result = StepResult::from_value(serde_json::json!([1, 2, 3]));
        let response = success(&request(), &result);
        assert_eq!(response.output.get("result"), Some(&serde_json::json!([1, 2, 3])));
    }

    #[test]
    fn running_copies_reschedule_delay() {
        let result = StepResult {
            result: serde_json::json!("x"),
            keep_running: true,
            reschedule_after_seconds: Some(5),
        };
        let response = running(&request(), &result);
        assert_eq!(response.status, WorkStatus::Running);
        assert_eq!(response.reschedule_after_seconds, Some(5));
    }

    #[test]
    fn fail_wraps_plain_text_as_string() {
        let response = fail(&request(), "boom");
        assert_eq!(response.output.get("error"), Some(&serde_json::json!("boom")));
        assert_eq!(response.status, WorkStatus::Failed);
    }

    #[test]
    fn fail_parses_json_error_text() {
        let response = fail(&request(), r#"{"code": 500}"#);
        assert_eq!(response.output.get("error"), Some(&serde_json::json!({"code": 500})));
    }
}
