//! Worker registry and the dispatcher that invokes a registered handler.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use workbridge_core::{identity_key, PollState, StepResult, WorkRequest, WorkbridgeError, WorkerConfig};

/// The tagged variant a handler's return value is classified into.
///
/// Grounded in the source's reflection-based branching: a handler may hand
/// back an authoritative `*StepResult`, a raw value the dispatcher wraps,
/// or an error that becomes a FAILED response.
pub enum WorkerOutcome {
    Step(StepResult),
    Value(Value),
    Err(String),
}

impl From<StepResult> for WorkerOutcome {
    fn from(value: StepResult) -> Self {
        Self::Step(value)
    }
}

impl From<Value> for WorkerOutcome {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl<T: Into<WorkerOutcome>> From<Result<T, String>> for WorkerOutcome {
    fn from(result: Result<T, String>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(message) => Self::Err(message),
        }
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased handler: payload in, tagged outcome out.
pub type HandlerFn = dyn Fn(Value) -> BoxFuture<'static, WorkerOutcome> + Send + Sync;

/// A registered worker: its descriptor, credit counter, and handler.
pub struct Worker {
    pub namespace: String,
    pub name: String,
    pub poll_state: Arc<PollState>,
    handler: Arc<HandlerFn>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("poll_state", &self.poll_state)
            .finish_non_exhaustive()
    }
}

impl Worker {
    /// The `(namespace, name)` identity key for this worker.
    pub fn identity_key(&self) -> String {
        identity_key(&self.namespace, &self.name)
    }
}

/// Registration requires a handler with exactly one declared parameter.
///
/// Rust's type system fixes the arity of every registration path offered by
/// [`WorkerRegistry`] to one, but the check is kept as real, independently
/// testable code rather than relying on that being self-evident, matching
/// the source's explicit runtime rejection.
pub fn validate_single_parameter(param_count: usize) -> Result<(), WorkbridgeError> {
    if param_count != 1 {
        return Err(WorkbridgeError::HandlerShapeMismatch {
            reason: "handler must have exactly one parameter".to_string(),
        });
    }
    Ok(())
}

/// The set of registered workers, keyed by `(namespace, name)`.
#[derive(Default, Debug)]
pub struct WorkerRegistry {
    workers: HashMap<String, Arc<Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a raw handler taking the payload as [`serde_json::Value`].
    pub fn register_value<F, Fut>(
        &mut self,
        config: WorkerConfig,
        handler: F,
    ) -> Result<(), WorkbridgeError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WorkerOutcome> + Send + 'static,
    {
        validate_single_parameter(1)?;
        let key = identity_key(&config.namespace, &config.name);
        if self.workers.contains_key(&key) {
            return Err(WorkbridgeError::AlreadyRegistered {
                namespace: config.namespace,
                name: config.name,
            });
        }
        let handler: Arc<HandlerFn> = Arc::new(move |value| Box::pin(handler(value)));
        self.workers.insert(
            key,
            Arc::new(Worker {
                namespace: config.namespace,
                name: config.name,
                poll_state: Arc::new(PollState::new(config.max_in_progress)),
                handler,
            }),
        );
        Ok(())
    }

    /// Registers a typed handler. The payload is coerced into `T` via a
    /// round trip through JSON before the handler is invoked; a payload
    /// that isn't a mapping or a sequence is rejected as "invalid input"
    /// before the handler ever runs.
    pub fn register<T, R, F, Fut>(
        &mut self,
        config: WorkerConfig,
        handler: F,
    ) -> Result<(), WorkbridgeError>
    where
        T: DeserializeOwned + Send + 'static,
        R: Into<WorkerOutcome>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.register_value(config, move |value| {
            let handler = Arc::clone(&handler);
            async move {
                match serde_json::from_value::<T>(value) {
                    Ok(input) => handler(input).await.into(),
                    Err(err) => WorkerOutcome::Err(format!("invalid input: {err}")),
                }
            }
        })
    }

    /// Looks up a worker by its `(namespace, name)` identity.
    ///
    /// Matching is by the full identity tuple, not name alone — the source's
    /// first-match-on-name executor lookup is a documented bug this SDK does
    /// not reproduce.
    pub fn lookup(&self, namespace: &str, name: &str) -> Option<Arc<Worker>> {
        self.workers.get(&identity_key(namespace, name)).cloned()
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<Worker>> {
        self.workers.values()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

/// Invokes `worker`'s handler against `request` and classifies the outcome
/// into a success/running/failed envelope.
pub async fn dispatch(worker: &Worker, request: &WorkRequest) -> workbridge_core::WorkResponse {
    if !(request.input_param.is_object() || request.input_param.is_array()) {
        return crate::response::fail(request, "invalid input");
    }

    let outcome = (worker.handler)(request.input_param.clone()).await;
    let step_result = match outcome {
        WorkerOutcome::Err(message) => return crate::response::fail(request, &message),
        WorkerOutcome::Step(step_result) => step_result,
        WorkerOutcome::Value(value) => {
            let value = if value.is_null() { Value::Object(Map::new()) } else { value };
            StepResult::from_value(value)
        }
    };

    if step_result.wants_reschedule() {
        crate::response::running(request, &step_result)
    } else {
        crate::response::success(request, &step_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use workbridge_core::WorkStatus;

    fn request(input: Value) -> WorkRequest {
        WorkRequest {
            process_id: "p1".into(),
            step_id: "s1".into(),
            step_execution_id: 1,
            step_name: "sum".into(),
            step_namespace: "default".into(),
            input_param: input,
            scheduling: StdHashMap::new(),
        }
    }

    #[derive(serde::Deserialize)]
    struct SumInput {
        a: i64,
        b: i64,
    }

    #[tokio::test]
    async fn typed_handler_coerces_mapping_payload() {
        let mut registry = WorkerRegistry::new();
        registry
            .register(WorkerConfig::new("sum"), |input: SumInput| async move {
                Value::from(input.a + input.b)
            })
            .unwrap();
        let worker = registry.lookup("default", "sum").unwrap();
        let response = dispatch(&worker, &request(serde_json::json!({"a": 1, "b": 2}))).await;
        assert_eq!(response.status, WorkStatus::Completed);
        assert_eq!(response.output.get("result"), Some(&serde_json::json!(3)));
    }

    #[tokio::test]
    async fn non_mapping_non_sequence_payload_is_rejected() {
        let mut registry = WorkerRegistry::new();
        registry
            .register_value(WorkerConfig::new("echo"), |value| async move { WorkerOutcome::Value(value) })
            .unwrap();
        let worker = registry.lookup("default", "echo").unwrap();
        let response = dispatch(&worker, &request(serde_json::json!("not a mapping"))).await;
        assert_eq!(response.status, WorkStatus::Failed);
        assert_eq!(response.output.get("error"), Some(&serde_json::json!("invalid input")));
    }

    #[tokio::test]
    async fn handler_error_produces_failed_response() {
        let mut registry = WorkerRegistry::new();
        registry
            .register(WorkerConfig::new("always_fails"), |_input: SumInput| async move {
                Err::<Value, String>("boom".to_string())
            })
            .unwrap();
        let worker = registry.lookup("default", "always_fails").unwrap();
        let response = dispatch(&worker, &request(serde_json::json!({"a": 1, "b": 2}))).await;
        assert_eq!(response.status, WorkStatus::Failed);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = WorkerRegistry::new();
        registry
            .register_value(WorkerConfig::new("echo"), |value| async move { WorkerOutcome::Value(value) })
            .unwrap();
        let err = registry
            .register_value(WorkerConfig::new("echo"), |value| async move { WorkerOutcome::Value(value) })
            .unwrap_err();
        assert!(matches!(err, WorkbridgeError::AlreadyRegistered { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_matches_by_namespace_and_name_not_name_alone() {
        let mut registry = WorkerRegistry::new();
        registry
            .register_value(WorkerConfig::new("echo").namespace("ns-a"), |value| async move {
                WorkerOutcome::Value(value)
            })
            .unwrap();
        assert!(registry.lookup("ns-a", "echo").is_some());
        assert!(registry.lookup("ns-b", "echo").is_none());
    }

    #[test]
    fn validate_single_parameter_rejects_other_arities() {
        assert!(validate_single_parameter(1).is_ok());
        let err = validate_single_parameter(0).unwrap_err();
        assert!(matches!(err, WorkbridgeError::HandlerShapeMismatch { reason } if reason.contains("must have exactly one parameter")));
        assert!(validate_single_parameter(2).is_err());
    }
}
