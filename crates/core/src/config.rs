//! Client and worker configuration.

use std::time::Duration;

use crate::error::WorkbridgeError;

/// Configuration for one registered worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub namespace: String,
    pub name: String,
    pub max_in_progress: u32,
}

impl WorkerConfig {
    /// Default maximum in-flight count for a worker that doesn't override it.
    pub const DEFAULT_MAX_IN_PROGRESS: u32 = 100;

    /// Default worker namespace.
    pub const DEFAULT_NAMESPACE: &'static str = "default";

    /// Builds a worker config in the default namespace with the default
    /// concurrency budget.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: Self::DEFAULT_NAMESPACE.to_string(),
            name: name.into(),
            max_in_progress: Self::DEFAULT_MAX_IN_PROGRESS,
        }
    }

    /// Overrides the namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Overrides the concurrency budget.
    pub fn max_in_progress(mut self, max_in_progress: u32) -> Self {
        self.max_in_progress = max_in_progress;
        self
    }
}

/// Configuration for the client as a whole.
///
/// Mirrors the enumerated options in the SDK's external interface: every
/// field has a documented default except `client_id` and `auth_token`, which
/// [`ClientConfig::validate`] requires to be non-empty.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub namespace: String,
    pub base_url: String,
    pub port: u16,
    pub connection_timeout_secs: u64,
    pub submit_client_poll_timeout_seconds: u64,
    pub step_timeout_millis: u64,
    pub delay_millis: u64,
    pub work_request_batch_size: u32,
    pub step_submission_attempts: u32,
    pub max_workers: usize,
    pub response_submit_batch_size: usize,
    pub max_submit_attempts: u32,
    pub permanent_error_keywords: Vec<String>,
    pub client_id: String,
    pub auth_token: String,
}

impl ClientConfig {
    pub const DEFAULT_NAMESPACE: &'static str = "default";
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost";
    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 60;
    pub const DEFAULT_SUBMIT_CLIENT_POLL_TIMEOUT_SECONDS: u64 = 30;
    pub const DEFAULT_STEP_TIMEOUT_MILLIS: u64 = 5_000;
    pub const DEFAULT_DELAY_MILLIS: u64 = 100;
    pub const DEFAULT_WORK_REQUEST_BATCH_SIZE: u32 = 100;
    pub const DEFAULT_STEP_SUBMISSION_ATTEMPTS: u32 = 3;
    pub const DEFAULT_MAX_WORKERS: usize = 20;
    pub const DEFAULT_RESPONSE_SUBMIT_BATCH_SIZE: usize = 500;
    pub const DEFAULT_MAX_SUBMIT_ATTEMPTS: u32 = 3;

    /// Minimum bound the executor pool size is clamped up to.
    pub const MIN_EXECUTOR_WORKERS: usize = 10;

    /// Minimum total submitter worker count, split across main/retry queues.
    pub const MIN_SUBMIT_WORKERS: usize = 10;

    /// Default permanent-error substrings: a response carrying any of these
    /// is never retried, regardless of `max_submit_attempts`.
    pub fn default_permanent_error_keywords() -> Vec<String> {
        vec![
            "Invalid request, step is not in RUNNING state".to_string(),
            "please poll the latest and update".to_string(),
        ]
    }

    /// Builds a config with every default applied, given only the required
    /// credentials.
    pub fn new(client_id: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            namespace: Self::DEFAULT_NAMESPACE.to_string(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            port: Self::DEFAULT_PORT,
            connection_timeout_secs: Self::DEFAULT_CONNECTION_TIMEOUT_SECS,
            submit_client_poll_timeout_seconds: Self::DEFAULT_SUBMIT_CLIENT_POLL_TIMEOUT_SECONDS,
            step_timeout_millis: Self::DEFAULT_STEP_TIMEOUT_MILLIS,
            delay_millis: Self::DEFAULT_DELAY_MILLIS,
            work_request_batch_size: Self::DEFAULT_WORK_REQUEST_BATCH_SIZE,
            step_submission_attempts: Self::DEFAULT_STEP_SUBMISSION_ATTEMPTS,
            max_workers: Self::DEFAULT_MAX_WORKERS,
            response_submit_batch_size: Self::DEFAULT_RESPONSE_SUBMIT_BATCH_SIZE,
            max_submit_attempts: Self::DEFAULT_MAX_SUBMIT_ATTEMPTS,
            permanent_error_keywords: Self::default_permanent_error_keywords(),
            client_id: client_id.into(),
            auth_token: auth_token.into(),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn delay_millis(mut self, delay_millis: u64) -> Self {
        self.delay_millis = delay_millis;
        self
    }

    /// The effective executor pool size, clamped to [`Self::MIN_EXECUTOR_WORKERS`].
    pub fn executor_pool_size(&self) -> usize {
        self.max_workers.max(Self::MIN_EXECUTOR_WORKERS)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_millis)
    }

    /// Base URL including the port, e.g. `http://localhost:8080`.
    pub fn endpoint_base(&self) -> String {
        format!("{}:{}", self.base_url.trim_end_matches('/'), self.port)
    }

    /// Validates required fields. Called once by the supervisor's fallible
    /// constructor; never re-checked on `start()`.
    pub fn validate(&self) -> Result<(), WorkbridgeError> {
        if self.client_id.trim().is_empty() || self.auth_token.trim().is_empty() {
            return Err(WorkbridgeError::MissingCredentials);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_missing_credentials() {
        let config = ClientConfig::new("", "token");
        assert!(matches!(config.validate(), Err(WorkbridgeError::MissingCredentials)));
        let config = ClientConfig::new("client", "");
        assert!(matches!(config.validate(), Err(WorkbridgeError::MissingCredentials)));
    }

    #[test]
    fn validate_accepts_both_credentials_present() {
        let config = ClientConfig::new("client", "token");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn executor_pool_size_is_clamped_to_minimum() {
        let config = ClientConfig::new("c", "t").max_workers(3);
        assert_eq!(config.executor_pool_size(), ClientConfig::MIN_EXECUTOR_WORKERS);
        let config = ClientConfig::new("c", "t").max_workers(40);
        assert_eq!(config.executor_pool_size(), 40);
    }
}
