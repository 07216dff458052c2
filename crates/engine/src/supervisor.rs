//! Client lifecycle: wires the poller, executor pool, and submitter
//! together, and exposes the public surface embedding applications use.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Notify;
use workbridge_core::{ClientConfig, WorkbridgeError, WorkerConfig};

use crate::dispatch::{WorkerOutcome, WorkerRegistry};
use crate::executor::ExecutorPool;
use crate::poller::Poller;
use crate::process::ProcessClient;
use crate::registration::renew_registration;
use crate::submitter::Submitter;
use crate::transport::Transport;

/// A handle to a started client, used to request a graceful, idempotent
/// shutdown from outside the task driving [`Client::start`].
#[derive(Clone)]
pub struct ClientHandle {
    stop_flag: Arc<AtomicBool>,
    stopped_once: Arc<AtomicBool>,
    done: Arc<Notify>,
}

impl ClientHandle {
    /// Requests a graceful shutdown. Idempotent: the second and later calls
    /// are no-ops, and none of them panic.
    pub fn stop(&self) {
        if self.stopped_once.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_flag.store(true, Ordering::SeqCst);
        self.done.notify_one();
    }
}

/// The embedding application's entry point: register workers, then start.
#[derive(Debug)]
pub struct Client {
    config: Arc<ClientConfig>,
    org_id: String,
    registry: Arc<RwLock<WorkerRegistry>>,
    transport: Transport,
    stop_flag: Arc<AtomicBool>,
    stopped_once: Arc<AtomicBool>,
    done: Arc<Notify>,
}

impl Client {
    /// Validates credentials and builds the transport. Refuses to
    /// initialise without both a client id and an auth token — this is the
    /// only place credentials are checked; `start` does not re-check them.
    pub fn new(org_id: impl Into<String>, config: ClientConfig) -> Result<Self, WorkbridgeError> {
        config.validate()?;
        let transport = Transport::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            org_id: org_id.into(),
            registry: Arc::new(RwLock::new(WorkerRegistry::new())),
            transport,
            stop_flag: Arc::new(AtomicBool::new(false)),
            stopped_once: Arc::new(AtomicBool::new(false)),
            done: Arc::new(Notify::new()),
        })
    }

    /// Registers a typed worker handler. See [`WorkerRegistry::register`].
    pub fn register<T, R, F, Fut>(&self, config: WorkerConfig, handler: F) -> Result<(), WorkbridgeError>
    where
        T: DeserializeOwned + Send + 'static,
        R: Into<WorkerOutcome>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        self.registry
            .write()
            .expect("worker registry lock poisoned")
            .register(config, handler)
    }

    /// Registers a raw worker handler taking [`serde_json::Value`]. See
    /// [`WorkerRegistry::register_value`].
    pub fn register_value<F, Fut>(&self, config: WorkerConfig, handler: F) -> Result<(), WorkbridgeError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WorkerOutcome> + Send + 'static,
    {
        self.registry
            .write()
            .expect("worker registry lock poisoned")
            .register_value(config, handler)
    }

    /// A client for the peripheral one-shot process/search RPCs.
    pub fn process_client(&self) -> ProcessClient {
        ProcessClient::new(self.transport.clone())
    }

    /// A handle that can request this client's shutdown from another task.
    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            stop_flag: Arc::clone(&self.stop_flag),
            stopped_once: Arc::clone(&self.stopped_once),
            done: Arc::clone(&self.done),
        }
    }

    /// Registers with the server (retrying indefinitely until accepted),
    /// then spawns the poller, executor pool, and submitter, and blocks
    /// until a handle's `stop()` is called.
    pub async fn start(&self) {
        renew_registration(&self.transport, &self.org_id, &self.registry).await;

        let executing_count = Arc::new(AtomicI64::new(0));
        let submitter = Arc::new(Submitter::new(Arc::clone(&self.config), self.transport.clone()));
        let submitter_handles = submitter.spawn();

        let pool_size = self.config.executor_pool_size();
        let (executor, executor_handles) = ExecutorPool::spawn(
            pool_size,
            Arc::clone(&self.registry),
            Arc::clone(&submitter),
            Arc::clone(&executing_count),
        );
        let executor = Arc::new(executor);

        let poller = Arc::new(Poller::new(
            Arc::clone(&self.config),
            self.transport.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&executor),
            Arc::clone(&submitter),
            executing_count,
            Arc::clone(&self.stop_flag),
        ));
        let poller_task = tokio::spawn({
            let poller = Arc::clone(&poller);
            async move { poller.run().await }
        });

        self.done.notified().await;

        let _ = poller_task.await;
        drop(poller);
        submitter.request_stop();
        for handle in submitter_handles {
            let _ = handle.await;
        }
        drop(executor);
        for handle in executor_handles {
            let _ = handle.await;
        }
    }

    /// Requests a graceful shutdown. Idempotent and equivalent to calling
    /// `stop()` on a [`ClientHandle`] obtained from this client.
    pub fn stop(&self) {
        self.handle().stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_missing_credentials() {
        let config = ClientConfig::new("", "");
        let err = Client::new("org-1", config).unwrap_err();
        assert!(matches!(err, WorkbridgeError::MissingCredentials));
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_does_not_panic() {
        let config = ClientConfig::new("client", "token");
        let client = Client::new("org-1", config).unwrap();
        let handle = client.handle();
        handle.stop();
        handle.stop();
        handle.stop();
    }
}
