//! Error taxonomy shared across the SDK's fallible boundaries.

use thiserror::Error;

/// Errors surfaced at the public boundary of the SDK.
///
/// Internal loops (poller, submitter, reaper) do not propagate these: they
/// log per the policy in the component design and continue. This type is
/// for entry points that can meaningfully fail once — construction,
/// registration, and the peripheral one-shot RPCs.
#[derive(Debug, Error)]
pub enum WorkbridgeError {
    #[error("client id and auth token are both required")]
    MissingCredentials,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned status {status}: {body}")]
    ServerStatus { status: u16, body: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("handler shape mismatch: {reason}")]
    HandlerShapeMismatch { reason: String },

    #[error("worker already registered: {namespace}/{name}")]
    AlreadyRegistered { namespace: String, name: String },

    #[error("no worker registered for {namespace}/{name}")]
    UnknownWorker { namespace: String, name: String },
}
