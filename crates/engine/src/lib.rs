#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![cfg_attr(test, allow(unused_crate_dependencies))]

//! The workbridge client SDK: register worker handlers, then call
//! [`Client::start`] to poll for work, execute it with bounded
//! concurrency, and submit results back with retry and reaping.

pub mod dispatch;
pub mod executor;
pub mod logging;
pub mod poller;
pub mod process;
pub mod registration;
pub mod response;
pub mod submitter;
pub mod supervisor;
pub mod transport;

pub use dispatch::{WorkerOutcome, WorkerRegistry};
pub use process::ProcessClient;
pub use supervisor::{Client, ClientHandle};
pub use transport::{Transport, TransportResponse};

pub use workbridge_core::{
    identity_key, ClientConfig, ClientSubmitResult, PollState, Queue, RegisteredWorker,
    StepResult, StepSize, WorkRequest, WorkResponse, WorkStatus, WorkbridgeError, WorkerConfig,
};
