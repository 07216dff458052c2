#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Shared data model, configuration, and primitives for the workbridge client SDK.

pub mod config;
pub mod error;
pub mod poll_state;
pub mod queue;
pub mod types;

pub use config::{ClientConfig, WorkerConfig};
pub use error::WorkbridgeError;
pub use poll_state::PollState;
pub use queue::Queue;
pub use types::{
    identity_key, ClientSubmitResult, RegisteredWorker, StepResult, StepSize, WorkRequest,
    WorkResponse, WorkStatus, IDENTITY_SEP,
};
