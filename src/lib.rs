//! Ambassador between a workflow engine and a zkVM proving backend.
//!
//! Workflow jobs carry named variables; the ambassador turns them into Prove,
//! Verify, Compose and Combine calls and writes the results back, keeping the
//! workflow instance's proof chain in its variables.

pub mod config;
pub mod gateway;
pub mod pipeline;
pub mod proof;
pub mod queue;

use thiserror::Error;

pub use gateway::GatewayError;
pub use proof::DecodeError;

#[derive(Debug, Error)]
pub enum AmbassadorError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("missing required variable `{0}`")]
    MissingVariable(String),
    #[error("variable `{name}` is invalid: {reason}")]
    InvalidVariable { name: String, reason: String },
    #[error("unsupported job type `{0}`")]
    UnknownJobType(String),
    #[error("job queue error: {0}")]
    Queue(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type AmbassadorResult<T> = Result<T, AmbassadorError>;
