//! Job handling: from a job's variables to its output variables.
//!
//! # Architecture
//!
//! - **kind**: `OperationKind` and the per-kind chain policy table.
//! - **variables**: typed, validated inputs for each kind.
//! - **handlers**: the single step pipeline used by every kind.
//! - **dispatcher**: job type lookup in front of the pipeline.
//!
//! The pipeline is a pure function of `(kind, job variables, gateway)`; it
//! knows nothing about how jobs are fetched or acknowledged.

pub mod dispatcher;
pub mod handlers;
pub mod kind;
pub mod variables;

// Re-export key types for convenience
pub use dispatcher::OperationDispatcher;
pub use handlers::{StepOutcome, run_step};
pub use kind::{ChainPolicy, OperationKind};
pub use variables::{StepInputs, VariableMap, load_variables, merge_variables, names};
