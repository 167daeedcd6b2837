//! Job queue collaborator and the workers that drain it.
//!
//! `JobQueue` is everything the ambassador needs from the workflow engine:
//! lease jobs, complete them with a variables delta, or report a failure.
//! `RestJobQueue` talks to a real engine, `InMemoryJobQueue` simulates one.

pub mod memory;
pub mod rest;
pub mod traits;
pub mod worker;

// Re-export key types
pub use memory::InMemoryJobQueue;
pub use rest::RestJobQueue;
pub use traits::{ActivatedJob, ActivationRequest, JobQueue};
pub use worker::{JobWorker, WorkerOptions, run_workers};
