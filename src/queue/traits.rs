//! The narrow interface to the workflow engine's job queue.

use serde::{Deserialize, Deserializer, Serialize};

use crate::AmbassadorResult;
use crate::pipeline::VariableMap;

/// Ask the engine for jobs of one type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRequest {
    #[serde(rename = "type")]
    pub job_type: String,
    pub worker: String,
    /// Lease duration of each activated job, in milliseconds.
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    pub max_jobs_to_activate: u32,
}

/// A job leased to this worker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivatedJob {
    #[serde(deserialize_with = "job_key")]
    pub job_key: String,
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub retries: i32,
    #[serde(default)]
    pub variables: VariableMap,
}

/// Job queue collaborator: hands out jobs and takes their results.
pub trait JobQueue: Send + Sync {
    /// Lease up to `request.max_jobs_to_activate` jobs; empty when none are pending.
    fn activate(&self, request: &ActivationRequest) -> AmbassadorResult<Vec<ActivatedJob>>;

    /// Complete a job, merging `variables` into its workflow instance.
    fn complete(&self, job_key: &str, variables: &VariableMap) -> AmbassadorResult<()>;

    /// Report a failed job with the retries it has left.
    fn fail(&self, job_key: &str, retries: i32, error_message: &str) -> AmbassadorResult<()>;
}

// Engines serialize 64-bit keys either as JSON numbers or as strings.
fn job_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Key {
        Number(u64),
        Text(String),
    }
    Ok(match Key::deserialize(deserializer)? {
        Key::Number(n) => n.to_string(),
        Key::Text(s) => s,
    })
}
