//! In-memory job queue for tests and local dry runs.
//!
//! Models just enough of the workflow engine: jobs of several types waiting
//! to be activated, workflow instances whose variables absorb completion
//! deltas, and a record of every completion and failure. Failed jobs are not
//! redelivered.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::traits::{ActivatedJob, ActivationRequest, JobQueue};
use crate::pipeline::{VariableMap, merge_variables};
use crate::{AmbassadorError, AmbassadorResult};

/// Default retries of a freshly created job, as in the engine.
pub const DEFAULT_RETRIES: i32 = 3;

/// Identifier of a simulated workflow instance.
pub type InstanceId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedJob {
    pub job_key: String,
    pub job_type: String,
    pub variables: VariableMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedJob {
    pub job_key: String,
    pub job_type: String,
    pub retries: i32,
    pub error_message: String,
}

#[derive(Debug)]
struct Queued {
    job: ActivatedJob,
    instance: Option<InstanceId>,
}

#[derive(Debug, Default)]
struct State {
    next_key: u64,
    pending: VecDeque<Queued>,
    active: HashMap<String, Queued>,
    instances: HashMap<InstanceId, VariableMap>,
    completed: Vec<CompletedJob>,
    failed: Vec<FailedJob>,
    activations: Vec<ActivationRequest>,
}

#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    state: Mutex<State>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AmbassadorResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| AmbassadorError::Queue("in-memory queue state poisoned".into()))
    }

    /// Enqueue a job that belongs to no instance.
    pub fn push(&self, job_type: &str, variables: VariableMap) -> AmbassadorResult<String> {
        let mut state = self.lock()?;
        Ok(enqueue(&mut state, job_type, variables, None))
    }

    /// Start a workflow instance with the given variables.
    pub fn start_instance(&self, variables: VariableMap) -> AmbassadorResult<InstanceId> {
        let mut state = self.lock()?;
        let id = state.instances.len() as InstanceId + 1;
        state.instances.insert(id, variables);
        Ok(id)
    }

    /// Enqueue the next step of `instance`, carrying its current variables.
    pub fn push_step(&self, instance: InstanceId, job_type: &str) -> AmbassadorResult<String> {
        let mut state = self.lock()?;
        let variables = state
            .instances
            .get(&instance)
            .cloned()
            .ok_or_else(|| AmbassadorError::Queue(format!("unknown instance {instance}")))?;
        Ok(enqueue(&mut state, job_type, variables, Some(instance)))
    }

    /// Override (or add) one variable of an instance.
    pub fn set_instance_variable(
        &self,
        instance: InstanceId,
        name: &str,
        value: serde_json::Value,
    ) -> AmbassadorResult<()> {
        let mut state = self.lock()?;
        let variables = state
            .instances
            .get_mut(&instance)
            .ok_or_else(|| AmbassadorError::Queue(format!("unknown instance {instance}")))?;
        variables.insert(name.to_string(), value);
        Ok(())
    }

    pub fn instance_variables(&self, instance: InstanceId) -> Option<VariableMap> {
        self.lock().ok()?.instances.get(&instance).cloned()
    }

    pub fn completed(&self) -> Vec<CompletedJob> {
        self.lock().map(|s| s.completed.clone()).unwrap_or_default()
    }

    pub fn failed(&self) -> Vec<FailedJob> {
        self.lock().map(|s| s.failed.clone()).unwrap_or_default()
    }

    pub fn activations(&self) -> Vec<ActivationRequest> {
        self.lock().map(|s| s.activations.clone()).unwrap_or_default()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().map(|s| s.pending.len()).unwrap_or_default()
    }

    pub fn active_len(&self) -> usize {
        self.lock().map(|s| s.active.len()).unwrap_or_default()
    }
}

fn enqueue(
    state: &mut State,
    job_type: &str,
    variables: VariableMap,
    instance: Option<InstanceId>,
) -> String {
    state.next_key += 1;
    let job_key = state.next_key.to_string();
    state.pending.push_back(Queued {
        job: ActivatedJob {
            job_key: job_key.clone(),
            job_type: job_type.to_string(),
            retries: DEFAULT_RETRIES,
            variables,
        },
        instance,
    });
    job_key
}

impl JobQueue for InMemoryJobQueue {
    fn activate(&self, request: &ActivationRequest) -> AmbassadorResult<Vec<ActivatedJob>> {
        let mut state = self.lock()?;
        state.activations.push(request.clone());

        let mut activated = Vec::new();
        let mut remaining = VecDeque::with_capacity(state.pending.len());
        while let Some(queued) = state.pending.pop_front() {
            if queued.job.job_type == request.job_type
                && activated.len() < request.max_jobs_to_activate as usize
            {
                activated.push(queued.job.clone());
                state.active.insert(queued.job.job_key.clone(), queued);
            } else {
                remaining.push_back(queued);
            }
        }
        state.pending = remaining;
        Ok(activated)
    }

    fn complete(&self, job_key: &str, variables: &VariableMap) -> AmbassadorResult<()> {
        let mut state = self.lock()?;
        let queued = state
            .active
            .remove(job_key)
            .ok_or_else(|| AmbassadorError::Queue(format!("job {job_key} is not active")))?;
        if let Some(instance) = queued.instance {
            if let Some(instance_variables) = state.instances.get_mut(&instance) {
                merge_variables(instance_variables, variables.clone());
            }
        }
        state.completed.push(CompletedJob {
            job_key: job_key.to_string(),
            job_type: queued.job.job_type,
            variables: variables.clone(),
        });
        Ok(())
    }

    fn fail(&self, job_key: &str, retries: i32, error_message: &str) -> AmbassadorResult<()> {
        let mut state = self.lock()?;
        let queued = state
            .active
            .remove(job_key)
            .ok_or_else(|| AmbassadorError::Queue(format!("job {job_key} is not active")))?;
        state.failed.push(FailedJob {
            job_key: job_key.to_string(),
            job_type: queued.job.job_type,
            retries,
            error_message: error_message.to_string(),
        });
        Ok(())
    }
}
