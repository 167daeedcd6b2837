//! Routes jobs to the step pipeline by job type.

use std::sync::Arc;

use super::handlers::{StepOutcome, run_step};
use super::kind::OperationKind;
use super::variables::VariableMap;
use crate::AmbassadorResult;
use crate::gateway::ProvingGateway;

/// Maps a job's declared type to its operation kind and runs the step.
#[derive(Clone)]
pub struct OperationDispatcher {
    gateway: Arc<dyn ProvingGateway>,
}

impl OperationDispatcher {
    pub fn new(gateway: Arc<dyn ProvingGateway>) -> Self {
        OperationDispatcher { gateway }
    }

    /// Job types this dispatcher serves, one worker each.
    pub fn job_types(&self) -> impl Iterator<Item = &'static str> {
        OperationKind::ALL.into_iter().map(OperationKind::job_type)
    }

    pub fn gateway(&self) -> &dyn ProvingGateway {
        self.gateway.as_ref()
    }

    /// Run the job's variables through the step for `job_type`.
    pub fn dispatch(&self, job_type: &str, variables: &VariableMap) -> AmbassadorResult<StepOutcome> {
        let kind: OperationKind = job_type.parse()?;
        self.handle(kind, variables)
    }

    pub fn handle(&self, kind: OperationKind, variables: &VariableMap) -> AmbassadorResult<StepOutcome> {
        tracing::debug!("Dispatching {} job with {} variables", kind, variables.len());
        run_step(kind, variables, self.gateway.as_ref())
    }
}

impl std::fmt::Debug for OperationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationDispatcher")
            .field("gateway", &self.gateway.name())
            .finish()
    }
}
