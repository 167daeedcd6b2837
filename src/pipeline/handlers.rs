//! The step pipeline shared by all four operation kinds.
//!
//! One body serves Prove, Verify, Compose and Combine:
//!
//! 1. read the kind's typed inputs from the job variables,
//! 2. build the request and make exactly one gateway call,
//! 3. write the results back as an output delta, extending the proof chain
//!    only when the kind's [`ChainPolicy`] says so.
//!
//! The pipeline never mutates the job's variables and holds no state between
//! steps; the chain lives in the workflow instance.

use serde_json::Value;

use super::kind::{ChainPolicy, OperationKind};
use super::variables::{StepInputs, VariableMap, names};
use crate::AmbassadorResult;
use crate::gateway::{
    CombinedRequest, CompositionRequest, ProveRequest, ProvingGateway, VerifyRequest,
    VerifyResponse,
};
use crate::proof::{self, Proof, ProofChain, SerializedProof};

/// Result of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub kind: OperationKind,
    /// Variables to merge into the workflow instance.
    pub variables: VariableMap,
    /// Chain element added by this step, if any.
    pub appended: Option<SerializedProof>,
}

impl StepOutcome {
    /// Length of the chain written back by this step, if it wrote one.
    pub fn chain_len(&self) -> Option<usize> {
        match self.variables.get(names::PROOF_CHAIN) {
            Some(Value::Array(items)) => Some(items.len()),
            _ => None,
        }
    }
}

/// What came back from the backend, before write-back.
struct BackendOutcome {
    proof: Option<Proof>,
    public_output: Option<String>,
    verdict: Option<VerifyResponse>,
    /// The chain the proof extends, for kinds that append.
    chain: ProofChain,
}

/// Run one step of `kind` against `gateway`.
pub fn run_step(
    kind: OperationKind,
    variables: &VariableMap,
    gateway: &dyn ProvingGateway,
) -> AmbassadorResult<StepOutcome> {
    let inputs = StepInputs::from_variables(kind, variables)?;
    let outcome = call_backend(inputs, gateway)?;
    Ok(write_back(kind, outcome))
}

fn call_backend(
    inputs: StepInputs,
    gateway: &dyn ProvingGateway,
) -> AmbassadorResult<BackendOutcome> {
    match inputs {
        StepInputs::Prove(inputs) => {
            let mut request = ProveRequest::new(inputs.method_payload());
            match &inputs.previous_proof {
                Some(serialized) => {
                    let previous = proof::parse(serialized)?;
                    warn_if_not_chain_tail(&inputs.chain, &previous);
                    request = request.with_previous_proof(previous);
                }
                None => tracing::debug!("Composition not set or false, proving without predecessor"),
            }
            tracing::info!(
                "Proving `{}` via {} gateway (continuation: {})",
                inputs.operation,
                gateway.name(),
                request.previous_proof.is_some()
            );
            let response = gateway.prove(&request)?;
            tracing::info!("Proving result: {}", response.public_output);
            Ok(BackendOutcome {
                proof: Some(response.proof_response),
                public_output: Some(response.public_output),
                verdict: None,
                chain: inputs.chain,
            })
        }
        StepInputs::Compose(inputs) => {
            let proof_chain = inputs.chain.parse_all()?;
            tracing::info!(
                "Composing chain of {} proofs via {} gateway",
                proof_chain.len(),
                gateway.name()
            );
            let response = gateway.compose(&CompositionRequest { proof_chain })?;
            Ok(BackendOutcome {
                proof: Some(response.proof_response),
                public_output: None,
                verdict: None,
                chain: inputs.chain,
            })
        }
        StepInputs::Verify(inputs) => {
            let request = match &inputs.proof {
                Some(serialized) => VerifyRequest {
                    proof: Some(proof::parse(serialized)?),
                },
                None => {
                    tracing::warn!(
                        "Variable `{}` is not available, sending an empty verify request",
                        names::PREVIOUS_PROOF
                    );
                    VerifyRequest::default()
                }
            };
            let verdict = gateway.verify(&request)?;
            tracing::info!("Verification result: {}", verdict.is_valid_executed);
            Ok(BackendOutcome {
                proof: None,
                public_output: None,
                verdict: Some(verdict),
                chain: ProofChain::new(),
            })
        }
        StepInputs::Combine(inputs) => {
            tracing::info!(
                "Running single-step request of {} payloads via {} gateway",
                inputs.method_payload.len(),
                gateway.name()
            );
            let response = gateway.combine(&CombinedRequest {
                method_payload: inputs.method_payload,
            })?;
            tracing::info!("Proving result: {}", response.public_output);
            Ok(BackendOutcome {
                proof: Some(response.proof_response),
                public_output: Some(response.public_output),
                verdict: None,
                chain: ProofChain::new(),
            })
        }
    }
}

fn write_back(kind: OperationKind, outcome: BackendOutcome) -> StepOutcome {
    let BackendOutcome {
        proof,
        public_output,
        verdict,
        mut chain,
    } = outcome;
    let mut variables = VariableMap::new();
    let mut appended = None;

    if let Some(proof) = &proof {
        let serialized = match kind.chain_policy() {
            ChainPolicy::Append => {
                let element = chain.append(proof).clone();
                tracing::debug!("Proof chain extended to {} elements", chain.len());
                variables.insert(names::PROOF_CHAIN.into(), chain.to_variable());
                appended = Some(element.clone());
                element
            }
            ChainPolicy::Untouched => proof::serialize(proof),
        };
        variables.insert(
            names::PREVIOUS_PROOF.into(),
            Value::String(serialized.into_inner()),
        );
    }
    if let Some(output) = public_output {
        variables.insert(names::PUBLIC_OUTPUT.into(), Value::String(output));
    }
    if let Some(verdict) = verdict {
        variables.insert(
            names::VERIFICATION_OUTPUT.into(),
            Value::String(verdict.public_output),
        );
        variables.insert(
            names::IS_VALID_EXECUTED.into(),
            Value::Bool(verdict.is_valid_executed),
        );
    }

    StepOutcome {
        kind,
        variables,
        appended,
    }
}

fn warn_if_not_chain_tail(chain: &ProofChain, previous: &Proof) {
    match chain.parse_last() {
        Some(Ok(tail)) if &tail == previous => {}
        Some(_) => tracing::warn!(
            "Predecessor proof is not the tail of the {}-element proof chain; continuing from it",
            chain.len()
        ),
        None => tracing::debug!("Continuing a proof that starts a new chain"),
    }
}
