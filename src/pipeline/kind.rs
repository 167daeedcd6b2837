//! Operation kinds and their chain-mutation policy.

use std::fmt;
use std::str::FromStr;

use crate::AmbassadorError;

/// What a job asks the backend to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Prove,
    Verify,
    Compose,
    Combine,
}

/// How a step of a given kind treats the workflow's `proof_chain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainPolicy {
    /// The resulting proof is appended to the chain.
    Append,
    /// The chain is neither read nor written.
    Untouched,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Prove,
        OperationKind::Verify,
        OperationKind::Compose,
        OperationKind::Combine,
    ];

    /// Job type this kind is registered under with the workflow engine.
    pub fn job_type(self) -> &'static str {
        match self {
            OperationKind::Prove => "proving-job",
            OperationKind::Verify => "verify-job",
            OperationKind::Compose => "compose-job",
            OperationKind::Combine => "combine-job",
        }
    }

    pub fn chain_policy(self) -> ChainPolicy {
        match self {
            OperationKind::Prove | OperationKind::Compose => ChainPolicy::Append,
            OperationKind::Verify | OperationKind::Combine => ChainPolicy::Untouched,
        }
    }
}

impl FromStr for OperationKind {
    type Err = AmbassadorError;

    fn from_str(job_type: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.job_type() == job_type)
            .ok_or_else(|| AmbassadorError::UnknownJobType(job_type.to_string()))
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.job_type())
    }
}
