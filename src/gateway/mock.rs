//! Mock gateway for testing and dry runs.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::traits::{
    CombinedRequest, CompositionRequest, CompositionResponse, GatewayError, ProveRequest,
    ProveResponse, ProvingGateway, VerifyRequest, VerifyResponse,
};
use crate::proof::Proof;

/// Configuration for mock gateway responses.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Name to report
    pub name: String,
    /// Public output attached to every Prove/Combine result
    pub public_output: String,
    /// Validity reported for verify requests that carry a proof
    pub verify_valid: bool,
    /// Whether prove should fail
    pub prove_fails: bool,
    /// Whether verify should fail
    pub verify_fails: bool,
    /// Whether compose should fail
    pub compose_fails: bool,
    /// Whether combine should fail
    pub combine_fails: bool,
}

impl MockConfig {
    /// Create a new mock config with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        MockConfig {
            name: name.into(),
            public_output: "5".to_string(),
            verify_valid: true,
            prove_fails: false,
            verify_fails: false,
            compose_fails: false,
            combine_fails: false,
        }
    }

    /// Set the public output.
    pub fn with_public_output(mut self, output: impl Into<String>) -> Self {
        self.public_output = output.into();
        self
    }

    /// Report every proof as invalid.
    pub fn verify_invalid(mut self) -> Self {
        self.verify_valid = false;
        self
    }

    /// Make prove fail.
    pub fn prove_fails(mut self) -> Self {
        self.prove_fails = true;
        self
    }

    /// Make verify fail.
    pub fn verify_fails(mut self) -> Self {
        self.verify_fails = true;
        self
    }

    /// Make compose fail.
    pub fn compose_fails(mut self) -> Self {
        self.compose_fails = true;
        self
    }

    /// Make combine fail.
    pub fn combine_fails(mut self) -> Self {
        self.combine_fails = true;
        self
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self::new("mock")
    }
}

/// A request received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Prove(ProveRequest),
    Verify(VerifyRequest),
    Compose(CompositionRequest),
    Combine(CombinedRequest),
}

/// Mock gateway returning deterministic fake proofs.
///
/// Every proof it mints carries a distinct receipt (`mock-receipt-<n>`), so
/// tests can tell chain elements apart. All requests are recorded.
pub struct MockGateway {
    config: MockConfig,
    minted: AtomicU64,
    calls: Mutex<Vec<GatewayCall>>,
}

impl MockGateway {
    /// Create a new mock gateway with the given configuration.
    pub fn new(config: MockConfig) -> Self {
        MockGateway {
            config,
            minted: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock gateway with default configuration.
    pub fn default_mock() -> Self {
        Self::new(MockConfig::default())
    }

    /// All requests received so far.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: GatewayCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn mint(&self, public_output: &str) -> Proof {
        let n = self.minted.fetch_add(1, Ordering::SeqCst) + 1;
        Proof::new(format!("mock-receipt-{n}").into_bytes(), public_output)
    }

    fn fail(&self, method: &str) -> GatewayError {
        GatewayError::Message(format!("mock {method} failed"))
    }
}

impl ProvingGateway for MockGateway {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn prove(&self, request: &ProveRequest) -> Result<ProveResponse, GatewayError> {
        self.record(GatewayCall::Prove(request.clone()));
        if self.config.prove_fails {
            return Err(self.fail("prove"));
        }
        let proof = self.mint(&self.config.public_output);
        Ok(ProveResponse {
            public_output: self.config.public_output.clone(),
            proof_response: proof,
        })
    }

    fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, GatewayError> {
        self.record(GatewayCall::Verify(request.clone()));
        if self.config.verify_fails {
            return Err(self.fail("verify"));
        }
        // Deterministic in the request alone, so repeated checks agree.
        Ok(match &request.proof {
            Some(proof) => VerifyResponse {
                public_output: proof.public_output.clone(),
                is_valid_executed: self.config.verify_valid && !proof.receipt.is_empty(),
            },
            None => VerifyResponse {
                public_output: String::new(),
                is_valid_executed: false,
            },
        })
    }

    fn compose(&self, request: &CompositionRequest) -> Result<CompositionResponse, GatewayError> {
        self.record(GatewayCall::Compose(request.clone()));
        if self.config.compose_fails {
            return Err(self.fail("compose"));
        }
        let output = request
            .proof_chain
            .last()
            .map(|p| p.public_output.clone())
            .unwrap_or_default();
        Ok(CompositionResponse {
            proof_response: self.mint(&output),
        })
    }

    fn combine(&self, request: &CombinedRequest) -> Result<ProveResponse, GatewayError> {
        self.record(GatewayCall::Combine(request.clone()));
        if self.config.combine_fails {
            return Err(self.fail("combine"));
        }
        let proof = self.mint(&self.config.public_output);
        Ok(ProveResponse {
            public_output: self.config.public_output.clone(),
            proof_response: proof,
        })
    }
}
