//! Gateway trait and request/response messages for the proving backend.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::proof::Proof;

/// Identity of the proving program build, sent with every Prove call.
pub const IMAGE_ID: [u32; 8] = [
    1910843796, 268995076, 638532809, 3011961156, 1301210768, 2805976851, 2467108861, 1954251535,
];

/// Any failure talking to the proving backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error calling {method}: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend rejected {method} with status {status}: {body}")]
    Status {
        method: &'static str,
        status: u16,
        body: String,
    },
    #[error("malformed {method} response: {reason}")]
    Decode { method: &'static str, reason: String },
    #[error("{0}")]
    Message(String),
}

/// Prove one step. `previous_proof` is set only for composition continuations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveRequest {
    pub image_id: Vec<u32>,
    pub method_payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_proof: Option<Proof>,
}

impl ProveRequest {
    /// Request for a fresh proof, carrying the fixed [`IMAGE_ID`].
    pub fn new(method_payload: impl Into<String>) -> Self {
        ProveRequest {
            image_id: IMAGE_ID.to_vec(),
            method_payload: method_payload.into(),
            previous_proof: None,
        }
    }

    pub fn with_previous_proof(mut self, proof: Proof) -> Self {
        self.previous_proof = Some(proof);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveResponse {
    #[serde(default)]
    pub public_output: String,
    #[serde(default)]
    pub proof_response: Proof,
}

/// Check a single proof. An empty request (no proof) is legal; the backend
/// decides what it means.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    #[serde(default)]
    pub public_output: String,
    #[serde(default)]
    pub is_valid_executed: bool,
}

/// Fold an ordered chain into one aggregate proof.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionRequest {
    #[serde(default)]
    pub proof_chain: Vec<Proof>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionResponse {
    #[serde(default)]
    pub proof_response: Proof,
}

/// Run several logical steps, described by payload strings, as one proof.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedRequest {
    #[serde(default)]
    pub method_payload: Vec<String>,
}

/// The four operations of the proving backend.
///
/// Every call is a single blocking round trip. Implementations never retry;
/// redelivery is the workflow engine's decision.
pub trait ProvingGateway: Send + Sync {
    /// Returns the gateway name (e.g., "http", "mock").
    fn name(&self) -> &str;

    /// Generate a proof for one step, optionally continuing `previous_proof`.
    fn prove(&self, request: &ProveRequest) -> Result<ProveResponse, GatewayError>;

    /// Check a single proof without touching any chain.
    fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, GatewayError>;

    /// Aggregate an ordered proof chain. The backend checks chain consistency.
    fn compose(&self, request: &CompositionRequest) -> Result<CompositionResponse, GatewayError>;

    /// Single-step execution of several payloads, independent of any chain.
    fn combine(&self, request: &CombinedRequest) -> Result<ProveResponse, GatewayError>;
}
