//! Gateway abstraction for the proving backend.
//!
//! `ProvingGateway` exposes the four opaque backend operations (Prove, Verify,
//! Compose, Combine). `HttpGateway` talks to a real backend; `MockGateway`
//! answers in-process for tests and dry runs.

pub mod http;
pub mod mock;
pub mod traits;

// Re-export key types
pub use http::{HttpGateway, HttpGatewayConfig};
pub use mock::{GatewayCall, MockConfig, MockGateway};
pub use traits::{
    CombinedRequest, CompositionRequest, CompositionResponse, GatewayError, IMAGE_ID,
    ProveRequest, ProveResponse, ProvingGateway, VerifyRequest, VerifyResponse,
};
