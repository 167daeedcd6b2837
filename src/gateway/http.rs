//! HTTP/JSON gateway to the proving backend.
//!
//! The backend is a gRPC service exposed through JSON transcoding, so each
//! operation is a `POST {url}/{service}/{Method}` carrying the protobuf-JSON
//! form of the request message.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use super::traits::{
    CombinedRequest, CompositionRequest, CompositionResponse, GatewayError, ProveRequest,
    ProveResponse, ProvingGateway, VerifyRequest, VerifyResponse,
};

/// Default gRPC service name of the proving backend.
pub const DEFAULT_SERVICE: &str = "poam.VerifiableProcessingService";

/// Configuration for the HTTP gateway.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Base URL of the backend
    pub url: Url,
    /// Fully-qualified service name used as the first path segment
    pub service: String,
    /// Per-request timeout; `None` waits for the backend indefinitely
    pub request_timeout: Option<Duration>,
}

impl HttpGatewayConfig {
    /// Create a new config for the given backend URL.
    pub fn new(url: Url) -> Self {
        HttpGatewayConfig {
            url,
            service: DEFAULT_SERVICE.to_string(),
            request_timeout: None,
        }
    }

    /// Set the service name.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// Gateway holding one long-lived HTTP client.
///
/// The client's connection pool is shared by every worker using this gateway
/// and is closed when the gateway is dropped.
#[derive(Debug)]
pub struct HttpGateway {
    config: HttpGatewayConfig,
    client: Client,
}

impl HttpGateway {
    /// Build the gateway and its client.
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        // `None` also lifts reqwest's 30 s default for blocking clients.
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| GatewayError::Transport {
                method: "connect",
                source,
            })?;
        Ok(HttpGateway { config, client })
    }

    pub fn config(&self) -> &HttpGatewayConfig {
        &self.config
    }

    // The base URL's path is a prefix; `{service}/{method}` goes below it.
    fn endpoint(&self, method: &'static str) -> Result<Url, GatewayError> {
        let mut url = self.config.url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::Message(format!(
                    "backend URL {} cannot carry a path",
                    self.config.url
                ))
            })?
            .pop_if_empty()
            .push(&self.config.service)
            .push(method);
        Ok(url)
    }

    fn post<Req, Resp>(&self, method: &'static str, request: &Req) -> Result<Resp, GatewayError>
    where
        Req: Serialize + std::fmt::Debug,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(method)?;
        tracing::trace!("Sending POST request to {}: {:?}", url, request);

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .map_err(|source| GatewayError::Transport { method, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                method,
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let body = response
            .text()
            .map_err(|source| GatewayError::Transport { method, source })?;
        serde_json::from_str(&body).map_err(|e| GatewayError::Decode {
            method,
            reason: e.to_string(),
        })
    }
}

impl ProvingGateway for HttpGateway {
    fn name(&self) -> &str {
        "http"
    }

    fn prove(&self, request: &ProveRequest) -> Result<ProveResponse, GatewayError> {
        self.post("Prove", request)
    }

    fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, GatewayError> {
        self.post("Verify", request)
    }

    fn compose(&self, request: &CompositionRequest) -> Result<CompositionResponse, GatewayError> {
        self.post("Compose", request)
    }

    fn combine(&self, request: &CombinedRequest) -> Result<ProveResponse, GatewayError> {
        self.post("Combined", request)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    use super::*;
    use crate::proof::Proof;

    fn gateway_for(server: &MockServer) -> HttpGateway {
        let url = Url::parse(&server.base_url()).unwrap();
        HttpGateway::new(HttpGatewayConfig::new(url)).unwrap()
    }

    #[test]
    fn test_prove_posts_to_service_method() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/poam.VerifiableProcessingService/Prove")
                .json_body_partial(r#"{"methodPayload":"{\"a\":2,\"b\":3,\"operation\":\"add\"}"}"#);
            then.status(200).json_body(json!({
                "publicOutput": "5",
                "proofResponse": {"receipt": "cjE=", "publicOutput": "5"}
            }));
        });

        let gateway = gateway_for(&server);
        let response = gateway
            .prove(&ProveRequest::new(r#"{"a":2,"b":3,"operation":"add"}"#))
            .unwrap();

        mock.assert();
        assert_eq!(response.public_output, "5");
        assert_eq!(response.proof_response, Proof::new(b"r1".to_vec(), "5"));
    }

    #[test]
    fn test_verify_and_compose_and_combine_endpoints() {
        let server = MockServer::start();
        let verify = server.mock(|when, then| {
            when.method(POST).path("/poam.VerifiableProcessingService/Verify");
            then.status(200)
                .json_body(json!({"publicOutput": "5", "isValidExecuted": true}));
        });
        let compose = server.mock(|when, then| {
            when.method(POST)
                .path("/poam.VerifiableProcessingService/Compose")
                .json_body(json!({"proofChain": [{"receipt": "YQ=="}, {"receipt": "Yg=="}]}));
            then.status(200)
                .json_body(json!({"proofResponse": {"receipt": "YWI="}}));
        });
        let combine = server.mock(|when, then| {
            when.method(POST)
                .path("/poam.VerifiableProcessingService/Combined")
                .json_body(json!({"methodPayload": ["m1", "m2"]}));
            then.status(200)
                .json_body(json!({"publicOutput": "3", "proofResponse": {"receipt": "Yw=="}}));
        });

        let gateway = gateway_for(&server);
        let verdict = gateway.verify(&VerifyRequest::default()).unwrap();
        assert!(verdict.is_valid_executed);

        let aggregate = gateway
            .compose(&CompositionRequest {
                proof_chain: vec![Proof::new(b"a".to_vec(), ""), Proof::new(b"b".to_vec(), "")],
            })
            .unwrap();
        assert_eq!(aggregate.proof_response.receipt, b"ab".to_vec());

        let combined = gateway
            .combine(&CombinedRequest {
                method_payload: vec!["m1".into(), "m2".into()],
            })
            .unwrap();
        assert_eq!(combined.public_output, "3");

        verify.assert();
        compose.assert();
        combine.assert();
    }

    #[test]
    fn test_error_status_surfaces_as_gateway_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/poam.VerifiableProcessingService/Prove");
            then.status(503).body("backend busy");
        });

        let err = gateway_for(&server)
            .prove(&ProveRequest::new("{}"))
            .unwrap_err();
        match err {
            GatewayError::Status { method, status, body } => {
                assert_eq!(method, "Prove");
                assert_eq!(status, 503);
                assert_eq!(body, "backend busy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_response_is_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/poam.VerifiableProcessingService/Verify");
            then.status(200).body("not json");
        });

        let err = gateway_for(&server)
            .verify(&VerifyRequest::default())
            .unwrap_err();
        assert!(matches!(err, GatewayError::Decode { method: "Verify", .. }));
    }

    #[test]
    fn test_unreachable_backend_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let url = Url::parse("http://127.0.0.1:9").unwrap();
        let gateway =
            HttpGateway::new(HttpGatewayConfig::new(url).with_timeout(Duration::from_secs(2)))
                .unwrap();
        let err = gateway.verify(&VerifyRequest::default()).unwrap_err();
        assert!(matches!(err, GatewayError::Transport { method: "Verify", .. }));
    }

    #[test]
    fn test_custom_service_name() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/custom.Service/Verify");
            then.status(200).json_body(json!({}));
        });
        let url = Url::parse(&server.base_url()).unwrap();
        let gateway =
            HttpGateway::new(HttpGatewayConfig::new(url).with_service("custom.Service")).unwrap();
        gateway.verify(&VerifyRequest::default()).unwrap();
        mock.assert();
    }

    #[test]
    fn test_base_url_path_is_kept_as_prefix() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/poam.VerifiableProcessingService/Verify");
            then.status(200).json_body(json!({}));
        });

        for base in ["/api", "/api/"] {
            let url = Url::parse(&format!("{}{}", server.base_url(), base)).unwrap();
            let gateway = HttpGateway::new(HttpGatewayConfig::new(url)).unwrap();
            gateway.verify(&VerifyRequest::default()).unwrap();
        }
        mock.assert_hits(2);
    }

    #[test]
    fn test_endpoint_under_path_prefix() {
        let url = Url::parse("http://backend/api").unwrap();
        let gateway = HttpGateway::new(HttpGatewayConfig::new(url)).unwrap();
        assert_eq!(
            gateway.endpoint("Prove").unwrap().as_str(),
            "http://backend/api/poam.VerifiableProcessingService/Prove"
        );
    }

    #[test]
    fn test_prove_continuation_carries_previous_proof() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/poam.VerifiableProcessingService/Prove")
                .json_body_partial(
                    r#"{"methodPayload":"{\"a\":5,\"b\":1,\"operation\":\"mul\"}","previousProof":{"receipt":"cjE=","publicOutput":"5"}}"#,
                );
            then.status(200).json_body(json!({
                "publicOutput": "5",
                "proofResponse": {"receipt": "cjI=", "publicOutput": "5"}
            }));
        });

        let request = ProveRequest::new(r#"{"a":5,"b":1,"operation":"mul"}"#)
            .with_previous_proof(Proof::new(b"r1".to_vec(), "5"));
        let response = gateway_for(&server).prove(&request).unwrap();

        mock.assert();
        assert_eq!(response.proof_response.receipt, b"r2".to_vec());
    }
}
