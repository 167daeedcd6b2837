//! Job queue adapter for the Camunda 8 REST API.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use url::Url;

use super::traits::{ActivatedJob, ActivationRequest, JobQueue};
use crate::pipeline::VariableMap;
use crate::{AmbassadorError, AmbassadorResult};

#[derive(Debug, Deserialize)]
struct ActivationResponse {
    #[serde(default)]
    jobs: Vec<ActivatedJob>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureRequest<'a> {
    retries: i32,
    error_message: &'a str,
}

/// REST client for the workflow engine's job endpoints.
#[derive(Debug)]
pub struct RestJobQueue {
    api_base_url: Url,
    http_client: Client,
}

impl RestJobQueue {
    pub fn new(api_base_url: Url) -> AmbassadorResult<Self> {
        let http_client = Client::builder()
            .build()
            .map_err(|e| AmbassadorError::Queue(format!("failed to build HTTP client: {e}")))?;
        Ok(RestJobQueue {
            api_base_url,
            http_client,
        })
    }

    // The base URL's path is a prefix (e.g. a SaaS cluster id); job
    // endpoints go below it.
    fn endpoint(&self, segments: &[&str]) -> AmbassadorResult<Url> {
        let mut url = self.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AmbassadorError::Queue(format!(
                    "job queue URL {} cannot carry a path",
                    self.api_base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn post<Req>(
        &self,
        segments: &[&str],
        request: &Req,
    ) -> AmbassadorResult<reqwest::blocking::Response>
    where
        Req: Serialize + std::fmt::Debug,
    {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        tracing::trace!("Sending POST request to {}: {:?}", url, request);

        let response = self
            .http_client
            .post(url)
            .json(request)
            .send()
            .map_err(|e| AmbassadorError::Queue(format!("POST {path} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AmbassadorError::Queue(format!(
                "POST {path} returned {status}: {}",
                response.text().unwrap_or_default()
            )));
        }
        Ok(response)
    }

    fn post_json<Req, Resp>(&self, segments: &[&str], request: &Req) -> AmbassadorResult<Resp>
    where
        Req: Serialize + std::fmt::Debug,
        Resp: DeserializeOwned,
    {
        self.post(segments, request)?.json::<Resp>().map_err(|e| {
            AmbassadorError::Queue(format!("malformed response from {}: {e}", segments.join("/")))
        })
    }
}

impl JobQueue for RestJobQueue {
    fn activate(&self, request: &ActivationRequest) -> AmbassadorResult<Vec<ActivatedJob>> {
        let response: ActivationResponse =
            self.post_json(&["v2", "jobs", "activation"], request)?;
        Ok(response.jobs)
    }

    fn complete(&self, job_key: &str, variables: &VariableMap) -> AmbassadorResult<()> {
        self.post(
            &["v2", "jobs", job_key, "completion"],
            &json!({ "variables": variables }),
        )?;
        Ok(())
    }

    fn fail(&self, job_key: &str, retries: i32, error_message: &str) -> AmbassadorResult<()> {
        self.post(
            &["v2", "jobs", job_key, "failure"],
            &FailureRequest {
                retries,
                error_message,
            },
        )?;
        Ok(())
    }
}
