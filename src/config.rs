//! Ambassador configuration: a TOML file plus environment overrides.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::gateway::HttpGatewayConfig;
use crate::gateway::http::DEFAULT_SERVICE;
use crate::queue::WorkerOptions;
use crate::{AmbassadorError, AmbassadorResult};

pub const GATEWAY_URL_ENV: &str = "ZKVM_AMBASSADOR_GATEWAY_URL";
pub const QUEUE_URL_ENV: &str = "ZKVM_AMBASSADOR_QUEUE_URL";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AmbassadorConfig {
    pub gateway: GatewayConfig,
    pub queue: QueueConfig,
    pub workers: WorkersConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub url: Url,
    pub service: String,
    /// 0 disables the timeout.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    pub url: Url,
    pub worker_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkersConfig {
    pub poll_interval_ms: u64,
    pub max_backoff_ms: u64,
    pub default_timeout_secs: u64,
    /// Job lease per job type, overriding `default_timeout_secs`.
    pub timeouts: BTreeMap<String, u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            url: default_url("http://localhost:50051"),
            service: DEFAULT_SERVICE.to_string(),
            request_timeout_secs: 0,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            url: default_url("http://localhost:8080"),
            worker_name: "zkvm-ambassador".to_string(),
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        WorkersConfig {
            poll_interval_ms: 100,
            max_backoff_ms: 5_000,
            default_timeout_secs: 300,
            // Proving is the slow step.
            timeouts: BTreeMap::from([("proving-job".to_string(), 1_000)]),
        }
    }
}

fn default_url(s: &str) -> Url {
    Url::parse(s).expect("default URL is valid")
}

impl AmbassadorConfig {
    /// Load from `path` (defaults when `None`), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> AmbassadorResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|name| std::env::var(name).ok())
    }

    pub fn from_file(path: &Path) -> AmbassadorResult<Self> {
        let s = std::fs::read_to_string(path).map_err(|e| {
            AmbassadorError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> AmbassadorResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| AmbassadorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the workers spin or never back off.
    pub fn validate(&self) -> AmbassadorResult<()> {
        let workers = &self.workers;
        if workers.poll_interval_ms == 0 {
            return Err(AmbassadorError::Config(
                "workers.poll_interval_ms must be at least 1".into(),
            ));
        }
        if workers.max_backoff_ms < workers.poll_interval_ms {
            return Err(AmbassadorError::Config(format!(
                "workers.max_backoff_ms ({}) is below workers.poll_interval_ms ({})",
                workers.max_backoff_ms, workers.poll_interval_ms
            )));
        }
        Ok(())
    }

    /// Apply URL overrides read through `lookup`.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> AmbassadorResult<Self> {
        if let Some(url) = lookup(GATEWAY_URL_ENV) {
            self.gateway.url = parse_url(GATEWAY_URL_ENV, &url)?;
        }
        if let Some(url) = lookup(QUEUE_URL_ENV) {
            self.queue.url = parse_url(QUEUE_URL_ENV, &url)?;
        }
        Ok(self)
    }

    pub fn gateway_config(&self) -> HttpGatewayConfig {
        let config =
            HttpGatewayConfig::new(self.gateway.url.clone()).with_service(&self.gateway.service);
        match self.gateway.request_timeout_secs {
            0 => config,
            secs => config.with_timeout(Duration::from_secs(secs)),
        }
    }

    pub fn worker_options(&self, job_type: &str) -> WorkerOptions {
        let workers = &self.workers;
        let timeout_secs = workers
            .timeouts
            .get(job_type)
            .copied()
            .unwrap_or(workers.default_timeout_secs);
        WorkerOptions::new(job_type)
            .with_worker_name(&self.queue.worker_name)
            .with_timeout(Duration::from_secs(timeout_secs))
            .with_backoff(
                Duration::from_millis(workers.poll_interval_ms),
                Duration::from_millis(workers.max_backoff_ms),
            )
    }
}

fn parse_url(name: &str, value: &str) -> AmbassadorResult<Url> {
    Url::parse(value).map_err(|e| AmbassadorError::Config(format!("{name}: invalid URL {value:?}: {e}")))
}
