//! OPA (Open Policy Agent) decision client
//!
//! Sends the request tuple to OPA's Data API and reads a boolean result.
//!
//! # Example
//!
//! ```no_run
//! use authz_gate::decision::opa::OpaDecisionClient;
//! use std::time::Duration;
//!
//! let client = OpaDecisionClient::builder()
//!     .url("http://localhost:8181")
//!     .policy_path("httpapi/authz/allow")
//!     .timeout(Duration::from_secs(2))
//!     .build()
//!     .expect("valid config");
//! ```

use super::{http_client, Decision, DecisionClient, DecisionError, DecisionRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// OPA client configuration
#[derive(Debug, Clone)]
pub struct OpaConfig {
    /// OPA server URL (e.g., "http://localhost:8181")
    pub url: String,
    /// Rule path under `/v1/data` (e.g., "httpapi/authz/allow")
    pub policy_path: String,
    /// Request timeout (default: 5 seconds)
    pub timeout: Option<Duration>,
}

/// OPA decision client
pub struct OpaDecisionClient {
    endpoint: String,
    client: reqwest::Client,
}

/// Builder for OpaDecisionClient
#[derive(Default)]
pub struct OpaDecisionClientBuilder {
    url: Option<String>,
    policy_path: Option<String>,
    timeout: Option<Duration>,
}

#[derive(Debug, Serialize)]
struct OpaInput<'a> {
    input: OpaInputData<'a>,
}

#[derive(Debug, Serialize)]
struct OpaInputData<'a> {
    subject: &'a str,
    object: &'a str,
    action: &'a str,
}

/// A missing or null `result` means the rule was undefined for this input
#[derive(Debug, Deserialize)]
struct OpaResponse {
    result: Option<bool>,
}

impl OpaDecisionClientBuilder {
    /// Set the OPA server URL
    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    /// Set the policy rule path
    pub fn policy_path(mut self, path: &str) -> Self {
        self.policy_path = Some(path.to_string());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the OpaDecisionClient
    pub fn build(self) -> Result<OpaDecisionClient, DecisionError> {
        let url = self
            .url
            .ok_or_else(|| DecisionError::ConfigError("OPA URL is required".into()))?;
        let policy_path = self
            .policy_path
            .ok_or_else(|| DecisionError::ConfigError("OPA policy path is required".into()))?;

        OpaDecisionClient::new(OpaConfig {
            url,
            policy_path,
            timeout: self.timeout,
        })
    }
}

impl OpaDecisionClient {
    /// Create a new OPA decision client
    pub fn new(config: OpaConfig) -> Result<Self, DecisionError> {
        let client = http_client(config.timeout)?;
        let endpoint = format!(
            "{}/v1/data/{}",
            config.url.trim_end_matches('/'),
            config.policy_path.trim_matches('/')
        );

        Ok(Self { endpoint, client })
    }

    /// Create a new builder for OpaDecisionClient
    pub fn builder() -> OpaDecisionClientBuilder {
        OpaDecisionClientBuilder::default()
    }

    /// Full URL of the policy rule
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DecisionClient for OpaDecisionClient {
    async fn evaluate(&self, request: &DecisionRequest) -> Result<Decision, DecisionError> {
        let input = OpaInput {
            input: OpaInputData {
                subject: &request.subject,
                object: &request.object,
                action: &request.action,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&input)
            .send()
            .await
            .map_err(|e| DecisionError::BackendError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DecisionError::BackendError(format!(
                "OPA returned status {}",
                response.status()
            )));
        }

        let opa_response: OpaResponse = response
            .json()
            .await
            .map_err(|e| DecisionError::BackendError(e.to_string()))?;

        let decision = Decision::from(opa_response.result.unwrap_or(false));

        debug!(
            decision = decision.as_str(),
            action = %request.action,
            "OPA authorization decision"
        );

        Ok(decision)
    }

    fn backend(&self) -> &'static str {
        "opa"
    }
}
