//! OpenFGA decision client
//!
//! Maps the request tuple onto an OpenFGA relationship check.
//!
//! # Example
//!
//! ```no_run
//! use authz_gate::decision::openfga::OpenFgaDecisionClient;
//!
//! let client = OpenFgaDecisionClient::builder()
//!     .url("http://localhost:8080")
//!     .store_id("01HSTORE")
//!     .authorization_model_id("01HMODEL")
//!     .build()
//!     .expect("valid config");
//! ```

use super::{http_client, Decision, DecisionClient, DecisionError, DecisionRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Object type used when none is configured
pub const DEFAULT_OBJECT_TYPE: &str = "resource";

/// OpenFGA client configuration
#[derive(Debug, Clone)]
pub struct OpenFgaConfig {
    /// OpenFGA server URL (e.g., "http://localhost:8080")
    pub url: String,
    /// Store holding the relationship tuples
    pub store_id: String,
    /// Authorization model ID (uses the latest model if not set)
    pub authorization_model_id: Option<String>,
    /// Type prefix for objects, e.g. `resource:/dataset1/item`
    pub object_type: String,
    /// Request timeout (default: 5 seconds)
    pub timeout: Option<Duration>,
}

/// OpenFGA decision client
pub struct OpenFgaDecisionClient {
    config: OpenFgaConfig,
    client: reqwest::Client,
}

/// Builder for OpenFgaDecisionClient
#[derive(Default)]
pub struct OpenFgaDecisionClientBuilder {
    url: Option<String>,
    store_id: Option<String>,
    authorization_model_id: Option<String>,
    object_type: Option<String>,
    timeout: Option<Duration>,
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    tuple_key: TupleKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct TupleKey {
    user: String,
    relation: String,
    object: String,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    allowed: bool,
}

impl OpenFgaDecisionClientBuilder {
    /// Set the OpenFGA server URL
    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    /// Set the store ID
    pub fn store_id(mut self, id: &str) -> Self {
        self.store_id = Some(id.to_string());
        self
    }

    /// Set the authorization model ID
    pub fn authorization_model_id(mut self, id: &str) -> Self {
        self.authorization_model_id = Some(id.to_string());
        self
    }

    /// Set the object type prefix
    pub fn object_type(mut self, object_type: &str) -> Self {
        self.object_type = Some(object_type.to_string());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the OpenFgaDecisionClient
    pub fn build(self) -> Result<OpenFgaDecisionClient, DecisionError> {
        let url = self
            .url
            .ok_or_else(|| DecisionError::ConfigError("OpenFGA URL is required".into()))?;
        let store_id = self
            .store_id
            .ok_or_else(|| DecisionError::ConfigError("OpenFGA store_id is required".into()))?;

        OpenFgaDecisionClient::new(OpenFgaConfig {
            url,
            store_id,
            authorization_model_id: self.authorization_model_id,
            object_type: self
                .object_type
                .unwrap_or_else(|| DEFAULT_OBJECT_TYPE.to_string()),
            timeout: self.timeout,
        })
    }
}

impl OpenFgaDecisionClient {
    /// Create a new OpenFGA decision client
    pub fn new(config: OpenFgaConfig) -> Result<Self, DecisionError> {
        let client = http_client(config.timeout)?;
        Ok(Self { config, client })
    }

    /// Create a new builder for OpenFgaDecisionClient
    pub fn builder() -> OpenFgaDecisionClientBuilder {
        OpenFgaDecisionClientBuilder::default()
    }

    /// Map an HTTP method onto an OpenFGA relation
    pub fn method_to_relation(method: &str) -> &'static str {
        match method.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" | "OPTIONS" => "viewer",
            "POST" | "PUT" | "PATCH" => "writer",
            "DELETE" => "deleter",
            _ => "viewer",
        }
    }

    fn tuple_key(&self, request: &DecisionRequest) -> TupleKey {
        TupleKey {
            user: format!("user:{}", request.subject),
            relation: Self::method_to_relation(&request.action).to_string(),
            object: format!("{}:{}", self.config.object_type, request.object),
        }
    }
}

#[async_trait]
impl DecisionClient for OpenFgaDecisionClient {
    async fn evaluate(&self, request: &DecisionRequest) -> Result<Decision, DecisionError> {
        // No tuple can name an empty user, and OpenFGA rejects `user:` outright
        if request.subject.is_empty() {
            debug!(object = %request.object, "Empty subject, denying without a check");
            return Ok(Decision::Denied);
        }

        let url = format!(
            "{}/stores/{}/check",
            self.config.url.trim_end_matches('/'),
            self.config.store_id
        );

        let check_request = CheckRequest {
            tuple_key: self.tuple_key(request),
            authorization_model_id: self.config.authorization_model_id.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .json(&check_request)
            .send()
            .await
            .map_err(|e| DecisionError::BackendError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DecisionError::BackendError(format!(
                "OpenFGA returned status {}",
                response.status()
            )));
        }

        let check_response: CheckResponse = response
            .json()
            .await
            .map_err(|e| DecisionError::BackendError(e.to_string()))?;

        let decision = Decision::from(check_response.allowed);

        debug!(
            decision = decision.as_str(),
            relation = %check_request.tuple_key.relation,
            "OpenFGA authorization decision"
        );

        Ok(decision)
    }

    fn backend(&self) -> &'static str {
        "openfga"
    }
}
