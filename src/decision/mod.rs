//! Policy decision module
//!
//! Defines the contract between the gate and a policy decision service,
//! plus OPA and OpenFGA backed clients.
//!
//! The gate only ever sees three outcomes: `Ok(Decision::Allowed)`,
//! `Ok(Decision::Denied)` and `Err(DecisionError)`. A backend that cannot
//! answer must return an error, never a denial.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod opa;
pub mod openfga;

/// Default timeout for remote decision requests (5 seconds)
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Decision evaluation errors
#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Policy error: {0}")]
    PolicyError(String),

    #[error("Decision timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Verdict of the policy decision service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allowed => "allow",
            Decision::Denied => "deny",
        }
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allowed
        } else {
            Decision::Denied
        }
    }
}

/// The (subject, object, action) tuple sent to the decision service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequest {
    /// Identity the request is evaluated under (may be empty)
    pub subject: String,
    /// Resource path
    pub object: String,
    /// HTTP method
    pub action: String,
}

impl DecisionRequest {
    pub fn new(
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
        }
    }
}

/// Policy decision client
///
/// Each call is a single attempt. Implementations must not turn transport
/// or evaluation failures into [`Decision::Denied`].
#[async_trait]
pub trait DecisionClient: Send + Sync {
    /// Evaluate the tuple against the policy
    async fn evaluate(&self, request: &DecisionRequest) -> Result<Decision, DecisionError>;

    /// Short backend name used in logs and metrics
    fn backend(&self) -> &'static str {
        "custom"
    }
}

/// Client that allows every request
pub struct AllowAll;

#[async_trait]
impl DecisionClient for AllowAll {
    async fn evaluate(&self, _request: &DecisionRequest) -> Result<Decision, DecisionError> {
        Ok(Decision::Allowed)
    }

    fn backend(&self) -> &'static str {
        "allow_all"
    }
}

/// Client that denies every request
pub struct DenyAll;

#[async_trait]
impl DecisionClient for DenyAll {
    async fn evaluate(&self, _request: &DecisionRequest) -> Result<Decision, DecisionError> {
        Ok(Decision::Denied)
    }

    fn backend(&self) -> &'static str {
        "deny_all"
    }
}

/// Build a reqwest client with the given (or default) timeout
pub(crate) fn http_client(timeout: Option<Duration>) -> Result<reqwest::Client, DecisionError> {
    reqwest::Client::builder()
        .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
        .build()
        .map_err(|e| DecisionError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}
