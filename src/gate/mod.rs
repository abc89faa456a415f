//! Authorization gate
//!
//! Wraps a downstream handler with an authorization checkpoint:
//!
//! ```text
//! skip? ──yes──────────────────────────────────────► next(request)
//!   │no
//!   ▼
//! identify ──error──► Forbidden
//!   │subject
//!   ▼
//! evaluate(subject, path, method)
//!   ├─ Allowed ─────────────────────────────────────► next(request)
//!   ├─ Denied  ─────────────────────────────────────► Forbidden
//!   └─ error   ─────────────────────────────────────► InternalError(cause)
//! ```
//!
//! Identity failures and explicit denials look the same from outside (403).
//! Decision failures are never folded into a denial (500).
//!
//! # Example
//!
//! ```no_run
//! use authz_gate::decision::opa::OpaDecisionClient;
//! use authz_gate::gate::AuthorizationGate;
//! use authz_gate::skip::SkipPaths;
//! use hyper::Request;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let opa = OpaDecisionClient::builder()
//!     .url("http://localhost:8181")
//!     .policy_path("httpapi/authz/allow")
//!     .build()?;
//!
//! let gate = AuthorizationGate::builder()
//!     .decision_client(opa)
//!     .skipper(SkipPaths::new().path("/health"))
//!     .decision_timeout(Duration::from_secs(2))
//!     .build()?;
//!
//! let request = Request::get("/dataset1/resource1").body(())?;
//! match gate.authorize(request, |_req| async { 200u16 }).await {
//!     Ok(status) => println!("handler returned {}", status),
//!     Err(rejection) => println!("rejected with {}", rejection.status()),
//! }
//! # Ok(())
//! # }
//! ```

use crate::decision::{Decision, DecisionClient, DecisionError, DecisionRequest};
use crate::identity::{BasicAuthIdentity, IdentityError, IdentityExtractor};
use crate::skip::{NeverSkip, SkipPolicy};
use hyper::{Request, Response, StatusCode};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, warn};

mod context;
mod service;

pub use context::RequestContext;
pub use service::GateService;

/// Gate construction errors
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Terminal rejection produced by the gate
#[derive(Error, Debug)]
pub enum GateRejection {
    /// Explicit denial, or no usable identity
    #[error("Forbidden")]
    Forbidden,

    /// The decision service could not produce a decision
    #[error("Authorization failed: {0}")]
    InternalError(#[source] DecisionError),
}

impl GateRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            GateRejection::Forbidden => StatusCode::FORBIDDEN,
            GateRejection::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text response; 403 bodies carry no policy detail
    pub fn into_response<B: From<String>>(self) -> Response<B> {
        let (status, body) = match self {
            GateRejection::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            GateRejection::InternalError(cause) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Authorization failed: {}", cause),
            ),
        };

        let mut response = Response::new(B::from(body));
        *response.status_mut() = status;
        response.headers_mut().insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("text/plain"),
        );
        response
    }
}

/// Why a request was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Skipped,
    Allowed,
}

impl Admission {
    pub fn as_str(self) -> &'static str {
        match self {
            Admission::Skipped => "skipped",
            Admission::Allowed => "allowed",
        }
    }
}

/// Immutable gate settings, shared by every request
pub struct GateConfig {
    skipper: Arc<dyn SkipPolicy>,
    identity: Arc<dyn IdentityExtractor>,
    decision_client: Arc<dyn DecisionClient>,
    decision_timeout: Option<Duration>,
}

impl GateConfig {
    pub fn decision_timeout(&self) -> Option<Duration> {
        self.decision_timeout
    }

    pub fn backend(&self) -> &'static str {
        self.decision_client.backend()
    }
}

/// Builder for AuthorizationGate
#[derive(Default)]
pub struct AuthorizationGateBuilder {
    skipper: Option<Arc<dyn SkipPolicy>>,
    identity: Option<Arc<dyn IdentityExtractor>>,
    decision_client: Option<Arc<dyn DecisionClient>>,
    decision_timeout: Option<Duration>,
}

impl AuthorizationGateBuilder {
    /// Set the decision client (required)
    pub fn decision_client(mut self, client: impl DecisionClient + 'static) -> Self {
        self.decision_client = Some(Arc::new(client));
        self
    }

    /// Set the skip policy (default: never skip)
    pub fn skipper(mut self, skipper: impl SkipPolicy + 'static) -> Self {
        self.skipper = Some(Arc::new(skipper));
        self
    }

    /// Set the skip policy from a closure
    pub fn skip_when<F>(self, predicate: F) -> Self
    where
        F: Fn(&RequestContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.skipper(predicate)
    }

    /// Set the identity strategy (default: basic auth user name)
    pub fn identity(mut self, identity: impl IdentityExtractor + 'static) -> Self {
        self.identity = Some(Arc::new(identity));
        self
    }

    /// Set the identity strategy from a closure
    pub fn identity_fn<F>(self, extract: F) -> Self
    where
        F: Fn(&RequestContext<'_>) -> Result<String, IdentityError> + Send + Sync + 'static,
    {
        self.identity(extract)
    }

    /// Bound the decision call; expiry yields an internal error
    pub fn decision_timeout(mut self, timeout: Duration) -> Self {
        self.decision_timeout = Some(timeout);
        self
    }

    /// Build the AuthorizationGate
    pub fn build(self) -> Result<AuthorizationGate, GateError> {
        let decision_client = self
            .decision_client
            .ok_or_else(|| GateError::ConfigError("Decision client is required".into()))?;

        if self.decision_timeout == Some(Duration::ZERO) {
            return Err(GateError::ConfigError(
                "Decision timeout must be greater than zero".into(),
            ));
        }

        Ok(AuthorizationGate {
            config: Arc::new(GateConfig {
                skipper: self.skipper.unwrap_or_else(|| Arc::new(NeverSkip)),
                identity: self
                    .identity
                    .unwrap_or_else(|| Arc::new(BasicAuthIdentity)),
                decision_client,
                decision_timeout: self.decision_timeout,
            }),
        })
    }
}

/// Authorization checkpoint in front of a downstream handler
///
/// Cloning is cheap; all clones share one [`GateConfig`].
#[derive(Clone)]
pub struct AuthorizationGate {
    config: Arc<GateConfig>,
}

impl AuthorizationGate {
    /// Gate with default skip policy and identity strategy
    pub fn new(decision_client: impl DecisionClient + 'static) -> Self {
        Self {
            config: Arc::new(GateConfig {
                skipper: Arc::new(NeverSkip),
                identity: Arc::new(BasicAuthIdentity),
                decision_client: Arc::new(decision_client),
                decision_timeout: None,
            }),
        }
    }

    pub fn builder() -> AuthorizationGateBuilder {
        AuthorizationGateBuilder::default()
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Whether the skip policy exempts this request
    pub fn should_skip(&self, ctx: &RequestContext<'_>) -> bool {
        self.config.skipper.should_skip(ctx)
    }

    /// Run the configured identity strategy
    pub fn identify(&self, ctx: &RequestContext<'_>) -> Result<String, IdentityError> {
        self.config.identity.extract(ctx)
    }

    /// Decide on the request without invoking a handler
    ///
    /// A failed identity extraction is a denial, not an error; the decision
    /// service is not consulted in that case.
    pub async fn check_permission(
        &self,
        ctx: &RequestContext<'_>,
    ) -> Result<Decision, DecisionError> {
        match self.decision_request(ctx) {
            Some(request) => self.evaluate(&request).await,
            None => Ok(Decision::Denied),
        }
    }

    /// The tuple to evaluate, or `None` when no identity could be extracted
    fn decision_request(&self, ctx: &RequestContext<'_>) -> Option<DecisionRequest> {
        match self.identify(ctx) {
            Ok(subject) => Some(DecisionRequest::new(
                subject,
                ctx.path(),
                ctx.method().as_str(),
            )),
            Err(e) => {
                debug!(error = %e, path = ctx.path(), "Identity extraction failed, denying");
                None
            }
        }
    }

    async fn evaluate(&self, request: &DecisionRequest) -> Result<Decision, DecisionError> {
        let evaluation = self.config.decision_client.evaluate(request);

        match self.config.decision_timeout {
            Some(limit) => tokio::time::timeout(limit, evaluation)
                .await
                .map_err(|_| DecisionError::Timeout(limit))?,
            None => evaluation.await,
        }
    }

    /// Run skip policy, identity extraction and the decision, in that order
    pub async fn admit(&self, ctx: &RequestContext<'_>) -> Result<Admission, GateRejection> {
        self.admit_timed(ctx).await.0
    }

    /// [`admit`](Self::admit), plus the time spent in the decision client
    ///
    /// The duration is `None` when the client was not consulted (skipped
    /// request or no identity).
    pub(crate) async fn admit_timed(
        &self,
        ctx: &RequestContext<'_>,
    ) -> (Result<Admission, GateRejection>, Option<Duration>) {
        if self.should_skip(ctx) {
            debug!(path = ctx.path(), "Authorization skipped");
            return (Ok(Admission::Skipped), None);
        }

        let Some(request) = self.decision_request(ctx) else {
            warn!(method = %ctx.method(), path = ctx.path(), "Request denied, no identity");
            return (Err(GateRejection::Forbidden), None);
        };

        let started = Instant::now();
        let decision = self.evaluate(&request).await;
        let elapsed = started.elapsed();

        let result = match decision {
            Ok(Decision::Allowed) => {
                debug!(method = %ctx.method(), path = ctx.path(), "Request allowed");
                Ok(Admission::Allowed)
            }
            Ok(Decision::Denied) => {
                warn!(method = %ctx.method(), path = ctx.path(), "Request denied");
                Err(GateRejection::Forbidden)
            }
            Err(e) => {
                error!(
                    backend = self.config.backend(),
                    error = %e,
                    "Authorization decision failed"
                );
                Err(GateRejection::InternalError(e))
            }
        };

        (result, Some(elapsed))
    }

    /// Authorize `request` and, if permitted, hand it to `next`
    ///
    /// Returns the handler's output untouched when the request is skipped or
    /// allowed, otherwise the rejection. `next` is called at most once.
    pub async fn authorize<B, F, Fut, T>(
        &self,
        request: Request<B>,
        next: F,
    ) -> Result<T, GateRejection>
    where
        F: FnOnce(Request<B>) -> Fut,
        Fut: Future<Output = T>,
    {
        self.admit(&RequestContext::from_request(&request)).await?;
        Ok(next(request).await)
    }
}
