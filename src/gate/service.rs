//! hyper integration
//!
//! [`GateService`] puts an [`AuthorizationGate`] in front of any hyper
//! service and turns rejections into HTTP responses.

use super::{AuthorizationGate, GateRejection, RequestContext};
use crate::metrics;
use hyper::service::Service;
use hyper::{Request, Response};
use std::future::Future;
use std::pin::Pin;

/// hyper service guarded by an authorization gate
#[derive(Clone)]
pub struct GateService<S> {
    gate: AuthorizationGate,
    inner: S,
}

impl<S> GateService<S> {
    pub fn new(gate: AuthorizationGate, inner: S) -> Self {
        Self { gate, inner }
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn rejection_outcome(rejection: &GateRejection) -> &'static str {
    match rejection {
        GateRejection::Forbidden => "forbidden",
        GateRejection::InternalError(_) => "error",
    }
}

impl<S, B, ResBody> Service<Request<B>> for GateService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>> + Clone + Send + Sync + 'static,
    S::Future: Send,
    B: Send + 'static,
    ResBody: From<String> + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let gate = self.gate.clone();
        let inner = self.inner.clone();

        Box::pin(async move {
            let (admission, decision_time) =
                gate.admit_timed(&RequestContext::from_request(&req)).await;

            let outcome = match &admission {
                Ok(admission) => admission.as_str(),
                Err(rejection) => rejection_outcome(rejection),
            };
            if let Some(elapsed) = decision_time {
                metrics::record_decision_duration(outcome, elapsed.as_secs_f64());
            }
            metrics::record_gate_outcome(outcome);

            match admission {
                Ok(_) => inner.call(req).await,
                Err(rejection) => Ok(rejection.into_response()),
            }
        })
    }
}
