//! Identity extraction
//!
//! Strategies that turn a request into the subject string the policy is
//! evaluated under. The gate treats any [`IdentityError`] as "no identity"
//! and denies the request.
//!
//! Any `Fn(&RequestContext) -> Result<String, IdentityError>` closure is a
//! strategy too:
//!
//! ```
//! use authz_gate::gate::RequestContext;
//! use authz_gate::identity::{IdentityError, IdentityExtractor};
//!
//! fn tenant_user(ctx: &RequestContext<'_>) -> Result<String, IdentityError> {
//!     ctx.header("x-tenant-user")
//!         .map(str::to_string)
//!         .ok_or(IdentityError::MissingIdentity)
//! }
//!
//! let strategy: Box<dyn IdentityExtractor> = Box::new(tenant_user);
//! ```

use crate::gate::RequestContext;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hyper::header::{HeaderName, AUTHORIZATION};
use thiserror::Error;

pub mod jwt;

pub use jwt::JwtIdentity;

/// Identity extraction errors
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Missing identity")]
    MissingIdentity,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid signature")]
    InvalidSignature,
}

/// Identity extraction strategy
pub trait IdentityExtractor: Send + Sync {
    /// Extract the subject from the request
    fn extract(&self, ctx: &RequestContext<'_>) -> Result<String, IdentityError>;
}

impl<F> IdentityExtractor for F
where
    F: Fn(&RequestContext<'_>) -> Result<String, IdentityError> + Send + Sync,
{
    fn extract(&self, ctx: &RequestContext<'_>) -> Result<String, IdentityError> {
        self(ctx)
    }
}

/// Default strategy: user name from `Authorization: Basic ...`
///
/// Absent or malformed credentials yield an empty subject rather than an
/// error; the policy is expected to deny the empty subject. The password is
/// not checked here.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAuthIdentity;

impl BasicAuthIdentity {
    /// Decode a basic credentials header value into (user, password)
    pub fn parse(value: &str) -> Option<(String, String)> {
        const PREFIX: &str = "Basic ";

        let scheme = value.get(..PREFIX.len())?;
        if !scheme.eq_ignore_ascii_case(PREFIX) {
            return None;
        }

        let decoded = STANDARD.decode(&value[PREFIX.len()..]).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;

        Some((user.to_string(), password.to_string()))
    }
}

impl IdentityExtractor for BasicAuthIdentity {
    fn extract(&self, ctx: &RequestContext<'_>) -> Result<String, IdentityError> {
        let user = ctx
            .header(AUTHORIZATION.as_str())
            .and_then(Self::parse)
            .map(|(user, _)| user)
            .unwrap_or_default();
        Ok(user)
    }
}

/// Subject taken verbatim from a request header
///
/// Intended for deployments behind an authenticating proxy that sets e.g.
/// `X-Forwarded-User`.
#[derive(Debug, Clone)]
pub struct HeaderIdentity {
    name: HeaderName,
}

impl HeaderIdentity {
    pub fn new(name: HeaderName) -> Self {
        Self { name }
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.name
    }
}

impl IdentityExtractor for HeaderIdentity {
    fn extract(&self, ctx: &RequestContext<'_>) -> Result<String, IdentityError> {
        ctx.headers()
            .get(&self.name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(IdentityError::MissingIdentity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Request;

    fn request_with_auth(value: &str) -> Request<()> {
        Request::builder()
            .uri("/dataset1/resource1")
            .header("authorization", value)
            .body(())
            .unwrap()
    }

    fn basic(credentials: &str) -> String {
        format!("Basic {}", STANDARD.encode(credentials))
    }

    #[test]
    fn test_basic_auth_user() {
        let req = request_with_auth(&basic("alice:secret"));
        let subject = BasicAuthIdentity
            .extract(&RequestContext::from_request(&req))
            .unwrap();
        assert_eq!(subject, "alice");
    }

    #[test]
    fn test_basic_auth_scheme_is_case_insensitive() {
        let value = format!("bAsIc {}", STANDARD.encode("bob:pw"));
        assert_eq!(
            BasicAuthIdentity::parse(&value),
            Some(("bob".into(), "pw".into()))
        );
    }

    #[test]
    fn test_basic_auth_password_may_contain_colon() {
        assert_eq!(
            BasicAuthIdentity::parse(&basic("cathy:a:b")),
            Some(("cathy".into(), "a:b".into()))
        );
    }

    #[test]
    fn test_basic_auth_missing_header_is_empty_subject() {
        let req = Request::builder().uri("/").body(()).unwrap();
        let subject = BasicAuthIdentity
            .extract(&RequestContext::from_request(&req))
            .unwrap();
        assert_eq!(subject, "");
    }

    #[test]
    fn test_basic_auth_malformed_is_empty_subject() {
        for value in [
            "Bearer abc.def.ghi",
            "Basic !!!not-base64!!!",
            basic("no-colon-here").as_str(),
            "Basic",
        ] {
            let req = request_with_auth(value);
            let result = BasicAuthIdentity.extract(&RequestContext::from_request(&req));
            assert_eq!(result.unwrap(), "", "value: {}", value);
        }
    }

    #[test]
    fn test_header_identity() {
        let strategy = HeaderIdentity::new(HeaderName::from_static("x-forwarded-user"));
        let req = Request::builder()
            .header("X-Forwarded-User", " cathy ")
            .body(())
            .unwrap();
        let subject = strategy.extract(&RequestContext::from_request(&req)).unwrap();
        assert_eq!(subject, "cathy");
    }

    #[test]
    fn test_header_identity_missing() {
        let strategy = HeaderIdentity::new(HeaderName::from_static("x-forwarded-user"));
        let req = Request::builder().body(()).unwrap();
        let result = strategy.extract(&RequestContext::from_request(&req));
        assert!(matches!(result, Err(IdentityError::MissingIdentity)));
    }

    #[test]
    fn test_closure_strategy() {
        let strategy = |_: &RequestContext<'_>| -> Result<String, IdentityError> {
            Ok("not_cathy_at_all".to_string())
        };
        let req = request_with_auth(&basic("cathy:secret"));
        let subject = strategy.extract(&RequestContext::from_request(&req)).unwrap();
        assert_eq!(subject, "not_cathy_at_all");
    }
}
