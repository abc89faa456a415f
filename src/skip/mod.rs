//! Skip policies
//!
//! A skip policy decides, before anything else, whether a request bypasses
//! authorization entirely (health probes, public assets).

use crate::gate::RequestContext;

/// Per-request bypass predicate
pub trait SkipPolicy: Send + Sync {
    fn should_skip(&self, ctx: &RequestContext<'_>) -> bool;
}

impl<F> SkipPolicy for F
where
    F: Fn(&RequestContext<'_>) -> bool + Send + Sync,
{
    fn should_skip(&self, ctx: &RequestContext<'_>) -> bool {
        self(ctx)
    }
}

/// Default policy: every request is authorized
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSkip;

impl SkipPolicy for NeverSkip {
    fn should_skip(&self, _ctx: &RequestContext<'_>) -> bool {
        false
    }
}

/// Skip by path
///
/// Exact paths must match the request path exactly. Prefixes match on a
/// segment boundary, so `/health` covers `/health/live` but not `/healthz`.
#[derive(Debug, Clone, Default)]
pub struct SkipPaths {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl SkipPaths {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.exact.push(path.into());
        self
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefixes
            .push(prefix.trim_end_matches('/').to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    fn matches(&self, path: &str) -> bool {
        if self.exact.iter().any(|p| p == path) {
            return true;
        }

        self.prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

impl SkipPolicy for SkipPaths {
    fn should_skip(&self, ctx: &RequestContext<'_>) -> bool {
        self.matches(ctx.path())
    }
}
