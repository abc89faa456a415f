//! Configuration module for authz-gate
//!
//! Handles loading and validation of the YAML configuration file, and turns
//! the `gate` and `decision` sections into a ready [`AuthorizationGate`].

use crate::decision::opa::OpaDecisionClient;
use crate::decision::openfga::OpenFgaDecisionClient;
use crate::decision::{AllowAll, DecisionError, DenyAll};
use crate::gate::{AuthorizationGate, AuthorizationGateBuilder};
use crate::identity::{BasicAuthIdentity, HeaderIdentity, IdentityError, JwtIdentity};
use crate::skip::SkipPaths;
use hyper::header::HeaderName;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid decision backend: {0}")]
    DecisionError(#[from] DecisionError),

    #[error("Invalid identity strategy: {0}")]
    IdentityError(#[from] IdentityError),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub gate: GateSettings,
    pub decision: DecisionConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_http_url(&self.upstream.url) {
            return Err(ConfigError::ValidationError(
                "Invalid upstream url: must start with http:// or https://".into(),
            ));
        }

        if self.upstream.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Upstream timeout must be greater than zero".into(),
            ));
        }

        if self.upstream.max_body_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "Upstream max_body_bytes must be greater than zero".into(),
            ));
        }

        self.gate.validate()?;
        self.decision.validate()?;

        Ok(())
    }

    /// Build the authorization gate described by `gate` and `decision`
    pub fn build_gate(&self) -> Result<AuthorizationGate, ConfigError> {
        let mut builder = AuthorizationGate::builder();

        if let Some(ms) = self.gate.decision_timeout_ms {
            builder = builder.decision_timeout(Duration::from_millis(ms));
        }

        let skip = self.gate.skip_policy();
        if !skip.is_empty() {
            builder = builder.skipper(skip);
        }

        builder = self.gate.identity.apply(builder)?;
        builder = self.decision.apply(builder)?;

        builder
            .build()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
}

/// Application the gate protects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
    #[serde(default = "default_upstream_timeout")]
    pub timeout_seconds: u64,
    /// Largest request body forwarded upstream; bigger bodies get 413
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Default cap on forwarded request bodies (10 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

fn default_upstream_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Gate behavior
///
/// ```yaml
/// gate:
///   skip_paths: ["/health"]
///   skip_prefixes: ["/public"]
///   decision_timeout_ms: 2000
///   identity:
///     type: basic
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateSettings {
    /// Paths exempt from authorization (exact match)
    #[serde(default)]
    pub skip_paths: Vec<String>,
    /// Path prefixes exempt from authorization (segment boundary match)
    #[serde(default)]
    pub skip_prefixes: Vec<String>,
    /// Upper bound on a single decision call
    #[serde(default)]
    pub decision_timeout_ms: Option<u64>,
    #[serde(default)]
    pub identity: IdentityConfig,
}

impl GateSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        for path in self.skip_paths.iter().chain(&self.skip_prefixes) {
            if !path.starts_with('/') {
                return Err(ConfigError::ValidationError(format!(
                    "Skip path '{}' must start with '/'",
                    path
                )));
            }
        }

        if self.decision_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "decision_timeout_ms must be greater than zero".into(),
            ));
        }

        self.identity.validate()
    }

    pub fn skip_policy(&self) -> SkipPaths {
        let policy = self
            .skip_paths
            .iter()
            .fold(SkipPaths::new(), |policy, path| policy.path(path.as_str()));
        self.skip_prefixes
            .iter()
            .fold(policy, |policy, prefix| policy.prefix(prefix.as_str()))
    }
}

/// Identity strategy selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentityConfig {
    /// User name from basic credentials
    #[default]
    Basic,
    /// Subject from a trusted header
    Header { name: String },
    /// `sub` claim of a bearer JWT
    Jwt {
        /// Shared secret (HS256) or PEM public key (RS256/ES256)
        secret: String,
        #[serde(default = "default_jwt_algorithm")]
        algorithm: String,
        #[serde(default)]
        issuer: Option<String>,
        #[serde(default)]
        audience: Option<String>,
    },
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

impl IdentityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            IdentityConfig::Basic => Ok(()),
            IdentityConfig::Header { name } => HeaderName::from_bytes(name.as_bytes())
                .map(|_| ())
                .map_err(|_| {
                    ConfigError::ValidationError(format!("Invalid identity header '{}'", name))
                }),
            IdentityConfig::Jwt {
                secret, algorithm, ..
            } => {
                if secret.trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "JWT identity requires a secret".into(),
                    ));
                }
                match algorithm.to_uppercase().as_str() {
                    "HS256" | "RS256" | "ES256" => Ok(()),
                    alg => Err(ConfigError::ValidationError(format!(
                        "Invalid JWT algorithm '{}': must be HS256, RS256 or ES256",
                        alg
                    ))),
                }
            }
        }
    }

    fn apply(
        &self,
        builder: AuthorizationGateBuilder,
    ) -> Result<AuthorizationGateBuilder, ConfigError> {
        Ok(match self {
            IdentityConfig::Basic => builder.identity(BasicAuthIdentity),
            IdentityConfig::Header { name } => {
                let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                    ConfigError::ValidationError(format!("Invalid identity header '{}'", name))
                })?;
                builder.identity(HeaderIdentity::new(name))
            }
            IdentityConfig::Jwt {
                secret,
                algorithm,
                issuer,
                audience,
            } => {
                let mut identity = JwtIdentity::from_algorithm(algorithm, secret)?;
                if let Some(issuer) = issuer {
                    identity = identity.with_issuer(issuer);
                }
                if let Some(audience) = audience {
                    identity = identity.with_audience(audience);
                }
                builder.identity(identity)
            }
        })
    }
}

/// Policy decision backend selection
///
/// ```yaml
/// decision:
///   type: opa
///   url: "http://localhost:8181"
///   policy_path: "httpapi/authz/allow"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionConfig {
    Opa {
        url: String,
        policy_path: String,
        #[serde(default)]
        timeout_seconds: Option<u64>,
    },
    #[serde(rename = "openfga")]
    OpenFga {
        url: String,
        store_id: String,
        #[serde(default)]
        authorization_model_id: Option<String>,
        #[serde(default)]
        object_type: Option<String>,
        #[serde(default)]
        timeout_seconds: Option<u64>,
    },
    AllowAll,
    DenyAll,
}

impl DecisionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            DecisionConfig::Opa {
                url, policy_path, ..
            } => {
                if !is_valid_http_url(url) {
                    return Err(ConfigError::ValidationError(
                        "Invalid OPA url: must start with http:// or https://".into(),
                    ));
                }
                if policy_path.trim_matches('/').is_empty() {
                    return Err(ConfigError::ValidationError(
                        "OPA policy_path cannot be empty".into(),
                    ));
                }
                Ok(())
            }
            DecisionConfig::OpenFga { url, store_id, .. } => {
                if !is_valid_http_url(url) {
                    return Err(ConfigError::ValidationError(
                        "Invalid OpenFGA url: must start with http:// or https://".into(),
                    ));
                }
                if store_id.trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "OpenFGA store_id cannot be empty".into(),
                    ));
                }
                Ok(())
            }
            DecisionConfig::AllowAll | DecisionConfig::DenyAll => Ok(()),
        }
    }

    /// Backend name as used in logs and metrics
    pub fn backend(&self) -> &'static str {
        match self {
            DecisionConfig::Opa { .. } => "opa",
            DecisionConfig::OpenFga { .. } => "openfga",
            DecisionConfig::AllowAll => "allow_all",
            DecisionConfig::DenyAll => "deny_all",
        }
    }

    fn apply(
        &self,
        builder: AuthorizationGateBuilder,
    ) -> Result<AuthorizationGateBuilder, ConfigError> {
        Ok(match self {
            DecisionConfig::Opa {
                url,
                policy_path,
                timeout_seconds,
            } => {
                let mut client = OpaDecisionClient::builder()
                    .url(url)
                    .policy_path(policy_path);
                if let Some(secs) = timeout_seconds {
                    client = client.timeout(Duration::from_secs(*secs));
                }
                builder.decision_client(client.build()?)
            }
            DecisionConfig::OpenFga {
                url,
                store_id,
                authorization_model_id,
                object_type,
                timeout_seconds,
            } => {
                let mut client = OpenFgaDecisionClient::builder()
                    .url(url)
                    .store_id(store_id);
                if let Some(id) = authorization_model_id {
                    client = client.authorization_model_id(id);
                }
                if let Some(object_type) = object_type {
                    client = client.object_type(object_type);
                }
                if let Some(secs) = timeout_seconds {
                    client = client.timeout(Duration::from_secs(*secs));
                }
                builder.decision_client(client.build()?)
            }
            DecisionConfig::AllowAll => builder.decision_client(AllowAll),
            DecisionConfig::DenyAll => builder.decision_client(DenyAll),
        })
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}
