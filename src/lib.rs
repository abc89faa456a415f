//! Authz Gate Library
//!
//! HTTP authorization gate backed by a remote policy decision service.
//!
//! # Features
//!
//! - **Fail Closed**: Identity failures are rejected as Forbidden, never 500
//! - **Pluggable Identity**: Basic auth, header, JWT, or any closure
//! - **Skip Policies**: Exact paths, segment prefixes, or custom predicates
//! - **Decision Backends**: OPA and OpenFGA integration
//!
//! # Example
//!
//! ```no_run
//! use authz_gate::{config::Config, server::Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let server = Server::bind(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod decision;
pub mod gate;
pub mod identity;
pub mod metrics;
pub mod server;
pub mod skip;

// Re-export commonly used types
pub use config::Config;
pub use decision::{Decision, DecisionClient, DecisionError, DecisionRequest};
pub use gate::{AuthorizationGate, GateRejection, GateService, RequestContext};
pub use identity::{IdentityError, IdentityExtractor};
pub use server::Server;
pub use skip::SkipPolicy;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
