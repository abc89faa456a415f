//! JWT identity
//!
//! Token-based identity: validates a bearer token and uses its `sub` claim
//! as the subject. Supports HS256, RS256 and ES256.

use super::{IdentityError, IdentityExtractor};
use crate::gate::RequestContext;
use hyper::header::AUTHORIZATION;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// JWT Claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: Option<usize>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
}

/// JWT identity strategy
///
/// # Example
///
/// ```
/// use authz_gate::identity::JwtIdentity;
///
/// let identity = JwtIdentity::new_hs256("my-secret")
///     .with_issuer("https://auth.example.com")
///     .with_audience("my-api");
/// ```
pub struct JwtIdentity {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentity {
    /// Create a JWT identity strategy with a shared secret (HS256)
    pub fn new_hs256(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Self::validation(Algorithm::HS256),
        }
    }

    /// Create a JWT identity strategy with an RSA public key (RS256)
    pub fn new_rs256(public_key_pem: &str) -> Result<Self, IdentityError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?;
        Ok(Self {
            decoding_key,
            validation: Self::validation(Algorithm::RS256),
        })
    }

    /// Create a JWT identity strategy with an EC P-256 public key (ES256)
    pub fn new_es256(public_key_pem: &str) -> Result<Self, IdentityError> {
        let decoding_key = DecodingKey::from_ec_pem(public_key_pem.as_bytes())
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?;
        Ok(Self {
            decoding_key,
            validation: Self::validation(Algorithm::ES256),
        })
    }

    /// Build from an algorithm name and key material as found in config
    pub fn from_algorithm(algorithm: &str, key: &str) -> Result<Self, IdentityError> {
        match algorithm.to_uppercase().as_str() {
            "HS256" => Ok(Self::new_hs256(key)),
            "RS256" => Self::new_rs256(key),
            "ES256" => Self::new_es256(key),
            alg => Err(IdentityError::InvalidToken(format!(
                "Unsupported JWT algorithm: {}",
                alg
            ))),
        }
    }

    fn validation(algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        // aud is only checked once an audience is configured
        validation.validate_aud = false;
        validation
    }

    /// Set the required issuer (`iss` claim)
    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Set the required audience (`aud` claim)
    #[must_use]
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }

    /// Bearer token from the Authorization header, else the `token` query parameter
    fn extract_token<'a>(ctx: &RequestContext<'a>) -> Option<&'a str> {
        if let Some(token) = ctx
            .header(AUTHORIZATION.as_str())
            .and_then(|auth| auth.strip_prefix("Bearer "))
        {
            return Some(token.trim());
        }

        ctx.query()?
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
    }
}

impl IdentityExtractor for JwtIdentity {
    fn extract(&self, ctx: &RequestContext<'_>) -> Result<String, IdentityError> {
        let token = Self::extract_token(ctx).ok_or(IdentityError::MissingIdentity)?;

        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => IdentityError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    IdentityError::InvalidSignature
                }
                _ => IdentityError::InvalidToken(e.to_string()),
            },
        )?;

        Ok(token_data.claims.sub)
    }
}
