//! Token collaborators: local decoding and remote introspection
//!
//! The enforcer never talks to an identity provider itself. Callers plug in
//! a [`TokenDecoder`] (a [`JwtDecoder`] covers the usual case) and, when
//! introspection is enabled, a [`TokenIntrospector`] backed by whatever
//! client they already use.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::claims::Claims;

/// Errors raised by token collaborators
#[derive(Debug, Error)]
pub enum TokenError {
    /// Token is malformed, badly signed or expired
    #[error("invalid token: {0}")]
    Invalid(String),

    /// Verification key could not be loaded
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Introspection endpoint failed or could not be reached
    #[error("introspection failed: {0}")]
    Introspection(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Invalid(err.to_string())
    }
}

/// Validates a bearer token locally and extracts its claims
#[async_trait]
pub trait TokenDecoder: Send + Sync {
    async fn decode(&self, token: &str) -> Result<Claims, TokenError>;
}

/// Asks the identity provider whether a token is currently active
#[async_trait]
pub trait TokenIntrospector: Send + Sync {
    async fn introspect(&self, token: &str) -> Result<IntrospectionResult, TokenError>;
}

/// Token introspection response (RFC 7662); only `active` is inspected
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionResult {
    #[serde(default)]
    pub active: Option<bool>,
}

impl IntrospectionResult {
    pub fn active() -> Self {
        Self { active: Some(true) }
    }

    pub fn inactive() -> Self {
        Self {
            active: Some(false),
        }
    }

    /// A missing `active` field counts as inactive
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(false)
    }
}

/// JWT decoder verifying signature and expiry with a fixed key
#[derive(Clone)]
pub struct JwtDecoder {
    key: DecodingKey,
    validation: Validation,
}

impl JwtDecoder {
    /// HS256 tokens signed with a shared secret
    pub fn from_secret(secret: &[u8]) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), Algorithm::HS256)
    }

    /// RS256 tokens verified with the realm's public key (PEM)
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, TokenError> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(|e| TokenError::InvalidKey(e.to_string()))?;
        Ok(Self::with_key(key, Algorithm::RS256))
    }

    fn with_key(key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;

        Self { key, validation }
    }

    /// Require the `iss` claim to match
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Require the `aud` claim to contain `audience`
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }
}

#[async_trait]
impl TokenDecoder for JwtDecoder {
    async fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}
