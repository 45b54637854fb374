//! Request-time enforcement: token checks followed by engine evaluation

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::claims::Claims;
use crate::config::{EnforcementMode, IntrospectionMode};
use crate::engine::Engine;
use crate::error::{AuthzError, Result};
use crate::token::{TokenDecoder, TokenIntrospector};

/// Authorizes bearer-token requests against an [`Engine`]
pub struct Enforcer {
    engine: Arc<Engine>,
    introspection: IntrospectionMode,
    decoder: Arc<dyn TokenDecoder>,
    introspector: Option<Arc<dyn TokenIntrospector>>,
    introspection_timeout: Option<Duration>,
}

impl Enforcer {
    /// Create an enforcer using the engine's configured introspection mode
    ///
    /// With [`IntrospectionMode::Always`] every request is rejected until an
    /// introspector is attached.
    pub fn new(engine: Arc<Engine>, decoder: Arc<dyn TokenDecoder>) -> Self {
        let introspection = engine.introspection_mode();

        Self {
            engine,
            introspection,
            decoder,
            introspector: None,
            introspection_timeout: None,
        }
    }

    /// Attach the client that introspects tokens
    pub fn with_introspector(mut self, introspector: Arc<dyn TokenIntrospector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    /// Override the configured introspection mode
    pub fn with_introspection_mode(mut self, mode: IntrospectionMode) -> Self {
        self.introspection = mode;
        self
    }

    /// Give up on introspection after `timeout`; the request is then denied
    pub fn with_introspection_timeout(mut self, timeout: Duration) -> Self {
        self.introspection_timeout = Some(timeout);
        self
    }

    /// Check `access_token` and decide whether it may invoke `path`
    ///
    /// Returns the token's claims on success, or `None` when enforcement is
    /// disabled and the token was not looked at. Dropping the future cancels
    /// an in-flight introspection.
    pub async fn authorize<R>(
        &self,
        access_token: &str,
        path: &str,
        request: &R,
    ) -> Result<Option<Claims>>
    where
        R: Serialize + ?Sized,
    {
        if self.engine.enforcement_mode() == EnforcementMode::Disabled {
            return Ok(None);
        }

        if self.introspection == IntrospectionMode::Always {
            self.introspect(access_token).await?;
        }

        let claims = self.decoder.decode(access_token).await.map_err(|e| {
            debug!(path, error = %e, "Token rejected");
            AuthzError::Unauthorized(format!("invalid token: {e}"))
        })?;

        self.engine.authorize(path, Some(&claims), request)?;

        Ok(Some(claims))
    }

    /// Change the enforcement mode of the underlying engine
    pub fn set_enforcement_mode(&self, mode: EnforcementMode) {
        self.engine.set_enforcement_mode(mode);
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn introspection_mode(&self) -> IntrospectionMode {
        self.introspection
    }

    async fn introspect(&self, access_token: &str) -> Result<()> {
        let Some(introspector) = &self.introspector else {
            warn!("Introspection is enabled but no introspector is configured");
            return Err(AuthzError::Unauthorized(
                "token introspection unavailable".to_string(),
            ));
        };

        let call = introspector.introspect(access_token);
        let outcome = match self.introspection_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(?timeout, "Token introspection timed out");
                    return Err(AuthzError::Unauthorized(
                        "token introspection timed out".to_string(),
                    ));
                }
            },
            None => call.await,
        };

        match outcome {
            Ok(result) if result.is_active() => Ok(()),
            Ok(_) => {
                warn!("Inactive token presented");
                Err(AuthzError::Unauthorized("token is not active".to_string()))
            }
            Err(e) => {
                warn!(error = %e, "Token introspection failed");
                Err(AuthzError::Unauthorized(format!("token introspection failed: {e}")))
            }
        }
    }
}

impl std::fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enforcer")
            .field("engine", &self.engine)
            .field("introspection", &self.introspection)
            .field("has_introspector", &self.introspector.is_some())
            .field("introspection_timeout", &self.introspection_timeout)
            .finish_non_exhaustive()
    }
}
