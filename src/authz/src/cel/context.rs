//! Evaluation context for CEL expressions

use cel_interpreter::Context;
use serde_json::Value;

use crate::cel::convert::json_to_cel;
use crate::cel::error::{CelError, Result};
use crate::cel::functions::register_role_functions;
use crate::claims::Claims;
use crate::config::EngineSettings;

/// Variable holding the principal's claims (`null` when unauthenticated)
pub const CLAIMS_VAR: &str = "Claims";

/// Variable holding the request payload
pub const REQUEST_VAR: &str = "Request";

/// Variable holding the static engine settings
pub const CONFIG_VAR: &str = "Config";

/// Everything a policy expression can see during one evaluation
///
/// Borrowed for the duration of a single call; compiled programs never keep
/// a reference to it.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    claims: Option<&'a Claims>,
    request: Value,
    settings: &'a EngineSettings,
}

impl<'a> EvalContext<'a> {
    /// Create an evaluation context with an empty (`null`) request
    pub fn new(settings: &'a EngineSettings) -> Self {
        Self {
            claims: None,
            request: Value::Null,
            settings,
        }
    }

    /// Attach the principal's claims
    pub fn with_claims(mut self, claims: Option<&'a Claims>) -> Self {
        self.claims = claims;
        self
    }

    /// Attach the request payload
    pub fn with_request(mut self, request: Value) -> Self {
        self.request = request;
        self
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.claims
    }

    pub fn request(&self) -> &Value {
        &self.request
    }

    /// Build the CEL context: variables plus the role helpers
    pub fn to_cel_context(&self) -> Result<Context> {
        let claims = match self.claims {
            Some(claims) => serde_json::to_value(claims)
                .map_err(|e| CelError::TypeConversionError(e.to_string()))?,
            None => Value::Null,
        };
        let settings = serde_json::to_value(self.settings)
            .map_err(|e| CelError::TypeConversionError(e.to_string()))?;

        let mut context = Context::default();
        context.add_variable_from_value(CLAIMS_VAR, json_to_cel(&claims));
        context.add_variable_from_value(REQUEST_VAR, json_to_cel(&self.request));
        context.add_variable_from_value(CONFIG_VAR, json_to_cel(&settings));

        register_role_functions(&mut context, self.claims, &self.settings.client_id);

        Ok(context)
    }
}
