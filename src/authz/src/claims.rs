//! Principal claims extracted from a bearer token

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `roles` object found under `realm_access` and each
/// `resource_access` client entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesClaim {
    #[serde(default)]
    pub roles: Vec<String>,
}

impl RolesClaim {
    /// Check whether the given role is present
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Claims of an access token
///
/// Registered claims and the identity-provider role claims are typed; every
/// other claim is kept in `extra` so policies can still reach it through
/// `Claims.<name>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    #[serde(default)]
    pub realm_access: RolesClaim,

    #[serde(default)]
    pub resource_access: HashMap<String, RolesClaim>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Check if the principal has the given realm role
    pub fn in_realm_role(&self, role: &str) -> bool {
        self.realm_access.has_role(role)
    }

    /// Check if the principal has the given role for the given client
    pub fn in_client_role(&self, client: &str, role: &str) -> bool {
        self.resource_access
            .get(client)
            .is_some_and(|roles| roles.has_role(role))
    }
}
