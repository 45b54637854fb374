//! Role helper functions callable from policy expressions
//!
//! | Expression                     | Meaning                                        |
//! |--------------------------------|------------------------------------------------|
//! | `InRealmRole("admin")`         | realm role held by the principal               |
//! | `InRole("editor")`             | client role for the configured `clientID`      |
//! | `InClientRole("app", "editor")`| client role for an explicit client             |
//!
//! All helpers return `false` when the request carries no claims.

use std::collections::HashMap;
use std::sync::Arc;

use cel_interpreter::Context;

use crate::claims::{Claims, RolesClaim};

/// Register the role helpers on a CEL context, bound to the given claims
pub fn register_role_functions(context: &mut Context, claims: Option<&Claims>, client_id: &str) {
    let realm_roles = claims
        .map(|c| c.realm_access.clone())
        .unwrap_or_default();
    let client_roles = claims
        .and_then(|c| c.resource_access.get(client_id).cloned())
        .unwrap_or_default();
    let resource_access: HashMap<String, RolesClaim> = claims
        .map(|c| c.resource_access.clone())
        .unwrap_or_default();

    context.add_function("InRealmRole", move |role: Arc<String>| {
        realm_roles.has_role(&role)
    });

    context.add_function("InRole", move |role: Arc<String>| {
        client_roles.has_role(&role)
    });

    context.add_function(
        "InClientRole",
        move |client: Arc<String>, role: Arc<String>| {
            resource_access
                .get(client.as_str())
                .is_some_and(|roles| roles.has_role(&role))
        },
    );
}
