//! # Recloak Authorization
//!
//! Embeddable, policy-based authorization for services that accept
//! identity-provider bearer tokens.
//!
//! ## Features
//!
//! - **Named policies** written in CEL, reusable through `@name` includes
//! - **Resource tree** where every path is guarded by the conjunction of its
//!   own policy and all of its ancestors' policies
//! - **Compile once, evaluate many**: one predicate per path, built at load
//! - **Enforcement modes** (`enforcing`, `permissive`, `disabled`) switchable
//!   at runtime
//! - **Pluggable token handling** with a bundled JWT decoder and an optional
//!   introspection hook
//!
//! ## Example
//!
//! ```rust
//! use recloak_authz::{AuthzConfig, AuthzError, Claims, Engine, Policy, Resource};
//! use serde_json::json;
//!
//! let config = AuthzConfig {
//!     policies: vec![Policy::new("admins", r#"InRealmRole("admin")"#)],
//!     resources: vec![Resource::new("users")
//!         .with_policy_ref("admins")
//!         .with_child(Resource::new("delete").with_policy(Policy::new("", "Request.force")))],
//!     ..Default::default()
//! };
//!
//! let engine = Engine::new(&config)?;
//!
//! let mut admin = Claims::default();
//! admin.realm_access.roles.push("admin".to_string());
//!
//! assert!(engine.authorize("users/delete", Some(&admin), &json!({"force": true})).is_ok());
//! assert!(engine.authorize("users/delete", None, &json!({"force": true})).is_err());
//! assert!(matches!(
//!     engine.authorize("reports", Some(&admin), &json!({})),
//!     Err(AuthzError::NoPolicyForPath(_))
//! ));
//! # Ok::<(), AuthzError>(())
//! ```

pub mod cel;
pub mod claims;
pub mod config;
pub mod enforcer;
pub mod engine;
pub mod error;
pub mod policy;
pub mod predicate;
pub mod token;
pub mod types;

// Re-export commonly used types
pub use claims::{Claims, RolesClaim};
pub use config::{
    load_config, parse_config, AuthzConfig, ConfigFormat, EnforcementMode, EngineSettings,
    IntrospectionMode,
};
pub use enforcer::Enforcer;
pub use engine::{Engine, SharedEnforcementMode};
pub use error::{AuthzError, Result};
pub use policy::PolicyMap;
pub use predicate::{CompiledPolicy, PolicyBuilder};
pub use token::{IntrospectionResult, JwtDecoder, TokenDecoder, TokenError, TokenIntrospector};
pub use types::{Policy, PolicySpec, Resource};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
