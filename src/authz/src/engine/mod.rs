//! Resource tree resolver and request-time authorization
//!
//! The engine walks the resource tree once, depth first and parents before
//! children, and compiles one predicate per path: the conjunction of the
//! policy chain from the root down to that resource. After construction the
//! path map is read-only; only the enforcement mode can change.
//!
//! ```text
//! users            policy: authenticated      → (authenticated)
//! ├── list                                    → (authenticated)
//! └── delete       policy: admins             → ((authenticated)) && (admins)
//! reports                                     → no entry
//! ```

mod mode;

pub use mode::SharedEnforcementMode;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::cel::{EvalContext, ExpressionCompiler};
use crate::claims::Claims;
use crate::config::{load_config, AuthzConfig, EnforcementMode, EngineSettings, IntrospectionMode};
use crate::error::{AuthzError, Result};
use crate::policy::PolicyMap;
use crate::predicate::{CompiledPolicy, PolicyBuilder};
use crate::types::{Policy, PolicySpec, Resource};

/// Compiled authorization engine
#[derive(Debug)]
pub struct Engine {
    settings: EngineSettings,
    mode: SharedEnforcementMode,
    policies: PolicyMap,
    compiled: HashMap<String, CompiledPolicy>,
}

impl Engine {
    /// Build an engine from a configuration
    ///
    /// Any configuration defect aborts the build; there is no partially
    /// built engine.
    pub fn new(config: &AuthzConfig) -> Result<Self> {
        let settings = EngineSettings::from_config(config)?;
        let policies = PolicyMap::from_config(config)?;

        let (compiled, resource_count) = {
            let mut resolver = TreeResolver {
                settings: &settings,
                policies: &policies,
                compiler: ExpressionCompiler::new(),
                compiled: HashMap::new(),
                visited: HashSet::new(),
            };

            for resource in &config.resources {
                resolver.walk(resource, None, PolicyBuilder::new())?;
            }

            (resolver.compiled, resolver.visited.len())
        };

        info!(
            "Authorization engine built: {} policies, {} resources, {} guarded paths, mode={}",
            policies.len(),
            resource_count,
            compiled.len(),
            config.enforcement_mode
        );

        Ok(Self {
            settings,
            mode: SharedEnforcementMode::new(config.enforcement_mode),
            policies,
            compiled,
        })
    }

    /// Load a configuration file and build an engine from it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(&load_config(path)?)
    }

    /// Decide whether `claims` may invoke `path` with `request`
    ///
    /// `Ok(())` allows the call. A policy that evaluates to false gives
    /// `Unauthorized`; an unguarded path gives `NoPolicyForPath` in
    /// enforcing mode.
    pub fn authorize<R>(&self, path: &str, claims: Option<&Claims>, request: &R) -> Result<()>
    where
        R: Serialize + ?Sized,
    {
        let mode = self.mode.get();
        if mode == EnforcementMode::Disabled {
            return Ok(());
        }

        let Some(policy) = self.compiled.get(path) else {
            debug!(path, %mode, "No policy for path");

            return match mode {
                EnforcementMode::Enforcing => Err(AuthzError::NoPolicyForPath(path.to_string())),
                EnforcementMode::Permissive | EnforcementMode::Disabled => Ok(()),
            };
        };

        let request = serde_json::to_value(request)
            .map_err(|e| AuthzError::EvaluationError(format!("invalid request payload: {e}")))?;

        let ctx = EvalContext::new(&self.settings)
            .with_claims(claims)
            .with_request(request);

        let result = policy.evaluate(&ctx);
        debug!(path, allowed = result.is_ok(), "Evaluated policy");

        result
    }

    /// Change the enforcement mode for all subsequent calls
    pub fn set_enforcement_mode(&self, mode: EnforcementMode) {
        info!(%mode, "Enforcement mode changed");
        self.mode.set(mode);
    }

    pub fn enforcement_mode(&self) -> EnforcementMode {
        self.mode.get()
    }

    /// Handle to the enforcement mode, shared with this engine
    pub fn shared_mode(&self) -> SharedEnforcementMode {
        self.mode.clone()
    }

    /// Compiled policy guarding `path`, if any
    pub fn policy_for(&self, path: &str) -> Option<&CompiledPolicy> {
        self.compiled.get(path)
    }

    /// Every guarded path (arbitrary order)
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.compiled.keys().map(String::as_str)
    }

    pub fn policies(&self) -> &PolicyMap {
        &self.policies
    }

    /// Configured token introspection mode, applied by the enforcer
    pub fn introspection_mode(&self) -> IntrospectionMode {
        self.settings.introspection
    }

    pub fn path_separator(&self) -> &str {
        &self.settings.path_separator
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}

/// Build-time state of the tree walk
struct TreeResolver<'a> {
    settings: &'a EngineSettings,
    policies: &'a PolicyMap,
    compiler: ExpressionCompiler,
    compiled: HashMap<String, CompiledPolicy>,
    visited: HashSet<String>,
}

impl TreeResolver<'_> {
    fn walk(
        &mut self,
        resource: &Resource,
        parent: Option<&str>,
        builder: PolicyBuilder,
    ) -> Result<()> {
        let separator = self.settings.path_separator.as_str();

        if resource.name.is_empty() {
            return Err(AuthzError::EmptyResourceName(
                parent.unwrap_or_default().to_string(),
            ));
        }
        if resource.name.contains(separator) {
            return Err(AuthzError::InvalidResourceName {
                name: resource.name.clone(),
                separator: separator.to_string(),
            });
        }

        let path = match parent {
            Some(parent) => format!("{parent}{separator}{}", resource.name),
            None => resource.name.clone(),
        };

        if !self.visited.insert(path.clone()) {
            return Err(AuthzError::DuplicatePath(path));
        }

        let builder = match &resource.policy {
            Some(spec) => {
                let policy = self.resolve_spec(spec, &path)?;
                builder.and(&[policy.expression.as_str()])
            }
            None => builder,
        };

        if !builder.is_empty() {
            let compiled = builder.compile(&self.compiler)?;

            if self.settings.debug {
                info!(path = %path, expression = compiled.source(), "Compiled resource policy");
            } else {
                debug!(path = %path, expression = compiled.source(), "Compiled resource policy");
            }

            self.compiled.insert(path.clone(), compiled);
        }

        for child in &resource.children {
            self.walk(child, Some(&path), builder.clone())?;
        }

        Ok(())
    }

    fn resolve_spec(&self, spec: &PolicySpec, path: &str) -> Result<Policy> {
        let policy = match spec {
            PolicySpec::Ref(name) if name.trim().is_empty() => {
                return Err(AuthzError::EmptyPolicySpec(path.to_string()));
            }
            PolicySpec::Ref(name) => self
                .policies
                .get(name)
                .cloned()
                .ok_or_else(|| AuthzError::PolicyNotFound(name.clone()))?,
            PolicySpec::Inline(policy) if policy.name.is_empty() && policy.expression.is_empty() => {
                return Err(AuthzError::EmptyPolicySpec(path.to_string()));
            }
            PolicySpec::Inline(policy) => match self.policies.get(&policy.name) {
                Some(registered) if !policy.name.is_empty() => registered.clone(),
                _ => self.policies.resolve(policy)?,
            },
        };

        if policy.expression.trim().is_empty() {
            return Err(AuthzError::EmptyExpression {
                path: path.to_string(),
                policy: policy.name,
            });
        }

        Ok(policy)
    }
}
