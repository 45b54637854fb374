//! Policy registry and `@name` include resolution
//!
//! Includes are expanded when a policy is added, so a policy can only include
//! policies that were registered before it. [`PolicyMap::from_config`]
//! registers the flat policy pool first (in file order) and then the named
//! inline policies of the resource tree (pre-order), which is the load order
//! configuration authors have to respect.

use std::collections::HashMap;
use std::ops::Range;

use tracing::debug;

use crate::config::AuthzConfig;
use crate::error::{AuthzError, Result};
use crate::types::{Policy, PolicySpec, Resource};

/// Marks an include of another policy inside an expression
pub const INCLUDE_PREFIX: char = '@';

/// Named policies with their includes already expanded
#[derive(Debug, Clone, Default)]
pub struct PolicyMap {
    policies: HashMap<String, Policy>,
}

impl PolicyMap {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry for a configuration: the policy pool, then every
    /// named inline policy in the resource tree
    pub fn from_config(config: &AuthzConfig) -> Result<Self> {
        let mut map = Self::new();

        for policy in &config.policies {
            map.add(policy.clone())?;
        }

        for resource in &config.resources {
            map.add_from_resource_tree(resource)?;
        }

        Ok(map)
    }

    /// Register a policy, expanding its includes
    ///
    /// Fails without modifying the registry if the name is taken or an
    /// include cannot be resolved.
    pub fn add(&mut self, policy: Policy) -> Result<()> {
        if policy.name.is_empty() {
            return Err(AuthzError::InvalidConfig(
                "policy name must not be empty".to_string(),
            ));
        }

        if self.policies.contains_key(&policy.name) {
            return Err(AuthzError::DuplicateName(policy.name));
        }

        let expression = self.expand_includes(&policy)?;
        debug!(policy = %policy.name, expression = %expression, "Registered policy");

        self.policies.insert(
            policy.name.clone(),
            Policy {
                expression,
                ..policy
            },
        );

        Ok(())
    }

    /// Register every named inline policy of a resource subtree, parents
    /// before children
    pub fn add_from_resource_tree(&mut self, resource: &Resource) -> Result<()> {
        if let Some(PolicySpec::Inline(policy)) = &resource.policy {
            if !policy.name.is_empty() {
                self.add(policy.clone())?;
            }
        }

        for child in &resource.children {
            self.add_from_resource_tree(child)?;
        }

        Ok(())
    }

    /// Get a registered policy by name
    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    /// Check if a policy is registered under this name
    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Iterate over registered policy names (arbitrary order)
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    /// Return a copy of `policy` with its includes expanded against this
    /// registry, without registering it
    pub fn resolve(&self, policy: &Policy) -> Result<Policy> {
        Ok(Policy {
            expression: self.expand_includes(policy)?,
            ..policy.clone()
        })
    }

    fn expand_includes(&self, policy: &Policy) -> Result<String> {
        let expression = &policy.expression;
        let includes = scan_includes(expression)
            .ok_or_else(|| AuthzError::UnterminatedQuote(policy.name.clone()))?;

        if includes.is_empty() {
            return Ok(expression.clone());
        }

        let mut expanded = String::with_capacity(expression.len());
        let mut cursor = 0;

        for include in includes {
            let name = &expression[include.name.clone()];

            if !name.is_empty() && name == policy.name {
                return Err(AuthzError::SelfInclude(policy.name.clone()));
            }

            let included = self
                .policies
                .get(name)
                .ok_or_else(|| AuthzError::UnresolvedInclude {
                    policy: policy.name.clone(),
                    include: name.to_string(),
                })?;

            expanded.push_str(&expression[cursor..include.marker.start]);
            expanded.push('(');
            expanded.push_str(&included.expression);
            expanded.push(')');
            cursor = include.marker.end;
        }

        expanded.push_str(&expression[cursor..]);
        Ok(expanded)
    }
}

/// Where the scanner currently is relative to string literals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Unquoted,
    Single,
    Double,
}

/// One `@name` occurrence, as byte ranges into the scanned expression
#[derive(Debug, Clone, PartialEq, Eq)]
struct IncludeMarker {
    /// The whole marker, prefix included
    marker: Range<usize>,
    /// Just the policy name
    name: Range<usize>,
}

/// Find include markers outside of string literals
///
/// Returns `None` if a string literal is left open at the end of the input.
fn scan_includes(expression: &str) -> Option<Vec<IncludeMarker>> {
    let mut markers = Vec::new();
    let mut state = QuoteState::Unquoted;
    let mut chars = expression.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        match state {
            QuoteState::Unquoted => match c {
                '\'' => state = QuoteState::Single,
                '"' => state = QuoteState::Double,
                INCLUDE_PREFIX => {
                    let name_start = idx + c.len_utf8();
                    let mut end = expression.len();

                    while let Some(&(next_idx, next)) = chars.peek() {
                        if next.is_whitespace() {
                            end = next_idx;
                            break;
                        }
                        chars.next();
                    }

                    markers.push(IncludeMarker {
                        marker: idx..end,
                        name: name_start..end,
                    });
                }
                _ => {}
            },
            QuoteState::Single | QuoteState::Double => match c {
                '\\' => {
                    chars.next();
                }
                '\'' if state == QuoteState::Single => state = QuoteState::Unquoted,
                '"' if state == QuoteState::Double => state = QuoteState::Unquoted,
                _ => {}
            },
        }
    }

    (state == QuoteState::Unquoted).then_some(markers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(expression: &str) -> Vec<&str> {
        scan_includes(expression)
            .unwrap()
            .into_iter()
            .map(|m| &expression[m.name])
            .collect()
    }

    #[test]
    fn test_scan_finds_markers_outside_quotes() {
        assert_eq!(names("@a && @b-c"), vec!["a", "b-c"]);
        assert_eq!(names(r#"Request.Email == "x@y.z" && @a"#), vec!["a"]);
        assert_eq!(names("Request.Email == 'x@y.z'"), Vec::<&str>::new());
        assert_eq!(names(r#""it's" == Request.s && @a"#), vec!["a"]);
    }

    #[test]
    fn test_scan_honours_escaped_quotes() {
        assert_eq!(names(r#"Request.s == "a\"@b" && @c"#), vec!["c"]);
    }

    #[test]
    fn test_scan_unterminated_quote() {
        assert!(scan_includes(r#"Request.s == "open"#).is_none());
        assert!(scan_includes("Request.s == 'open").is_none());
    }

    #[test]
    fn test_add_and_duplicate() {
        let mut map = PolicyMap::new();
        map.add(Policy::new("x", "true")).unwrap();

        let err = map.add(Policy::new("x", "false")).unwrap_err();
        assert!(matches!(err, AuthzError::DuplicateName(name) if name == "x"));
        assert_eq!(map.get("x").unwrap().expression, "true");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_include_substitution() {
        let mut map = PolicyMap::new();
        map.add(Policy::new("x", "1==1")).unwrap();
        map.add(Policy::new("y", "@x && true")).unwrap();

        assert_eq!(map.get("y").unwrap().expression, "(1==1) && true");
    }

    #[test]
    fn test_transitive_include() {
        let mut map = PolicyMap::new();
        map.add(Policy::new("a", "InRealmRole('admin')")).unwrap();
        map.add(Policy::new("b", "@a || false")).unwrap();
        map.add(Policy::new("c", "@b && @a")).unwrap();

        assert_eq!(
            map.get("c").unwrap().expression,
            "((InRealmRole('admin')) || false) && (InRealmRole('admin'))"
        );
    }

    #[test]
    fn test_self_include() {
        let mut map = PolicyMap::new();
        let err = map.add(Policy::new("x", "@x")).unwrap_err();
        assert!(matches!(err, AuthzError::SelfInclude(name) if name == "x"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_forward_reference_is_unresolved() {
        let mut map = PolicyMap::new();
        let err = map.add(Policy::new("a", "@b")).unwrap_err();
        assert!(matches!(
            err,
            AuthzError::UnresolvedInclude { policy, include } if policy == "a" && include == "b"
        ));
    }

    #[test]
    fn test_unterminated_quote_error() {
        let mut map = PolicyMap::new();
        let err = map.add(Policy::new("q", "Request.s == 'x")).unwrap_err();
        assert!(matches!(err, AuthzError::UnterminatedQuote(name) if name == "q"));
    }

    #[test]
    fn test_add_from_resource_tree_is_preorder() {
        let tree = Resource::new("root")
            .with_policy(Policy::new("parent", "true"))
            .with_child(
                Resource::new("plain").with_child(
                    Resource::new("leaf").with_policy(Policy::new("child", "@parent")),
                ),
            );

        let mut map = PolicyMap::new();
        map.add_from_resource_tree(&tree).unwrap();

        assert!(map.contains("parent"));
        assert_eq!(map.get("child").unwrap().expression, "(true)");
    }

    #[test]
    fn test_unnamed_inline_policy_is_not_registered() {
        let tree = Resource::new("root").with_policy(Policy::new("", "true"));

        let mut map = PolicyMap::new();
        map.add_from_resource_tree(&tree).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_resolve_does_not_register() {
        let mut map = PolicyMap::new();
        map.add(Policy::new("x", "true")).unwrap();

        let resolved = map.resolve(&Policy::new("", "@x && false")).unwrap();
        assert_eq!(resolved.expression, "(true) && false");
        assert_eq!(map.len(), 1);
    }
}
