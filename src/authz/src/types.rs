//! Policy and resource definitions as they appear in configuration

use serde::{Deserialize, Serialize};

/// A named, reusable boolean expression over claims and request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Unique policy name (inline policies may leave it empty)
    #[serde(default)]
    pub name: String,

    /// Human readable description
    #[serde(default)]
    pub description: String,

    /// CEL expression, optionally containing `@name` includes
    #[serde(default)]
    pub expression: String,
}

impl Policy {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            expression: expression.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Policy attached to a resource: either a reference to a registered policy
/// or a policy defined in place
///
/// In YAML/JSON a plain string is a reference and a mapping is an inline
/// policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicySpec {
    Ref(String),
    Inline(Policy),
}

impl PolicySpec {
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Ref(name.into())
    }

    /// The inline policy, if this spec defines one
    pub fn as_inline(&self) -> Option<&Policy> {
        match self {
            Self::Inline(policy) => Some(policy),
            Self::Ref(_) => None,
        }
    }
}

impl From<Policy> for PolicySpec {
    fn from(policy: Policy) -> Self {
        Self::Inline(policy)
    }
}

/// A node in the protected resource hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Path segment of this resource
    pub name: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicySpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Resource>,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_policy(mut self, policy: impl Into<PolicySpec>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    pub fn with_policy_ref(self, name: impl Into<String>) -> Self {
        self.with_policy(PolicySpec::reference(name))
    }

    pub fn with_child(mut self, child: Resource) -> Self {
        self.children.push(child);
        self
    }
}
