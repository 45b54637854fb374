//! Error types for the authorization engine

use thiserror::Error;

use crate::cel::CelError;

/// Authorization engine errors
///
/// Everything up to `CompileError` is raised while building a registry or an
/// engine and is fatal for that build. The remaining variants are request-time
/// outcomes returned to the caller.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// A policy with this name is already registered
    #[error("duplicate policy name: {0}")]
    DuplicateName(String),

    /// Two resources produce the same full path
    #[error("duplicate resource path: {0}")]
    DuplicatePath(String),

    /// A policy expression includes its own name
    #[error("policy `{0}` includes itself")]
    SelfInclude(String),

    /// An `@name` marker names a policy that is not registered yet
    #[error("policy `{policy}` includes unknown policy `{include}`")]
    UnresolvedInclude { policy: String, include: String },

    /// A string literal in a policy expression is never closed
    #[error("unterminated string literal in policy `{0}`")]
    UnterminatedQuote(String),

    /// A resource has an empty name
    #[error("resource name is empty (under `{0}`)")]
    EmptyResourceName(String),

    /// A resource name contains the path separator
    #[error("resource name `{name}` contains the path separator `{separator}`")]
    InvalidResourceName { name: String, separator: String },

    /// A resource carries a policy spec with nothing in it
    #[error("resource `{0}` has an empty policy spec")]
    EmptyPolicySpec(String),

    /// The policy resolved for a resource has a blank expression
    #[error("policy `{policy}` attached to `{path}` has an empty expression")]
    EmptyExpression { path: String, policy: String },

    /// A resource references a policy that is not registered
    #[error("policy not found: {0}")]
    PolicyNotFound(String),

    /// The accumulated expression could not be compiled
    #[error("failed to compile `{source_text}`: {message}")]
    CompileError { source_text: String, message: String },

    /// Enforcing mode and no policy is attached to the path
    #[error("no policy for path: {0}")]
    NoPolicyForPath(String),

    /// The policy denied access, or the token was rejected
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The compiled predicate failed at runtime
    #[error("policy evaluation failed: {0}")]
    EvaluationError(String),

    /// Configuration is structurally valid but semantically wrong
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file has an extension we cannot decode
    #[error("unsupported config format `{0}` (only .json, .yaml and .yml are supported)")]
    UnsupportedConfigFormat(String),

    /// YAML decoding error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    /// Whether this error is one of the two "access denied" outcomes
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::NoPolicyForPath(_))
    }
}

impl From<CelError> for AuthzError {
    fn from(err: CelError) -> Self {
        match err {
            CelError::CompilationError { source_text, message } => {
                Self::CompileError { source_text, message }
            }
            other => Self::EvaluationError(other.to_string()),
        }
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
