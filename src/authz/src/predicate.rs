//! Predicate building and compiled policies
//!
//! [`PolicyBuilder`] is a plain value: every combinator consumes the builder
//! and returns a new one, so the same state can be handed down several
//! branches of the resource tree without them seeing each other's changes.

use std::fmt;
use std::sync::Arc;

use cel_interpreter::Program;

use crate::cel::{self, EvalContext, ExpressionCompiler};
use crate::error::{AuthzError, Result};

/// Incrementally combines policy expressions with `&&` and `||`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyBuilder {
    current_expr: String,
}

impl PolicyBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder starting from a base expression
    pub fn with_base(expr: impl Into<String>) -> Self {
        Self {
            current_expr: expr.into(),
        }
    }

    /// Conjoin the given fragments with the current expression
    ///
    /// Empty fragments are skipped. On an empty builder the joined fragments
    /// become the expression.
    pub fn and<S: AsRef<str>>(self, exprs: &[S]) -> Self {
        self.combine(exprs, "&&", true)
    }

    /// Disjoin the given fragments with the current expression
    ///
    /// An empty builder stays empty: there is nothing to OR against.
    pub fn or<S: AsRef<str>>(self, exprs: &[S]) -> Self {
        self.combine(exprs, "||", false)
    }

    /// True until a non-empty fragment has been added
    pub fn is_empty(&self) -> bool {
        self.current_expr.is_empty()
    }

    /// The accumulated expression text
    pub fn expression(&self) -> &str {
        &self.current_expr
    }

    /// Compile the accumulated expression
    pub fn compile(&self, compiler: &ExpressionCompiler) -> Result<CompiledPolicy> {
        let program = compiler.compile(&self.current_expr)?;

        Ok(CompiledPolicy {
            source: Arc::from(self.current_expr.as_str()),
            program,
        })
    }

    fn combine<S: AsRef<str>>(mut self, exprs: &[S], op: &str, seeds_empty: bool) -> Self {
        let joined = exprs
            .iter()
            .map(AsRef::as_ref)
            .filter(|expr| !expr.is_empty())
            .map(|expr| format!("({expr})"))
            .collect::<Vec<_>>()
            .join(&format!(" {op} "));

        if joined.is_empty() {
            return self;
        }

        if self.current_expr.is_empty() {
            if seeds_empty {
                self.current_expr = joined;
            }
        } else {
            self.current_expr = format!("({}) {op} {joined}", self.current_expr);
        }

        self
    }
}

/// An expression compiled once and evaluated many times
///
/// Cloning is cheap; the program is shared.
#[derive(Clone)]
pub struct CompiledPolicy {
    source: Arc<str>,
    program: Arc<Program>,
}

impl CompiledPolicy {
    /// The expression this policy was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against an environment
    ///
    /// `Ok(())` means allowed, `Unauthorized` means the expression was false,
    /// any other error means the expression could not be evaluated.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<()> {
        if cel::execute(&self.program, ctx)? {
            Ok(())
        } else {
            Err(AuthzError::Unauthorized(format!(
                "policy `{}` denied access",
                self.source
            )))
        }
    }
}

impl fmt::Debug for CompiledPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPolicy")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
