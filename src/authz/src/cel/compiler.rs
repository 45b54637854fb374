//! CEL expression compiler with compiled program caching

use std::sync::Arc;

use cel_interpreter::objects::Value as CelValue;
use cel_interpreter::{Context, Program};
use dashmap::DashMap;

use crate::cel::{
    context::EvalContext,
    error::{CelError, Result},
};

/// Compiles CEL expressions, caching programs by source text
#[derive(Default)]
pub struct ExpressionCompiler {
    /// Compiled program cache (thread-safe)
    program_cache: DashMap<String, Arc<Program>>,
}

impl std::fmt::Debug for ExpressionCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCompiler")
            .field("cached_programs", &self.program_cache.len())
            .finish()
    }
}

impl ExpressionCompiler {
    /// Create a new compiler with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a CEL expression, returning the cached program if the same
    /// source was compiled before
    ///
    /// # Errors
    /// Returns `CelError::CompilationError` if the expression does not parse
    /// or is a constant that is not boolean
    pub fn compile(&self, expr: &str) -> Result<Arc<Program>> {
        if let Some(program) = self.program_cache.get(expr) {
            return Ok(program.clone());
        }

        let program = Program::compile(expr).map_err(|e| CelError::CompilationError {
            source_text: expr.to_string(),
            message: format!("{:?}", e),
        })?;

        // Expressions that need no variables are constant; a constant must be boolean
        if let Ok(value) = program.execute(&Context::default()) {
            if !matches!(value, CelValue::Bool(_)) {
                return Err(CelError::CompilationError {
                    source_text: expr.to_string(),
                    message: format!("expression is constant {:?}, expected a boolean", value),
                });
            }
        }

        let program = Arc::new(program);
        self.program_cache
            .insert(expr.to_string(), program.clone());

        Ok(program)
    }

    /// Number of cached programs
    pub fn cached_programs(&self) -> usize {
        self.program_cache.len()
    }

    /// Clear the compiled program cache
    pub fn clear_cache(&self) {
        self.program_cache.clear();
    }
}

/// Run a compiled program against an evaluation context
///
/// # Errors
/// Returns an error if execution fails (e.g. a missing field) or the result
/// is not boolean
pub fn execute(program: &Program, ctx: &EvalContext<'_>) -> Result<bool> {
    let cel_context = ctx.to_cel_context()?;

    let result = program
        .execute(&cel_context)
        .map_err(|e| CelError::EvaluationError(format!("{:?}", e)))?;

    match result {
        CelValue::Bool(b) => Ok(b),
        _ => Err(CelError::NonBooleanResult),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use serde_json::json;

    fn eval(expr: &str, request: serde_json::Value) -> Result<bool> {
        let compiler = ExpressionCompiler::new();
        let settings = EngineSettings::default();
        let program = compiler.compile(expr)?;
        execute(&program, &EvalContext::new(&settings).with_request(request))
    }

    #[test]
    fn test_simple_expression() {
        assert!(eval("true", json!(null)).unwrap());
        assert!(!eval("false", json!(null)).unwrap());
        assert!(eval("1 == 1", json!(null)).unwrap());
    }

    #[test]
    fn test_request_access() {
        assert!(eval(r#"Request.Name == "bar""#, json!({"Name": "bar"})).unwrap());
        assert!(!eval(r#"Request.Name == "bar""#, json!({"Name": "baz"})).unwrap());
    }

    #[test]
    fn test_missing_field_is_evaluation_error() {
        let result = eval(r#"Request.Name == "bar""#, json!({}));
        assert!(matches!(result, Err(CelError::EvaluationError(_))));
    }

    #[test]
    fn test_program_caching() {
        let compiler = ExpressionCompiler::new();

        let first = compiler.compile("true").unwrap();
        assert_eq!(compiler.cached_programs(), 1);

        let second = compiler.compile("true").unwrap();
        assert_eq!(compiler.cached_programs(), 1);
        assert!(Arc::ptr_eq(&first, &second));

        compiler.compile("false").unwrap();
        assert_eq!(compiler.cached_programs(), 2);

        compiler.clear_cache();
        assert_eq!(compiler.cached_programs(), 0);
    }

    #[test]
    fn test_compilation_error() {
        let compiler = ExpressionCompiler::new();

        let result = compiler.compile("Request.Name ==");
        assert!(matches!(result, Err(CelError::CompilationError { .. })));
        assert_eq!(compiler.cached_programs(), 0);
    }

    #[test]
    fn test_non_boolean_result() {
        let result = eval("Request.name", json!({"name": "hello"}));
        assert!(matches!(result, Err(CelError::NonBooleanResult)));
    }

    #[test]
    fn test_constant_non_boolean_is_compilation_error() {
        let compiler = ExpressionCompiler::new();

        for expr in ["'hello'", "1 + 2", "[true]", r#"{"a": true}"#] {
            let result = compiler.compile(expr);
            assert!(
                matches!(result, Err(CelError::CompilationError { .. })),
                "{expr} should not compile"
            );
        }
        assert_eq!(compiler.cached_programs(), 0);

        assert!(compiler.compile("1 + 2 == 3").is_ok());
        assert!(compiler.compile("Request.name").is_ok());
    }
}
