//! CEL (Common Expression Language) backend for policy expressions
//!
//! Policies are plain CEL text. Each evaluation sees three variables,
//! `Claims`, `Request` and `Config`, plus the role helpers from
//! [`functions`].

pub mod compiler;
pub mod context;
pub mod convert;
pub mod error;
pub mod functions;

pub use compiler::{execute, ExpressionCompiler};
pub use context::EvalContext;
pub use error::{CelError, Result};
