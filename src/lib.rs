//! Able language core
//!
//! A tree-walking evaluator for Able programs together with a static
//! checker. Programs arrive as AST values (see [`ast::build`]); the
//! [`interpreter::Interpreter`] runs them, and the
//! [`typechecker::TypeChecker`] reports diagnostics without running them.

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod interpreter;
pub mod typechecker;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::{InterpreterConfig, TypecheckMode};
    pub use crate::diagnostics::{Diagnostic, DiagnosticBag, Location, Severity};
    pub use crate::interpreter::{Interpreter, RuntimeError, Value};
    pub use crate::typechecker::{ModuleReport, TypeChecker, TypecheckerSession};
}
