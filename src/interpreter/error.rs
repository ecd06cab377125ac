//! Runtime errors and control-flow signals for the Able interpreter.

use std::fmt;

use crate::diagnostics::error_codes::runtime as codes;
use crate::diagnostics::DiagnosticBag;

use super::value::{format_value, Value};

/// A hard runtime failure that aborts evaluation and cannot be rescued
#[derive(Debug, Clone, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct RuntimeError {
    /// Error code (R0xxx series)
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
    /// The raised value, for raises nobody rescued
    pub raised: Option<Value>,
}

impl miette::Diagnostic for RuntimeError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }
}

impl RuntimeError {
    /// Create a new runtime error
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            raised: None,
        }
    }

    /// Undefined identifier error
    pub fn undefined_identifier(name: &str) -> Self {
        Self::new(
            codes::UNDEFINED_IDENTIFIER,
            format!("Undefined variable '{}'", name),
        )
    }

    /// Method lookup and UFCS fallback both failed
    pub fn no_method(receiver: &str, method: &str) -> Self {
        Self::new(
            codes::NO_METHOD,
            format!(
                "No method '{}' for {} and no matching free function",
                method, receiver
            ),
        )
    }

    /// No static method on a struct definition
    pub fn no_static_method(type_name: &str, method: &str) -> Self {
        Self::new(
            codes::NO_METHOD,
            format!("No static method '{}' for {}", method, type_name),
        )
    }

    /// Private method called from outside
    pub fn private_method(type_name: &str, method: &str) -> Self {
        Self::new(
            codes::NO_METHOD,
            format!("Method '{}' on {} is private", method, type_name),
        )
    }

    /// Destructuring failed
    pub fn pattern_mismatch(context: &str, value: &Value) -> Self {
        Self::new(
            codes::PATTERN_MISMATCH,
            format!(
                "pattern mismatch in {}: cannot destructure {} ({})",
                context,
                format_value(value),
                value.type_name()
            ),
        )
    }

    /// Type mismatch error
    pub fn type_mismatch(expected: &str, got: &str) -> Self {
        Self::new(
            codes::TYPE_MISMATCH,
            format!("type mismatch: expected {}, got {}", expected, got),
        )
    }

    /// Not callable error
    pub fn not_callable(value: &Value) -> Self {
        Self::new(
            codes::NOT_CALLABLE,
            format!("value of type {} is not callable", value.type_name()),
        )
    }

    /// Arity mismatch error
    pub fn arity_mismatch(name: &str, expected: usize, got: usize) -> Self {
        Self::new(
            codes::ARITY_MISMATCH,
            format!("{} expects {} arguments, got {}", name, expected, got),
        )
    }

    /// Break, continue, return or rethrow used where nothing can catch it
    pub fn invalid_control_flow(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_CONTROL_FLOW, message)
    }

    /// Import or package member resolution failure
    pub fn import(message: impl Into<String>) -> Self {
        Self::new(codes::IMPORT_FAILURE, format!("Import error: {}", message.into()))
    }

    /// Invalid assignment target
    pub fn invalid_assignment(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_ASSIGNMENT, message)
    }

    /// Unknown or missing struct field
    pub fn unknown_field(type_name: &str, field: &str) -> Self {
        Self::new(
            codes::UNKNOWN_FIELD,
            format!("{} has no field '{}'", type_name, field),
        )
    }

    /// Scheduler failure (budget exhausted, await that can never settle)
    pub fn scheduler(message: impl Into<String>) -> Self {
        Self::new(codes::SCHEDULER, message)
    }

    /// A raise that reached the top level
    pub fn uncaught(value: Value) -> Self {
        let message = match &value {
            Value::Error(err) => err.message.clone(),
            other => format_value(other),
        };
        Self {
            code: codes::UNCAUGHT_RAISE,
            message,
            raised: Some(value),
        }
    }

    /// Static checking refused the module
    pub fn typecheck_failed(diagnostics: &DiagnosticBag) -> Self {
        let messages: Vec<&str> = diagnostics.messages().collect();
        Self::new(
            codes::TYPECHECK_FAILED,
            format!(
                "typecheck failed with {} error(s): {}",
                diagnostics.error_count(),
                messages.join("; ")
            ),
        )
    }
}

/// Non-normal completion of an evaluation step
#[derive(Debug, Clone)]
pub enum Signal {
    Break {
        label: Option<String>,
        value: Value,
    },
    Continue {
        label: Option<String>,
    },
    Return(Value),
    /// A raised error value, catchable by `rescue`
    Raise(Value),
    /// The running task is waiting on a pending future
    Suspend,
    /// A hard failure
    Error(RuntimeError),
}

impl From<RuntimeError> for Signal {
    fn from(error: RuntimeError) -> Self {
        Signal::Error(error)
    }
}

/// Result of evaluating a node: `Ok` is normal completion
pub type EvalResult<T = Value> = Result<T, Signal>;

/// Check that `args` has exactly `expected` elements, returning an arity error if not.
pub fn check_arity<T>(name: &str, args: &[T], expected: usize) -> Result<(), RuntimeError> {
    if args.len() != expected {
        Err(RuntimeError::arity_mismatch(name, expected, args.len()))
    } else {
        Ok(())
    }
}
