//! Standard runtime errors raised by arithmetic.
//!
//! Each error resolves to a struct definition by name: first the current
//! scope, then the core error package, then any registered package. Failing
//! all of those a placeholder definition is synthesized. The resolution is
//! cached per interpreter.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::build::{struct_def, ty};
use crate::ast::IntegerKind;

use super::error::{RuntimeError, Signal};
use super::numeric::ArithmeticError;
use super::value::*;
use super::Interpreter;

/// Package the standard library defines its error structs in
pub const CORE_ERRORS_PACKAGE: &str = "able.core.errors";

pub const DIVISION_BY_ZERO: &str = "DivisionByZeroError";
pub const OVERFLOW: &str = "OverflowError";
pub const SHIFT_OUT_OF_RANGE: &str = "ShiftOutOfRangeError";

#[derive(Debug, Default)]
pub(crate) struct StandardErrors {
    cache: HashMap<&'static str, Rc<StructDefValue>>,
}

impl Interpreter {
    fn standard_error_def(&mut self, name: &'static str, fields: &[(&str, &str)]) -> Rc<StructDefValue> {
        if let Some(def) = self.standard_errors.cache.get(name) {
            return def.clone();
        }
        let def = self
            .resolve_standard_error(name)
            .unwrap_or_else(|| {
                Rc::new(StructDefValue {
                    def: struct_def(name, fields.iter().map(|(f, t)| (*f, ty(*t))).collect()),
                    package: None,
                })
            });
        self.standard_errors.cache.insert(name, def.clone());
        def
    }

    fn resolve_standard_error(&self, name: &str) -> Option<Rc<StructDefValue>> {
        if let Some(Value::StructDef(def)) = self.globals.lookup(name) {
            return Some(def);
        }
        let core = self
            .packages
            .get(CORE_ERRORS_PACKAGE)
            .and_then(|entry| entry.symbol(name));
        if let Some(symbol) = core {
            if let Value::StructDef(def) = &symbol.value {
                return Some(def.clone());
            }
        }
        self.packages.entries().find_map(|entry| match entry.symbol(name) {
            Some(symbol) => match &symbol.value {
                Value::StructDef(def) => Some(def.clone()),
                _ => None,
            },
            None => None,
        })
    }

    /// Build a standard error struct and wrap it as a raised error value
    fn standard_error(
        &mut self,
        name: &'static str,
        message: String,
        payload: Vec<(&'static str, &'static str, Value)>,
    ) -> Value {
        let schema: Vec<(&str, &str)> = payload.iter().map(|(f, t, _)| (*f, *t)).collect();
        let def = self.standard_error_def(name, &schema);
        let fields = def
            .def
            .fields
            .iter()
            .map(|field| {
                payload
                    .iter()
                    .find(|(f, _, _)| field.name.as_deref() == Some(*f))
                    .map(|(_, _, v)| v.clone())
                    .unwrap_or(Value::Nil)
            })
            .collect();
        let instance = Value::Struct(StructInstance { def, fields });
        Value::error(message, Some(instance))
    }

    /// Convert an arithmetic failure into the signal evaluation unwinds with
    pub(crate) fn arithmetic_signal(&mut self, error: ArithmeticError) -> Signal {
        match error {
            ArithmeticError::DivisionByZero => Signal::Raise(self.standard_error(
                DIVISION_BY_ZERO,
                "division by zero".to_string(),
                Vec::new(),
            )),
            ArithmeticError::Overflow { operation } => {
                let message = format!("integer overflow in '{}'", operation);
                Signal::Raise(self.standard_error(
                    OVERFLOW,
                    message,
                    vec![("operation", "String", Value::String(operation))],
                ))
            }
            ArithmeticError::ShiftOutOfRange { shift } => Signal::Raise(self.standard_error(
                SHIFT_OUT_OF_RANGE,
                format!("shift out of range: {}", shift),
                vec![(
                    "shift",
                    "i64",
                    Value::Integer {
                        kind: IntegerKind::I64,
                        value: shift as i128,
                    },
                )],
            )),
            ArithmeticError::Unsupported {
                operation,
                left,
                right,
            } => {
                let got = if right.is_empty() {
                    left
                } else {
                    format!("{} and {}", left, right)
                };
                Signal::Error(RuntimeError::type_mismatch(
                    &format!("numeric operands for '{}'", operation),
                    &got,
                ))
            }
        }
    }
}
