//! Built-in natives, kernel intrinsics and host-provided extern functions.

use std::collections::HashMap;

use crate::ast::*;

use super::environment::Environment;
use super::error::{check_arity, EvalResult, RuntimeError, Signal};
use super::numeric::ArithmeticError;
use super::value::*;
use super::Interpreter;

/// Extern functions the runtime provides itself; these may have empty bodies
pub const KERNEL_EXTERNS: &[&str] = &[
    "__able_array_size",
    "__able_char_from_codepoint",
    "__able_char_to_codepoint",
    "__able_string_length",
    "__able_raise_division_by_zero",
    "__able_print",
];

pub fn is_kernel_extern(name: &str) -> bool {
    KERNEL_EXTERNS.contains(&name)
}

/// Host functions registered for extern declarations, keyed by (target, name)
#[derive(Default)]
pub(crate) struct HostFunctions {
    functions: HashMap<(String, String), NativeFn>,
}

impl HostFunctions {
    pub fn insert(&mut self, target: &str, name: &str, func: NativeFn) {
        self.functions
            .insert((target.to_string(), name.to_string()), func);
    }

    pub fn get(&self, target: &str, name: &str) -> Option<NativeFn> {
        self.functions
            .get(&(target.to_string(), name.to_string()))
            .cloned()
    }
}

fn i32_value(value: usize) -> Value {
    Value::Integer {
        kind: IntegerKind::I32,
        value: value as i128,
    }
}

impl Interpreter {
    /// Install global natives
    pub(crate) fn install_builtins(&mut self) {
        self.globals.define(
            "print",
            Value::native("print", None, |interp, args| {
                let mut parts = Vec::with_capacity(args.len());
                for arg in &args {
                    parts.push(interp.stringify(arg)?);
                }
                let line = parts.join(" ");
                println!("{}", line);
                interp.output.push(line);
                Ok(Value::Nil)
            }),
        );
        self.globals.define(
            "Error",
            Value::native("Error", Some(1), |interp, args| {
                let message = interp.stringify(&args[0])?;
                Ok(Value::error(message, None))
            }),
        );
        self.install_concurrency_builtins();
    }

    /// A kernel intrinsic implementation, if `name` is one
    fn kernel_intrinsic(&self, name: &str) -> Option<Value> {
        let value = match name {
            "__able_array_size" => Value::native(name, Some(1), |_, args| match &args[0] {
                Value::Array(items) => Ok(i32_value(items.len())),
                other => Err(RuntimeError::type_mismatch("Array", &other.type_name()).into()),
            }),
            "__able_string_length" => Value::native(name, Some(1), |_, args| match &args[0] {
                Value::String(s) => Ok(i32_value(s.chars().count())),
                other => Err(RuntimeError::type_mismatch("String", &other.type_name()).into()),
            }),
            "__able_char_from_codepoint" => Value::native(name, Some(1), |_, args| {
                match &args[0] {
                    Value::Integer { value, .. } => u32::try_from(*value)
                        .ok()
                        .and_then(char::from_u32)
                        .map(Value::Char)
                        .ok_or_else(|| {
                            Signal::Raise(Value::error(
                                format!("invalid code point {}", value),
                                None,
                            ))
                        }),
                    other => Err(RuntimeError::type_mismatch("integer", &other.type_name()).into()),
                }
            }),
            "__able_char_to_codepoint" => Value::native(name, Some(1), |_, args| match &args[0] {
                Value::Char(c) => Ok(i32_value(*c as usize)),
                other => Err(RuntimeError::type_mismatch("char", &other.type_name()).into()),
            }),
            "__able_raise_division_by_zero" => Value::native(name, Some(0), |interp, _| {
                Err(interp.arithmetic_signal(ArithmeticError::DivisionByZero))
            }),
            "__able_print" => Value::native(name, Some(1), |interp, args| {
                let line = interp.stringify(&args[0])?;
                println!("{}", line);
                interp.output.push(line);
                Ok(Value::Nil)
            }),
            _ => return None,
        };
        Some(value)
    }

    /// Register a host implementation for `extern <target> fn <name>`
    pub fn register_host_function(
        &mut self,
        target: &str,
        name: &str,
        func: impl Fn(&mut Interpreter, Vec<Value>) -> Result<Value, Signal> + 'static,
    ) {
        self.hosts.insert(target, name, std::rc::Rc::new(func));
    }

    /// Evaluate an extern function declaration
    pub(crate) fn eval_extern(&mut self, def: &ExternFunctionBody, env: &Environment) -> EvalResult {
        let name = def.signature.name.clone();
        if env.lookup(&name).is_some() {
            return Ok(Value::Nil);
        }
        let arity = def.signature.params.len();
        let value = if def.body.trim().is_empty() {
            match self.kernel_intrinsic(&name) {
                Some(intrinsic) => intrinsic,
                None => {
                    return Err(Signal::Raise(Value::error(
                        format!(
                            "extern function {} for {} must provide a host body",
                            name, def.target
                        ),
                        None,
                    )))
                }
            }
        } else if let Some(host) = self.hosts.get(&def.target, &name) {
            Value::Native(std::rc::Rc::new(NativeFunction {
                name: name.clone(),
                arity: Some(arity),
                func: host,
            }))
        } else {
            let target = def.target.clone();
            let missing = name.clone();
            Value::native(name.clone(), Some(arity), move |interp, args| {
                // Hosts may register after the declaration was evaluated
                match interp.hosts.get(&target, &missing) {
                    Some(host) => host(interp, args),
                    None => Err(Signal::Raise(Value::error(
                        format!(
                            "no host implementation registered for extern function {} for {}",
                            missing, target
                        ),
                        None,
                    ))),
                }
            })
        };
        env.define(name, value);
        Ok(Value::Nil)
    }

    /// Call a native after checking its arity
    pub(crate) fn call_native(&mut self, native: &NativeFunction, args: Vec<Value>) -> EvalResult {
        if let Some(arity) = native.arity {
            check_arity(&native.name, &args, arity)?;
        }
        (native.func)(self, args)
    }
}
