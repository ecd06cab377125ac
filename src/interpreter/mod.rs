//! Interpreter for Able programs
//!
//! A tree-walking evaluator over the AST in [`crate::ast`]. Evaluation of a
//! node yields `Result<Value, Signal>`: `Ok` is normal completion, and every
//! non-local exit (break, continue, return, raise, task suspension, hard
//! failure) travels outward as a [`Signal`]. The public entry points convert
//! leftover signals into a [`RuntimeError`].

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::*;
use crate::config::InterpreterConfig;
use crate::typechecker::TypecheckerSession;

mod assignment;
mod control;
mod definitions;
pub mod environment;
pub mod error;
pub mod fixture;
mod kernel;
pub mod methods;
pub mod numeric;
pub mod packages;
mod pattern;
pub mod scheduler;
mod standard_errors;
pub mod value;

pub use environment::Environment;
pub use error::{EvalResult, RuntimeError, Signal};
pub use kernel::{is_kernel_extern, KERNEL_EXTERNS};
pub use methods::{ImplementationEntry, MethodRegistry};
pub use packages::{PackageEntry, PackageRegistry, PackageSymbol, Visibility};
pub use standard_errors::{CORE_ERRORS_PACKAGE, DIVISION_BY_ZERO, OVERFLOW, SHIFT_OUT_OF_RANGE};
pub use value::*;

use kernel::HostFunctions;
use scheduler::{ExecutionContext, Executor, Frame};
use standard_errors::StandardErrors;

/// Interpreter for Able programs
pub struct Interpreter {
    /// Global environment; root modules evaluate here
    globals: Environment,
    config: InterpreterConfig,
    /// Inherent methods and interface implementations
    methods: MethodRegistry,
    packages: PackageRegistry,
    /// Module scope of each package, shared by all of its modules
    package_envs: HashMap<String, Environment>,
    executor: Executor,
    /// State of the running task (or of the top level)
    context: ExecutionContext,
    standard_errors: StandardErrors,
    hosts: HostFunctions,
    /// Package of the code currently running: the module being evaluated,
    /// or the defining package of the innermost function call
    current_package: Option<String>,
    /// Lines written by `print`
    output: Vec<String>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Create a new interpreter with default configuration
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    /// Create an interpreter with specific configuration
    pub fn with_config(config: InterpreterConfig) -> Self {
        let mut interpreter = Self {
            globals: Environment::new(),
            config,
            methods: MethodRegistry::new(),
            packages: PackageRegistry::new(),
            package_envs: HashMap::new(),
            executor: Executor::new(),
            context: ExecutionContext::default(),
            standard_errors: StandardErrors::default(),
            hosts: HostFunctions::default(),
            current_package: None,
            output: Vec::new(),
        };
        interpreter.install_builtins();
        interpreter
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn packages(&self) -> &PackageRegistry {
        &self.packages
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    /// Lines printed so far
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Evaluate a statement in the global environment
    pub fn evaluate(&mut self, stmt: &Stmt) -> Result<Value, RuntimeError> {
        let env = self.globals.clone();
        self.evaluate_in(stmt, &env)
    }

    /// Evaluate a statement in a caller-supplied environment
    pub fn evaluate_in(&mut self, stmt: &Stmt, env: &Environment) -> Result<Value, RuntimeError> {
        finish(self.eval_stmt(stmt, env))
    }

    /// Evaluate an expression in the global environment
    pub fn evaluate_expression(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let env = self.globals.clone();
        finish(self.eval_expr(expr, &env))
    }

    /// Evaluate a module: register its package, bind its imports, then run
    /// its body. Returns the value of the last statement.
    pub fn evaluate_module(&mut self, module: &Module) -> Result<Value, RuntimeError> {
        let package = module.package_name();
        let env = match &package {
            Some(name) => {
                self.packages.register(name, &module.origin)?;
                let globals = self.globals.clone();
                self.package_envs
                    .entry(name.clone())
                    .or_insert_with(|| globals.child())
                    .clone()
            }
            None => self.globals.clone(),
        };
        tracing::debug!(
            package = package.as_deref().unwrap_or("<root>"),
            statements = module.body.len(),
            "evaluating module"
        );

        let previous = std::mem::replace(&mut self.current_package, package);
        let result = self.evaluate_module_body(module, &env);
        self.current_package = previous;
        result
    }

    fn evaluate_module_body(&mut self, module: &Module, env: &Environment) -> Result<Value, RuntimeError> {
        for import in &module.imports {
            self.import_package(import, env)?;
        }
        let mut last = Value::Nil;
        for stmt in &module.body {
            last = finish(self.eval_stmt(stmt, env))?;
            self.export_definition(stmt, env);
        }
        Ok(last)
    }

    /// Publish a top-level definition of the current package's module.
    /// Nested definitions stay local to their block.
    fn export_definition(&mut self, stmt: &Stmt, env: &Environment) {
        let Some(package) = self.current_package.clone() else {
            return;
        };
        let (name, is_private) = match stmt {
            Stmt::Function(def) => (&def.name, def.is_private),
            Stmt::Struct(def) => (&def.name, def.is_private),
            Stmt::Interface(def) => (&def.name, def.is_private),
            Stmt::Extern(def) => (&def.signature.name, false),
            _ => return,
        };
        if let Some(value) = env.lookup(name) {
            self.packages
                .define(&package, name, value, Visibility::from_private(is_private));
        }
    }

    /// Check a module with `session`, then evaluate it according to the
    /// configured typecheck mode
    pub fn run_checked_module(
        &mut self,
        module: &Module,
        session: &mut TypecheckerSession,
    ) -> Result<Value, RuntimeError> {
        let mode = self.config.typecheck.mode;
        if mode.runs_checker() {
            let report = session.check_module(module);
            for diagnostic in report.diagnostics.diagnostics() {
                tracing::warn!(code = %diagnostic.code, "{}", diagnostic.message);
            }
            if mode.is_fatal(&report.diagnostics) {
                return Err(RuntimeError::typecheck_failed(&report.diagnostics));
            }
        }
        self.evaluate_module(module)
    }

    /// Call any callable value from host code
    pub fn call(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        finish(self.call_value(callee, args))
    }

    /// Evaluate a statement
    pub(crate) fn eval_stmt(&mut self, stmt: &Stmt, env: &Environment) -> EvalResult {
        match stmt {
            Stmt::Expr(expr) => self.eval_expr(expr, env),
            Stmt::Function(def) => {
                let function = Value::Function(Rc::new(FunctionValue::from_definition(
                    def,
                    env.clone(),
                    self.current_package.clone(),
                )));
                env.define(def.name.clone(), function.clone());
                Ok(function)
            }
            Stmt::Struct(def) => self.eval_struct_definition(def, env),
            Stmt::Interface(def) => self.eval_interface_definition(def, env),
            Stmt::Implementation(def) => self.eval_implementation(def, env),
            Stmt::Methods(def) => self.eval_methods(def, env),
            Stmt::TypeAlias(def) => {
                let key = qualified_key(self.current_package.as_deref(), &def.name);
                self.methods.register_alias(&key, def.target.clone());
                Ok(Value::Nil)
            }
            Stmt::Union(def) => {
                let key = qualified_key(self.current_package.as_deref(), &def.name);
                self.methods.register_union(&key, def.variants.clone());
                Ok(Value::Nil)
            }
            Stmt::Extern(def) => self.eval_extern(def, env),
            Stmt::DynImport(import) => {
                self.dynimport_package(import, env)?;
                Ok(Value::Nil)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Nil,
                };
                Err(Signal::Return(value))
            }
            Stmt::Break { label, value } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Nil,
                };
                Err(Signal::Break {
                    label: label.clone(),
                    value,
                })
            }
            Stmt::Continue { label } => Err(Signal::Continue {
                label: label.clone(),
            }),
            Stmt::Raise(expr) => {
                let value = self.eval_expr(expr, env)?;
                Err(Signal::Raise(self.to_error_value(value)?))
            }
            Stmt::Rethrow => match self.context.raise_stack.last() {
                Some(error) => Err(Signal::Raise(error.clone())),
                None => Err(RuntimeError::invalid_control_flow("rethrow outside rescue").into()),
            },
            Stmt::While(looped) => self.eval_while(looped, env),
            Stmt::For(looped) => self.eval_for(looped, env),
        }
    }

    /// Evaluate an expression
    pub(crate) fn eval_expr(&mut self, expr: &Expr, env: &Environment) -> EvalResult {
        match expr {
            Expr::Integer { value, kind } => {
                numeric::checked_integer(kind.unwrap_or(IntegerKind::I32), *value, "literal")
                    .map_err(|e| self.arithmetic_signal(e))
            }
            Expr::Float { value, kind } => Ok(Value::Float {
                kind: kind.unwrap_or(FloatKind::F64),
                value: *value,
            }),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Char(c) => Ok(Value::Char(*c)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Nil => Ok(Value::Nil),
            Expr::Identifier(ident) => self.lookup_identifier(&ident.name, env),
            Expr::Array { id, elements } => {
                let elements: Vec<&Expr> = elements.iter().collect();
                Ok(Value::Array(self.eval_operands(*id, &elements, env)?))
            }
            Expr::Interpolation { id, parts } => {
                let parts: Vec<&Expr> = parts.iter().collect();
                let values = self.eval_operands(*id, &parts, env)?;
                let mut out = String::new();
                for value in &values {
                    match self.stringify(value) {
                        Ok(text) => out.push_str(&text),
                        Err(Signal::Suspend) => {
                            self.save_frame(*id, Frame::Operands(values.clone()));
                            return Err(Signal::Suspend);
                        }
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::String(out))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand, env)?;
                match (op, value.concrete()) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Not, other) => {
                        Err(RuntimeError::type_mismatch("bool", &other.type_name()).into())
                    }
                    (_, operand) => numeric::unary(*op, operand).map_err(|e| self.arithmetic_signal(e)),
                }
            }
            Expr::Binary { id, op, left, right } => self.eval_binary(*id, *op, left, right, env),
            Expr::Call(call) => self.eval_call(call, env),
            Expr::Member { object, member } => {
                let object = self.eval_expr(object, env)?;
                self.member_access(&object, member, env)
            }
            Expr::Index { id, object, index } => {
                let values = self.eval_operands(*id, &[object.as_ref(), index.as_ref()], env)?;
                index_value(&values[0], &values[1])
            }
            Expr::Block(block) => self.eval_block(block, env),
            Expr::Assign(assignment) => self.eval_assignment(assignment, env),
            Expr::If(expr) => self.eval_if(expr, env),
            Expr::Match(expr) => self.eval_match(expr, env),
            Expr::Lambda(lambda) => Ok(Value::Function(Rc::new(FunctionValue {
                name: "<lambda>".to_string(),
                params: lambda.params.clone(),
                body: FunctionBody::Expr(lambda.body.clone()),
                closure: env.clone(),
                is_private: false,
                package: self.current_package.clone(),
            }))),
            Expr::StructLiteral(literal) => self.eval_struct_literal(literal, env),
            Expr::Range {
                id,
                start,
                end,
                inclusive,
            } => {
                let bounds = self.eval_operands(*id, &[start.as_ref(), end.as_ref()], env)?;
                range_value(&bounds[0], &bounds[1], *inclusive)
            }
            Expr::Rescue(expr) => self.eval_rescue(expr, env),
            Expr::Breakpoint { label, body } => self.eval_breakpoint(label, body, env),
            Expr::Spawn(body) => Ok(self.spawn_task((**body).clone(), env)),
            Expr::Await { id, future } => {
                let handle = match self.take_frame(*id) {
                    Some(Frame::Awaiting(handle)) => handle,
                    _ => match self.eval_expr(future, env)? {
                        Value::Future(handle) => handle,
                        other => {
                            return Err(
                                RuntimeError::type_mismatch("Future", &other.type_name()).into()
                            )
                        }
                    },
                };
                match self.await_future(&handle) {
                    Err(Signal::Suspend) => {
                        self.save_frame(*id, Frame::Awaiting(handle));
                        Err(Signal::Suspend)
                    }
                    other => other,
                }
            }
        }
    }

    /// Read a name, resolving `dynimport` references against the registry
    fn lookup_identifier(&self, name: &str, env: &Environment) -> EvalResult {
        match env.lookup(name) {
            Some(Value::DynRef { package, name }) => Ok(self.resolve_dyn_member(&package, &name)?),
            Some(value) => Ok(value),
            None => Err(RuntimeError::undefined_identifier(name).into()),
        }
    }

    fn eval_binary(
        &mut self,
        id: NodeId,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        env: &Environment,
    ) -> EvalResult {
        if !matches!(op, BinaryOp::And | BinaryOp::Or) {
            let values = self.eval_operands(id, &[left, right], env)?;
            return self.apply_binary(op, &values[0], &values[1]);
        }
        let lhs = match self.take_frame(id) {
            Some(Frame::Operands(mut values)) if !values.is_empty() => values.swap_remove(0),
            _ => self.eval_expr(left, env)?,
        };
        let lhs_truth = expect_bool(lhs.clone(), op)?;
        // Short-circuit
        if (op == BinaryOp::And) != lhs_truth {
            return Ok(Value::Bool(lhs_truth));
        }
        match self.eval_expr(right, env) {
            Ok(rhs) => Ok(Value::Bool(expect_bool(rhs, op)?)),
            Err(Signal::Suspend) => {
                self.save_frame(id, Frame::Operands(vec![lhs]));
                Err(Signal::Suspend)
            }
            Err(other) => Err(other),
        }
    }

    /// Evaluate callee and arguments, then call. A call that suspends keeps
    /// its evaluated operands so resuming re-enters the callee directly.
    fn eval_call(&mut self, call: &CallExpr, env: &Environment) -> EvalResult {
        let mut operands: Vec<&Expr> = Vec::with_capacity(call.args.len() + 1);
        operands.push(&call.callee);
        operands.extend(call.args.iter());
        let mut args = self.eval_operands(call.id, &operands, env)?;
        let callee = args.remove(0);
        let saved = self.context.in_task.then(|| {
            let mut saved = Vec::with_capacity(args.len() + 1);
            saved.push(callee.clone());
            saved.extend(args.iter().cloned());
            saved
        });
        match self.call_value(callee, args) {
            Err(Signal::Suspend) => {
                if let Some(saved) = saved {
                    self.save_frame(call.id, Frame::Operands(saved));
                }
                Err(Signal::Suspend)
            }
            other => other,
        }
    }

    /// Apply a non-short-circuit binary operator to evaluated operands
    pub(crate) fn apply_binary(&mut self, op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
        let (left, right) = (left.concrete(), right.concrete());
        match (op, left, right) {
            (BinaryOp::Eq, _, _) => Ok(Value::Bool(values_equal(left, right))),
            (BinaryOp::Ne, _, _) => Ok(Value::Bool(!values_equal(left, right))),
            (BinaryOp::Add, Value::String(a), Value::String(b)) => {
                Ok(Value::String(format!("{}{}", a, b)))
            }
            (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge, _, _)
                if !numeric::is_numeric(left) =>
            {
                let ordering = match (left, right) {
                    (Value::String(a), Value::String(b)) => a.cmp(b),
                    (Value::Char(a), Value::Char(b)) => a.cmp(b),
                    _ => {
                        return Err(RuntimeError::type_mismatch(
                            &format!("comparable operands for '{}'", op.symbol()),
                            &format!("{} and {}", left.type_name(), right.type_name()),
                        )
                        .into())
                    }
                };
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Le => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
            _ => numeric::binary(op, left, right).map_err(|e| self.arithmetic_signal(e)),
        }
    }

    /// Call a callable value with evaluated arguments
    pub(crate) fn call_value(&mut self, callee: Value, args: Vec<Value>) -> EvalResult {
        match callee {
            Value::Function(function) => self.call_function(&function, args),
            Value::Native(native) => self.call_native(&native, args),
            Value::BoundMethod { receiver, method } => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(*receiver);
                full.extend(args);
                self.call_value(*method, full)
            }
            Value::DynRef { package, name } => {
                let resolved = self.resolve_dyn_member(&package, &name)?;
                self.call_value(resolved, args)
            }
            Value::Interface { value, .. } => self.call_value(*value, args),
            other => Err(RuntimeError::not_callable(&other).into()),
        }
    }

    /// Call a user-defined function: bind parameters in a fresh scope over the
    /// closure, run the body, and turn `return` into the call's value
    pub(crate) fn call_function(&mut self, function: &FunctionValue, args: Vec<Value>) -> EvalResult {
        error::check_arity(&function.name, &args, function.params.len())?;
        let caller = std::mem::replace(&mut self.current_package, function.package.clone());
        let result = self.run_function_body(function, args);
        self.current_package = caller;
        result
    }

    fn run_function_body(&mut self, function: &FunctionValue, args: Vec<Value>) -> EvalResult {
        let scope = function.closure.child();
        let context = format!("parameters of {}", function.name);
        for (param, arg) in function.params.iter().zip(args.iter()) {
            let arg = match &param.ty {
                Some(ty) => self
                    .coerce_to_type(arg, ty, &scope)
                    .ok_or_else(|| RuntimeError::pattern_mismatch(&context, arg))?,
                None => arg.clone(),
            };
            self.bind_pattern(&param.pattern, &arg, &scope, &context, true)?;
        }

        let result = match &function.body {
            FunctionBody::Block(block) => self.eval_block(block, &scope),
            FunctionBody::Expr(expr) => self.eval_expr(expr, &scope),
        };
        match result {
            Ok(value) | Err(Signal::Return(value)) => Ok(value),
            Err(Signal::Break { .. }) | Err(Signal::Continue { .. }) => Err(
                RuntimeError::invalid_control_flow("break or continue outside of a loop").into(),
            ),
            Err(other) => Err(other),
        }
    }

    /// Render a value for interpolation and `print`. Types implementing
    /// `Display` render through their `to_string` method.
    pub(crate) fn stringify(&mut self, value: &Value) -> EvalResult<String> {
        let concrete = value.concrete();
        if let Value::Struct(_) | Value::Array(_) | Value::Error(_) = concrete {
            let method = self
                .methods
                .implementation_for(&concrete.type_key(), "Display")
                .and_then(|entry| entry.methods.get("to_string").cloned());
            if let Some(method) = method {
                let rendered = self.call_function(&method, vec![concrete.clone()])?;
                return Ok(format_value(&rendered));
            }
        }
        Ok(format_value(value))
    }

    /// Turn a raised value into an error value; errors pass through
    fn to_error_value(&mut self, value: Value) -> EvalResult {
        if let Value::Error(_) = value {
            return Ok(value);
        }
        let message = match self.find_method(&value, "message")? {
            Some(method) => {
                let rendered = self.call_value(method, Vec::new())?;
                format_value(&rendered)
            }
            None => self.stringify(&value)?,
        };
        Ok(Value::error(message, Some(value)))
    }

}

/// Convert the outcome of a top-level evaluation into a plain result
fn finish(result: EvalResult) -> Result<Value, RuntimeError> {
    match result {
        Ok(value) | Err(Signal::Return(value)) => Ok(value),
        Err(Signal::Raise(value)) => Err(RuntimeError::uncaught(value)),
        Err(Signal::Error(error)) => Err(error),
        Err(Signal::Break { label, .. }) | Err(Signal::Continue { label }) => {
            Err(RuntimeError::invalid_control_flow(match label {
                Some(label) => format!("unknown break label '{}'", label),
                None => "break or continue outside of a loop".to_string(),
            }))
        }
        Err(Signal::Suspend) => Err(RuntimeError::scheduler(
            "await suspended outside of a task",
        )),
    }
}

fn expect_bool(value: Value, op: BinaryOp) -> Result<bool, Signal> {
    match value.concrete() {
        Value::Bool(b) => Ok(*b),
        other => Err(RuntimeError::type_mismatch(
            &format!("bool operands for '{}'", op.symbol()),
            &other.type_name(),
        )
        .into()),
    }
}

fn index_value(object: &Value, index: &Value) -> EvalResult {
    let position = match index.concrete() {
        Value::Integer { value, .. } => *value,
        other => return Err(RuntimeError::type_mismatch("integer index", &other.type_name()).into()),
    };
    match object.concrete() {
        Value::Range(range) => usize::try_from(position)
            .ok()
            .and_then(|i| range.get(i))
            .ok_or_else(|| index_out_of_bounds(position, range.len())),
        Value::Array(items) => usize::try_from(position)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .ok_or_else(|| index_out_of_bounds(position, items.len())),
        Value::String(s) => usize::try_from(position)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(Value::Char)
            .ok_or_else(|| index_out_of_bounds(position, s.chars().count())),
        other => Err(RuntimeError::type_mismatch("Array or String", &other.type_name()).into()),
    }
}

/// Out-of-bounds indexing raises a rescuable error
pub(crate) fn index_out_of_bounds(index: i128, len: usize) -> Signal {
    Signal::Raise(Value::error(
        format!("index {} out of bounds for length {}", index, len),
        None,
    ))
}

/// Ranges evaluate to a lazy integer range
fn range_value(start: &Value, end: &Value, inclusive: bool) -> EvalResult {
    match (start.concrete(), end.concrete()) {
        (
            Value::Integer {
                kind: start_kind,
                value: from,
            },
            Value::Integer {
                kind: end_kind,
                value: to,
            },
        ) => {
            let kind = numeric::promote_integer_kinds(*start_kind, *end_kind);
            Ok(Value::Range(RangeValue::new(kind, *from, *to, inclusive)))
        }
        (left, right) => Err(RuntimeError::type_mismatch(
            "integer range bounds",
            &format!("{} and {}", left.type_name(), right.type_name()),
        )
        .into()),
    }
}

#[cfg(test)]
mod tests;
