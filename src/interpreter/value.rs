//! Runtime value types for the Able interpreter.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::*;

use super::environment::Environment;
use super::error::Signal;
use super::Interpreter;

/// Host function signature for natives and kernel intrinsics
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, Vec<Value>) -> Result<Value, Signal>>;

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    /// Integer of a specific kind; the payload always fits the kind's range
    Integer { kind: IntegerKind, value: i128 },
    /// Float of a specific kind
    Float { kind: FloatKind, value: f64 },
    Bool(bool),
    Char(char),
    String(String),
    Nil,
    Array(Vec<Value>),
    /// An integer range, iterated lazily
    Range(RangeValue),
    /// A struct definition, also the receiver of static methods
    StructDef(Rc<StructDefValue>),
    /// A struct instance; fields are stored in declared order
    Struct(StructInstance),
    InterfaceDef(Rc<InterfaceDefValue>),
    /// A value viewed through an interface
    Interface {
        interface: Rc<InterfaceDefValue>,
        value: Box<Value>,
    },
    Function(Rc<FunctionValue>),
    Native(Rc<NativeFunction>),
    /// A method with its receiver supplied as the implicit first argument
    BoundMethod {
        receiver: Box<Value>,
        method: Box<Value>,
    },
    /// A statically imported package (public members only)
    Package(Rc<PackageValue>),
    /// A late-bound package reference from `dynimport`
    DynPackage { name: String },
    /// A late-bound symbol reference from `dynimport`
    DynRef { package: String, name: String },
    Error(Rc<ErrorValue>),
    Future(Rc<FutureHandle>),
}

/// Bounds of an integer range; `last` is the final element covered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValue {
    pub kind: IntegerKind,
    pub start: i128,
    pub last: i128,
    pub inclusive: bool,
}

impl RangeValue {
    pub fn new(kind: IntegerKind, start: i128, end: i128, inclusive: bool) -> Self {
        let last = if inclusive { end } else { end - 1 };
        Self {
            kind,
            start,
            last,
            inclusive,
        }
    }

    pub fn len(&self) -> usize {
        if self.last < self.start {
            0
        } else {
            usize::try_from(self.last - self.start + 1).unwrap_or(usize::MAX)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, without materializing the range
    pub fn get(&self, index: usize) -> Option<Value> {
        let value = self.start.checked_add(i128::try_from(index).ok()?)?;
        (value <= self.last).then_some(Value::Integer {
            kind: self.kind,
            value,
        })
    }

    pub fn to_vec(&self) -> Vec<Value> {
        (self.start..=self.last)
            .map(|value| Value::Integer {
                kind: self.kind,
                value,
            })
            .collect()
    }
}

/// A registered struct definition
#[derive(Debug)]
pub struct StructDefValue {
    pub def: StructDefinition,
    pub package: Option<String>,
}

impl StructDefValue {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Registry key, qualified by package so same-named types never collide
    pub fn key(&self) -> String {
        qualified_key(self.package.as_deref(), &self.def.name)
    }
}

/// `pkg.Name` or `Name` for the root package
pub fn qualified_key(package: Option<&str>, name: &str) -> String {
    match package {
        Some(pkg) => format!("{}.{}", pkg, name),
        None => name.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct StructInstance {
    pub def: Rc<StructDefValue>,
    pub fields: Vec<Value>,
}

impl StructInstance {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.def.def.field_index(name).and_then(|i| self.fields.get(i))
    }
}

/// A registered interface definition; default method bodies close over `env`
pub struct InterfaceDefValue {
    pub def: InterfaceDefinition,
    pub package: Option<String>,
    pub env: Environment,
}

impl InterfaceDefValue {
    pub fn name(&self) -> &str {
        &self.def.name
    }
}

impl fmt::Debug for InterfaceDefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterfaceDefValue({})", self.def.name)
    }
}

/// Body of a user-defined callable
#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Block),
    Expr(Expr),
}

/// A user-defined function or lambda closing over its defining scope
pub struct FunctionValue {
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: FunctionBody,
    pub closure: Environment,
    pub is_private: bool,
    /// Package the function was defined in; its body runs as that package
    pub package: Option<String>,
}

impl FunctionValue {
    pub fn from_definition(def: &FunctionDefinition, closure: Environment, package: Option<String>) -> Self {
        Self {
            name: def.name.clone(),
            params: def.params.clone(),
            body: FunctionBody::Block(def.body.clone()),
            closure,
            is_private: def.is_private,
            package,
        }
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionValue({})", self.name)
    }
}

/// A host-implemented function
pub struct NativeFunction {
    pub name: String,
    /// `None` for variadic natives
    pub arity: Option<usize>,
    pub func: NativeFn,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        arity: Option<usize>,
        func: impl Fn(&mut Interpreter, Vec<Value>) -> Result<Value, Signal> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            func: Rc::new(func),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

#[derive(Debug)]
pub struct PackageValue {
    pub name: String,
    pub symbols: BTreeMap<String, Value>,
}

/// A raised error: a message plus the value that was raised
#[derive(Debug, Clone)]
pub struct ErrorValue {
    pub message: String,
    pub value: Option<Value>,
}

/// Settlement state of a future
#[derive(Debug, Clone)]
pub enum FutureState {
    Pending,
    Resolved(Value),
    Failed(Value),
}

/// Shared handle to the result of a spawned task
#[derive(Debug)]
pub struct FutureHandle {
    pub id: u64,
    state: RefCell<FutureState>,
}

impl FutureHandle {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: RefCell::new(FutureState::Pending),
        }
    }

    pub fn state(&self) -> FutureState {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), FutureState::Pending)
    }

    pub fn resolve(&self, value: Value) {
        *self.state.borrow_mut() = FutureState::Resolved(value);
    }

    pub fn fail(&self, error: Value) {
        *self.state.borrow_mut() = FutureState::Failed(error);
    }
}

impl Value {
    pub fn int(value: i128) -> Self {
        Value::Integer {
            kind: IntegerKind::I32,
            value,
        }
    }

    pub fn f64(value: f64) -> Self {
        Value::Float {
            kind: FloatKind::F64,
            value,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn native(
        name: impl Into<String>,
        arity: Option<usize>,
        func: impl Fn(&mut Interpreter, Vec<Value>) -> Result<Value, Signal> + 'static,
    ) -> Self {
        Value::Native(Rc::new(NativeFunction::new(name, arity, func)))
    }

    pub fn error(message: impl Into<String>, value: Option<Value>) -> Self {
        Value::Error(Rc::new(ErrorValue {
            message: message.into(),
            value,
        }))
    }

    /// Strip interface wrappers down to the concrete value
    pub fn concrete(&self) -> &Value {
        match self {
            Value::Interface { value, .. } => value.concrete(),
            other => other,
        }
    }

    /// Anything but `nil` and `false` passes a condition
    pub fn is_truthy(&self) -> bool {
        !matches!(self.concrete(), Value::Nil | Value::Bool(false))
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::Native(_) | Value::BoundMethod { .. } | Value::DynRef { .. }
        )
    }

    /// Runtime type key used for method and implementation lookup
    pub fn type_key(&self) -> String {
        match self.concrete() {
            Value::Struct(instance) => instance.def.key(),
            other => other.type_name(),
        }
    }

    /// Human-readable type name
    pub fn type_name(&self) -> String {
        match self {
            Value::Integer { kind, .. } => kind.name().to_string(),
            Value::Float { kind, .. } => kind.name().to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::String(_) => "String".to_string(),
            Value::Nil => "nil".to_string(),
            Value::Array(_) => "Array".to_string(),
            Value::Range(_) => "Range".to_string(),
            Value::StructDef(def) => def.name().to_string(),
            Value::Struct(instance) => instance.def.name().to_string(),
            Value::InterfaceDef(def) => def.name().to_string(),
            Value::Interface { value, .. } => value.type_name(),
            Value::Function(_) | Value::Native(_) | Value::BoundMethod { .. } => "fn".to_string(),
            Value::Package(_) | Value::DynPackage { .. } => "package".to_string(),
            Value::DynRef { .. } => "dynref".to_string(),
            Value::Error(_) => "Error".to_string(),
            Value::Future(_) => "Future".to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(self))
    }
}

/// Compare two values for equality
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.concrete(), right.concrete()) {
        (Value::Integer { value: a, .. }, Value::Integer { value: b, .. }) => a == b,
        (Value::Float { value: a, .. }, Value::Float { value: b, .. }) => a == b,
        (Value::Integer { value: a, .. }, Value::Float { value: b, .. })
        | (Value::Float { value: b, .. }, Value::Integer { value: a, .. }) => (*a as f64) == *b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Char(a), Value::Char(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Nil, Value::Nil) => true,
        (Value::Range(a), Value::Range(b)) => a.start == b.start && a.last == b.last,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Value::Struct(a), Value::Struct(b)) => {
            Rc::ptr_eq(&a.def, &b.def)
                && a
                    .fields
                    .iter()
                    .zip(b.fields.iter())
                    .all(|(x, y)| values_equal(x, y))
        }
        (Value::StructDef(a), Value::StructDef(b)) => Rc::ptr_eq(a, b),
        (Value::Error(a), Value::Error(b)) => a.message == b.message,
        (Value::Future(a), Value::Future(b)) => Rc::ptr_eq(a, b),
        // Functions, packages and references are never equal
        _ => false,
    }
}

/// Format a value for display
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Integer { value, .. } => value.to_string(),
        Value::Float { value, .. } => {
            if value.fract() == 0.0 && value.is_finite() {
                format!("{:.1}", value)
            } else {
                value.to_string()
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Char(c) => c.to_string(),
        Value::String(s) => s.clone(),
        Value::Nil => "nil".to_string(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Range(range) => {
            let end = if range.inclusive { range.last } else { range.last + 1 };
            let op = if range.inclusive { ".." } else { "..." };
            format!("{}{}{}", range.start, op, end)
        }
        Value::StructDef(def) => format!("<struct {}>", def.name()),
        Value::Struct(instance) => {
            let def = &instance.def.def;
            match def.kind {
                StructKind::Singleton => def.name.clone(),
                StructKind::Positional => {
                    let items: Vec<String> = instance.fields.iter().map(format_value).collect();
                    format!("{} {{ {} }}", def.name, items.join(", "))
                }
                StructKind::Named => {
                    let items: Vec<String> = def
                        .fields
                        .iter()
                        .zip(instance.fields.iter())
                        .map(|(field, value)| {
                            format!(
                                "{}: {}",
                                field.name.as_deref().unwrap_or("_"),
                                format_value(value)
                            )
                        })
                        .collect();
                    format!("{} {{ {} }}", def.name, items.join(", "))
                }
            }
        }
        Value::InterfaceDef(def) => format!("<interface {}>", def.name()),
        Value::Interface { value, .. } => format_value(value),
        Value::Function(func) => format!("<function {}>", func.name),
        Value::Native(native) => format!("<native {}>", native.name),
        Value::BoundMethod { method, .. } => format!("<bound {}>", format_value(method)),
        Value::Package(pkg) => format!("<package {}>", pkg.name),
        Value::DynPackage { name } => format!("<dynpackage {}>", name),
        Value::DynRef { package, name } => format!("<dynref {}.{}>", package, name),
        Value::Error(err) => err.message.clone(),
        Value::Future(handle) => format!("<future #{}>", handle.id),
    }
}
