//! Method dispatch for the Able interpreter.
//!
//! Contains the method and implementation registry, member resolution on
//! receivers, and the uniform-function-call (UFCS) fallback.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::*;

use super::environment::Environment;
use super::error::{EvalResult, RuntimeError};
use super::value::*;
use super::Interpreter;

/// Methods one implementation provides for one target type
#[derive(Debug, Clone)]
pub struct ImplementationEntry {
    pub interface: String,
    pub target: String,
    pub methods: HashMap<String, Rc<FunctionValue>>,
}

/// Inherent methods, interface implementations, aliases and unions.
/// Alias and union keys are package-qualified like struct keys.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    inherent: HashMap<String, HashMap<String, Rc<FunctionValue>>>,
    implementations: Vec<ImplementationEntry>,
    type_aliases: HashMap<String, TypeExpr>,
    unions: HashMap<String, Vec<TypeExpr>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method from a `methods` block
    pub fn add_inherent(&mut self, target: &str, method: Rc<FunctionValue>) {
        self.inherent
            .entry(target.to_string())
            .or_default()
            .insert(method.name.clone(), method);
    }

    /// Register an implementation, replacing an earlier one for the same pair
    pub fn add_implementation(&mut self, entry: ImplementationEntry) {
        self.implementations
            .retain(|e| !(e.interface == entry.interface && e.target == entry.target));
        self.implementations.push(entry);
    }

    pub fn inherent_method(&self, target: &str, name: &str) -> Option<Rc<FunctionValue>> {
        self.inherent.get(target).and_then(|m| m.get(name)).cloned()
    }

    /// Find `name` among the implementations for `target`.
    /// Two interfaces providing the same method name is an ambiguity.
    pub fn implementation_method(
        &self,
        target: &str,
        name: &str,
    ) -> Result<Option<Rc<FunctionValue>>, RuntimeError> {
        let mut found: Option<(&str, &Rc<FunctionValue>)> = None;
        for entry in self.implementations.iter().filter(|e| e.target == target) {
            if let Some(method) = entry.methods.get(name) {
                if let Some((first, _)) = found {
                    return Err(RuntimeError::new(
                        crate::diagnostics::error_codes::runtime::NO_METHOD,
                        format!(
                            "ambiguous method '{}' for {} (provided by {} and {})",
                            name, target, first, entry.interface
                        ),
                    ));
                }
                found = Some((&entry.interface, method));
            }
        }
        Ok(found.map(|(_, method)| method.clone()))
    }

    /// Does `target` implement the interface called `interface`
    pub fn implements(&self, target: &str, interface: &str) -> bool {
        self.implementation_for(target, interface).is_some()
    }

    pub fn implementation_for(&self, target: &str, interface: &str) -> Option<&ImplementationEntry> {
        self.implementations
            .iter()
            .find(|e| e.target == target && interface_matches(&e.interface, interface))
    }

    pub fn register_alias(&mut self, name: &str, target: TypeExpr) {
        self.type_aliases.insert(name.to_string(), target);
    }

    pub fn type_alias(&self, name: &str) -> Option<TypeExpr> {
        self.type_aliases.get(name).cloned()
    }

    pub fn register_union(&mut self, name: &str, variants: Vec<TypeExpr>) {
        self.unions.insert(name.to_string(), variants);
    }

    pub fn union_variants(&self, name: &str) -> Option<Vec<TypeExpr>> {
        self.unions.get(name).cloned()
    }
}

/// Interfaces are compared by their unqualified name
fn interface_matches(registered: &str, wanted: &str) -> bool {
    let short = |name: &str| name.rsplit('.').next().unwrap_or(name).to_string();
    registered == wanted || short(registered) == short(wanted)
}

fn bind(receiver: &Value, method: Value) -> Value {
    Value::BoundMethod {
        receiver: Box::new(receiver.clone()),
        method: Box::new(method),
    }
}

fn is_instance_method(method: &FunctionValue) -> bool {
    method.params.first().is_some_and(|p| p.pattern.is_self())
}

impl Interpreter {
    /// Registry keys an impl or methods target resolves to.
    /// Union targets expand to each of their variants.
    pub(crate) fn target_keys(&self, target: &TypeExpr, env: &Environment) -> Vec<String> {
        match target {
            TypeExpr::Simple(name) | TypeExpr::Generic { base: name, .. } => {
                match env.lookup(name) {
                    Some(Value::StructDef(def)) => vec![def.key()],
                    _ => match self.union_variants(name) {
                        Some(variants) => variants
                            .iter()
                            .flat_map(|v| self.target_keys(v, env))
                            .collect(),
                        None => vec![name.clone()],
                    },
                }
            }
            TypeExpr::Union(members) => members
                .iter()
                .flat_map(|m| self.target_keys(m, env))
                .collect(),
            other => vec![other.to_string()],
        }
    }

    /// Alias target for `name` as written in the running package: the
    /// package's own alias, else a qualified or global one
    pub(crate) fn type_alias(&self, name: &str) -> Option<TypeExpr> {
        let local = qualified_key(self.current_package.as_deref(), name);
        self.methods
            .type_alias(&local)
            .or_else(|| self.methods.type_alias(name))
    }

    /// Union variants for `name`, resolved like [`Self::type_alias`]
    pub(crate) fn union_variants(&self, name: &str) -> Option<Vec<TypeExpr>> {
        let local = qualified_key(self.current_package.as_deref(), name);
        self.methods
            .union_variants(&local)
            .or_else(|| self.methods.union_variants(name))
    }

    /// A private method is callable only from code of its defining package
    fn check_privacy(&self, type_name: &str, name: &str, method: &Value) -> EvalResult<()> {
        let function = match method {
            Value::BoundMethod { method, .. } => method.as_ref(),
            other => other,
        };
        match function {
            Value::Function(function)
                if function.is_private && function.package != self.current_package =>
            {
                Err(RuntimeError::private_method(type_name, name).into())
            }
            _ => Ok(()),
        }
    }

    /// Resolve an instance method (inherent, then implementation) bound to `receiver`
    pub(crate) fn find_method(
        &self,
        receiver: &Value,
        name: &str,
    ) -> Result<Option<Value>, RuntimeError> {
        let concrete = receiver.concrete();
        let key = concrete.type_key();
        if let Some(method) = self.methods.inherent_method(&key, name) {
            if is_instance_method(&method) {
                return Ok(Some(bind(concrete, Value::Function(method))));
            }
        }
        if let Some(method) = self.methods.implementation_method(&key, name)? {
            if is_instance_method(&method) {
                return Ok(Some(bind(concrete, Value::Function(method))));
            }
        }
        Ok(builtin_method(concrete, name))
    }

    /// Method lookup with free-function fallback; never raises.
    ///
    /// Returns a method bound to `receiver`, or a free function `name` from
    /// `env` bound with `receiver` as its first argument, or `None`.
    pub fn try_ufcs(&self, env: &Environment, name: &str, receiver: &Value) -> Option<Value> {
        if let Ok(Some(method)) = self.find_method(receiver, name) {
            return Some(method);
        }
        match env.lookup(name) {
            Some(function) if function.is_callable() => Some(bind(receiver, function)),
            _ => None,
        }
    }

    /// Static method on a struct definition (`Point.origin()`)
    pub(crate) fn static_method(&self, def: &StructDefValue, name: &str) -> EvalResult {
        let key = def.key();
        let method = match self.methods.inherent_method(&key, name) {
            Some(method) => Some(method),
            None => self.methods.implementation_method(&key, name)?,
        };
        match method {
            Some(method) if !is_instance_method(&method) => {
                let method = Value::Function(method);
                self.check_privacy(def.name(), name, &method)?;
                Ok(method)
            }
            _ => Err(RuntimeError::no_static_method(def.name(), name).into()),
        }
    }

    /// Member access: fields first, then methods, then UFCS
    pub(crate) fn member_access(
        &mut self,
        object: &Value,
        member: &MemberName,
        env: &Environment,
    ) -> EvalResult {
        let name = match member {
            MemberName::Named(name) => name.as_str(),
            MemberName::Position(index) => return positional_field(object, *index),
        };
        match object {
            Value::Package(pkg) => {
                return pkg.symbols.get(name).cloned().ok_or_else(|| {
                    RuntimeError::import(format!(
                        "No public member '{}' on package {}",
                        name, pkg.name
                    ))
                    .into()
                });
            }
            Value::DynPackage { name: package } => {
                return Ok(self.resolve_dyn_member(package, name)?);
            }
            Value::StructDef(def) => return self.static_method(def, name),
            _ => {}
        }

        let concrete = object.concrete();
        if let Value::Struct(instance) = concrete {
            if let Some(value) = instance.field(name) {
                return Ok(value.clone());
            }
        }
        if let Value::Error(err) = concrete {
            match name {
                "message" => return Ok(Value::String(err.message.clone())),
                "value" => return Ok(err.value.clone().unwrap_or(Value::Nil)),
                _ => {}
            }
        }

        match self.try_ufcs(env, name, object) {
            Some(method) => {
                self.check_privacy(&concrete.type_name(), name, &method)?;
                Ok(method)
            }
            None => Err(RuntimeError::no_method(&concrete.type_name(), name).into()),
        }
    }
}

fn positional_field(object: &Value, index: usize) -> EvalResult {
    match object.concrete() {
        Value::Struct(instance) => instance
            .fields
            .get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::unknown_field(instance.def.name(), &index.to_string()).into()),
        Value::Array(items) => items
            .get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::unknown_field("Array", &index.to_string()).into()),
        other => Err(RuntimeError::unknown_field(&other.type_name(), &index.to_string()).into()),
    }
}

/// Methods every value of a built-in type carries
fn builtin_method(receiver: &Value, name: &str) -> Option<Value> {
    if let Value::Future(handle) = receiver {
        return future_method(receiver, handle, name);
    }
    let size = match (receiver, name) {
        (Value::Array(items), "size" | "len") => items.len(),
        (Value::String(s), "size" | "len") => s.chars().count(),
        (Value::Range(range), "size" | "len") => range.len(),
        _ => return None,
    };
    let method = Value::native(name, Some(1), move |_, _| {
        Ok(Value::Integer {
            kind: IntegerKind::I32,
            value: size as i128,
        })
    });
    Some(bind(receiver, method))
}

/// `status()`, `value()` and `is_ready()` on a future
fn future_method(receiver: &Value, handle: &Rc<FutureHandle>, name: &str) -> Option<Value> {
    let handle = handle.clone();
    let method = match name {
        "status" => Value::native("Future.status", Some(1), move |interp, _| {
            Ok(interp.future_status(&handle))
        }),
        "value" => Value::native("Future.value", Some(1), move |interp, _| {
            interp.future_value(&handle)
        }),
        "is_ready" => Value::native("Future.is_ready", Some(1), move |_, _| {
            Ok(Value::Bool(!handle.is_pending()))
        }),
        _ => return None,
    };
    Some(bind(receiver, method))
}
