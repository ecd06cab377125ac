//! Pattern matching and destructuring.
//!
//! One algorithm serves assignment, for-loop binders, function parameters,
//! `match` clauses and `rescue` clauses. Callers decide whether a failed
//! match is a hard error or a fall-through.

use crate::ast::*;

use super::environment::Environment;
use super::error::{EvalResult, RuntimeError};
use super::numeric::coerce_integer;
use super::value::*;
use super::Interpreter;

/// Value of a literal expression, as used by literal patterns
pub fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Integer { value, kind } => Some(Value::Integer {
            kind: kind.unwrap_or(IntegerKind::I32),
            value: *value,
        }),
        Expr::Float { value, kind } => Some(Value::Float {
            kind: kind.unwrap_or(FloatKind::F64),
            value: *value,
        }),
        Expr::Bool(b) => Some(Value::Bool(*b)),
        Expr::Char(c) => Some(Value::Char(*c)),
        Expr::String(s) => Some(Value::String(s.clone())),
        Expr::Nil => Some(Value::Nil),
        _ => None,
    }
}

fn struct_tag_matches(def: &StructDefValue, tag: &str) -> bool {
    tag == def.name() || tag == def.key()
}

impl Interpreter {
    /// Match a pattern against a value, returning bindings on success
    pub fn match_pattern(
        &self,
        pattern: &Pattern,
        value: &Value,
        env: &Environment,
    ) -> Option<Vec<(String, Value)>> {
        let mut bindings = Vec::new();
        if self.match_into(pattern, value, env, &mut bindings) {
            Some(bindings)
        } else {
            None
        }
    }

    /// Destructure `value` into `env`, failing hard on mismatch.
    /// `declare` defines every name in `env`; otherwise names are assigned.
    pub(crate) fn bind_pattern(
        &self,
        pattern: &Pattern,
        value: &Value,
        env: &Environment,
        context: &str,
        declare: bool,
    ) -> EvalResult<()> {
        let bindings = self
            .match_pattern(pattern, value, env)
            .ok_or_else(|| RuntimeError::pattern_mismatch(context, value))?;
        for (name, bound) in bindings {
            if declare {
                env.define(name, bound);
            } else {
                env.assign(&name, bound);
            }
        }
        Ok(())
    }

    fn match_into(
        &self,
        pattern: &Pattern,
        value: &Value,
        env: &Environment,
        bindings: &mut Vec<(String, Value)>,
    ) -> bool {
        match pattern {
            Pattern::Wildcard => true,
            Pattern::Identifier(name) => {
                bindings.push((name.clone(), value.clone()));
                true
            }
            Pattern::Literal(expr) => {
                literal_value(expr).is_some_and(|lit| values_equal(&lit, value))
            }
            Pattern::Array { elements, rest } => {
                let materialized;
                let items = match value.concrete() {
                    Value::Array(items) => items,
                    Value::Range(range) => {
                        materialized = range.to_vec();
                        &materialized
                    }
                    _ => return false,
                };
                if items.len() < elements.len() || (rest.is_none() && items.len() != elements.len())
                {
                    return false;
                }
                for (element, item) in elements.iter().zip(items.iter()) {
                    if !self.match_into(element, item, env, bindings) {
                        return false;
                    }
                }
                if let Some(RestPattern::Named(name)) = rest {
                    bindings.push((name.clone(), Value::Array(items[elements.len()..].to_vec())));
                }
                true
            }
            Pattern::Struct { type_name, fields } => match value.concrete() {
                Value::Struct(instance) => {
                    self.match_struct(instance, type_name.as_deref(), fields, env, bindings)
                }
                Value::Error(err) => err
                    .value
                    .as_ref()
                    .is_some_and(|inner| self.match_into(pattern, inner, env, bindings)),
                _ => false,
            },
            Pattern::Typed { pattern, ty } => match self.coerce_to_type(value, ty, env) {
                Some(coerced) => self.match_into(pattern, &coerced, env, bindings),
                None => false,
            },
        }
    }

    fn match_struct(
        &self,
        instance: &StructInstance,
        type_name: Option<&str>,
        fields: &[StructPatternField],
        env: &Environment,
        bindings: &mut Vec<(String, Value)>,
    ) -> bool {
        if let Some(tag) = type_name {
            if !struct_tag_matches(&instance.def, tag) {
                return false;
            }
        }
        let positional = fields.iter().any(|f| f.field.is_none());
        if positional {
            if fields.len() > instance.fields.len() {
                return false;
            }
            return fields
                .iter()
                .zip(instance.fields.iter())
                .all(|(field, item)| self.match_into(&field.pattern, item, env, bindings));
        }
        fields.iter().all(|field| {
            let name = field.field.as_deref().unwrap_or_default();
            match instance.field(name) {
                Some(item) => self.match_into(&field.pattern, item, env, bindings),
                None => false,
            }
        })
    }

    /// Check `value` against a declared type, re-tagging integers to the
    /// declared width and wrapping interface-typed values.
    pub(crate) fn coerce_to_type(
        &self,
        value: &Value,
        ty: &TypeExpr,
        env: &Environment,
    ) -> Option<Value> {
        match ty {
            TypeExpr::Wildcard => Some(value.clone()),
            TypeExpr::Nullable(inner) => match value.concrete() {
                Value::Nil => Some(Value::Nil),
                _ => self.coerce_to_type(value, inner, env),
            },
            TypeExpr::Union(members) => members
                .iter()
                .find_map(|member| self.coerce_to_type(value, member, env)),
            TypeExpr::Function { .. } => value.is_callable().then(|| value.clone()),
            TypeExpr::Simple(name) => self.coerce_named(value, name, &[], env),
            TypeExpr::Generic { base, args } => self.coerce_named(value, base, args, env),
        }
    }

    fn coerce_named(
        &self,
        value: &Value,
        name: &str,
        args: &[TypeExpr],
        env: &Environment,
    ) -> Option<Value> {
        let concrete = value.concrete();
        if let Some(kind) = IntegerKind::from_name(name) {
            return match concrete {
                Value::Integer { value, .. } => coerce_integer(*value, kind),
                _ => None,
            };
        }
        if let Some(kind) = FloatKind::from_name(name) {
            return match concrete {
                Value::Float { value, .. } => Some(Value::Float {
                    kind,
                    value: *value,
                }),
                _ => None,
            };
        }
        match name {
            "bool" => return matches!(concrete, Value::Bool(_)).then(|| concrete.clone()),
            "char" => return matches!(concrete, Value::Char(_)).then(|| concrete.clone()),
            "String" | "string" => {
                return matches!(concrete, Value::String(_)).then(|| concrete.clone())
            }
            "nil" | "void" => return matches!(concrete, Value::Nil).then_some(Value::Nil),
            "Error" => return matches!(concrete, Value::Error(_)).then(|| value.clone()),
            "Future" => return matches!(concrete, Value::Future(_)).then(|| concrete.clone()),
            "Range" => return matches!(concrete, Value::Range(_)).then(|| concrete.clone()),
            "Array" => {
                let Value::Array(items) = concrete else {
                    return None;
                };
                let Some(element_ty) = args.first() else {
                    return Some(concrete.clone());
                };
                let coerced: Option<Vec<Value>> = items
                    .iter()
                    .map(|item| self.coerce_to_type(item, element_ty, env))
                    .collect();
                return coerced.map(Value::Array);
            }
            _ => {}
        }

        match env.lookup(name) {
            Some(Value::StructDef(def)) => {
                return match concrete {
                    Value::Struct(instance) if std::rc::Rc::ptr_eq(&instance.def, &def) => {
                        Some(concrete.clone())
                    }
                    Value::Error(err) => err
                        .value
                        .as_ref()
                        .and_then(|inner| self.coerce_named(inner, name, args, env))
                        .map(|_| value.clone()),
                    _ => None,
                };
            }
            Some(Value::InterfaceDef(interface)) => {
                if let Value::Interface { interface: current, .. } = value {
                    if current.name() == interface.name() {
                        return Some(value.clone());
                    }
                }
                return self
                    .methods
                    .implements(&concrete.type_key(), interface.name())
                    .then(|| Value::Interface {
                        interface: interface.clone(),
                        value: Box::new(concrete.clone()),
                    });
            }
            _ => {}
        }

        if let Some(target) = self.type_alias(name) {
            return self.coerce_to_type(value, &target, env);
        }
        if let Some(variants) = self.union_variants(name) {
            return variants
                .iter()
                .find_map(|variant| self.coerce_to_type(value, variant, env));
        }
        // Unknown names are generic parameters and accept any value
        Some(value.clone())
    }
}
