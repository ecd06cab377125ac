//! Checker-side types and resolution of type expressions.

use std::collections::BTreeMap;
use std::fmt;

use crate::ast::{FloatKind, IntegerKind, TypeExpr};
use crate::diagnostics::Location;

use super::TypeChecker;

/// Static type of an expression or binding
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Integer(IntegerKind),
    Float(FloatKind),
    Bool,
    Char,
    String,
    Nil,
    Error,
    Array(Box<Type>),
    Future(Box<Type>),
    /// `?T`: nil or `T`
    Nullable(Box<Type>),
    /// A normalized union of at least three members, or two without nil
    Union(Vec<Type>),
    Function { params: Vec<Type>, ret: Box<Type> },
    /// Instance of a struct or interface, by declared name
    Named(String, Vec<Type>),
    /// Generic parameter, declared or inferred
    TypeParam(String),
    /// A struct definition used as a value; the key is package-qualified
    StructDef(String),
    InterfaceDef(String),
    /// A package object bound by `import pkg`
    Package(String),
    /// Unknown or dynamically resolved; compatible with everything
    Unknown,
}

impl Type {
    /// Primitive types compared by class in literal compatibility checks
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Type::Integer(_) | Type::Float(_) | Type::Bool | Type::Char | Type::String | Type::Nil
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Integer(_) | Type::Float(_))
    }

    /// Whether a value of type `self` may be stored where `expected` is declared
    pub fn is_assignable_to(&self, expected: &Type) -> bool {
        match (self, expected) {
            (Type::Unknown | Type::TypeParam(_), _) | (_, Type::Unknown | Type::TypeParam(_)) => true,
            (actual, Type::Nullable(inner)) => {
                matches!(actual, Type::Nil) || actual.is_assignable_to(inner)
            }
            (actual, Type::Union(members)) => members.iter().any(|m| actual.is_assignable_to(m)),
            (Type::Nullable(inner), expected) => inner.is_assignable_to(expected),
            (Type::Union(members), expected) => members.iter().all(|m| m.is_assignable_to(expected)),
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (Type::Array(a), Type::Array(b)) => a.is_assignable_to(b),
            (a, b) if a.is_primitive() || b.is_primitive() => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integer(kind) => f.write_str(kind.name()),
            Type::Float(kind) => f.write_str(kind.name()),
            Type::Bool => f.write_str("bool"),
            Type::Char => f.write_str("char"),
            Type::String => f.write_str("String"),
            Type::Nil => f.write_str("nil"),
            Type::Error => f.write_str("Error"),
            Type::Array(inner) => write!(f, "Array {}", inner),
            Type::Future(inner) => write!(f, "Future {}", inner),
            Type::Nullable(inner) => write!(f, "?{}", inner),
            Type::Union(members) => {
                let parts: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                f.write_str(&parts.join(" | "))
            }
            Type::Function { params, ret } => {
                let parts: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "({}) -> {}", parts.join(", "), ret)
            }
            Type::Named(name, args) => {
                f.write_str(name)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
            Type::TypeParam(name) => f.write_str(name),
            Type::StructDef(key) => write!(f, "struct {}", key),
            Type::InterfaceDef(key) => write!(f, "interface {}", key),
            Type::Package(name) => write!(f, "package {}", name),
            Type::Unknown => f.write_str("unknown"),
        }
    }
}

/// Names that are never inferred as generic parameters
pub fn is_reserved_type_name(name: &str) -> bool {
    IntegerKind::from_name(name).is_some()
        || FloatKind::from_name(name).is_some()
        || matches!(
            name,
            "bool" | "char" | "String" | "string" | "nil" | "void" | "Error" | "Array" | "Future" | "Self"
        )
}

impl TypeChecker {
    /// Resolve a type expression without reporting anything
    pub(super) fn resolve_type_expr(&self, ty: &TypeExpr) -> Type {
        match ty {
            TypeExpr::Simple(name) => self.resolve_named_type(name, &[]),
            TypeExpr::Generic { base, args } => self.resolve_named_type(base, args),
            TypeExpr::Nullable(inner) => Type::Nullable(Box::new(self.resolve_type_expr(inner))),
            TypeExpr::Union(members) => {
                let members = members.iter().map(|m| self.resolve_type_expr(m)).collect();
                super::unions::normalize_union(members).0
            }
            TypeExpr::Function { params, ret } => Type::Function {
                params: params.iter().map(|p| self.resolve_type_expr(p)).collect(),
                ret: Box::new(self.resolve_type_expr(ret)),
            },
            TypeExpr::Wildcard => Type::Unknown,
        }
    }

    fn resolve_named_type(&self, name: &str, args: &[TypeExpr]) -> Type {
        let first_arg = || {
            args.first()
                .map(|arg| self.resolve_type_expr(arg))
                .unwrap_or(Type::Unknown)
        };
        if let Some(kind) = IntegerKind::from_name(name) {
            return Type::Integer(kind);
        }
        if let Some(kind) = FloatKind::from_name(name) {
            return Type::Float(kind);
        }
        match name {
            "bool" => return Type::Bool,
            "char" => return Type::Char,
            "String" | "string" => return Type::String,
            "nil" | "void" => return Type::Nil,
            "Error" => return Type::Error,
            "Array" => return Type::Array(Box::new(first_arg())),
            "Future" => return Type::Future(Box::new(first_arg())),
            _ => {}
        }
        if self.is_generic_in_scope(name) {
            return Type::TypeParam(name.to_string());
        }
        if let Some(alias) = self.aliases.get(name) {
            return alias.clone();
        }
        let args = args.iter().map(|arg| self.resolve_type_expr(arg)).collect();
        Type::Named(name.to_string(), args)
    }

    /// Whether `name` names a type visible at this point
    pub(super) fn is_known_type(&self, name: &str) -> bool {
        is_reserved_type_name(name)
            || self.aliases.contains_key(name)
            || self.is_generic_in_scope(name)
            || matches!(
                self.env.lookup(name),
                Some(Type::StructDef(_) | Type::InterfaceDef(_))
            )
    }

    /// Unknown, non-reserved simple type names in a function signature,
    /// each mapped to where it was inferred
    pub(super) fn infer_generic_names(
        &self,
        types: &[&TypeExpr],
        declared: &[String],
        location: Option<&Location>,
    ) -> BTreeMap<String, Option<Location>> {
        let mut names = Vec::new();
        for ty in types {
            collect_simple_names(ty, &mut names);
        }
        names
            .into_iter()
            .filter(|name| !declared.contains(name) && !self.is_known_type(name))
            .map(|name| (name, location.cloned()))
            .collect()
    }
}

fn collect_simple_names(ty: &TypeExpr, names: &mut Vec<String>) {
    match ty {
        TypeExpr::Simple(name) => {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        TypeExpr::Generic { args, .. } => {
            for arg in args {
                collect_simple_names(arg, names);
            }
        }
        TypeExpr::Nullable(inner) => collect_simple_names(inner, names),
        TypeExpr::Union(members) => {
            for member in members {
                collect_simple_names(member, names);
            }
        }
        TypeExpr::Function { params, ret } => {
            for param in params {
                collect_simple_names(param, names);
            }
            collect_simple_names(ret, names);
        }
        TypeExpr::Wildcard => {}
    }
}
