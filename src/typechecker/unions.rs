//! Union normalization.
//!
//! Members are flattened, `?T` expands to `nil | T`, and duplicates are
//! dropped. Unknown members are equivalent to each other. One remaining
//! member is the type itself; `nil` plus one other member collapses to a
//! nullable type.

use crate::ast::TypeExpr;
use crate::diagnostics::error_codes::warnings;
use crate::diagnostics::{Diagnostic, Location};

use super::types::Type;
use super::TypeChecker;

/// Normalize union members; also returns the members that were redundant
pub fn normalize_union(members: Vec<Type>) -> (Type, Vec<Type>) {
    let mut normalized: Vec<Type> = Vec::new();
    let mut redundant = Vec::new();
    for member in members {
        add_member(member, &mut normalized, &mut redundant);
    }
    let ty = match normalized.len() {
        0 => Type::Unknown,
        1 => normalized.remove(0),
        2 if normalized.contains(&Type::Nil) => {
            let other = normalized.into_iter().find(|m| *m != Type::Nil).unwrap_or(Type::Nil);
            Type::Nullable(Box::new(other))
        }
        _ => Type::Union(normalized),
    };
    (ty, redundant)
}

fn add_member(member: Type, normalized: &mut Vec<Type>, redundant: &mut Vec<Type>) {
    match member {
        Type::Union(inner) => {
            for m in inner {
                add_member(m, normalized, redundant);
            }
        }
        Type::Nullable(inner) => {
            add_member(Type::Nil, normalized, redundant);
            add_member(*inner, normalized, redundant);
        }
        // A repeated unknown member is dropped without a warning
        Type::Unknown if normalized.contains(&Type::Unknown) => {}
        other if normalized.contains(&other) => redundant.push(other),
        other => normalized.push(other),
    }
}

impl TypeChecker {
    /// Walk a written type expression and warn about redundant members in
    /// every union it contains
    pub(super) fn check_type_expr(&mut self, ty: &TypeExpr, location: Option<&Location>) {
        match ty {
            TypeExpr::Union(members) => {
                self.check_union(members, location);
            }
            TypeExpr::Generic { args, .. } => {
                for arg in args {
                    self.check_type_expr(arg, location);
                }
            }
            TypeExpr::Nullable(inner) => self.check_type_expr(inner, location),
            TypeExpr::Function { params, ret } => {
                for param in params {
                    self.check_type_expr(param, location);
                }
                self.check_type_expr(ret, location);
            }
            TypeExpr::Simple(_) | TypeExpr::Wildcard => {}
        }
    }

    /// Normalize the written members of a union, reporting each redundant one
    pub(super) fn check_union(&mut self, members: &[TypeExpr], location: Option<&Location>) -> Type {
        for member in members {
            if !matches!(member, TypeExpr::Union(_)) {
                self.check_type_expr(member, location);
            }
        }
        let resolved = members.iter().map(|m| self.resolve_type_expr(m)).collect();
        let (ty, redundant) = normalize_union(resolved);
        for member in redundant {
            self.diagnostics.push(
                Diagnostic::warning(warnings::REDUNDANT_UNION_MEMBER)
                    .message(format!("typechecker: redundant union member {}", member))
                    .location(location.cloned())
                    .build(),
            );
        }
        ty
    }
}
