//! Statements, function bodies and pattern bindings.

use crate::ast::*;
use crate::diagnostics::error_codes::{control, declarations};
use crate::diagnostics::Location;

use super::types::Type;
use super::{describe_location, GenericFrame, TypeChecker};

impl TypeChecker {
    /// Check a top-level statement whose declaration was already hoisted
    pub(super) fn check_top_level(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Function(def) => self.check_function(def, None),
            Stmt::Struct(_) | Stmt::Interface(_) | Stmt::TypeAlias(_) | Stmt::Union(_) => {
                self.check_type_declaration(stmt)
            }
            Stmt::Extern(def) => self.check_signature_types(&def.signature, def.location.as_ref()),
            other => self.check_stmt(other),
        }
    }

    pub(super) fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => {
                self.check_expr(expr);
            }
            Stmt::Function(def) => {
                let ty = self.function_type(&def.params, def.return_type.as_ref());
                self.env.define(def.name.clone(), ty);
                self.check_function(def, None);
            }
            Stmt::Struct(def) => self.check_local_type(stmt, &def.name, def.location.as_ref()),
            Stmt::Interface(def) => self.check_local_type(stmt, &def.name, def.location.as_ref()),
            Stmt::TypeAlias(def) => self.check_local_type(stmt, &def.name, def.location.as_ref()),
            Stmt::Union(def) => self.check_local_type(stmt, &def.name, def.location.as_ref()),
            Stmt::Implementation(def) => self.check_implementation(def),
            Stmt::Methods(def) => self.check_methods(def),
            Stmt::Extern(def) => {
                let signature = &def.signature;
                if self.env.lookup(&signature.name).is_none() {
                    let ty = self.function_type(&signature.params, signature.return_type.as_ref());
                    self.env.define(signature.name.clone(), ty);
                }
                self.check_signature_types(signature, def.location.as_ref());
            }
            Stmt::DynImport(import) => self.check_import(import, true),
            Stmt::Return(value) => {
                if let Some(value) = value {
                    self.check_expr(value);
                }
            }
            Stmt::Break { label, value } => {
                self.check_label(label.as_deref());
                if let Some(value) = value {
                    self.check_expr(value);
                }
            }
            Stmt::Continue { label } => self.check_label(label.as_deref()),
            Stmt::Raise(value) => {
                self.check_expr(value);
            }
            Stmt::Rethrow => {
                if self.rescue_depth == 0 {
                    self.report(
                        control::RETHROW_OUTSIDE_RESCUE,
                        "typechecker: rethrow outside rescue".to_string(),
                        None,
                    );
                }
            }
            Stmt::While(looped) => {
                self.check_expr(&looped.condition);
                self.check_block(&looped.body);
            }
            Stmt::For(looped) => {
                let element = match self.check_expr(&looped.iterable) {
                    Type::Array(inner) => *inner,
                    _ => Type::Unknown,
                };
                self.env.push();
                self.bind_pattern(&looped.pattern, element);
                for stmt in &looped.body.stmts {
                    self.check_stmt(stmt);
                }
                self.env.pop();
            }
        }
    }

    fn check_label(&mut self, label: Option<&str>) {
        let Some(label) = label else {
            return;
        };
        if !self.labels.iter().any(|l| l == label) {
            self.report(
                control::UNKNOWN_BREAK_LABEL,
                format!("typechecker: unknown break label '{}'", label),
                None,
            );
        }
    }

    /// Check a block in its own scope; the type is that of a trailing
    /// expression statement
    pub(super) fn check_block(&mut self, block: &Block) -> Type {
        self.env.push();
        let mut last = Type::Nil;
        for stmt in &block.stmts {
            self.check_stmt(stmt);
            last = match stmt {
                Stmt::Expr(expr) => self.expression_type_hint(expr),
                _ => Type::Nil,
            };
        }
        self.env.pop();
        last
    }

    /// Cheap type of an already-checked expression, without re-reporting
    fn expression_type_hint(&self, expr: &Expr) -> Type {
        match expr {
            Expr::Integer { kind, .. } => Type::Integer(kind.unwrap_or(IntegerKind::I32)),
            Expr::Float { kind, .. } => Type::Float(kind.unwrap_or(FloatKind::F64)),
            Expr::Bool(_) => Type::Bool,
            Expr::Char(_) => Type::Char,
            Expr::String(_) | Expr::Interpolation { .. } => Type::String,
            Expr::Nil => Type::Nil,
            Expr::Identifier(ident) => self.env.lookup(&ident.name).cloned().unwrap_or(Type::Unknown),
            _ => Type::Unknown,
        }
    }

    /// Check a named function or method; `self_ty` types a `self` receiver
    pub(super) fn check_function(&mut self, def: &FunctionDefinition, self_ty: Option<&Type>) {
        self.check_callable(
            format!("fn {}", def.name),
            &def.generics,
            &def.params,
            def.return_type.as_ref(),
            &def.body,
            def.location.as_ref(),
            self_ty,
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn check_callable(
        &mut self,
        label: String,
        generics: &[GenericParameter],
        params: &[Parameter],
        return_type: Option<&TypeExpr>,
        body: &Block,
        location: Option<&Location>,
        self_ty: Option<&Type>,
    ) {
        let declared: Vec<String> = generics.iter().map(|g| g.name.clone()).collect();
        let mut written: Vec<&TypeExpr> = params.iter().filter_map(|p| p.ty.as_ref()).collect();
        written.extend(return_type);
        let inferred = self.infer_generic_names(&written, &declared, location);
        if !inferred.is_empty() {
            tracing::trace!(function = %label, inferred = ?inferred.keys().collect::<Vec<_>>(), "inferred generics");
        }
        self.generic_stack.push(GenericFrame {
            label,
            declared,
            inferred,
        });

        for generic in generics {
            for constraint in &generic.constraints {
                self.check_type_expr(constraint, location);
            }
        }
        if let Some(ret) = return_type {
            self.check_type_expr(ret, location);
        }

        let saved_labels = std::mem::take(&mut self.labels);
        let saved_rescue = std::mem::replace(&mut self.rescue_depth, 0);
        self.env.push();
        for param in params {
            let ty = if param.pattern.is_self() && param.ty.is_none() {
                self_ty.cloned().unwrap_or(Type::Unknown)
            } else {
                param.ty.as_ref().map_or(Type::Unknown, |ty| self.resolve_type_expr(ty))
            };
            match &param.ty {
                Some(written) if !matches!(param.pattern, Pattern::Typed { .. }) => {
                    self.check_type_expr(written, location);
                    self.bind_pattern(&param.pattern, ty);
                }
                _ => self.bind_pattern(&param.pattern, ty),
            }
        }
        self.check_block(body);
        self.env.pop();
        self.labels = saved_labels;
        self.rescue_depth = saved_rescue;
        self.generic_stack.pop();
    }

    fn check_signature_types(&mut self, signature: &FunctionSignature, location: Option<&Location>) {
        for param in &signature.params {
            if let Some(ty) = &param.ty {
                self.check_type_expr(ty, location);
            }
        }
        if let Some(ret) = &signature.return_type {
            self.check_type_expr(ret, location);
        }
    }

    /// Check written types inside a struct, interface, alias or union
    pub(super) fn check_type_declaration(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Struct(def) => {
                for field in &def.fields {
                    self.check_type_expr(&field.ty, def.location.as_ref());
                }
            }
            Stmt::Interface(def) => self.check_interface(def),
            Stmt::TypeAlias(def) => self.check_type_expr(&def.target, def.location.as_ref()),
            Stmt::Union(def) => {
                self.check_union(&def.variants, def.location.as_ref());
            }
            _ => {}
        }
    }

    /// A type declared inside a function body may not reuse a name the
    /// enclosing signature inferred as a generic parameter
    fn check_local_type(&mut self, stmt: &Stmt, name: &str, location: Option<&Location>) {
        let clash = self.generic_stack.iter().rev().find_map(|frame| {
            frame
                .inferred
                .get(name)
                .map(|inferred_at| (frame.label.clone(), describe_location(inferred_at.as_ref())))
        });
        if let Some((label, inferred_at)) = clash {
            self.report(
                declarations::INFERRED_PARAMETER_REDECLARED,
                format!(
                    "typechecker: cannot redeclare inferred type parameter '{}' inside {} (inferred at {})",
                    name, label, inferred_at
                ),
                location,
            );
        }
        self.declare_type(stmt);
        self.check_type_declaration(stmt);
    }

    /// Bind the names a pattern introduces in the current scope
    pub(super) fn bind_pattern(&mut self, pattern: &Pattern, ty: Type) {
        match pattern {
            Pattern::Wildcard => {}
            Pattern::Identifier(name) => self.env.define(name.clone(), ty),
            Pattern::Literal(expr) => {
                self.check_expr(expr);
            }
            Pattern::Array { elements, rest } => {
                let element = match ty {
                    Type::Array(inner) => *inner,
                    _ => Type::Unknown,
                };
                for item in elements {
                    self.bind_pattern(item, element.clone());
                }
                if let Some(RestPattern::Named(name)) = rest {
                    self.env.define(name.clone(), Type::Array(Box::new(element)));
                }
            }
            Pattern::Struct { fields, .. } => {
                for field in fields {
                    self.bind_pattern(&field.pattern, Type::Unknown);
                }
            }
            Pattern::Typed { pattern, ty } => {
                self.check_type_expr(ty, None);
                let declared = self.resolve_type_expr(ty);
                self.bind_pattern(pattern, declared);
            }
        }
    }
}
