//! Expression checking.

use crate::ast::*;
use crate::diagnostics::error_codes::{declarations, packages, types};
use crate::diagnostics::Location;
use crate::interpreter::numeric::promote_integer_kinds;

use super::summary::SymbolKind;
use super::types::Type;
use super::TypeChecker;

impl TypeChecker {
    pub(super) fn check_expr(&mut self, expr: &Expr) -> Type {
        match expr {
            Expr::Integer { value, kind } => {
                let kind = kind.unwrap_or(IntegerKind::I32);
                self.check_integer_literal(*value, kind, None);
                Type::Integer(kind)
            }
            Expr::Float { kind, .. } => Type::Float(kind.unwrap_or(FloatKind::F64)),
            Expr::Bool(_) => Type::Bool,
            Expr::Char(_) => Type::Char,
            Expr::String(_) => Type::String,
            Expr::Nil => Type::Nil,
            Expr::Identifier(ident) => self.check_identifier(ident),
            Expr::Array { elements, .. } => {
                let mut element = Type::Unknown;
                for (index, item) in elements.iter().enumerate() {
                    let ty = self.check_expr(item);
                    if index == 0 {
                        element = ty;
                    }
                }
                Type::Array(Box::new(element))
            }
            Expr::Interpolation { parts, .. } => {
                for part in parts {
                    self.check_expr(part);
                }
                Type::String
            }
            Expr::Unary { op, operand } => {
                let ty = self.check_expr(operand);
                match op {
                    UnaryOp::Not => Type::Bool,
                    UnaryOp::Neg | UnaryOp::BitNot => ty,
                }
            }
            Expr::Binary { op, left, right, .. } => {
                let left = self.check_expr(left);
                let right = self.check_expr(right);
                self.check_binary(*op, left, right)
            }
            Expr::Call(call) => self.check_call(call),
            Expr::Member { object, member } => self.check_member(object, member),
            Expr::Index { object, index, .. } => {
                let object = self.check_expr(object);
                self.check_expr(index);
                match object {
                    Type::Array(inner) => *inner,
                    Type::String => Type::Char,
                    _ => Type::Unknown,
                }
            }
            Expr::Block(block) => self.check_block(block),
            Expr::Assign(assignment) => self.check_assignment(assignment),
            Expr::If(branch) => {
                self.check_expr(&branch.condition);
                self.check_block(&branch.then_branch);
                for elsif in &branch.elsif {
                    self.check_expr(&elsif.condition);
                    self.check_block(&elsif.body);
                }
                if let Some(otherwise) = &branch.else_branch {
                    self.check_block(otherwise);
                }
                Type::Unknown
            }
            Expr::Match(matched) => {
                let subject = self.check_expr(&matched.subject);
                for clause in &matched.clauses {
                    self.check_clause(clause, subject.clone());
                }
                Type::Unknown
            }
            Expr::Lambda(lambda) => self.check_lambda(lambda),
            Expr::StructLiteral(literal) => self.check_struct_literal(literal),
            Expr::Range { start, end, .. } => {
                let start = self.check_expr(start);
                self.check_expr(end);
                Type::Array(Box::new(start))
            }
            Expr::Rescue(rescue) => {
                self.check_expr(&rescue.body);
                self.rescue_depth += 1;
                for clause in &rescue.clauses {
                    self.check_clause(clause, Type::Unknown);
                }
                self.rescue_depth -= 1;
                Type::Unknown
            }
            Expr::Breakpoint { label, body } => {
                self.labels.push(label.clone());
                self.check_block(body);
                self.labels.pop();
                Type::Unknown
            }
            Expr::Spawn(body) => {
                let saved_labels = std::mem::take(&mut self.labels);
                let saved_rescue = std::mem::replace(&mut self.rescue_depth, 0);
                let ty = self.check_expr(body);
                self.labels = saved_labels;
                self.rescue_depth = saved_rescue;
                Type::Future(Box::new(ty))
            }
            Expr::Await { future, .. } => match self.check_expr(future) {
                Type::Future(inner) => *inner,
                _ => Type::Unknown,
            },
        }
    }

    fn check_identifier(&mut self, ident: &Identifier) -> Type {
        match self.env.lookup(&ident.name) {
            Some(ty) => ty.clone(),
            None => {
                self.report(
                    declarations::UNDEFINED_IDENTIFIER,
                    format!("typechecker: undefined identifier '{}'", ident.name),
                    ident.location.as_ref(),
                );
                Type::Unknown
            }
        }
    }

    fn check_integer_literal(&mut self, value: i128, kind: IntegerKind, location: Option<&Location>) {
        if !kind.contains(value) {
            self.report(
                types::LITERAL_OUT_OF_RANGE,
                format!(
                    "typechecker: integer literal {} does not fit in {}",
                    value,
                    kind.name()
                ),
                location,
            );
        }
    }

    fn check_binary(&mut self, op: BinaryOp, left: Type, right: Type) -> Type {
        match op {
            BinaryOp::And | BinaryOp::Or => return Type::Bool,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                return Type::Bool
            }
            _ => {}
        }
        if op == BinaryOp::Add && left == Type::String && right == Type::String {
            return Type::String;
        }
        let concrete = left.is_primitive() && right.is_primitive();
        if concrete && !(left.is_numeric() && right.is_numeric()) {
            self.report(
                types::INVALID_OPERANDS,
                format!(
                    "typechecker: invalid operands for '{}': {} and {}",
                    op.symbol(),
                    left,
                    right
                ),
                None,
            );
            return Type::Unknown;
        }
        if op == BinaryOp::Div {
            return Type::Float(FloatKind::F64);
        }
        match (&left, &right) {
            (Type::Integer(l), Type::Integer(r)) => Type::Integer(promote_integer_kinds(*l, *r)),
            (Type::Float(_), _) | (_, Type::Float(_)) if concrete => Type::Float(FloatKind::F64),
            _ => Type::Unknown,
        }
    }

    fn check_call(&mut self, call: &CallExpr) -> Type {
        let (name, callee) = match call.callee.as_ref() {
            Expr::Identifier(ident) => (Some(ident.name.clone()), self.check_identifier(ident)),
            Expr::Member {
                object,
                member: MemberName::Named(member),
            } => {
                let ty = self.check_member(object, &MemberName::Named(member.clone()));
                // Only package members are called without a receiver
                let name = match self.env.lookup(root_name(object)) {
                    Some(Type::Package(_)) => Some(member.clone()),
                    _ => None,
                };
                (name, ty)
            }
            other => (None, self.check_expr(other)),
        };
        for arg in &call.args {
            self.check_expr(arg);
        }
        match (name, callee) {
            (Some(name), Type::Function { params, ret }) => {
                if params.len() != call.args.len() {
                    self.report(
                        types::WRONG_ARGUMENT_COUNT,
                        format!(
                            "typechecker: function '{}' expects {} argument(s), got {}",
                            name,
                            params.len(),
                            call.args.len()
                        ),
                        call.location.as_ref(),
                    );
                }
                *ret
            }
            (None, Type::Function { ret, .. }) => *ret,
            (_, Type::StructDef(key)) => match self.structs.get(&key) {
                Some(info) => Type::Named(info.name.clone(), Vec::new()),
                None => Type::Unknown,
            },
            _ => Type::Unknown,
        }
    }

    /// `obj.member`; members of an imported package are checked against
    /// its summary
    fn check_member(&mut self, object: &Expr, member: &MemberName) -> Type {
        let object_ty = self.check_expr(object);
        let (Type::Package(package), MemberName::Named(name)) = (&object_ty, member) else {
            return Type::Unknown;
        };
        let Some(summary) = self.packages.get(package).cloned() else {
            return Type::Unknown;
        };
        let location = match object {
            Expr::Identifier(ident) => ident.location.clone(),
            _ => None,
        };
        match summary.symbol(name) {
            None => {
                self.report(
                    packages::UNKNOWN_SYMBOL,
                    format!("typechecker: package '{}' has no symbol '{}'", package, name),
                    location.as_ref(),
                );
                Type::Unknown
            }
            Some(symbol) if symbol.is_private && self.package.as_deref() != Some(package.as_str()) => {
                self.report(
                    packages::PRIVATE_SYMBOL,
                    format!(
                        "typechecker: symbol '{}' of package '{}' is private",
                        name, package
                    ),
                    location.as_ref(),
                );
                Type::Unknown
            }
            Some(symbol) => match symbol.kind {
                SymbolKind::Function { .. } | SymbolKind::Struct { .. } | SymbolKind::Interface { .. } => {
                    self.summary_symbol_type(package, name, symbol)
                }
                _ => Type::Unknown,
            },
        }
    }

    fn check_clause(&mut self, clause: &MatchClause, subject: Type) {
        self.env.push();
        self.bind_pattern(&clause.pattern, subject);
        if let Some(guard) = &clause.guard {
            // Guards only need to be truthy at runtime
            self.check_expr(guard);
        }
        self.check_expr(&clause.body);
        self.env.pop();
    }

    fn check_lambda(&mut self, lambda: &Lambda) -> Type {
        let saved_labels = std::mem::take(&mut self.labels);
        let saved_rescue = std::mem::replace(&mut self.rescue_depth, 0);
        self.env.push();
        let mut params = Vec::with_capacity(lambda.params.len());
        for param in &lambda.params {
            let ty = match &param.ty {
                Some(written) => {
                    self.check_type_expr(written, None);
                    self.resolve_type_expr(written)
                }
                None => Type::Unknown,
            };
            self.bind_pattern(&param.pattern, ty.clone());
            params.push(ty);
        }
        let body = self.check_expr(&lambda.body);
        self.env.pop();
        self.labels = saved_labels;
        self.rescue_depth = saved_rescue;
        let ret = match &lambda.return_type {
            Some(written) => {
                self.check_type_expr(written, None);
                self.resolve_type_expr(written)
            }
            None => body,
        };
        Type::Function {
            params,
            ret: Box::new(ret),
        }
    }

    fn check_struct_literal(&mut self, literal: &StructLiteral) -> Type {
        let info = match self.env.lookup(&literal.type_name) {
            Some(Type::StructDef(key)) => self.structs.get(key).cloned(),
            _ => None,
        };
        let values: Vec<&Expr> = match &literal.fields {
            StructLiteralFields::Named(inits) => inits.iter().map(|init| &init.value).collect(),
            StructLiteralFields::Positional(values) => values.iter().collect(),
        };
        for value in values {
            self.check_expr(value);
        }
        let Some(info) = info else {
            if self.env.lookup(&literal.type_name).is_none() {
                self.report(
                    declarations::UNDEFINED_IDENTIFIER,
                    format!("typechecker: undefined identifier '{}'", literal.type_name),
                    literal.location.as_ref(),
                );
            }
            return Type::Unknown;
        };

        match &literal.fields {
            StructLiteralFields::Named(inits) if !info.positional => {
                for init in inits {
                    if !info.fields.contains(&init.name) {
                        self.report(
                            types::TYPE_MISMATCH,
                            format!("typechecker: struct '{}' has no field '{}'", info.name, init.name),
                            literal.location.as_ref(),
                        );
                    }
                }
                for field in &info.fields {
                    if !inits.iter().any(|init| &init.name == field) {
                        self.report(
                            types::TYPE_MISMATCH,
                            format!("typechecker: missing field '{}' in {} literal", field, info.name),
                            literal.location.as_ref(),
                        );
                    }
                }
            }
            StructLiteralFields::Positional(values) if info.positional => {
                if values.len() != info.fields.len() {
                    self.report(
                        types::WRONG_ARGUMENT_COUNT,
                        format!(
                            "typechecker: struct '{}' expects {} field(s), got {}",
                            info.name,
                            info.fields.len(),
                            values.len()
                        ),
                        literal.location.as_ref(),
                    );
                }
            }
            _ => {}
        }
        Type::Named(info.name, Vec::new())
    }

    fn check_assignment(&mut self, assignment: &Assignment) -> Type {
        let value_ty = self.check_expr(&assignment.value);
        match (&assignment.op, &assignment.target) {
            (AssignOp::Declare, AssignTarget::Pattern(pattern)) => {
                if let Pattern::Typed { ty, .. } = pattern {
                    let declared = self.resolve_type_expr(ty);
                    self.check_declared_value(&assignment.value, &value_ty, &declared);
                }
                self.bind_pattern(pattern, value_ty.clone());
            }
            (_, AssignTarget::Pattern(pattern)) => {
                for name in pattern.binding_names() {
                    if self.env.lookup(&name).is_none() {
                        self.report(
                            declarations::UNDEFINED_IDENTIFIER,
                            format!("typechecker: undefined identifier '{}'", name),
                            None,
                        );
                    }
                }
            }
            (_, AssignTarget::Member { object, .. }) => {
                self.check_expr(object);
            }
            (_, AssignTarget::Index { object, index }) => {
                self.check_expr(object);
                self.check_expr(index);
            }
        }
        value_ty
    }

    /// `x: T := value`: literal range and primitive compatibility
    fn check_declared_value(&mut self, value: &Expr, actual: &Type, declared: &Type) {
        if let (Expr::Integer { value, kind: None }, Type::Integer(kind)) = (value, declared) {
            self.check_integer_literal(*value, *kind, None);
            return;
        }
        if !actual.is_assignable_to(declared) {
            self.report(
                types::TYPE_MISMATCH,
                format!("typechecker: cannot assign {} to {}", actual, declared),
                None,
            );
        }
    }
}

/// Leftmost identifier of a member chain
fn root_name(expr: &Expr) -> &str {
    match expr {
        Expr::Identifier(ident) => &ident.name,
        Expr::Member { object, .. } => root_name(object),
        _ => "",
    }
}
