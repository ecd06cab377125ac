//! Builder functions for constructing AST nodes
//!
//! These are the construction API used by parsers, fixtures and tests.

use super::*;

// Literals and simple expressions

pub fn int(value: i128) -> Expr {
    Expr::Integer { value, kind: None }
}

pub fn int_of(value: i128, kind: IntegerKind) -> Expr {
    Expr::Integer {
        value,
        kind: Some(kind),
    }
}

pub fn float(value: f64) -> Expr {
    Expr::Float { value, kind: None }
}

pub fn boolean(value: bool) -> Expr {
    Expr::Bool(value)
}

pub fn chr(value: char) -> Expr {
    Expr::Char(value)
}

pub fn string(value: impl Into<String>) -> Expr {
    Expr::String(value.into())
}

pub fn nil() -> Expr {
    Expr::Nil
}

pub fn ident(name: impl Into<String>) -> Expr {
    Expr::Identifier(Identifier {
        name: name.into(),
        location: None,
    })
}

pub fn ident_at(name: impl Into<String>, location: Location) -> Expr {
    Expr::Identifier(Identifier {
        name: name.into(),
        location: Some(location),
    })
}

pub fn array(elements: Vec<Expr>) -> Expr {
    Expr::Array {
        id: NodeId::new(),
        elements,
    }
}

pub fn interpolate(parts: Vec<Expr>) -> Expr {
    Expr::Interpolation {
        id: NodeId::new(),
        parts,
    }
}

pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary {
        op,
        operand: Box::new(operand),
    }
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        id: NodeId::new(),
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call(CallExpr {
        id: NodeId::new(),
        callee: Box::new(callee),
        args,
        location: None,
    })
}

/// `name(args)`
pub fn call_fn(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    call(ident(name), args)
}

/// `receiver.name(args)`
pub fn method_call(receiver: Expr, name: impl Into<String>, args: Vec<Expr>) -> Expr {
    call(member(receiver, name), args)
}

pub fn member(object: Expr, name: impl Into<String>) -> Expr {
    Expr::Member {
        object: Box::new(object),
        member: MemberName::Named(name.into()),
    }
}

pub fn member_at(object: Expr, position: usize) -> Expr {
    Expr::Member {
        object: Box::new(object),
        member: MemberName::Position(position),
    }
}

pub fn index(object: Expr, index: Expr) -> Expr {
    Expr::Index {
        id: NodeId::new(),
        object: Box::new(object),
        index: Box::new(index),
    }
}

pub fn range(start: Expr, end: Expr, inclusive: bool) -> Expr {
    Expr::Range {
        id: NodeId::new(),
        start: Box::new(start),
        end: Box::new(end),
        inclusive,
    }
}

pub fn spawn(body: Expr) -> Expr {
    Expr::Spawn(Box::new(body))
}

pub fn await_(future: Expr) -> Expr {
    Expr::Await {
        id: NodeId::new(),
        future: Box::new(future),
    }
}

// Blocks and control flow

pub fn block(stmts: Vec<Stmt>) -> Block {
    Block {
        id: NodeId::new(),
        stmts,
    }
}

pub fn block_expr(stmts: Vec<Stmt>) -> Expr {
    Expr::Block(block(stmts))
}

pub fn if_else(condition: Expr, then_branch: Vec<Stmt>, else_branch: Option<Vec<Stmt>>) -> Expr {
    Expr::If(Box::new(IfExpr {
        id: NodeId::new(),
        condition,
        then_branch: block(then_branch),
        elsif: Vec::new(),
        else_branch: else_branch.map(block),
    }))
}

pub fn if_chain(
    condition: Expr,
    then_branch: Vec<Stmt>,
    elsif: Vec<(Expr, Vec<Stmt>)>,
    else_branch: Option<Vec<Stmt>>,
) -> Expr {
    Expr::If(Box::new(IfExpr {
        id: NodeId::new(),
        condition,
        then_branch: block(then_branch),
        elsif: elsif
            .into_iter()
            .map(|(condition, body)| ElsIf {
                condition,
                body: block(body),
            })
            .collect(),
        else_branch: else_branch.map(block),
    }))
}

pub fn clause(pattern: Pattern, guard: Option<Expr>, body: Expr) -> MatchClause {
    MatchClause {
        pattern,
        guard,
        body,
    }
}

pub fn match_expr(subject: Expr, clauses: Vec<MatchClause>) -> Expr {
    Expr::Match(Box::new(MatchExpr {
        id: NodeId::new(),
        subject,
        clauses,
    }))
}

pub fn rescue(body: Expr, clauses: Vec<MatchClause>) -> Expr {
    Expr::Rescue(Box::new(RescueExpr {
        id: NodeId::new(),
        body,
        clauses,
    }))
}

pub fn breakpoint(label: impl Into<String>, stmts: Vec<Stmt>) -> Expr {
    Expr::Breakpoint {
        label: label.into(),
        body: block(stmts),
    }
}

pub fn lambda(params: Vec<Parameter>, body: Expr) -> Expr {
    Expr::Lambda(Box::new(Lambda {
        params,
        return_type: None,
        body,
    }))
}

// Struct literals

pub fn struct_literal(type_name: impl Into<String>, fields: Vec<(&str, Expr)>) -> Expr {
    Expr::StructLiteral(StructLiteral {
        id: NodeId::new(),
        type_name: type_name.into(),
        fields: StructLiteralFields::Named(
            fields
                .into_iter()
                .map(|(name, value)| FieldInit {
                    name: name.to_string(),
                    value,
                })
                .collect(),
        ),
        location: None,
    })
}

pub fn struct_positional(type_name: impl Into<String>, values: Vec<Expr>) -> Expr {
    Expr::StructLiteral(StructLiteral {
        id: NodeId::new(),
        type_name: type_name.into(),
        fields: StructLiteralFields::Positional(values),
        location: None,
    })
}

// Assignments

fn assignment(op: AssignOp, target: AssignTarget, value: Expr) -> Expr {
    Expr::Assign(Box::new(Assignment { op, target, value }))
}

/// `pattern := value`
pub fn declare(pattern: Pattern, value: Expr) -> Stmt {
    Stmt::Expr(assignment(AssignOp::Declare, AssignTarget::Pattern(pattern), value))
}

/// `pattern = value`
pub fn assign(pattern: Pattern, value: Expr) -> Stmt {
    Stmt::Expr(assignment(AssignOp::Assign, AssignTarget::Pattern(pattern), value))
}

/// `name op= value`
pub fn compound(op: BinaryOp, name: impl Into<String>, value: Expr) -> Stmt {
    Stmt::Expr(assignment(
        AssignOp::Compound(op),
        AssignTarget::Pattern(Pattern::Identifier(name.into())),
        value,
    ))
}

/// `object.member = value` (or `op=` when `op` is given)
pub fn assign_member(
    object: Expr,
    member: impl Into<String>,
    op: Option<BinaryOp>,
    value: Expr,
) -> Stmt {
    Stmt::Expr(assignment(
        op.map_or(AssignOp::Assign, AssignOp::Compound),
        AssignTarget::Member {
            object,
            member: MemberName::Named(member.into()),
        },
        value,
    ))
}

/// `object[index] = value` (or `op=` when `op` is given)
pub fn assign_index(object: Expr, index: Expr, op: Option<BinaryOp>, value: Expr) -> Stmt {
    Stmt::Expr(assignment(
        op.map_or(AssignOp::Assign, AssignOp::Compound),
        AssignTarget::Index { object, index },
        value,
    ))
}

// Statements

pub fn expr(expr: Expr) -> Stmt {
    Stmt::Expr(expr)
}

pub fn ret(value: Option<Expr>) -> Stmt {
    Stmt::Return(value)
}

pub fn brk(label: Option<&str>, value: Option<Expr>) -> Stmt {
    Stmt::Break {
        label: label.map(str::to_string),
        value,
    }
}

pub fn cont(label: Option<&str>) -> Stmt {
    Stmt::Continue {
        label: label.map(str::to_string),
    }
}

pub fn raise(value: Expr) -> Stmt {
    Stmt::Raise(value)
}

pub fn rethrow() -> Stmt {
    Stmt::Rethrow
}

pub fn while_loop(condition: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While(WhileLoop {
        id: NodeId::new(),
        condition,
        body: block(body),
    })
}

pub fn for_loop(pattern: Pattern, iterable: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::For(ForLoop {
        id: NodeId::new(),
        pattern,
        iterable,
        body: block(body),
    })
}

// Patterns

pub fn wildcard() -> Pattern {
    Pattern::Wildcard
}

pub fn bind(name: impl Into<String>) -> Pattern {
    Pattern::Identifier(name.into())
}

pub fn literal(value: Expr) -> Pattern {
    Pattern::Literal(Box::new(value))
}

pub fn array_pattern(elements: Vec<Pattern>, rest: Option<RestPattern>) -> Pattern {
    Pattern::Array { elements, rest }
}

pub fn rest(name: impl Into<String>) -> Option<RestPattern> {
    Some(RestPattern::Named(name.into()))
}

/// `Type { field: pattern, ... }`
pub fn struct_pattern(type_name: Option<&str>, fields: Vec<(&str, Pattern)>) -> Pattern {
    Pattern::Struct {
        type_name: type_name.map(str::to_string),
        fields: fields
            .into_iter()
            .map(|(field, pattern)| StructPatternField {
                field: Some(field.to_string()),
                pattern,
            })
            .collect(),
    }
}

/// `Type { pattern, pattern }` matched by declared order
pub fn positional_pattern(type_name: Option<&str>, patterns: Vec<Pattern>) -> Pattern {
    Pattern::Struct {
        type_name: type_name.map(str::to_string),
        fields: patterns
            .into_iter()
            .map(|pattern| StructPatternField {
                field: None,
                pattern,
            })
            .collect(),
    }
}

pub fn typed(pattern: Pattern, ty: TypeExpr) -> Pattern {
    Pattern::Typed {
        pattern: Box::new(pattern),
        ty,
    }
}

// Types

pub fn ty(name: impl Into<String>) -> TypeExpr {
    TypeExpr::Simple(name.into())
}

pub fn generic(base: impl Into<String>, args: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::Generic {
        base: base.into(),
        args,
    }
}

pub fn nullable(inner: TypeExpr) -> TypeExpr {
    TypeExpr::Nullable(Box::new(inner))
}

pub fn union(members: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::Union(members)
}

pub fn fn_type(params: Vec<TypeExpr>, ret: TypeExpr) -> TypeExpr {
    TypeExpr::Function {
        params,
        ret: Box::new(ret),
    }
}

// Definitions

pub fn param(name: impl Into<String>, ty: Option<TypeExpr>) -> Parameter {
    Parameter {
        pattern: Pattern::Identifier(name.into()),
        ty,
    }
}

pub fn generic_param(name: impl Into<String>, constraints: Vec<TypeExpr>) -> GenericParameter {
    GenericParameter {
        name: name.into(),
        constraints,
    }
}

pub fn function(
    name: impl Into<String>,
    params: Vec<Parameter>,
    return_type: Option<TypeExpr>,
    body: Vec<Stmt>,
) -> FunctionDefinition {
    FunctionDefinition {
        name: name.into(),
        generics: Vec::new(),
        params,
        return_type,
        body: block(body),
        is_private: false,
        location: None,
    }
}

impl FunctionDefinition {
    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_generics(mut self, generics: Vec<GenericParameter>) -> Self {
        self.generics = generics;
        self
    }
}

pub fn struct_def(name: impl Into<String>, fields: Vec<(&str, TypeExpr)>) -> StructDefinition {
    StructDefinition {
        name: name.into(),
        generics: Vec::new(),
        kind: StructKind::Named,
        fields: fields
            .into_iter()
            .map(|(name, ty)| StructField {
                name: Some(name.to_string()),
                ty,
            })
            .collect(),
        is_private: false,
        location: None,
    }
}

pub fn positional_struct_def(name: impl Into<String>, fields: Vec<TypeExpr>) -> StructDefinition {
    let kind = if fields.is_empty() {
        StructKind::Singleton
    } else {
        StructKind::Positional
    };
    StructDefinition {
        name: name.into(),
        generics: Vec::new(),
        kind,
        fields: fields
            .into_iter()
            .map(|ty| StructField { name: None, ty })
            .collect(),
        is_private: false,
        location: None,
    }
}

impl StructDefinition {
    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_generics(mut self, generics: Vec<GenericParameter>) -> Self {
        self.generics = generics;
        self
    }
}

pub fn signature(
    name: impl Into<String>,
    params: Vec<Parameter>,
    return_type: Option<TypeExpr>,
) -> FunctionSignature {
    FunctionSignature {
        name: name.into(),
        generics: Vec::new(),
        params,
        return_type,
        default_body: None,
    }
}

impl FunctionSignature {
    pub fn with_default(mut self, body: Vec<Stmt>) -> Self {
        self.default_body = Some(block(body));
        self
    }
}

pub fn interface(name: impl Into<String>, signatures: Vec<FunctionSignature>) -> InterfaceDefinition {
    InterfaceDefinition {
        name: name.into(),
        generics: Vec::new(),
        signatures,
        is_private: false,
        location: None,
    }
}

pub fn implementation(
    interface: impl Into<String>,
    target: TypeExpr,
    definitions: Vec<FunctionDefinition>,
) -> ImplementationDefinition {
    ImplementationDefinition {
        interface: interface.into(),
        interface_args: Vec::new(),
        target,
        generics: Vec::new(),
        definitions,
        location: None,
    }
}

pub fn methods(target: TypeExpr, definitions: Vec<FunctionDefinition>) -> MethodsDefinition {
    MethodsDefinition {
        target,
        generics: Vec::new(),
        definitions,
        location: None,
    }
}

pub fn type_alias(name: impl Into<String>, target: TypeExpr) -> TypeAliasDefinition {
    TypeAliasDefinition {
        name: name.into(),
        generics: Vec::new(),
        target,
        is_private: false,
        location: None,
    }
}

pub fn union_def(name: impl Into<String>, variants: Vec<TypeExpr>) -> UnionDefinition {
    UnionDefinition {
        name: name.into(),
        generics: Vec::new(),
        variants,
        is_private: false,
        location: None,
    }
}

pub fn extern_fn(
    target: impl Into<String>,
    signature: FunctionSignature,
    body: impl Into<String>,
) -> ExternFunctionBody {
    ExternFunctionBody {
        target: target.into(),
        signature,
        body: body.into(),
        location: None,
    }
}

// Modules and imports

pub fn import(path: &str) -> ImportStatement {
    ImportStatement {
        path: path.split('.').map(str::to_string).collect(),
        alias: None,
        selectors: Vec::new(),
        wildcard: false,
        location: None,
    }
}

impl ImportStatement {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn select(mut self, name: impl Into<String>, alias: Option<&str>) -> Self {
        self.selectors.push(ImportSelector {
            name: name.into(),
            alias: alias.map(str::to_string),
        });
        self
    }

    pub fn all(mut self) -> Self {
        self.wildcard = true;
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

pub fn module(package: Option<&str>, imports: Vec<ImportStatement>, body: Vec<Stmt>) -> Module {
    Module {
        id: NodeId::new(),
        package: package.map(|name| PackageStatement {
            path: name.split('.').map(str::to_string).collect(),
            is_private: false,
        }),
        imports,
        body,
        origin: PackageOrigin::default(),
        location: None,
    }
}

impl Module {
    pub fn with_origin(mut self, root: impl Into<String>, is_stdlib: bool) -> Self {
        self.origin = PackageOrigin {
            root: root.into(),
            is_stdlib,
        };
        self
    }
}

pub fn loc(path: &str, line: usize, column: usize) -> Location {
    Location::new(path, line, column)
}
