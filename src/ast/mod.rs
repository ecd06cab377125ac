//! Abstract Syntax Tree definitions for Able
//!
//! The tree is produced by an external parser (or by the builder functions in
//! [`build`]) and consumed read-only by the evaluator and the type checker.
//! Nodes that can hold a suspended task's progress carry a [`NodeId`].

use crate::diagnostics::Location;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub mod build;

/// Unique identifier for AST nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Generate a new unique node ID
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// A complete Able module (one source file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: NodeId,
    pub package: Option<PackageStatement>,
    pub imports: Vec<ImportStatement>,
    pub body: Vec<Stmt>,
    pub origin: PackageOrigin,
    pub location: Option<Location>,
}

impl Module {
    /// Dotted package name, if the module declares one
    pub fn package_name(&self) -> Option<String> {
        self.package.as_ref().map(|p| p.path.join("."))
    }
}

/// `package foo.bar`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageStatement {
    pub path: Vec<String>,
    pub is_private: bool,
}

/// Where a package was loaded from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageOrigin {
    pub root: String,
    pub is_stdlib: bool,
}

/// `import` / `dynimport` statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportStatement {
    pub path: Vec<String>,
    pub alias: Option<String>,
    pub selectors: Vec<ImportSelector>,
    pub wildcard: bool,
    pub location: Option<Location>,
}

impl ImportStatement {
    /// Dotted package name
    pub fn package_name(&self) -> String {
        self.path.join(".")
    }

    /// Name the whole package is bound under when no selectors are given
    pub fn binding_name(&self) -> String {
        self.alias
            .clone()
            .or_else(|| self.path.last().cloned())
            .unwrap_or_default()
    }
}

/// `name` or `name as alias` inside an import selector list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSelector {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportSelector {
    pub fn binding_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Statements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Expr(Expr),
    Function(FunctionDefinition),
    Struct(StructDefinition),
    Interface(InterfaceDefinition),
    Implementation(ImplementationDefinition),
    Methods(MethodsDefinition),
    TypeAlias(TypeAliasDefinition),
    Union(UnionDefinition),
    Extern(ExternFunctionBody),
    DynImport(ImportStatement),
    Return(Option<Expr>),
    Break {
        label: Option<String>,
        value: Option<Expr>,
    },
    Continue {
        label: Option<String>,
    },
    Raise(Expr),
    Rethrow,
    While(WhileLoop),
    For(ForLoop),
}

impl Stmt {
    /// Name introduced by a top-level definition statement
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            Stmt::Function(def) => Some(&def.name),
            Stmt::Struct(def) => Some(&def.name),
            Stmt::Interface(def) => Some(&def.name),
            Stmt::TypeAlias(def) => Some(&def.name),
            Stmt::Union(def) => Some(&def.name),
            _ => None,
        }
    }
}

/// A braced sequence of statements with its own scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhileLoop {
    pub id: NodeId,
    pub condition: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForLoop {
    pub id: NodeId,
    pub pattern: Pattern,
    pub iterable: Expr,
    pub body: Block,
}

/// Integer kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegerKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntegerKind {
    pub const ALL: [IntegerKind; 8] = [
        IntegerKind::I8,
        IntegerKind::I16,
        IntegerKind::I32,
        IntegerKind::I64,
        IntegerKind::U8,
        IntegerKind::U16,
        IntegerKind::U32,
        IntegerKind::U64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IntegerKind::I8 => "i8",
            IntegerKind::I16 => "i16",
            IntegerKind::I32 => "i32",
            IntegerKind::I64 => "i64",
            IntegerKind::U8 => "u8",
            IntegerKind::U16 => "u16",
            IntegerKind::U32 => "u32",
            IntegerKind::U64 => "u64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn bits(self) -> u32 {
        match self {
            IntegerKind::I8 | IntegerKind::U8 => 8,
            IntegerKind::I16 | IntegerKind::U16 => 16,
            IntegerKind::I32 | IntegerKind::U32 => 32,
            IntegerKind::I64 | IntegerKind::U64 => 64,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntegerKind::I8 | IntegerKind::I16 | IntegerKind::I32 | IntegerKind::I64
        )
    }

    pub fn min_value(self) -> i128 {
        if self.is_signed() {
            -(1i128 << (self.bits() - 1))
        } else {
            0
        }
    }

    pub fn max_value(self) -> i128 {
        if self.is_signed() {
            (1i128 << (self.bits() - 1)) - 1
        } else {
            (1i128 << self.bits()) - 1
        }
    }

    pub fn contains(self, value: i128) -> bool {
        value >= self.min_value() && value <= self.max_value()
    }
}

impl fmt::Display for IntegerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Float kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatKind {
    F32,
    F64,
}

impl FloatKind {
    pub fn name(self) -> &'static str {
        match self {
            FloatKind::F32 => "f32",
            FloatKind::F64 => "f64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "f32" => Some(FloatKind::F32),
            "f64" => Some(FloatKind::F64),
            _ => None,
        }
    }
}

/// An identifier occurrence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub location: Option<Location>,
}

/// Expressions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Integer {
        value: i128,
        kind: Option<IntegerKind>,
    },
    Float {
        value: f64,
        kind: Option<FloatKind>,
    },
    Bool(bool),
    Char(char),
    String(String),
    Nil,
    Identifier(Identifier),
    Array {
        id: NodeId,
        elements: Vec<Expr>,
    },
    /// String interpolation; literal segments are `Expr::String`
    Interpolation {
        id: NodeId,
        parts: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        id: NodeId,
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call(CallExpr),
    Member {
        object: Box<Expr>,
        member: MemberName,
    },
    Index {
        id: NodeId,
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Block(Block),
    Assign(Box<Assignment>),
    If(Box<IfExpr>),
    Match(Box<MatchExpr>),
    Lambda(Box<Lambda>),
    StructLiteral(StructLiteral),
    Range {
        id: NodeId,
        start: Box<Expr>,
        end: Box<Expr>,
        inclusive: bool,
    },
    Rescue(Box<RescueExpr>),
    Breakpoint {
        label: String,
        body: Block,
    },
    Spawn(Box<Expr>),
    Await {
        id: NodeId,
        future: Box<Expr>,
    },
}

impl Expr {
    /// Literal expressions usable in literal patterns
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::Integer { .. }
                | Expr::Float { .. }
                | Expr::Bool(_)
                | Expr::Char(_)
                | Expr::String(_)
                | Expr::Nil
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
    /// `.~x`
    BitNot,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// `/`, always produces a float
    Div,
    /// `//`, Euclidean quotient
    IntDiv,
    /// `%`, Euclidean remainder
    Mod,
    /// `^`
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Source text of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::BitAnd => ".&",
            BinaryOp::BitOr => ".|",
            BinaryOp::BitXor => ".^",
            BinaryOp::Shl => ".<<",
            BinaryOp::Shr => ".>>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::IntDiv
                | BinaryOp::Mod
                | BinaryOp::Pow
        )
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallExpr {
    pub id: NodeId,
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
    pub location: Option<Location>,
}

/// `obj.name` or `obj.0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberName {
    Named(String),
    Position(usize),
}

impl fmt::Display for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberName::Named(name) => f.write_str(name),
            MemberName::Position(index) => write!(f, "{}", index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    /// `:=`
    Declare,
    /// `=`
    Assign,
    /// `+=`, `.<<=` and friends
    Compound(BinaryOp),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssignTarget {
    Pattern(Pattern),
    Member { object: Expr, member: MemberName },
    Index { object: Expr, index: Expr },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub op: AssignOp,
    pub target: AssignTarget,
    pub value: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfExpr {
    pub id: NodeId,
    pub condition: Expr,
    pub then_branch: Block,
    pub elsif: Vec<ElsIf>,
    pub else_branch: Option<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElsIf {
    pub condition: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchExpr {
    pub id: NodeId,
    pub subject: Expr,
    pub clauses: Vec<MatchClause>,
}

/// A `pattern if guard => body` clause, shared by `match` and `rescue`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchClause {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescueExpr {
    pub id: NodeId,
    pub body: Expr,
    pub clauses: Vec<MatchClause>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lambda {
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeExpr>,
    pub body: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructLiteral {
    pub id: NodeId,
    pub type_name: String,
    pub fields: StructLiteralFields,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StructLiteralFields {
    Named(Vec<FieldInit>),
    Positional(Vec<Expr>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldInit {
    pub name: String,
    pub value: Expr,
}

/// Patterns used by assignment, loops, parameters, match and rescue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Pattern {
    Wildcard,
    Identifier(String),
    Literal(Box<Expr>),
    Array {
        elements: Vec<Pattern>,
        rest: Option<RestPattern>,
    },
    Struct {
        type_name: Option<String>,
        fields: Vec<StructPatternField>,
    },
    Typed {
        pattern: Box<Pattern>,
        ty: TypeExpr,
    },
}

impl Pattern {
    /// Names bound by this pattern, in source order
    pub fn binding_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut Vec<String>) {
        match self {
            Pattern::Wildcard | Pattern::Literal(_) => {}
            Pattern::Identifier(name) => names.push(name.clone()),
            Pattern::Array { elements, rest } => {
                for element in elements {
                    element.collect_names(names);
                }
                if let Some(RestPattern::Named(name)) = rest {
                    names.push(name.clone());
                }
            }
            Pattern::Struct { fields, .. } => {
                for field in fields {
                    field.pattern.collect_names(names);
                }
            }
            Pattern::Typed { pattern, .. } => pattern.collect_names(names),
        }
    }

    /// Is this the `self` receiver binder of a method
    pub fn is_self(&self) -> bool {
        match self {
            Pattern::Identifier(name) => name == "self",
            Pattern::Typed { pattern, .. } => pattern.is_self(),
            _ => false,
        }
    }
}

/// `...rest` or `...` at the end of an array pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RestPattern {
    Named(String),
    Ignored,
}

/// A struct pattern field; `field` is `None` for positional patterns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructPatternField {
    pub field: Option<String>,
    pub pattern: Pattern,
}

/// Type expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    Simple(String),
    Generic { base: String, args: Vec<TypeExpr> },
    Nullable(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    Function { params: Vec<TypeExpr>, ret: Box<TypeExpr> },
    Wildcard,
}

impl TypeExpr {
    /// Base name of a simple or generic type
    pub fn base_name(&self) -> Option<&str> {
        match self {
            TypeExpr::Simple(name) => Some(name),
            TypeExpr::Generic { base, .. } => Some(base),
            _ => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Simple(name) => f.write_str(name),
            TypeExpr::Generic { base, args } => {
                f.write_str(base)?;
                for arg in args {
                    match arg {
                        TypeExpr::Simple(_) | TypeExpr::Wildcard => write!(f, " {}", arg)?,
                        _ => write!(f, " ({})", arg)?,
                    }
                }
                Ok(())
            }
            TypeExpr::Nullable(inner) => write!(f, "?{}", inner),
            TypeExpr::Union(members) => {
                let parts: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                f.write_str(&parts.join(" | "))
            }
            TypeExpr::Function { params, ret } => {
                let parts: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "({}) -> {}", parts.join(", "), ret)
            }
            TypeExpr::Wildcard => f.write_str("_"),
        }
    }
}

/// `T: Display + Clone`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericParameter {
    pub name: String,
    pub constraints: Vec<TypeExpr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub pattern: Pattern,
    pub ty: Option<TypeExpr>,
}

/// `fn name<T>(params) -> Ret { body }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub generics: Vec<GenericParameter>,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
    pub is_private: bool,
    pub location: Option<Location>,
}

impl FunctionDefinition {
    /// Methods whose first parameter is `self` are instance methods
    pub fn is_instance_method(&self) -> bool {
        self.params.first().is_some_and(|p| p.pattern.is_self())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructKind {
    Named,
    Positional,
    Singleton,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructField {
    pub name: Option<String>,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDefinition {
    pub name: String,
    pub generics: Vec<GenericParameter>,
    pub kind: StructKind,
    pub fields: Vec<StructField>,
    pub is_private: bool,
    pub location: Option<Location>,
}

impl StructDefinition {
    /// Declared position of a named field
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.as_deref() == Some(name))
    }
}

/// An interface method signature with an optional default body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub generics: Vec<GenericParameter>,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeExpr>,
    pub default_body: Option<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub name: String,
    pub generics: Vec<GenericParameter>,
    pub signatures: Vec<FunctionSignature>,
    pub is_private: bool,
    pub location: Option<Location>,
}

/// `impl Interface for Target { ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementationDefinition {
    pub interface: String,
    pub interface_args: Vec<TypeExpr>,
    pub target: TypeExpr,
    pub generics: Vec<GenericParameter>,
    pub definitions: Vec<FunctionDefinition>,
    pub location: Option<Location>,
}

/// `methods Target { ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodsDefinition {
    pub target: TypeExpr,
    pub generics: Vec<GenericParameter>,
    pub definitions: Vec<FunctionDefinition>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeAliasDefinition {
    pub name: String,
    pub generics: Vec<GenericParameter>,
    pub target: TypeExpr,
    pub is_private: bool,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionDefinition {
    pub name: String,
    pub generics: Vec<GenericParameter>,
    pub variants: Vec<TypeExpr>,
    pub is_private: bool,
    pub location: Option<Location>,
}

/// `extern <target> fn name(...) -> T { host source }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternFunctionBody {
    pub target: String,
    pub signature: FunctionSignature,
    pub body: String,
    pub location: Option<Location>,
}
