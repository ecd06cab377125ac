//! Static checker for Able modules
//!
//! A single pass over a module that never fails: problems are collected as
//! diagnostics, and the module's symbol surface is summarized so that later
//! modules (through a [`TypecheckerSession`]) can import from it.
//!
//! Scopes are layered: ambient bindings (builtins and standard-library
//! packages) at the bottom, imports above them, then the module's own
//! declarations, then block scopes. Lookups walk innermost first, so an
//! explicit import shadows an ambient binding of the same name.

use std::collections::{BTreeMap, HashMap};

use crate::ast::*;
use crate::diagnostics::error_codes::{declarations, packages};
use crate::diagnostics::{Diagnostic, DiagnosticBag, Location};
use crate::interpreter::scheduler;

mod expressions;
mod implementations;
mod session;
mod statements;
pub mod summary;
pub mod types;
pub mod unions;

pub use session::TypecheckerSession;
pub use summary::{
    qualify, ImplementationSummary, InterfaceMethod, PackageSummary, SymbolKind, SymbolSummary,
};
pub use types::Type;
pub use unions::normalize_union;

use implementations::ImplementationRecord;

/// Summary name used for modules without a `package` statement
pub const ROOT_PACKAGE: &str = "<root>";

/// Result of checking one module
#[derive(Debug, Clone)]
pub struct ModuleReport {
    pub diagnostics: DiagnosticBag,
    pub summary: PackageSummary,
}

/// Lexical scopes, innermost last
#[derive(Debug, Clone)]
pub struct TypeEnv {
    scopes: Vec<HashMap<String, Type>>,
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeEnv {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Leave the innermost scope; the outermost is never popped
    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Bind a name in the innermost scope
    pub fn define(&mut self, name: impl Into<String>, ty: Type) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), ty);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

#[derive(Debug, Clone)]
struct StructInfo {
    name: String,
    fields: Vec<String>,
    positional: bool,
}

#[derive(Debug, Clone)]
struct InterfaceInfo {
    name: String,
    methods: Vec<InterfaceMethod>,
}

/// Generic parameters of the function being checked
#[derive(Debug, Clone)]
struct GenericFrame {
    /// `fn name`, used in messages
    label: String,
    declared: Vec<String>,
    inferred: BTreeMap<String, Option<Location>>,
}

/// Static checker for one module
#[derive(Debug)]
pub struct TypeChecker {
    env: TypeEnv,
    diagnostics: DiagnosticBag,
    /// Summaries of packages checked earlier
    packages: BTreeMap<String, PackageSummary>,
    /// Package of the module being checked
    package: Option<String>,
    structs: HashMap<String, StructInfo>,
    interfaces: HashMap<String, InterfaceInfo>,
    aliases: HashMap<String, Type>,
    implementations: Vec<ImplementationRecord>,
    generic_stack: Vec<GenericFrame>,
    /// Enclosing `breakpoint` labels
    labels: Vec<String>,
    /// Number of enclosing rescue clauses
    rescue_depth: usize,
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeChecker {
    pub fn new() -> Self {
        Self::with_packages(BTreeMap::new())
    }

    /// A checker that knows the given package summaries; public symbols of
    /// standard-library packages become ambient bindings
    pub fn with_packages(packages: BTreeMap<String, PackageSummary>) -> Self {
        let mut checker = Self {
            env: TypeEnv::new(),
            diagnostics: DiagnosticBag::new(),
            packages,
            package: None,
            structs: HashMap::new(),
            interfaces: HashMap::new(),
            aliases: HashMap::new(),
            implementations: Vec::new(),
            generic_stack: Vec::new(),
            labels: Vec::new(),
            rescue_depth: 0,
        };
        checker.install_ambient();
        checker
    }

    fn install_ambient(&mut self) {
        self.env.define("print", Type::Unknown);
        self.env.define(
            "Error",
            Type::Function {
                params: vec![Type::Unknown],
                ret: Box::new(Type::Error),
            },
        );
        let nullary = |ret: Type| Type::Function {
            params: Vec::new(),
            ret: Box::new(ret),
        };
        self.env.define("proc_yield", nullary(Type::Nil));
        self.env.define("proc_flush", nullary(Type::Nil));
        self.env.define("proc_pending_tasks", nullary(Type::Integer(IntegerKind::I32)));
        self.env.define("proc_cancelled", nullary(Type::Bool));
        for def in scheduler::status_definitions() {
            self.declare_type(&Stmt::Struct(def));
        }
        self.declare_type(&Stmt::Union(scheduler::status_union()));
        let stdlib: Vec<PackageSummary> = self
            .packages
            .values()
            .filter(|summary| summary.is_stdlib)
            .cloned()
            .collect();
        for summary in &stdlib {
            for (name, symbol) in summary.public_symbols() {
                let ty = self.summary_symbol_type(&summary.name, name, symbol);
                self.env.define(name.clone(), ty);
            }
        }
    }

    /// Diagnostics collected so far
    pub fn diagnostics(&self) -> &DiagnosticBag {
        &self.diagnostics
    }

    /// Check a module
    pub fn check_module(&mut self, module: &Module) -> ModuleReport {
        self.package = module.package_name();

        // Imports
        self.env.push();
        for import in &module.imports {
            self.check_import(import, false);
        }

        // Module scope: earlier modules of the same package, then this one
        self.env.push();
        if let Some(own) = self.package.as_ref().and_then(|p| self.packages.get(p)).cloned() {
            for (name, symbol) in &own.symbols {
                let ty = self.summary_symbol_type(&own.name, name, symbol);
                self.env.define(name.clone(), ty);
            }
        }
        self.declare_top_level(&module.body);

        for stmt in &module.body {
            self.check_top_level(stmt);
        }

        let summary = self.build_summary(module);
        self.env.pop();
        self.env.pop();
        ModuleReport {
            diagnostics: std::mem::take(&mut self.diagnostics),
            summary,
        }
    }

    fn package_label(&self) -> &str {
        self.package.as_deref().unwrap_or(ROOT_PACKAGE)
    }

    pub(crate) fn report(&mut self, code: &str, message: String, location: Option<&Location>) {
        self.diagnostics.push(
            Diagnostic::error(code)
                .message(message)
                .location(location.cloned())
                .build(),
        );
    }

    fn is_generic_in_scope(&self, name: &str) -> bool {
        self.generic_stack.iter().any(|frame| {
            frame.declared.iter().any(|declared| declared == name) || frame.inferred.contains_key(name)
        })
    }

    /// Report duplicates, then bind every top-level declaration so bodies
    /// may refer to declarations that come later
    fn declare_top_level(&mut self, body: &[Stmt]) {
        let mut seen: HashMap<&str, Option<&Location>> = HashMap::new();
        for stmt in body {
            let Some(name) = stmt.declared_name() else {
                continue;
            };
            let location = declaration_location(stmt);
            match seen.get(name) {
                Some(previous) => {
                    let previous = describe_location(*previous);
                    self.report(
                        declarations::DUPLICATE_DECLARATION,
                        format!(
                            "typechecker: duplicate declaration '{}' (previous declaration at {})",
                            name, previous
                        ),
                        location,
                    );
                }
                None => {
                    seen.insert(name, location);
                }
            }
        }

        // Types first so signatures resolve against them
        for stmt in body {
            self.declare_type(stmt);
        }
        for stmt in body {
            match stmt {
                Stmt::Function(def) => {
                    let ty = self.function_type(&def.params, def.return_type.as_ref());
                    self.env.define(def.name.clone(), ty);
                }
                Stmt::Extern(def) => {
                    let signature = &def.signature;
                    if self.env.lookup(&signature.name).is_none() {
                        let ty = self.function_type(&signature.params, signature.return_type.as_ref());
                        self.env.define(signature.name.clone(), ty);
                    }
                }
                _ => {}
            }
        }
    }

    /// Bind a struct, interface, alias or union declaration
    fn declare_type(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Struct(def) => {
                let key = qualify(self.package.as_deref(), &def.name);
                let fields = match def.kind {
                    StructKind::Named => def
                        .fields
                        .iter()
                        .map(|f| f.name.clone().unwrap_or_default())
                        .collect(),
                    _ => (0..def.fields.len()).map(|i| i.to_string()).collect(),
                };
                self.structs.insert(
                    key.clone(),
                    StructInfo {
                        name: def.name.clone(),
                        fields,
                        positional: def.kind != StructKind::Named,
                    },
                );
                self.env.define(def.name.clone(), Type::StructDef(key));
            }
            Stmt::Interface(def) => {
                let key = qualify(self.package.as_deref(), &def.name);
                self.interfaces.insert(
                    key.clone(),
                    InterfaceInfo {
                        name: def.name.clone(),
                        methods: interface_methods(def),
                    },
                );
                self.env.define(def.name.clone(), Type::InterfaceDef(key));
            }
            Stmt::TypeAlias(def) => {
                let ty = self.resolve_type_expr(&def.target);
                self.aliases.insert(def.name.clone(), ty);
            }
            Stmt::Union(def) => {
                let members = def.variants.iter().map(|v| self.resolve_type_expr(v)).collect();
                self.aliases.insert(def.name.clone(), normalize_union(members).0);
            }
            _ => {}
        }
    }

    fn function_type(&self, params: &[Parameter], return_type: Option<&TypeExpr>) -> Type {
        Type::Function {
            params: params
                .iter()
                .map(|p| p.ty.as_ref().map_or(Type::Unknown, |ty| self.resolve_type_expr(ty)))
                .collect(),
            ret: Box::new(return_type.map_or(Type::Unknown, |ty| self.resolve_type_expr(ty))),
        }
    }

    /// Type of a symbol imported from a summary, registering the struct or
    /// interface shape it describes
    fn summary_symbol_type(&mut self, package: &str, name: &str, symbol: &SymbolSummary) -> Type {
        match &symbol.kind {
            SymbolKind::Function { arity } => Type::Function {
                params: vec![Type::Unknown; *arity],
                ret: Box::new(Type::Unknown),
            },
            SymbolKind::Struct { fields, positional } => {
                let key = qualify(Some(package), name);
                self.structs.insert(
                    key.clone(),
                    StructInfo {
                        name: name.to_string(),
                        fields: fields.clone(),
                        positional: *positional,
                    },
                );
                Type::StructDef(key)
            }
            SymbolKind::Interface { methods } => {
                let key = qualify(Some(package), name);
                self.interfaces.insert(
                    key.clone(),
                    InterfaceInfo {
                        name: name.to_string(),
                        methods: methods.clone(),
                    },
                );
                Type::InterfaceDef(key)
            }
            SymbolKind::TypeAlias | SymbolKind::Union => {
                self.aliases
                    .entry(name.to_string())
                    .or_insert_with(|| Type::Named(name.to_string(), Vec::new()));
                Type::Unknown
            }
        }
    }

    /// Validate an `import` (or, when `late`, a `dynimport`) and bind what
    /// it introduces in the current scope
    pub(crate) fn check_import(&mut self, import: &ImportStatement, late: bool) {
        let package = import.package_name();
        let Some(summary) = self.packages.get(&package).cloned() else {
            if !late {
                self.report(
                    packages::UNKNOWN_PACKAGE,
                    format!("typechecker: unknown package '{}'", package),
                    import.location.as_ref(),
                );
            }
            // Bind the names anyway so later uses do not cascade
            if import.selectors.is_empty() {
                if !import.wildcard {
                    self.env.define(import.binding_name(), Type::Unknown);
                }
            } else {
                for selector in &import.selectors {
                    self.env.define(selector.binding_name(), Type::Unknown);
                }
            }
            return;
        };
        tracing::trace!(package = %package, "resolving import");
        let same_package = self.package.as_deref() == Some(package.as_str());

        let already_recorded = self.implementations.iter().any(|r| r.package == package);
        if !same_package && !already_recorded {
            for implementation in &summary.implementations {
                let prefix = format!("{}.", package);
                let display = |key: &str| key.strip_prefix(&prefix).unwrap_or(key).to_string();
                let record = ImplementationRecord {
                    interface: display(&implementation.interface),
                    target: display(&implementation.target),
                    interface_key: implementation.interface.clone(),
                    target_key: implementation.target.clone(),
                    package: package.clone(),
                    location: None,
                };
                self.record_implementation(record, import.location.as_ref());
            }
        }

        if import.wildcard {
            for (name, symbol) in &summary.symbols {
                if symbol.is_private && !same_package {
                    continue;
                }
                let ty = self.summary_symbol_type(&package, name, symbol);
                self.env.define(name.clone(), ty);
            }
        } else if !import.selectors.is_empty() {
            for selector in &import.selectors {
                match summary.symbol(&selector.name) {
                    None => {
                        self.report(
                            packages::UNKNOWN_SYMBOL,
                            format!(
                                "typechecker: package '{}' has no symbol '{}'",
                                package, selector.name
                            ),
                            import.location.as_ref(),
                        );
                        self.env.define(selector.binding_name(), Type::Unknown);
                    }
                    Some(symbol) if symbol.is_private && !same_package => {
                        self.report(
                            packages::PRIVATE_SYMBOL,
                            format!(
                                "typechecker: symbol '{}' of package '{}' is private",
                                selector.name, package
                            ),
                            import.location.as_ref(),
                        );
                        self.env.define(selector.binding_name(), Type::Unknown);
                    }
                    Some(symbol) => {
                        let ty = self.summary_symbol_type(&package, &selector.name, symbol);
                        self.env.define(selector.binding_name(), ty);
                    }
                }
            }
        } else {
            self.env.define(import.binding_name(), Type::Package(package));
        }
    }

    /// Public surface of the checked module
    fn build_summary(&self, module: &Module) -> PackageSummary {
        let mut summary = PackageSummary::new(self.package_label());
        summary.is_stdlib = module.origin.is_stdlib;
        for stmt in &module.body {
            let (name, kind, is_private, location) = match stmt {
                Stmt::Function(def) => (
                    &def.name,
                    SymbolKind::Function {
                        arity: def.params.len(),
                    },
                    def.is_private,
                    &def.location,
                ),
                Stmt::Extern(def) => (
                    &def.signature.name,
                    SymbolKind::Function {
                        arity: def.signature.params.len(),
                    },
                    false,
                    &def.location,
                ),
                Stmt::Struct(def) => {
                    let fields = self
                        .structs
                        .get(&qualify(self.package.as_deref(), &def.name))
                        .map(|info| info.fields.clone())
                        .unwrap_or_default();
                    (
                        &def.name,
                        SymbolKind::Struct {
                            fields,
                            positional: def.kind != StructKind::Named,
                        },
                        def.is_private,
                        &def.location,
                    )
                }
                Stmt::Interface(def) => (
                    &def.name,
                    SymbolKind::Interface {
                        methods: interface_methods(def),
                    },
                    def.is_private,
                    &def.location,
                ),
                Stmt::TypeAlias(def) => (&def.name, SymbolKind::TypeAlias, def.is_private, &def.location),
                Stmt::Union(def) => (&def.name, SymbolKind::Union, def.is_private, &def.location),
                _ => continue,
            };
            summary.symbols.insert(
                name.clone(),
                SymbolSummary {
                    kind,
                    is_private,
                    location: location.clone(),
                },
            );
        }
        summary.implementations = self
            .implementations
            .iter()
            .filter(|record| record.package == summary.name)
            .map(|record| ImplementationSummary {
                interface: record.interface_key.clone(),
                target: record.target_key.clone(),
            })
            .collect();
        summary
    }
}

fn interface_methods(def: &InterfaceDefinition) -> Vec<InterfaceMethod> {
    def.signatures
        .iter()
        .map(|signature| InterfaceMethod {
            name: signature.name.clone(),
            arity: signature.params.len(),
            has_default: signature.default_body.is_some(),
        })
        .collect()
}

fn declaration_location(stmt: &Stmt) -> Option<&Location> {
    match stmt {
        Stmt::Function(def) => def.location.as_ref(),
        Stmt::Struct(def) => def.location.as_ref(),
        Stmt::Interface(def) => def.location.as_ref(),
        Stmt::TypeAlias(def) => def.location.as_ref(),
        Stmt::Union(def) => def.location.as_ref(),
        Stmt::Implementation(def) => def.location.as_ref(),
        Stmt::Methods(def) => def.location.as_ref(),
        Stmt::Extern(def) => def.location.as_ref(),
        _ => None,
    }
}

/// `path:line:column`, or `<unknown>` for synthesized nodes
fn describe_location(location: Option<&Location>) -> String {
    location.map_or_else(|| "<unknown>".to_string(), |l| l.to_string())
}
