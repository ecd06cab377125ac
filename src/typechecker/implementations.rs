//! Interfaces, implementations and `methods` blocks.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::ast::*;
use crate::diagnostics::error_codes::{declarations, implementations};
use crate::diagnostics::{Diagnostic, Location, Note};

use super::summary::SymbolKind;
use super::types::Type;
use super::{describe_location, GenericFrame, InterfaceInfo, TypeChecker};

/// An `impl Interface for Target` visible to the module being checked
#[derive(Debug, Clone)]
pub(super) struct ImplementationRecord {
    /// Interface name without package qualification
    pub interface: String,
    /// Target type as written
    pub target: String,
    /// Package-qualified interface key
    pub interface_key: String,
    /// Target with its base resolved to a package-qualified key
    pub target_key: String,
    /// Package that declared it
    pub package: String,
    pub location: Option<Location>,
}

fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

impl TypeChecker {
    /// Add an implementation, rejecting a second one for the same
    /// interface and target
    pub(super) fn record_implementation(&mut self, record: ImplementationRecord, at: Option<&Location>) {
        let existing = self
            .implementations
            .iter()
            .find(|r| r.interface_key == record.interface_key && r.target_key == record.target_key);
        if let Some(existing) = existing {
            let message = format!(
                "typechecker: ambiguous implementation of {} for {} (also implemented in package '{}')",
                record.interface, record.target, existing.package
            );
            let mut note = Note::new("previous implementation");
            if let Some(previous) = existing.location.clone() {
                note = note.with_location(previous);
            }
            self.diagnostics.push(
                Diagnostic::error(implementations::AMBIGUOUS_IMPLEMENTATION)
                    .message(message)
                    .location(at.cloned())
                    .note(note)
                    .build(),
            );
            return;
        }
        self.implementations.push(record);
    }

    /// Interface named by an implementation, possibly `pkg.Interface`,
    /// with its qualified key
    fn lookup_interface(&mut self, name: &str) -> Option<(String, InterfaceInfo)> {
        match self.env.lookup(name) {
            Some(Type::InterfaceDef(key)) => {
                let key = key.clone();
                return self.interfaces.get(&key).cloned().map(|info| (key, info));
            }
            Some(_) => return None,
            None => {}
        }
        let (prefix, short) = name.rsplit_once('.')?;
        let Some(Type::Package(package)) = self.env.lookup(prefix).cloned() else {
            return None;
        };
        let symbol = self.packages.get(&package)?.symbol(short)?.clone();
        if !matches!(symbol.kind, SymbolKind::Interface { .. }) {
            return None;
        }
        match self.summary_symbol_type(&package, short, &symbol) {
            Type::InterfaceDef(key) => self.interfaces.get(&key).cloned().map(|info| (key, info)),
            _ => None,
        }
    }

    /// Key for an implementation target: a struct base is replaced by the
    /// qualified key it resolves to, anything else stays as written
    fn target_key(&self, target: &TypeExpr) -> String {
        let written = target.to_string();
        let Some(base) = target.base_name() else {
            return written;
        };
        match self.env.lookup(base) {
            Some(Type::StructDef(key)) => match written.strip_prefix(base) {
                Some(rest) => format!("{}{}", key, rest),
                None => key.clone(),
            },
            _ => written,
        }
    }

    pub(super) fn check_implementation(&mut self, def: &ImplementationDefinition) {
        let location = def.location.as_ref();
        let interface = short_name(&def.interface).to_string();
        let target = def.target.to_string();
        self.push_declared_generics(format!("impl {} for {}", interface, target), &def.generics);
        self.check_target(&def.target, location);
        for arg in &def.interface_args {
            self.check_type_expr(arg, location);
        }
        let self_ty = self.resolve_type_expr(&def.target);

        self.report_duplicate_methods(&def.definitions, location);
        match self.lookup_interface(&def.interface) {
            None => self.report(
                implementations::UNKNOWN_INTERFACE,
                format!("typechecker: unknown interface '{}'", def.interface),
                location,
            ),
            Some((interface_key, info)) => {
                for method in &info.methods {
                    let provided = def.definitions.iter().any(|d| d.name == method.name);
                    if !provided && !method.has_default {
                        self.report(
                            implementations::MISSING_METHOD,
                            format!(
                                "typechecker: implementation of {} for {} is missing method '{}'",
                                info.name, target, method.name
                            ),
                            location,
                        );
                    }
                }
                for definition in &def.definitions {
                    match info.methods.iter().find(|m| m.name == definition.name) {
                        None => self.report(
                            implementations::EXTRA_METHOD,
                            format!(
                                "typechecker: method '{}' is not part of interface {}",
                                definition.name, info.name
                            ),
                            definition.location.as_ref().or(location),
                        ),
                        Some(method) if method.arity != definition.params.len() => self.report(
                            implementations::METHOD_ARITY,
                            format!(
                                "typechecker: method '{}' of {} expects {} parameter(s), got {}",
                                definition.name,
                                info.name,
                                method.arity,
                                definition.params.len()
                            ),
                            definition.location.as_ref().or(location),
                        ),
                        Some(_) => {}
                    }
                }
                let record = ImplementationRecord {
                    interface_key,
                    target_key: self.target_key(&def.target),
                    interface,
                    target,
                    package: self.package_label().to_string(),
                    location: def.location.clone(),
                };
                self.record_implementation(record, location);
            }
        }

        for definition in &def.definitions {
            self.check_function(definition, Some(&self_ty));
        }
        self.generic_stack.pop();
    }

    pub(super) fn check_methods(&mut self, def: &MethodsDefinition) {
        let location = def.location.as_ref();
        self.push_declared_generics(format!("methods {}", def.target), &def.generics);
        self.check_target(&def.target, location);
        let self_ty = self.resolve_type_expr(&def.target);
        self.report_duplicate_methods(&def.definitions, location);
        for definition in &def.definitions {
            self.check_function(definition, Some(&self_ty));
        }
        self.generic_stack.pop();
    }

    pub(super) fn check_interface(&mut self, def: &InterfaceDefinition) {
        let location = def.location.as_ref();
        self.push_declared_generics(format!("interface {}", def.name), &def.generics);
        let mut seen: HashSet<&str> = HashSet::new();
        for signature in &def.signatures {
            if !seen.insert(&signature.name) {
                self.report(
                    declarations::DUPLICATE_DECLARATION,
                    format!(
                        "typechecker: duplicate declaration '{}' (previous declaration at {})",
                        signature.name,
                        describe_location(location)
                    ),
                    location,
                );
            }
            match &signature.default_body {
                Some(body) => self.check_callable(
                    format!("fn {}", signature.name),
                    &signature.generics,
                    &signature.params,
                    signature.return_type.as_ref(),
                    body,
                    location,
                    None,
                ),
                None => {
                    for param in &signature.params {
                        if let Some(ty) = &param.ty {
                            self.check_type_expr(ty, location);
                        }
                    }
                    if let Some(ret) = &signature.return_type {
                        self.check_type_expr(ret, location);
                    }
                }
            }
        }
        self.generic_stack.pop();
    }

    fn push_declared_generics(&mut self, label: String, generics: &[GenericParameter]) {
        self.generic_stack.push(GenericFrame {
            label,
            declared: generics.iter().map(|g| g.name.clone()).collect(),
            inferred: BTreeMap::new(),
        });
    }

    /// The target of `impl`/`methods` must name a known type
    fn check_target(&mut self, target: &TypeExpr, location: Option<&Location>) {
        self.check_type_expr(target, location);
        if let Some(base) = target.base_name() {
            if !self.is_known_type(base) {
                self.report(
                    declarations::UNDEFINED_IDENTIFIER,
                    format!("typechecker: undefined identifier '{}'", base),
                    location,
                );
            }
        }
    }

    fn report_duplicate_methods(&mut self, definitions: &[FunctionDefinition], location: Option<&Location>) {
        let mut seen: HashMap<&str, Option<&Location>> = HashMap::new();
        for definition in definitions {
            let at = definition.location.as_ref().or(location);
            if let Some(previous) = seen.get(definition.name.as_str()) {
                let message = format!(
                    "typechecker: duplicate declaration '{}' (previous declaration at {})",
                    definition.name,
                    describe_location(*previous)
                );
                self.report(declarations::DUPLICATE_DECLARATION, message, at);
            } else {
                seen.insert(&definition.name, at);
            }
        }
    }
}
