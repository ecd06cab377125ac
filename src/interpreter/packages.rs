//! Package registry and import resolution for the Able interpreter.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::ast::*;

use super::environment::Environment;
use super::error::RuntimeError;
use super::value::{PackageValue, Value};
use super::Interpreter;

/// Visibility of a package symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn from_private(is_private: bool) -> Self {
        if is_private {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }
}

#[derive(Debug, Clone)]
pub struct PackageSymbol {
    pub value: Value,
    pub visibility: Visibility,
}

/// One registered package
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub name: String,
    pub origin: PackageOrigin,
    pub(crate) symbols: BTreeMap<String, PackageSymbol>,
}

impl PackageEntry {
    pub fn symbol(&self, name: &str) -> Option<&PackageSymbol> {
        self.symbols.get(name)
    }

    /// Public symbols in name order
    pub fn public_symbols(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.symbols
            .iter()
            .filter(|(_, s)| s.visibility == Visibility::Public)
            .map(|(name, s)| (name, &s.value))
    }

    pub fn symbol_names(&self) -> Vec<&str> {
        self.symbols.keys().map(String::as_str).collect()
    }
}

/// Errors raised while registering packages
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("package '{name}' is already registered from '{existing}' (new origin '{incoming}')")]
    Collision {
        name: String,
        existing: String,
        incoming: String,
    },
}

impl From<RegistryError> for RuntimeError {
    fn from(error: RegistryError) -> Self {
        RuntimeError::new(
            crate::diagnostics::error_codes::runtime::PACKAGE_COLLISION,
            error.to_string(),
        )
    }
}

/// Package name to symbol table
#[derive(Debug, Default)]
pub struct PackageRegistry {
    packages: BTreeMap<String, PackageEntry>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package; the same name from a different origin collides
    pub fn register(&mut self, name: &str, origin: &PackageOrigin) -> Result<(), RegistryError> {
        match self.packages.get(name) {
            Some(existing) if &existing.origin != origin => Err(RegistryError::Collision {
                name: name.to_string(),
                existing: existing.origin.root.clone(),
                incoming: origin.root.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                self.packages.insert(
                    name.to_string(),
                    PackageEntry {
                        name: name.to_string(),
                        origin: origin.clone(),
                        symbols: BTreeMap::new(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Define or replace a symbol in a registered package
    pub fn define(&mut self, package: &str, name: &str, value: Value, visibility: Visibility) {
        if let Some(entry) = self.packages.get_mut(package) {
            entry
                .symbols
                .insert(name.to_string(), PackageSymbol { value, visibility });
        }
    }

    pub fn get(&self, name: &str) -> Option<&PackageEntry> {
        self.packages.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.packages.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PackageEntry> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Look up a public symbol, failing with a privacy error for private ones
    pub fn public_symbol(&self, package: &str, name: &str) -> Result<Value, RuntimeError> {
        let entry = self.require(package)?;
        match entry.symbol(name) {
            Some(symbol) if symbol.visibility == Visibility::Public => Ok(symbol.value.clone()),
            Some(_) => Err(RuntimeError::import(format!(
                "symbol '{}' of package '{}' is private",
                name, package
            ))),
            None => Err(RuntimeError::import(format!(
                "package '{}' has no symbol '{}'",
                package, name
            ))),
        }
    }

    fn require(&self, package: &str) -> Result<&PackageEntry, RuntimeError> {
        self.packages
            .get(package)
            .ok_or_else(|| RuntimeError::import(format!("package '{}' not found", package)))
    }

    /// A package object exposing only public symbols
    pub fn package_value(&self, package: &str) -> Result<Value, RuntimeError> {
        let entry = self.require(package)?;
        Ok(Value::Package(Rc::new(PackageValue {
            name: entry.name.clone(),
            symbols: entry
                .public_symbols()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        })))
    }
}

impl Interpreter {
    /// Bind a static `import` into `env`
    pub(crate) fn import_package(
        &mut self,
        import: &ImportStatement,
        env: &Environment,
    ) -> Result<(), RuntimeError> {
        let package = import.package_name();
        tracing::debug!(package = %package, "import");
        if !import.selectors.is_empty() {
            for selector in &import.selectors {
                let value = self.packages.public_symbol(&package, &selector.name)?;
                env.define(selector.binding_name(), value);
            }
        } else if import.wildcard {
            let entry = self
                .packages
                .get(&package)
                .ok_or_else(|| RuntimeError::import(format!("package '{}' not found", package)))?;
            for (name, value) in entry.public_symbols() {
                env.define(name.clone(), value.clone());
            }
        } else {
            let value = self.packages.package_value(&package)?;
            env.define(import.binding_name(), value);
        }
        Ok(())
    }

    /// Bind a `dynimport` into `env` as late-bound references
    pub(crate) fn dynimport_package(
        &mut self,
        import: &ImportStatement,
        env: &Environment,
    ) -> Result<(), RuntimeError> {
        let package = import.package_name();
        tracing::debug!(package = %package, "dynimport");
        let entry = self
            .packages
            .get(&package)
            .ok_or_else(|| RuntimeError::import(format!("package '{}' not found", package)))?;
        if !import.selectors.is_empty() {
            for selector in &import.selectors {
                // Validate visibility now; resolve the value at use
                self.packages.public_symbol(&package, &selector.name)?;
                env.define(
                    selector.binding_name(),
                    Value::DynRef {
                        package: package.clone(),
                        name: selector.name.clone(),
                    },
                );
            }
        } else if import.wildcard {
            let names: Vec<String> = entry.public_symbols().map(|(n, _)| n.clone()).collect();
            for name in names {
                env.define(
                    name.clone(),
                    Value::DynRef {
                        package: package.clone(),
                        name,
                    },
                );
            }
        } else {
            env.define(import.binding_name(), Value::DynPackage { name: package });
        }
        Ok(())
    }

    /// Resolve a late-bound reference against the current registry
    pub(crate) fn resolve_dyn_member(&self, package: &str, name: &str) -> Result<Value, RuntimeError> {
        match self.packages.public_symbol(package, name) {
            Ok(value) => Ok(value),
            Err(_) if self.packages.get(package).is_some() => Err(RuntimeError::import(format!(
                "No public member '{}' on package {}",
                name, package
            ))),
            Err(error) => Err(error),
        }
    }
}
