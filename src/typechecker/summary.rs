//! Package summaries: the symbol surface a checked module leaves behind for
//! later modules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Location;

/// Key for a type declared in `package` (or at the root)
pub fn qualify(package: Option<&str>, name: &str) -> String {
    match package {
        Some(package) => format!("{}.{}", package, name),
        None => name.to_string(),
    }
}

/// What a summarized symbol is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SymbolKind {
    Function { arity: usize },
    Struct { fields: Vec<String>, positional: bool },
    Interface { methods: Vec<InterfaceMethod> },
    TypeAlias,
    Union,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceMethod {
    pub name: String,
    /// Parameter count, including `self`
    pub arity: usize,
    pub has_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSummary {
    #[serde(flatten)]
    pub kind: SymbolKind,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// `impl Interface for Target` recorded by a package, keyed by the
/// package-qualified interface and target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationSummary {
    pub interface: String,
    pub target: String,
}

/// Public surface of a package, plus its private symbols for modules of the
/// same package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageSummary {
    pub name: String,
    #[serde(default)]
    pub is_stdlib: bool,
    #[serde(default)]
    pub symbols: BTreeMap<String, SymbolSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implementations: Vec<ImplementationSummary>,
}

impl PackageSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn symbol(&self, name: &str) -> Option<&SymbolSummary> {
        self.symbols.get(name)
    }

    /// Symbols visible to other packages
    pub fn public_symbols(&self) -> impl Iterator<Item = (&String, &SymbolSummary)> {
        self.symbols.iter().filter(|(_, symbol)| !symbol.is_private)
    }

    /// Fold a later check of the same package into this summary
    pub fn merge(&mut self, other: &PackageSummary) {
        self.is_stdlib |= other.is_stdlib;
        for (name, symbol) in &other.symbols {
            self.symbols.insert(name.clone(), symbol.clone());
        }
        for implementation in &other.implementations {
            if !self.implementations.contains(implementation) {
                self.implementations.push(implementation.clone());
            }
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
