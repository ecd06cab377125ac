//! Checking many modules in sequence.

use std::collections::BTreeMap;

use crate::ast::Module;

use super::summary::PackageSummary;
use super::{ModuleReport, TypeChecker};

/// Keeps package summaries between `check_module` calls so later modules
/// see the public surface of earlier ones
#[derive(Debug, Default)]
pub struct TypecheckerSession {
    summaries: BTreeMap<String, PackageSummary>,
}

impl TypecheckerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `module` against every package summarized so far, then fold its
    /// own summary into the session
    pub fn check_module(&mut self, module: &Module) -> ModuleReport {
        let mut checker = TypeChecker::with_packages(self.summaries.clone());
        let report = checker.check_module(module);
        tracing::debug!(
            package = %report.summary.name,
            diagnostics = report.diagnostics.len(),
            "checked module"
        );
        if module.package.is_some() {
            self.summaries
                .entry(report.summary.name.clone())
                .and_modify(|existing| existing.merge(&report.summary))
                .or_insert_with(|| report.summary.clone());
        }
        report
    }

    pub fn summary(&self, package: &str) -> Option<&PackageSummary> {
        self.summaries.get(package)
    }

    pub fn summaries(&self) -> impl Iterator<Item = &PackageSummary> {
        self.summaries.values()
    }
}
