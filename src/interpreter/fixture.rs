//! Fixture manifests and the comparable `{kind, value}` shape of results.
//!
//! A fixture directory carries a `manifest.json` describing what evaluating
//! its entry module should produce:
//!
//! ```json
//! { "description": "adds two numbers",
//!   "entry": "main.able",
//!   "expect": { "result": { "kind": "i32", "value": 3 } } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ast::StructKind;

use super::error::RuntimeError;
use super::value::{FutureState, Value};

/// Errors loading a fixture manifest
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read fixture manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid fixture manifest: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureManifest {
    #[serde(default)]
    pub description: String,
    /// Entry module, relative to the manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<FixtureExpectation>,
    /// Modules evaluated before the entry, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup: Vec<String>,
}

impl FixtureManifest {
    pub fn from_json(text: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureExpectation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<FixtureResult>,
    /// Expected `print` output, line by line
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stdout: Vec<String>,
    /// Substrings the evaluation error message must contain
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl FixtureExpectation {
    /// Describe every way `outcome` and `stdout` differ from this expectation
    pub fn mismatches(&self, outcome: &Result<Value, RuntimeError>, stdout: &[String]) -> Vec<String> {
        let mut problems = Vec::new();
        match (outcome, &self.result) {
            (Ok(value), Some(expected)) => {
                let actual = value.to_fixture_result();
                if !expected.matches(&actual) {
                    problems.push(format!(
                        "expected result {}, got {}",
                        expected.to_json(),
                        actual.to_json()
                    ));
                }
            }
            (Err(error), Some(_)) => problems.push(format!("expected a result, got error: {}", error)),
            _ => {}
        }
        if !self.errors.is_empty() {
            match outcome {
                Ok(value) => problems.push(format!("expected an error, got {}", value)),
                Err(error) => {
                    for fragment in &self.errors {
                        if !error.message.contains(fragment.as_str()) {
                            problems.push(format!(
                                "error '{}' does not mention '{}'",
                                error.message, fragment
                            ));
                        }
                    }
                }
            }
        }
        if !self.stdout.is_empty() && self.stdout != stdout {
            problems.push(format!("expected stdout {:?}, got {:?}", self.stdout, stdout));
        }
        problems
    }
}

/// Comparable shape of an evaluation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureResult {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl FixtureResult {
    fn new(kind: impl Into<String>, value: Option<serde_json::Value>) -> Self {
        Self {
            kind: kind.into(),
            value,
        }
    }

    /// An expectation without a value only constrains the kind
    pub fn matches(&self, actual: &FixtureResult) -> bool {
        self.kind == actual.kind && (self.value.is_none() || self.value == actual.value)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn integer_json(value: i128) -> serde_json::Value {
    if let Ok(v) = i64::try_from(value) {
        json!(v)
    } else if let Ok(v) = u64::try_from(value) {
        json!(v)
    } else {
        json!(value.to_string())
    }
}

impl Value {
    /// The `{kind, value}` shape fixtures compare against
    pub fn to_fixture_result(&self) -> FixtureResult {
        match self {
            Value::Integer { kind, value } => FixtureResult::new(kind.name(), Some(integer_json(*value))),
            Value::Float { kind, value } => FixtureResult::new(
                kind.name(),
                Some(
                    serde_json::Number::from_f64(*value)
                        .map(serde_json::Value::Number)
                        .unwrap_or_else(|| json!(value.to_string())),
                ),
            ),
            Value::Bool(b) => FixtureResult::new("bool", Some(json!(b))),
            Value::Char(c) => FixtureResult::new("char", Some(json!(c.to_string()))),
            Value::String(s) => FixtureResult::new("String", Some(json!(s))),
            Value::Nil => FixtureResult::new("nil", None),
            Value::Array(items) => FixtureResult::new(
                "array",
                Some(serde_json::Value::Array(
                    items.iter().map(|item| item.to_fixture_result().to_json()).collect(),
                )),
            ),
            Value::Range(range) => FixtureResult::new(
                "range",
                Some(json!({
                    "start": integer_json(range.start),
                    "last": integer_json(range.last),
                    "inclusive": range.inclusive,
                })),
            ),
            Value::Struct(instance) => {
                let def = &instance.def.def;
                let fields = match def.kind {
                    StructKind::Named => serde_json::Value::Object(
                        def.fields
                            .iter()
                            .zip(instance.fields.iter())
                            .map(|(field, value)| {
                                (
                                    field.name.clone().unwrap_or_default(),
                                    value.to_fixture_result().to_json(),
                                )
                            })
                            .collect(),
                    ),
                    StructKind::Positional | StructKind::Singleton => serde_json::Value::Array(
                        instance
                            .fields
                            .iter()
                            .map(|value| value.to_fixture_result().to_json())
                            .collect(),
                    ),
                };
                FixtureResult::new(
                    "struct_instance",
                    Some(json!({ "type": def.name, "fields": fields })),
                )
            }
            Value::StructDef(def) => FixtureResult::new("struct_definition", Some(json!(def.name()))),
            Value::InterfaceDef(def) => {
                FixtureResult::new("interface_definition", Some(json!(def.name())))
            }
            Value::Interface { value, .. } => value.to_fixture_result(),
            Value::Function(_) | Value::Native(_) | Value::BoundMethod { .. } => {
                FixtureResult::new("function", None)
            }
            Value::Package(pkg) => FixtureResult::new("package", Some(json!(pkg.name))),
            Value::DynPackage { name } => FixtureResult::new("package", Some(json!(name))),
            Value::DynRef { package, name } => {
                FixtureResult::new("dyn_ref", Some(json!(format!("{}.{}", package, name))))
            }
            Value::Error(err) => FixtureResult::new("error", Some(json!(err.message))),
            Value::Future(handle) => {
                let state = match handle.state() {
                    FutureState::Pending => "pending",
                    FutureState::Resolved(_) => "resolved",
                    FutureState::Failed(_) => "failed",
                };
                FixtureResult::new("future", Some(json!(state)))
            }
        }
    }
}
