//! Lexical environments for the Able interpreter.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::value::Value;

struct Scope {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Environment>,
}

/// A chained lexical scope, shared by reference between closures and tasks.
///
/// Lookups walk outward to the global scope. Values captured by closures can
/// form reference cycles (a function stored in the scope it closes over);
/// such scopes live as long as the interpreter.
#[derive(Clone)]
pub struct Environment(Rc<Scope>);

impl Environment {
    /// Create a new root scope
    pub fn new() -> Self {
        Self(Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        }))
    }

    /// Create a child scope of this one
    pub fn child(&self) -> Self {
        Self(Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(self.clone()),
        }))
    }

    /// Define a binding in this scope, shadowing any outer binding
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Look up a binding, searching from this scope outward
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.0.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        self.0.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// Update the innermost scope that owns `name`; returns false if none does
    pub fn update(&self, name: &str, value: Value) -> bool {
        let mut scope = Some(self);
        while let Some(env) = scope {
            let mut bindings = env.0.bindings.borrow_mut();
            if let Some(slot) = bindings.get_mut(name) {
                *slot = value;
                return true;
            }
            drop(bindings);
            scope = env.0.parent.as_ref();
        }
        false
    }

    /// Write to the innermost owning scope, or define in this scope if new
    pub fn assign(&self, name: &str, value: Value) {
        if !self.update(name, value.clone()) {
            self.define(name, value);
        }
    }

    /// Does this scope itself (not a parent) bind `name`
    pub fn has_own(&self, name: &str) -> bool {
        self.0.bindings.borrow().contains_key(name)
    }

    /// Names bound directly in this scope
    pub fn own_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.bindings.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Do two handles refer to the same scope
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("names", &self.own_names())
            .field("has_parent", &self.0.parent.is_some())
            .finish()
    }
}
