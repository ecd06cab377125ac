//! Type definitions, implementation and methods registration, and struct
//! literal construction.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::*;
use crate::diagnostics::error_codes::runtime as codes;

use super::environment::Environment;
use super::error::{EvalResult, RuntimeError};
use super::methods::ImplementationEntry;
use super::value::*;
use super::Interpreter;

impl Interpreter {
    pub(crate) fn eval_struct_definition(&mut self, def: &StructDefinition, env: &Environment) -> EvalResult {
        let value = Value::StructDef(Rc::new(StructDefValue {
            def: def.clone(),
            package: self.current_package.clone(),
        }));
        env.define(def.name.clone(), value.clone());
        Ok(value)
    }

    pub(crate) fn eval_interface_definition(
        &mut self,
        def: &InterfaceDefinition,
        env: &Environment,
    ) -> EvalResult {
        let value = Value::InterfaceDef(Rc::new(InterfaceDefValue {
            def: def.clone(),
            package: self.current_package.clone(),
            env: env.clone(),
        }));
        env.define(def.name.clone(), value.clone());
        Ok(value)
    }

    /// Register `impl Interface for Target`. Signatures the block leaves out
    /// fall back to the interface's default bodies.
    pub(crate) fn eval_implementation(
        &mut self,
        def: &ImplementationDefinition,
        env: &Environment,
    ) -> EvalResult {
        let interface = match env.lookup(&def.interface) {
            Some(Value::InterfaceDef(interface)) => Some(interface),
            _ => None,
        };
        let mut methods: HashMap<String, Rc<FunctionValue>> = def
            .definitions
            .iter()
            .map(|f| {
                let method = FunctionValue::from_definition(f, env.clone(), self.current_package.clone());
                (f.name.clone(), Rc::new(method))
            })
            .collect();
        if let Some(interface) = &interface {
            for signature in &interface.def.signatures {
                if methods.contains_key(&signature.name) {
                    continue;
                }
                if let Some(body) = &signature.default_body {
                    methods.insert(
                        signature.name.clone(),
                        Rc::new(FunctionValue {
                            name: signature.name.clone(),
                            params: signature.params.clone(),
                            body: FunctionBody::Block(body.clone()),
                            closure: interface.env.clone(),
                            is_private: false,
                            package: interface.package.clone(),
                        }),
                    );
                }
            }
        }

        let interface_name = match &interface {
            Some(interface) => qualified_key(interface.package.as_deref(), interface.name()),
            None => def.interface.clone(),
        };
        for target in self.target_keys(&def.target, env) {
            tracing::trace!(interface = %interface_name, target = %target, "registering implementation");
            self.methods.add_implementation(ImplementationEntry {
                interface: interface_name.clone(),
                target,
                methods: methods.clone(),
            });
        }
        Ok(Value::Nil)
    }

    /// Register a `methods Target { ... }` block
    pub(crate) fn eval_methods(&mut self, def: &MethodsDefinition, env: &Environment) -> EvalResult {
        let targets = self.target_keys(&def.target, env);
        for function in &def.definitions {
            let method = Rc::new(FunctionValue::from_definition(
                function,
                env.clone(),
                self.current_package.clone(),
            ));
            for target in &targets {
                self.methods.add_inherent(target, method.clone());
            }
        }
        Ok(Value::Nil)
    }

    /// Build a struct instance; fields are stored in declared order
    pub(crate) fn eval_struct_literal(&mut self, literal: &StructLiteral, env: &Environment) -> EvalResult {
        let def = match self.lookup_identifier(&literal.type_name, env)? {
            Value::StructDef(def) => def,
            other => {
                return Err(RuntimeError::type_mismatch(
                    &format!("struct definition '{}'", literal.type_name),
                    &other.type_name(),
                )
                .into())
            }
        };
        let declared = &def.def.fields;
        let fields = match &literal.fields {
            StructLiteralFields::Named(inits) => {
                let mut positions = Vec::with_capacity(inits.len());
                for init in inits {
                    let index = def
                        .def
                        .field_index(&init.name)
                        .ok_or_else(|| RuntimeError::unknown_field(def.name(), &init.name))?;
                    positions.push(index);
                }
                let exprs: Vec<&Expr> = inits.iter().map(|init| &init.value).collect();
                let values = self.eval_operands(literal.id, &exprs, env)?;
                let mut slots: Vec<Option<Value>> = vec![None; declared.len()];
                for (index, value) in positions.into_iter().zip(values) {
                    slots[index] = Some(self.fit_field(value, &declared[index].ty, env));
                }
                let mut fields = Vec::with_capacity(slots.len());
                for (slot, field) in slots.into_iter().zip(declared.iter()) {
                    let name = field.name.as_deref().unwrap_or("_");
                    fields.push(slot.ok_or_else(|| {
                        RuntimeError::new(
                            codes::UNKNOWN_FIELD,
                            format!("missing field '{}' in {} literal", name, def.name()),
                        )
                    })?);
                }
                fields
            }
            StructLiteralFields::Positional(exprs) => {
                if exprs.len() != declared.len() {
                    return Err(RuntimeError::arity_mismatch(def.name(), declared.len(), exprs.len()).into());
                }
                let exprs: Vec<&Expr> = exprs.iter().collect();
                let values = self.eval_operands(literal.id, &exprs, env)?;
                values
                    .into_iter()
                    .zip(declared.iter())
                    .map(|(value, field)| self.fit_field(value, &field.ty, env))
                    .collect()
            }
        };
        Ok(Value::Struct(StructInstance { def, fields }))
    }

    /// Re-tag a field value to its declared type where it fits
    fn fit_field(&self, value: Value, ty: &TypeExpr, env: &Environment) -> Value {
        self.coerce_to_type(&value, ty, env).unwrap_or(value)
    }
}
