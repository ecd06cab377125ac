//! Assignment: `:=` declarations, `=` rebinding, compound operators and
//! writes through member and index paths.
//!
//! Values are immutable trees, so `a.b[i] = v` reads the root binding,
//! rebuilds the path with the new leaf, and assigns the new root back.

use crate::ast::*;

use super::environment::Environment;
use super::error::{EvalResult, RuntimeError, Signal};
use super::value::*;
use super::{index_out_of_bounds, Interpreter};

/// A resolved assignment path: a root variable and the steps below it
#[derive(Debug)]
struct Place {
    root: String,
    steps: Vec<PlaceStep>,
}

#[derive(Debug)]
enum PlaceStep {
    Field(String),
    Position(usize),
    Index(i128),
}

impl Interpreter {
    pub(crate) fn eval_assignment(&mut self, assignment: &Assignment, env: &Environment) -> EvalResult {
        match (&assignment.op, &assignment.target) {
            (AssignOp::Declare, AssignTarget::Pattern(pattern)) => {
                let value = self.eval_expr(&assignment.value, env)?;
                self.bind_pattern(pattern, &value, env, "declaration", true)?;
                Ok(value)
            }
            (AssignOp::Assign, AssignTarget::Pattern(pattern)) => {
                let value = self.eval_expr(&assignment.value, env)?;
                self.bind_pattern(pattern, &value, env, "assignment", false)?;
                Ok(value)
            }
            (AssignOp::Compound(op), AssignTarget::Pattern(Pattern::Identifier(name))) => {
                let current = env
                    .lookup(name)
                    .ok_or_else(|| RuntimeError::undefined_identifier(name))?;
                let rhs = self.eval_expr(&assignment.value, env)?;
                let value = self.apply_binary(*op, &current, &rhs)?;
                env.assign(name, value.clone());
                Ok(value)
            }
            (AssignOp::Compound(op), AssignTarget::Pattern(_)) => Err(RuntimeError::invalid_assignment(
                format!("'{}=' requires a variable on the left", op.symbol()),
            )
            .into()),
            (AssignOp::Declare, _) => Err(RuntimeError::invalid_assignment(
                "':=' cannot declare a member or index",
            )
            .into()),
            (op, target) => {
                let place = self.resolve_target(target, env)?;
                let rhs = self.eval_expr(&assignment.value, env)?;
                let value = match op {
                    AssignOp::Compound(op) => {
                        let current = self.read_place(&place, env)?;
                        self.apply_binary(*op, &current, &rhs)?
                    }
                    _ => rhs,
                };
                self.write_place(&place, value.clone(), env)?;
                Ok(value)
            }
        }
    }

    fn resolve_target(&mut self, target: &AssignTarget, env: &Environment) -> EvalResult<Place> {
        match target {
            AssignTarget::Member { object, member } => {
                let mut place = self.resolve_place(object, env)?;
                place.steps.push(member_step(member));
                Ok(place)
            }
            AssignTarget::Index { object, index } => {
                let mut place = self.resolve_place(object, env)?;
                place.steps.push(self.index_step(index, env)?);
                Ok(place)
            }
            AssignTarget::Pattern(_) => Err(RuntimeError::invalid_assignment(
                "pattern targets are bound, not written through",
            )
            .into()),
        }
    }

    /// Index expressions on the path are evaluated once, left to right
    fn resolve_place(&mut self, expr: &Expr, env: &Environment) -> EvalResult<Place> {
        match expr {
            Expr::Identifier(ident) => Ok(Place {
                root: ident.name.clone(),
                steps: Vec::new(),
            }),
            Expr::Member { object, member } => {
                let mut place = self.resolve_place(object, env)?;
                place.steps.push(member_step(member));
                Ok(place)
            }
            Expr::Index { object, index, .. } => {
                let mut place = self.resolve_place(object, env)?;
                place.steps.push(self.index_step(index, env)?);
                Ok(place)
            }
            _ => Err(RuntimeError::invalid_assignment(
                "assignment target must be rooted at a variable",
            )
            .into()),
        }
    }

    fn index_step(&mut self, index: &Expr, env: &Environment) -> EvalResult<PlaceStep> {
        match self.eval_expr(index, env)? {
            Value::Integer { value, .. } => Ok(PlaceStep::Index(value)),
            other => Err(RuntimeError::type_mismatch("integer index", &other.type_name()).into()),
        }
    }

    fn read_place(&self, place: &Place, env: &Environment) -> EvalResult {
        let mut current = env
            .lookup(&place.root)
            .ok_or_else(|| RuntimeError::undefined_identifier(&place.root))?;
        for step in &place.steps {
            current = read_step(&current, step)?;
        }
        Ok(current)
    }

    fn write_place(&self, place: &Place, value: Value, env: &Environment) -> EvalResult<()> {
        let root = env
            .lookup(&place.root)
            .ok_or_else(|| RuntimeError::undefined_identifier(&place.root))?;
        let updated = write_steps(root, &place.steps, value)?;
        env.assign(&place.root, updated);
        Ok(())
    }
}

fn member_step(member: &MemberName) -> PlaceStep {
    match member {
        MemberName::Named(name) => PlaceStep::Field(name.clone()),
        MemberName::Position(index) => PlaceStep::Position(*index),
    }
}

fn slot_of(value: &Value, step: &PlaceStep) -> EvalResult<usize> {
    match (value.concrete(), step) {
        (Value::Struct(instance), PlaceStep::Field(name)) => instance
            .def
            .def
            .field_index(name)
            .ok_or_else(|| RuntimeError::unknown_field(instance.def.name(), name).into()),
        (Value::Struct(instance), PlaceStep::Position(index)) if *index < instance.fields.len() => {
            Ok(*index)
        }
        (Value::Array(items), PlaceStep::Position(index)) if *index < items.len() => Ok(*index),
        (Value::Array(items), PlaceStep::Index(index)) => usize::try_from(*index)
            .ok()
            .filter(|i| *i < items.len())
            .ok_or_else(|| index_out_of_bounds(*index, items.len())),
        (other, PlaceStep::Field(name)) => {
            Err(RuntimeError::unknown_field(&other.type_name(), name).into())
        }
        (other, PlaceStep::Position(index)) => {
            Err(RuntimeError::unknown_field(&other.type_name(), &index.to_string()).into())
        }
        (other, PlaceStep::Index(_)) => {
            Err(RuntimeError::type_mismatch("indexable Array", &other.type_name()).into())
        }
    }
}

fn read_step(value: &Value, step: &PlaceStep) -> EvalResult {
    let slot = slot_of(value, step)?;
    match value.concrete() {
        Value::Struct(instance) => Ok(instance.fields[slot].clone()),
        Value::Array(items) => Ok(items[slot].clone()),
        other => Err(RuntimeError::invalid_assignment(format!(
            "cannot write into {}",
            other.type_name()
        ))
        .into()),
    }
}

/// Rebuild `value` with the leaf at `steps` replaced by `leaf`
fn write_steps(value: Value, steps: &[PlaceStep], leaf: Value) -> Result<Value, Signal> {
    let Some((step, rest)) = steps.split_first() else {
        return Ok(leaf);
    };
    let slot = slot_of(&value, step)?;
    match value {
        Value::Interface { interface, value } => Ok(Value::Interface {
            interface,
            value: Box::new(write_steps(*value, steps, leaf)?),
        }),
        Value::Struct(mut instance) => {
            let child = std::mem::replace(&mut instance.fields[slot], Value::Nil);
            instance.fields[slot] = write_steps(child, rest, leaf)?;
            Ok(Value::Struct(instance))
        }
        Value::Array(mut items) => {
            let child = std::mem::replace(&mut items[slot], Value::Nil);
            items[slot] = write_steps(child, rest, leaf)?;
            Ok(Value::Array(items))
        }
        other => Err(RuntimeError::invalid_assignment(format!(
            "cannot write into {}",
            other.type_name()
        ))
        .into()),
    }
}
