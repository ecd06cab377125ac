//! Blocks, loops, branching, `match`, `rescue` and labeled breakpoints.
//!
//! Every construct that can contain an `await` saves a [`Frame`] under its
//! `NodeId` when a suspension passes through it, and picks that frame back up
//! when the task resumes.

use crate::ast::*;

use super::environment::Environment;
use super::error::{EvalResult, RuntimeError, Signal};
use super::scheduler::{Frame, LoopItems};
use super::value::*;
use super::Interpreter;

impl Interpreter {
    /// Evaluate `exprs` left to right. Operands finished before a suspension
    /// are kept under `id`, so resuming evaluates only the rest.
    pub(crate) fn eval_operands(
        &mut self,
        id: NodeId,
        exprs: &[&Expr],
        env: &Environment,
    ) -> EvalResult<Vec<Value>> {
        let mut values = match self.take_frame(id) {
            Some(Frame::Operands(values)) => values,
            _ => Vec::with_capacity(exprs.len()),
        };
        while let Some(expr) = exprs.get(values.len()) {
            match self.eval_expr(expr, env) {
                Ok(value) => values.push(value),
                Err(Signal::Suspend) => {
                    self.save_frame(id, Frame::Operands(values));
                    return Err(Signal::Suspend);
                }
                Err(other) => return Err(other),
            }
        }
        Ok(values)
    }

    /// Evaluate a block in a child scope; its value is the last statement's
    pub(crate) fn eval_block(&mut self, block: &Block, env: &Environment) -> EvalResult {
        let (scope, mut index, mut result) = match self.take_frame(block.id) {
            Some(Frame::Block { env, index, result }) => (env, index, result),
            _ => (env.child(), 0, Value::Nil),
        };
        while let Some(stmt) = block.stmts.get(index) {
            match self.eval_stmt(stmt, &scope) {
                Ok(value) => {
                    result = value;
                    index += 1;
                }
                Err(Signal::Suspend) => {
                    self.save_frame(
                        block.id,
                        Frame::Block {
                            env: scope,
                            index,
                            result,
                        },
                    );
                    return Err(Signal::Suspend);
                }
                Err(other) => return Err(other),
            }
        }
        Ok(result)
    }

    /// `while`: the loop's value is the unlabeled break value, else nil
    pub(crate) fn eval_while(&mut self, looped: &WhileLoop, env: &Environment) -> EvalResult {
        let mut resuming = matches!(self.take_frame(looped.id), Some(Frame::LoopBody));
        loop {
            if !resuming && !self.eval_expr(&looped.condition, env)?.is_truthy() {
                return Ok(Value::Nil);
            }
            resuming = false;
            match self.eval_block(&looped.body, env) {
                Ok(_) | Err(Signal::Continue { label: None }) => {}
                Err(Signal::Break { label: None, value }) => return Ok(value),
                Err(Signal::Suspend) => {
                    self.save_frame(looped.id, Frame::LoopBody);
                    return Err(Signal::Suspend);
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// `for pattern in iterable`: iterates a snapshot of an array or string,
    /// or a range one element at a time
    pub(crate) fn eval_for(&mut self, looped: &ForLoop, env: &Environment) -> EvalResult {
        let (items, mut index, mut resumed_scope) = match self.take_frame(looped.id) {
            Some(Frame::ForLoop { items, index, env }) => (items, index, Some(env)),
            _ => {
                let iterable = self.eval_expr(&looped.iterable, env)?;
                (iterate(&iterable)?, 0, None)
            }
        };
        loop {
            let scope = match resumed_scope.take() {
                Some(scope) => scope,
                None => {
                    let Some(item) = items.get(index) else {
                        break;
                    };
                    let scope = env.child();
                    self.bind_pattern(&looped.pattern, &item, &scope, "for loop", true)?;
                    scope
                }
            };
            match self.eval_block(&looped.body, &scope) {
                Ok(_) | Err(Signal::Continue { label: None }) => index += 1,
                Err(Signal::Break { label: None, value }) => return Ok(value),
                Err(Signal::Suspend) => {
                    self.save_frame(
                        looped.id,
                        Frame::ForLoop {
                            items,
                            index,
                            env: scope,
                        },
                    );
                    return Err(Signal::Suspend);
                }
                Err(other) => return Err(other),
            }
        }
        Ok(Value::Nil)
    }

    /// `if`/`elsif`/`else`; a missing branch evaluates to nil
    pub(crate) fn eval_if(&mut self, expr: &IfExpr, env: &Environment) -> EvalResult {
        let chosen = match self.take_frame(expr.id) {
            Some(Frame::Branch(index)) => Some(index),
            _ => self.choose_branch(expr, env)?,
        };
        let Some(index) = chosen else {
            return Ok(Value::Nil);
        };
        let block = match index {
            0 => &expr.then_branch,
            i if i <= expr.elsif.len() => &expr.elsif[i - 1].body,
            _ => match &expr.else_branch {
                Some(block) => block,
                None => return Ok(Value::Nil),
            },
        };
        match self.eval_block(block, env) {
            Err(Signal::Suspend) => {
                self.save_frame(expr.id, Frame::Branch(index));
                Err(Signal::Suspend)
            }
            other => other,
        }
    }

    /// Index of the branch to run: 0 for `then`, `1..=n` for the elsifs,
    /// `n + 1` for `else`
    fn choose_branch(&mut self, expr: &IfExpr, env: &Environment) -> EvalResult<Option<usize>> {
        if self.eval_expr(&expr.condition, env)?.is_truthy() {
            return Ok(Some(0));
        }
        for (i, elsif) in expr.elsif.iter().enumerate() {
            if self.eval_expr(&elsif.condition, env)?.is_truthy() {
                return Ok(Some(i + 1));
            }
        }
        Ok(expr.else_branch.as_ref().map(|_| expr.elsif.len() + 1))
    }

    /// Find the first clause whose pattern matches and whose guard passes
    fn select_clause(
        &mut self,
        clauses: &[MatchClause],
        subject: &Value,
        env: &Environment,
    ) -> EvalResult<Option<(usize, Environment)>> {
        for (index, clause) in clauses.iter().enumerate() {
            let scope = env.child();
            let Some(bindings) = self.match_pattern(&clause.pattern, subject, &scope) else {
                continue;
            };
            for (name, value) in bindings {
                scope.define(name, value);
            }
            if let Some(guard) = &clause.guard {
                if !self.eval_expr(guard, &scope)?.is_truthy() {
                    continue;
                }
            }
            return Ok(Some((index, scope)));
        }
        Ok(None)
    }

    /// `match`: clauses are tried in order; no match raises
    pub(crate) fn eval_match(&mut self, expr: &MatchExpr, env: &Environment) -> EvalResult {
        let (index, scope) = match self.take_frame(expr.id) {
            Some(Frame::Clause { index, env, .. }) => (index, env),
            _ => {
                let subject = self.eval_expr(&expr.subject, env)?;
                match self.select_clause(&expr.clauses, &subject, env)? {
                    Some(selected) => selected,
                    None => {
                        return Err(Signal::Raise(Value::error(
                            format!("Non-exhaustive match for {}", format_value(&subject)),
                            Some(subject),
                        )))
                    }
                }
            }
        };
        match self.eval_expr(&expr.clauses[index].body, &scope) {
            Err(Signal::Suspend) => {
                self.save_frame(
                    expr.id,
                    Frame::Clause {
                        index,
                        env: scope,
                        raised: None,
                    },
                );
                Err(Signal::Suspend)
            }
            other => other,
        }
    }

    /// `body rescue { clauses }`: only raised errors are caught; an
    /// unmatched error propagates unchanged
    pub(crate) fn eval_rescue(&mut self, expr: &RescueExpr, env: &Environment) -> EvalResult {
        if let Some(Frame::Clause { index, env: scope, raised }) = self.take_frame(expr.id) {
            return self.run_rescue_clause(expr, index, scope, raised.unwrap_or(Value::Nil));
        }
        let raised = match self.eval_expr(&expr.body, env) {
            Err(Signal::Raise(error)) => error,
            other => return other,
        };
        tracing::trace!(error = %raised, "rescuing raised error");

        // Guards may rethrow, so the error is in scope while they run
        self.context.raise_stack.push(raised.clone());
        let selected = self.select_clause(&expr.clauses, &raised, env);
        self.context.raise_stack.pop();
        match selected? {
            Some((index, scope)) => self.run_rescue_clause(expr, index, scope, raised),
            None => Err(Signal::Raise(raised)),
        }
    }

    fn run_rescue_clause(
        &mut self,
        expr: &RescueExpr,
        index: usize,
        scope: Environment,
        raised: Value,
    ) -> EvalResult {
        self.context.raise_stack.push(raised.clone());
        let result = self.eval_expr(&expr.clauses[index].body, &scope);
        self.context.raise_stack.pop();
        if let Err(Signal::Suspend) = result {
            self.save_frame(
                expr.id,
                Frame::Clause {
                    index,
                    env: scope,
                    raised: Some(raised),
                },
            );
        }
        result
    }

    /// `breakpoint 'label { ... }`: `break 'label v` exits with `v`,
    /// `continue 'label` restarts the body
    pub(crate) fn eval_breakpoint(&mut self, label: &str, body: &Block, env: &Environment) -> EvalResult {
        loop {
            match self.eval_block(body, env) {
                Err(Signal::Break {
                    label: Some(target),
                    value,
                }) if target == label => return Ok(value),
                Err(Signal::Continue {
                    label: Some(target),
                }) if target == label => continue,
                other => return other,
            }
        }
    }
}

/// Items a `for` loop walks over
fn iterate(value: &Value) -> Result<LoopItems, Signal> {
    match value.concrete() {
        Value::Array(items) => Ok(LoopItems::Values(items.clone())),
        Value::String(s) => Ok(LoopItems::Values(s.chars().map(Value::Char).collect())),
        Value::Range(range) => Ok(LoopItems::Range(*range)),
        other => Err(RuntimeError::type_mismatch(
            "iterable (Array, String or Range)",
            &other.type_name(),
        )
        .into()),
    }
}
