//! Cooperative task scheduler.
//!
//! Tasks run on the interpreter's thread, one at a time, in FIFO order. A
//! task suspends only when it awaits a pending future. Progress through
//! blocks, loops and branches is recorded per `NodeId` in the task's
//! execution context so a resumed task re-enters the statement it
//! suspended in instead of restarting its body.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use crate::ast::build::{positional_struct_def, struct_def, ty, union_def};
use crate::ast::{Expr, IntegerKind, NodeId, StructDefinition, UnionDefinition};

use super::environment::Environment;
use super::error::{EvalResult, RuntimeError, Signal};
use super::value::{FutureHandle, FutureState, RangeValue, StructDefValue, StructInstance, Value};
use super::Interpreter;

/// Saved progress of one node in a suspended task
#[derive(Debug, Clone)]
pub(crate) enum Frame {
    /// Statement index, block scope and last statement value
    Block {
        env: Environment,
        index: usize,
        result: Value,
    },
    /// Suspended inside a `while` body
    LoopBody,
    /// Suspended inside a `for` body
    ForLoop {
        items: LoopItems,
        index: usize,
        env: Environment,
    },
    /// Suspended inside the chosen branch of an `if`
    Branch(usize),
    /// Suspended awaiting this future
    Awaiting(Rc<FutureHandle>),
    /// Suspended inside a match or rescue clause body
    Clause {
        index: usize,
        env: Environment,
        raised: Option<Value>,
    },
    /// Operands evaluated before the suspension, in source order
    Operands(Vec<Value>),
}

/// What a `for` loop walks over: a snapshot of an array or string, or a
/// range produced one element at a time
#[derive(Debug, Clone)]
pub(crate) enum LoopItems {
    Values(Vec<Value>),
    Range(RangeValue),
}

impl LoopItems {
    pub fn get(&self, index: usize) -> Option<Value> {
        match self {
            LoopItems::Values(items) => items.get(index).cloned(),
            LoopItems::Range(range) => range.get(index),
        }
    }
}

/// Per-task evaluation state, swapped in while a task runs
#[derive(Debug, Default)]
pub(crate) struct ExecutionContext {
    pub in_task: bool,
    pub frames: HashMap<NodeId, Frame>,
    /// Errors currently being handled by rescue clauses, innermost last
    pub raise_stack: Vec<Value>,
    /// Set by `proc_yield` while its task is parked, cleared on resume
    pub yielded: bool,
}

pub(crate) struct Task {
    pub id: u64,
    pub body: Rc<Expr>,
    pub env: Environment,
    /// Package of the code that spawned the task
    pub package: Option<String>,
    pub future: Rc<FutureHandle>,
    pub context: ExecutionContext,
}

/// Structs describing a future's progress, plus the `ProcError` payload of
/// a failed one
pub fn status_definitions() -> Vec<StructDefinition> {
    vec![
        struct_def("ProcError", vec![("details", ty("String"))]),
        positional_struct_def("Pending", vec![]),
        positional_struct_def("Resolved", vec![]),
        positional_struct_def("Cancelled", vec![]),
        struct_def("Failed", vec![("error", ty("ProcError"))]),
    ]
}

/// `union ProcStatus = Pending | Resolved | Cancelled | Failed`
pub fn status_union() -> UnionDefinition {
    union_def(
        "ProcStatus",
        vec![ty("Pending"), ty("Resolved"), ty("Cancelled"), ty("Failed")],
    )
}

/// FIFO run-queue owned by one interpreter
pub struct Executor {
    queue: VecDeque<Task>,
    next_id: u64,
    /// Status struct definitions, by name
    statuses: BTreeMap<String, Rc<StructDefValue>>,
}

impl Default for Executor {
    fn default() -> Self {
        let statuses = status_definitions()
            .into_iter()
            .map(|def| (def.name.clone(), Rc::new(StructDefValue { def, package: None })))
            .collect();
        Self {
            queue: VecDeque::new(),
            next_id: 0,
            statuses,
        }
    }
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    fn status(&self, name: &str, fields: Vec<Value>) -> Value {
        match self.statuses.get(name) {
            Some(def) => Value::Struct(StructInstance {
                def: def.clone(),
                fields,
            }),
            None => Value::Nil,
        }
    }

    pub(crate) fn enqueue(
        &mut self,
        body: Rc<Expr>,
        env: Environment,
        package: Option<String>,
    ) -> Rc<FutureHandle> {
        self.next_id += 1;
        let future = Rc::new(FutureHandle::new(self.next_id));
        self.queue.push_back(Task {
            id: self.next_id,
            body,
            env,
            package,
            future: future.clone(),
            context: ExecutionContext {
                in_task: true,
                ..ExecutionContext::default()
            },
        });
        future
    }

    fn pop(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    fn requeue(&mut self, task: Task) {
        self.queue.push_back(task);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Interpreter {
    /// Queue `body` as a task over `env` and return its future
    pub(crate) fn spawn_task(&mut self, body: Expr, env: &Environment) -> Value {
        let future = self
            .executor
            .enqueue(Rc::new(body), env.clone(), self.current_package.clone());
        tracing::trace!(task = future.id, "spawned task");
        Value::Future(future)
    }

    /// Schedule an expression as a task in the global scope
    pub fn evaluate_as_task(&mut self, expr: &Expr) -> Value {
        let env = self.globals.clone();
        self.spawn_task(expr.clone(), &env)
    }

    /// Number of queued (not yet completed) tasks
    pub fn pending_tasks(&self) -> usize {
        self.executor.len()
    }

    /// Run one pass over the tasks queued when the flush began, at most
    /// `limit` of them (default: the configured `max_steps`). Each runs to
    /// completion or to its next suspension. Returns the steps taken.
    pub fn flush(&mut self, limit: Option<usize>) -> usize {
        let limit = limit.unwrap_or(self.config.scheduler.max_steps);
        let batch = self.executor.len().min(limit);
        let mut steps = 0;
        while steps < batch {
            let Some(task) = self.executor.pop() else {
                break;
            };
            steps += 1;
            self.run_task(task);
        }
        steps
    }

    /// Flush until the queue is empty or the tick budget is spent
    pub fn drain(&mut self) -> Result<usize, RuntimeError> {
        let budget = self.config.scheduler.tick_budget;
        let mut total = 0;
        while !self.executor.is_empty() {
            if total >= budget {
                return Err(RuntimeError::scheduler(format!(
                    "tick budget of {} exhausted with {} task(s) pending",
                    budget,
                    self.executor.len()
                )));
            }
            total += self.flush(Some(budget - total));
        }
        Ok(total)
    }

    fn run_task(&mut self, mut task: Task) {
        let saved = std::mem::replace(&mut self.context, std::mem::take(&mut task.context));
        let caller = std::mem::replace(&mut self.current_package, task.package.clone());
        let outcome = self.eval_expr(&task.body, &task.env);
        self.current_package = caller;
        task.context = std::mem::replace(&mut self.context, saved);

        match outcome {
            Ok(value) | Err(Signal::Return(value)) => {
                tracing::trace!(task = task.id, "task completed");
                task.future.resolve(value);
            }
            Err(Signal::Suspend) => {
                tracing::trace!(task = task.id, "task suspended");
                self.executor.requeue(task);
            }
            Err(Signal::Raise(error)) => {
                tracing::debug!(task = task.id, "task raised");
                task.future.fail(error);
            }
            Err(Signal::Error(error)) => {
                tracing::debug!(task = task.id, error = %error, "task failed");
                task.future.fail(Value::error(error.message, None));
            }
            Err(Signal::Break { .. }) | Err(Signal::Continue { .. }) => {
                task.future
                    .fail(Value::error("break or continue outside of a loop", None));
            }
        }
    }

    /// Wait for a future. Inside a task a pending future suspends the task;
    /// at the top level the scheduler is driven until the future settles.
    pub(crate) fn await_future(&mut self, future: &Rc<FutureHandle>) -> EvalResult {
        let budget = self.config.scheduler.tick_budget;
        let mut spent = 0;
        loop {
            match future.state() {
                FutureState::Resolved(value) => return Ok(value),
                FutureState::Failed(error) => return Err(Signal::Raise(error)),
                FutureState::Pending if self.context.in_task => return Err(Signal::Suspend),
                FutureState::Pending => {
                    if self.executor.is_empty() {
                        return Err(RuntimeError::scheduler(format!(
                            "future #{} can never resolve: no tasks are queued",
                            future.id
                        ))
                        .into());
                    }
                    if spent >= budget {
                        return Err(RuntimeError::scheduler(format!(
                            "tick budget of {} exhausted awaiting future #{}",
                            budget, future.id
                        ))
                        .into());
                    }
                    spent += self.flush(Some(budget - spent));
                }
            }
        }
    }

    /// Bind the status structs, the `ProcStatus` union and the `proc_*`
    /// natives in the global scope
    pub(crate) fn install_concurrency_builtins(&mut self) {
        for (name, def) in &self.executor.statuses {
            self.globals.define(name.clone(), Value::StructDef(def.clone()));
        }
        let union = status_union();
        self.methods.register_union(&union.name, union.variants);

        self.globals.define(
            "proc_yield",
            Value::native("proc_yield", Some(0), |interp, _| interp.proc_yield()),
        );
        self.globals.define(
            "proc_flush",
            Value::native("proc_flush", Some(0), |interp, _| {
                interp.flush(None);
                Ok(Value::Nil)
            }),
        );
        self.globals.define(
            "proc_pending_tasks",
            Value::native("proc_pending_tasks", Some(0), |interp, _| {
                Ok(Value::Integer {
                    kind: IntegerKind::I32,
                    value: interp.pending_tasks() as i128,
                })
            }),
        );
        self.globals.define(
            "proc_cancelled",
            Value::native("proc_cancelled", Some(0), |interp, _| {
                interp.require_task("proc_cancelled")?;
                // Tasks are never cancelled
                Ok(Value::Bool(false))
            }),
        );
    }

    fn require_task(&self, native: &str) -> EvalResult<()> {
        if self.context.in_task {
            Ok(())
        } else {
            Err(RuntimeError::scheduler(format!(
                "{} must be called inside an asynchronous task",
                native
            ))
            .into())
        }
    }

    /// Give up the rest of this turn: the task is requeued and the call
    /// returns nil when it resumes
    fn proc_yield(&mut self) -> EvalResult {
        self.require_task("proc_yield")?;
        if std::mem::take(&mut self.context.yielded) {
            return Ok(Value::Nil);
        }
        self.context.yielded = true;
        Err(Signal::Suspend)
    }

    /// `future.status()`: `Pending`, `Resolved`, or `Failed { error: ProcError }`
    pub(crate) fn future_status(&self, future: &FutureHandle) -> Value {
        match future.state() {
            FutureState::Pending => self.executor.status("Pending", Vec::new()),
            FutureState::Resolved(_) => self.executor.status("Resolved", Vec::new()),
            FutureState::Failed(error) => {
                let details = match &error {
                    Value::Error(err) => err.message.clone(),
                    other => other.to_string(),
                };
                let proc_error = self.proc_error(details);
                self.executor.status("Failed", vec![proc_error])
            }
        }
    }

    fn proc_error(&self, details: impl Into<String>) -> Value {
        self.executor
            .status("ProcError", vec![Value::String(details.into())])
    }

    /// `future.value()`: the result, or the error a failed task raised.
    /// At the top level a pending future is driven to completion first;
    /// inside a task it yields an error value instead of blocking.
    pub(crate) fn future_value(&mut self, future: &Rc<FutureHandle>) -> EvalResult {
        if future.is_pending() && !self.context.in_task {
            return match self.await_future(future) {
                Err(Signal::Raise(error)) => Ok(error),
                other => other,
            };
        }
        match future.state() {
            FutureState::Resolved(value) => Ok(value),
            FutureState::Failed(error) => Ok(error),
            FutureState::Pending => Ok(Value::error(
                "Future pending",
                Some(self.proc_error("Future pending")),
            )),
        }
    }

    /// Take the saved frame for `id` (only inside a task)
    pub(crate) fn take_frame(&mut self, id: NodeId) -> Option<Frame> {
        if self.context.in_task {
            self.context.frames.remove(&id)
        } else {
            None
        }
    }

    pub(crate) fn save_frame(&mut self, id: NodeId, frame: Frame) {
        if self.context.in_task {
            self.context.frames.insert(id, frame);
        }
    }
}
