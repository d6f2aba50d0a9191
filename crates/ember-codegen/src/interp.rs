// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Tree-walking interpreter for Ember.
//!
//! `eval_expr`/`exec_stmt`/`exec_block` are real `async fn`s that `.await`
//! genuine `ember-rt` futures (`Channel::send`/`recv`, `select`,
//! `scheduler::sleep`/`yield_now`) — `spawn` hands the scheduler a
//! `Box::pin`'d call into this module directly, with no separate codegen
//! step translating Ember into some other representation first.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use tracing::{trace, warn};

use ember_ast::decl::{Decl, DeclKind, FnDecl};
use ember_ast::expr::{BinOp, Expr, ExprKind, UnaryOp};
use ember_ast::stmt::{Block, SelectArm, Stmt, StmtKind};

use ember_rt::select::{select, select_or_default, SelectCase};
use ember_rt::{scheduler, Channel, Priority};

use crate::env::Env;
use crate::value::Value;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    #[error("unknown name '{0}'")]
    UnknownName(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("'{name}' expects {expected} argument(s), found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error(transparent)]
    Runtime(#[from] ember_rt::RuntimeError),
}

/// How a statement (or block) finished: fell off the end, or hit `return`.
enum Flow {
    Normal,
    Return(Value),
}

/// The function table shared by every task spawned from one program —
/// cheap to clone (`Rc`), so each spawned body gets its own copy.
#[derive(Clone)]
pub struct Interpreter {
    functions: Rc<HashMap<String, Rc<FnDecl>>>,
}

impl Interpreter {
    pub fn new(decls: &[Decl]) -> Self {
        let mut functions = HashMap::new();
        for decl in decls {
            let DeclKind::Fn(f) = &decl.kind;
            functions.insert(f.name.clone(), Rc::new(f.clone()));
        }
        Self {
            functions: Rc::new(functions),
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Calls `name(args)` to completion, for use as the program's entry
    /// point (run directly, not through `spawn`).
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        let f = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        call_fn(self.clone(), f, args).await
    }

    /// Wraps `call` for use as a `Scheduler::spawn` body: interpreter
    /// errors are logged and surfaced as `Unit` rather than failing the
    /// task, since the scheduler's task result slot is reserved for
    /// `RuntimeError::Cancelled` (see DESIGN.md).
    pub async fn call_as_task(self, f: Rc<FnDecl>, args: Vec<Value>) -> Value {
        match call_fn(self, f, args).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "spawned task body failed");
                Value::Unit
            }
        }
    }

    fn function(&self, name: &str) -> Option<Rc<FnDecl>> {
        self.functions.get(name).cloned()
    }
}

fn call_fn(interp: Interpreter, f: Rc<FnDecl>, args: Vec<Value>) -> BoxFuture<'static, Result<Value, EvalError>> {
    Box::pin(async move {
        if f.params.len() != args.len() {
            return Err(EvalError::Arity {
                name: f.name.clone(),
                expected: f.params.len(),
                found: args.len(),
            });
        }
        let mut env = Env::new();
        for (param, arg) in f.params.iter().zip(args) {
            env.declare(param.clone(), arg);
        }
        trace!(function = %f.name, "calling function");
        match exec_block(&interp, &mut env, &f.body).await? {
            Flow::Return(v) => Ok(v),
            Flow::Normal => Ok(Value::Unit),
        }
    })
}

fn exec_block<'a>(interp: &'a Interpreter, env: &'a mut Env, block: &'a Block) -> BoxFuture<'a, Result<Flow, EvalError>> {
    Box::pin(async move {
        env.push_scope();
        for stmt in block {
            match exec_stmt(interp, env, stmt).await {
                Ok(Flow::Normal) => continue,
                Ok(ret @ Flow::Return(_)) => {
                    env.pop_scope();
                    return Ok(ret);
                }
                Err(e) => {
                    env.pop_scope();
                    return Err(e);
                }
            }
        }
        env.pop_scope();
        Ok(Flow::Normal)
    })
}

fn exec_stmt<'a>(interp: &'a Interpreter, env: &'a mut Env, stmt: &'a Stmt) -> BoxFuture<'a, Result<Flow, EvalError>> {
    Box::pin(async move {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                eval_expr(interp, env, expr).await?;
                Ok(Flow::Normal)
            }
            StmtKind::Let { name, init } => {
                let value = eval_expr(interp, env, init).await?;
                env.declare(name.clone(), value);
                Ok(Flow::Normal)
            }
            StmtKind::LetTuple { names, init } => {
                let value = eval_expr(interp, env, init).await?;
                let Value::Tuple(mut items) = value else {
                    return Err(EvalError::Type(format!(
                        "expected a 2-tuple, found {}",
                        value.type_name()
                    )));
                };
                if items.len() != 2 {
                    return Err(EvalError::Type(format!(
                        "expected a 2-tuple, found {}-tuple",
                        items.len()
                    )));
                }
                let second = items.pop().unwrap();
                let first = items.pop().unwrap();
                env.declare(names.0.clone(), first);
                env.declare(names.1.clone(), second);
                Ok(Flow::Normal)
            }
            StmtKind::Assign { name, value } => {
                let v = eval_expr(interp, env, value).await?;
                if !env.assign(name, v) {
                    return Err(EvalError::UnknownName(name.clone()));
                }
                Ok(Flow::Normal)
            }
            StmtKind::Return(value) => {
                let v = match value {
                    Some(e) => eval_expr(interp, env, e).await?,
                    None => Value::Unit,
                };
                Ok(Flow::Return(v))
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = eval_expr(interp, env, cond).await?;
                if cond.is_truthy() {
                    exec_block(interp, env, then_branch).await
                } else if let Some(else_branch) = else_branch {
                    exec_block(interp, env, else_branch).await
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While { cond, body } => {
                loop {
                    let c = eval_expr(interp, env, cond).await?;
                    if !c.is_truthy() {
                        return Ok(Flow::Normal);
                    }
                    match exec_block(interp, env, body).await? {
                        Flow::Normal => continue,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
            }
            StmtKind::Spawn { priority, body } => {
                spawn_block(interp, env, priority.as_ref(), body).await?;
                Ok(Flow::Normal)
            }
            StmtKind::Yield => {
                scheduler::yield_now().await;
                Ok(Flow::Normal)
            }
            StmtKind::Select { arms, default } => {
                exec_select(interp, env, arms, default.as_ref()).await?;
                Ok(Flow::Normal)
            }
        }
    })
}

fn eval_expr<'a>(interp: &'a Interpreter, env: &'a mut Env, expr: &'a Expr) -> BoxFuture<'a, Result<Value, EvalError>> {
    Box::pin(async move {
        match &expr.kind {
            ExprKind::Int(v) => Ok(Value::Int(*v)),
            ExprKind::String(v) => Ok(Value::Str(v.clone())),
            ExprKind::Bool(v) => Ok(Value::Bool(*v)),
            ExprKind::Ident(name) => env
                .get(name)
                .or_else(|| crate::value::priority_from_name(name).map(|_| Value::Str(name.clone())))
                .ok_or_else(|| EvalError::UnknownName(name.clone())),
            ExprKind::Unary { op, operand } => {
                let v = eval_expr(interp, env, operand).await?;
                eval_unary(*op, v)
            }
            ExprKind::Binary { op, left, right } => {
                let l = eval_expr(interp, env, left).await?;
                let r = eval_expr(interp, env, right).await?;
                eval_binary(*op, l, r)
            }
            ExprKind::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(eval_expr(interp, env, arg).await?);
                }
                call_callee(interp, env, callee, values).await
            }
            ExprKind::Spawn { priority, body } => {
                let handle = spawn_block(interp, env, priority.as_deref(), body).await?;
                Ok(Value::Task(handle))
            }
        }
    })
}

fn eval_unary(op: UnaryOp, v: Value) -> Result<Value, EvalError> {
    match (op, v) {
        (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(-n)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, v) => Err(EvalError::Type(format!(
            "unary operator does not apply to {:?} and {}",
            op,
            v.type_name()
        ))),
    }
}

fn eval_binary(op: BinOp, l: Value, r: Value) -> Result<Value, EvalError> {
    use BinOp::*;
    match op {
        And => return Ok(Value::Bool(l.is_truthy() && r.is_truthy())),
        Or => return Ok(Value::Bool(l.is_truthy() || r.is_truthy())),
        _ => {}
    }
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => match op {
            Add => Ok(Value::Int(a + b)),
            Sub => Ok(Value::Int(a - b)),
            Mul => Ok(Value::Int(a * b)),
            Div => {
                if b == 0 {
                    Err(EvalError::Type("division by zero".into()))
                } else {
                    Ok(Value::Int(a / b))
                }
            }
            Rem => {
                if b == 0 {
                    Err(EvalError::Type("division by zero".into()))
                } else {
                    Ok(Value::Int(a % b))
                }
            }
            Eq => Ok(Value::Bool(a == b)),
            Ne => Ok(Value::Bool(a != b)),
            Lt => Ok(Value::Bool(a < b)),
            Gt => Ok(Value::Bool(a > b)),
            Le => Ok(Value::Bool(a <= b)),
            Ge => Ok(Value::Bool(a >= b)),
            And | Or => unreachable!("handled above"),
        },
        (Value::Str(a), Value::Str(b)) => match op {
            Add => Ok(Value::Str(a + &b)),
            Eq => Ok(Value::Bool(a == b)),
            Ne => Ok(Value::Bool(a != b)),
            _ => Err(EvalError::Type("operator not defined for strings".to_string())),
        },
        (Value::Bool(a), Value::Bool(b)) => match op {
            Eq => Ok(Value::Bool(a == b)),
            Ne => Ok(Value::Bool(a != b)),
            _ => Err(EvalError::Type("operator not defined for bools".into())),
        },
        (a, b) => Err(EvalError::Type(format!(
            "operator not defined for {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Evaluates `priority` (if present, must name `High`/`Normal`/`Low`) and
/// spawns `body` as a new task on the ambient scheduler.
async fn spawn_block(
    interp: &Interpreter,
    env: &mut Env,
    priority: Option<&Expr>,
    body: &Block,
) -> Result<ember_rt::TaskHandle<Value>, EvalError> {
    let priority = match priority {
        Some(expr) => {
            let v = eval_expr(interp, env, expr).await?;
            v.as_priority()
                .ok_or_else(|| EvalError::Type(format!("'{}' is not a priority", v)))?
        }
        None => Priority::Normal,
    };
    let body = body.clone();
    let child_interp = interp.clone();
    // Every spawned body runs with its own fresh `Env`; closures are not
    // part of this language, so nothing needs to be captured from the
    // spawning task's scope beyond what it is given as a wrapper function.
    let fut = async move {
        let mut child_env = Env::new();
        match exec_block(&child_interp, &mut child_env, &body).await {
            Ok(Flow::Return(v)) => v,
            Ok(Flow::Normal) => Value::Unit,
            Err(e) => {
                warn!(error = %e, "spawned block failed");
                Value::Unit
            }
        }
    };
    scheduler::spawn(fut, priority).map_err(EvalError::from)
}

async fn exec_select(
    interp: &Interpreter,
    env: &mut Env,
    arms: &[SelectArm],
    default: Option<&Block>,
) -> Result<(), EvalError> {
    let mut channels = Vec::with_capacity(arms.len());
    let mut send_values = Vec::with_capacity(arms.len());
    for arm in arms {
        match arm {
            SelectArm::Recv { chan, .. } => {
                let c = eval_expr(interp, env, chan).await?;
                let c = c
                    .as_channel()
                    .ok_or_else(|| EvalError::Type(format!("expected a channel, found {}", c.type_name())))?
                    .clone();
                channels.push(c);
                send_values.push(None);
            }
            SelectArm::Send { chan, value, .. } => {
                let c = eval_expr(interp, env, chan).await?;
                let c = c
                    .as_channel()
                    .ok_or_else(|| EvalError::Type(format!("expected a channel, found {}", c.type_name())))?
                    .clone();
                let v = eval_expr(interp, env, value).await?;
                channels.push(c);
                send_values.push(Some(v));
            }
        }
    }

    let cases: Vec<SelectCase<Value>> = arms
        .iter()
        .zip(channels.iter())
        .zip(send_values.into_iter())
        .map(|((arm, chan), value)| match arm {
            SelectArm::Recv { .. } => SelectCase::Recv(chan),
            SelectArm::Send { .. } => SelectCase::Send(chan, value.expect("send case always has a value")),
        })
        .collect();

    let outcome = if default.is_some() {
        select_or_default(cases)?.await
    } else {
        select(cases)?.await
    };

    match outcome.case_index {
        None => {
            if let Some(default_block) = default {
                exec_block(interp, env, default_block).await?;
            }
        }
        Some(i) => match &arms[i] {
            SelectArm::Recv { bind, ok_bind, body, .. } => {
                env.push_scope();
                if let Some(name) = bind {
                    env.declare(name.clone(), outcome.value.unwrap_or(Value::Unit));
                }
                if let Some(name) = ok_bind {
                    env.declare(name.clone(), Value::Bool(outcome.ok));
                }
                let flow = exec_block(interp, env, body).await;
                env.pop_scope();
                flow?;
            }
            SelectArm::Send { ok_bind, body, .. } => {
                env.push_scope();
                if let Some(name) = ok_bind {
                    env.declare(name.clone(), Value::Bool(outcome.ok));
                }
                let flow = exec_block(interp, env, body).await;
                env.pop_scope();
                flow?;
            }
        },
    }
    Ok(())
}

async fn call_callee(
    interp: &Interpreter,
    env: &mut Env,
    callee: &str,
    mut args: Vec<Value>,
) -> Result<Value, EvalError> {
    if let Some(result) = try_builtin(interp, callee, &mut args).await? {
        return Ok(result);
    }
    if let Some(f) = interp.function(callee) {
        return call_fn(interp.clone(), f, args).await;
    }
    Err(EvalError::UnknownFunction(callee.to_string()))
}

fn expect_args(name: &str, args: &[Value], n: usize) -> Result<(), EvalError> {
    if args.len() != n {
        return Err(EvalError::Arity {
            name: name.to_string(),
            expected: n,
            found: args.len(),
        });
    }
    Ok(())
}

/// Resolves the fixed set of runtime builtins by name. Returns `Ok(None)`
/// for any other callee so the caller falls through to user functions.
async fn try_builtin(
    _interp: &Interpreter,
    name: &str,
    args: &mut Vec<Value>,
) -> Result<Option<Value>, EvalError> {
    Ok(Some(match name {
        "channel" => {
            expect_args(name, args, 1)?;
            let capacity = args[0]
                .as_int()
                .ok_or_else(|| EvalError::Type("channel(capacity) expects an int".into()))?;
            Value::Channel(Channel::new(capacity.max(0) as usize))
        }
        "send" => {
            expect_args(name, args, 2)?;
            let chan = args[0]
                .as_channel()
                .ok_or_else(|| EvalError::Type("send expects a channel".into()))?
                .clone();
            let value = args.pop().unwrap();
            let ok = chan.send(value).await.is_ok();
            Value::Bool(ok)
        }
        "recv" => {
            expect_args(name, args, 1)?;
            let chan = args[0]
                .as_channel()
                .ok_or_else(|| EvalError::Type("recv expects a channel".into()))?
                .clone();
            let (value, ok) = chan.recv().await;
            Value::Tuple(vec![value.unwrap_or(Value::Unit), Value::Bool(ok)])
        }
        "close" => {
            expect_args(name, args, 1)?;
            let chan = args[0]
                .as_channel()
                .ok_or_else(|| EvalError::Type("close expects a channel".into()))?;
            chan.close();
            Value::Unit
        }
        "len" => {
            expect_args(name, args, 1)?;
            let chan = args[0]
                .as_channel()
                .ok_or_else(|| EvalError::Type("len expects a channel".into()))?;
            Value::Int(chan.len() as i64)
        }
        "sleep" => {
            expect_args(name, args, 1)?;
            let ticks = args[0]
                .as_int()
                .ok_or_else(|| EvalError::Type("sleep(ticks) expects an int".into()))?;
            scheduler::sleep(ticks.max(0) as u64).await?;
            Value::Unit
        }
        "cancel" => {
            expect_args(name, args, 1)?;
            let task = args[0]
                .as_task()
                .ok_or_else(|| EvalError::Type("cancel expects a task".into()))?;
            task.cancel();
            Value::Unit
        }
        "print" => {
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    print!(" ");
                }
                print!("{arg}");
            }
            println!();
            Value::Unit
        }
        _ => return Ok(None),
    }))
}
