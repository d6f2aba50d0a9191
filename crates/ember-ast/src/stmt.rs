// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Statement AST nodes.

use crate::expr::Expr;
use crate::{NodeId, Span};

/// A braced sequence of statements.
pub type Block = Vec<Stmt>;

/// A statement in the AST.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

/// The kind of statement.
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// Expression statement, value discarded.
    Expr(Expr),
    /// `let name = init;`
    Let { name: String, init: Expr },
    /// `let (a, b) = init;` — binds a two-element tuple value, the shape
    /// `recv(ch)` produces.
    LetTuple { names: (String, String), init: Expr },
    /// `name = value;`
    Assign { name: String, value: Expr },
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    While { cond: Expr, body: Block },
    /// `spawn [priority] { ... }` used as a statement (handle discarded).
    Spawn {
        priority: Option<Expr>,
        body: Block,
    },
    /// `yield;`
    Yield,
    Select {
        arms: Vec<SelectArm>,
        default: Option<Block>,
    },
}

/// One arm of a `select` statement.
#[derive(Debug, Clone)]
pub enum SelectArm {
    /// `recv(chan) [as v | as (v, ok)] => { body }`
    Recv {
        chan: Expr,
        bind: Option<String>,
        ok_bind: Option<String>,
        body: Block,
    },
    /// `send(chan, value) [as ok] => { body }`
    Send {
        chan: Expr,
        value: Expr,
        ok_bind: Option<String>,
        body: Block,
    },
}
