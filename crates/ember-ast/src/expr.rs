// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Expression AST nodes.

use crate::stmt::Block;
use crate::{NodeId, Span};

/// An expression in the AST.
#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

/// The kind of expression.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    String(String),
    Bool(bool),
    /// Identifier: a variable, or a priority literal (`High`/`Normal`/`Low`)
    /// when it appears where a priority is expected.
    Ident(String),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Call to a user function or a runtime builtin (`channel`, `send`,
    /// `recv`, `sleep`, `close`, `len`, `cancel`, `print`) — resolved by
    /// name at lowering time, not by the parser.
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    /// `spawn [priority] { ... }` as an expression yields a task handle.
    Spawn {
        priority: Option<Box<Expr>>,
        body: Block,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}
