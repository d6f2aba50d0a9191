// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Abstract Syntax Tree types for the Ember surface language.
//!
//! Ember exists to give the scheduler/channel/select runtime (`ember-rt`)
//! a concrete caller — a handful of functions, statements, and the
//! `spawn`/`select` forms that lower onto the runtime's primitives. It is
//! not a general-purpose language.

pub mod decl;
pub mod expr;
pub mod span;
pub mod stmt;
pub mod token;

pub use span::{LineMap, Span};

/// Unique identifier for AST nodes, assigned in parse order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const DUMMY: NodeId = NodeId(u32::MAX);
}
