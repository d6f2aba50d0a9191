// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Top-level declaration AST nodes.

use crate::stmt::Block;
use crate::{NodeId, Span};

/// A top-level declaration. Ember programs are a flat list of functions —
/// no modules, types, or traits, since the surface language only exists
/// to drive the scheduler/channel/select runtime from concrete programs.
#[derive(Debug, Clone)]
pub struct Decl {
    pub id: NodeId,
    pub kind: DeclKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Fn(FnDecl),
}

#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
}
