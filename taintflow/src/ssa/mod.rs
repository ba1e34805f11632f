//! SSA Program Model
//!
//! The analyzer consumes a program already lowered to three-address SSA by an
//! external front end. This module owns the data model, a construction API
//! for front ends and tests, and the read-only per-function view the taint
//! engine traverses.

/// Incremental construction of programs and function bodies.
pub mod builder;
/// The program arena: packages, functions, blocks, nodes.
pub mod program;
/// The interned type table.
pub mod types;
/// Read-only per-function adapter: referrers, dominators, call resolution.
pub mod view;

pub use builder::{FunctionBuilder, ProgramBuilder};
pub use program::{
    BinOpKind, Block, BlockId, CallExpr, Callee, FuncId, Function, Node, NodeId, NodeKind,
    Package, Pos, Program, UnOpKind,
};
pub use types::{
    BasicKind, InterfaceMethod, Signature, StructField, Type, TypeId, TypeTable,
};
pub use view::{DomTree, FuncView};
