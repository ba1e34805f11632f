//! The SSA program arena.
//!
//! A program is a set of packages; each package lists functions; each function
//! owns its nodes (values and instructions) and ordered basic blocks. The
//! analyzer never mutates a loaded program.

use super::types::{Signature, TypeId, TypeTable};
use crate::errors::{Error, Result};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::path::Path;

/// Index of a function in [`Program::functions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuncId(pub u32);

/// Index of a basic block within its function.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockId(pub u32);

/// Index of a node (value or instruction) within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// A source position: file table index plus 1-based line and column.
/// Line 0 means "no position".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Pos {
    /// Index into [`Program::files`].
    pub file: u32,
    /// 1-based line; 0 when unknown.
    pub line: u32,
    /// 1-based column; 0 when unknown.
    pub col: u32,
}

impl Pos {
    /// The absent position.
    pub const NONE: Pos = Pos { file: 0, line: 0, col: 0 };

    /// True when the position carries no location.
    #[must_use]
    pub fn is_none(self) -> bool {
        self.line == 0
    }
}

/// Binary operators. Comparisons produce booleans and carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOpKind {
    /// True for comparison operators, whose boolean result carries no payload.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOpKind::Eq | BinOpKind::Ne | BinOpKind::Lt | BinOpKind::Le | BinOpKind::Gt | BinOpKind::Ge
        )
    }
}

/// Unary operators. `Len` and `Cap` produce integers that carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum UnOpKind {
    Neg,
    Not,
    BitNot,
    Len,
    Cap,
}

/// How a call names its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Callee {
    /// Direct call of a declared function.
    Static(FuncId),
    /// Call through a function value (closure or function pointer).
    Value(NodeId),
    /// Invoke-style dynamic dispatch through an interface value.
    Invoke {
        /// The interface receiver.
        recv: NodeId,
        /// The method name.
        method: CompactString,
    },
}

/// The shared shape of call-like instructions (`Call`, `Go`, `Defer`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallExpr {
    /// The call target.
    pub callee: Callee,
    /// Argument values. For a variadic callee the final argument is the
    /// synthetic slice holding the expanded elements.
    pub args: Vec<NodeId>,
}

impl CallExpr {
    /// True for invoke-style dynamic dispatch.
    #[must_use]
    pub fn is_invoke(&self) -> bool {
        matches!(self.callee, Callee::Invoke { .. })
    }

    /// The method name for invoke calls.
    #[must_use]
    pub fn method_name(&self) -> Option<&str> {
        match &self.callee {
            Callee::Invoke { method, .. } => Some(method.as_str()),
            _ => None,
        }
    }
}

/// Every kind of node a function can contain.
///
/// The first group are pure values that live outside any block (parameters,
/// free variables, globals, constants); the rest are instructions in block
/// program order. Value instructions define the node's own value; effect
/// instructions define nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Function parameter `index`.
    Param {
        /// Position in the parameter list.
        index: u32,
    },
    /// Captured variable of a closure; carries one implicit pointer level.
    FreeVar {
        /// Position in the capture list.
        index: u32,
    },
    /// Reference to a package-level variable. The node's type is the address
    /// of the global.
    Global {
        /// Declaring package path.
        package: CompactString,
        /// Variable name.
        name: CompactString,
    },
    /// Compile-time constant.
    Const {
        /// Literal rendering, for display only.
        value: CompactString,
    },

    /// Local or heap allocation; the node is the address of the cell.
    Alloc {
        /// True for heap allocations.
        heap: bool,
    },
    /// Address of a struct field.
    FieldAddr {
        /// Address of the struct.
        base: NodeId,
        /// Field index in the struct type.
        field: u32,
    },
    /// Value-mode field extraction.
    Field {
        /// The struct value.
        base: NodeId,
        /// Field index in the struct type.
        field: u32,
    },
    /// Address of an array/slice element.
    IndexAddr {
        /// Address or slice.
        base: NodeId,
        /// Element index.
        index: NodeId,
    },
    /// Value-mode element read of an array or string.
    Index {
        /// The aggregate value.
        base: NodeId,
        /// Element index.
        index: NodeId,
    },
    /// Load through an address.
    Load {
        /// The address read.
        addr: NodeId,
    },
    /// Binary operation.
    BinOp {
        /// Operator.
        op: BinOpKind,
        /// Left operand.
        x: NodeId,
        /// Right operand.
        y: NodeId,
    },
    /// Unary operation.
    UnOp {
        /// Operator.
        op: UnOpKind,
        /// Operand.
        x: NodeId,
    },
    /// SSA phi; one edge per predecessor, in predecessor order.
    Phi {
        /// Incoming values.
        edges: Vec<NodeId>,
    },
    /// Projection of one element of a multi-valued result.
    Extract {
        /// The tuple-valued node.
        tuple: NodeId,
        /// Result index.
        index: u32,
    },
    /// Function call.
    Call(CallExpr),
    /// Checked conversion from an interface. With `comma_ok` the node's type
    /// is a `(value, bool)` tuple.
    TypeAssert {
        /// The interface value.
        x: NodeId,
        /// The asserted type.
        asserted: TypeId,
        /// True for the two-result form.
        comma_ok: bool,
    },
    /// Value conversion (numeric, string/byte, named-type change).
    Convert {
        /// The converted value.
        x: NodeId,
    },
    /// Wraps a concrete value into an interface.
    MakeInterface {
        /// The wrapped value.
        x: NodeId,
    },
    /// Slice allocation.
    MakeSlice {
        /// Length.
        len: NodeId,
        /// Capacity.
        cap: NodeId,
    },
    /// Map allocation.
    MakeMap,
    /// Channel allocation.
    MakeChan,
    /// Closure construction over a declared function.
    MakeClosure {
        /// The closed-over function.
        func: FuncId,
        /// Values bound to the function's free variables.
        bindings: Vec<NodeId>,
    },
    /// Reslicing of a slice, string or array pointer.
    Slice {
        /// The sliced value.
        x: NodeId,
        /// Optional low bound.
        low: Option<NodeId>,
        /// Optional high bound.
        high: Option<NodeId>,
    },
    /// Map read. With `comma_ok` the node's type is a `(value, bool)` tuple.
    Lookup {
        /// The map value.
        x: NodeId,
        /// The key.
        index: NodeId,
        /// True for the two-result form.
        comma_ok: bool,
    },
    /// Iterator over a map or string.
    Range {
        /// The iterated value.
        x: NodeId,
    },
    /// Advances an iterator; yields an `(ok, key, value)` tuple.
    Next {
        /// The iterator from a `Range`.
        iter: NodeId,
    },
    /// Channel receive.
    Recv {
        /// The channel.
        chan: NodeId,
    },

    /// Store through an address.
    Store {
        /// Destination address.
        addr: NodeId,
        /// Stored value.
        value: NodeId,
    },
    /// Channel send.
    Send {
        /// The channel.
        chan: NodeId,
        /// Sent value.
        value: NodeId,
    },
    /// Map write.
    MapUpdate {
        /// The map value.
        map: NodeId,
        /// The key.
        key: NodeId,
        /// Stored value.
        value: NodeId,
    },
    /// Unconditional branch.
    Jump {
        /// Successor block.
        target: BlockId,
    },
    /// Conditional branch.
    CondBranch {
        /// The boolean condition.
        cond: NodeId,
        /// Successor when true.
        then_block: BlockId,
        /// Successor when false.
        else_block: BlockId,
    },
    /// Function return.
    Return {
        /// Returned values, one per result.
        results: Vec<NodeId>,
    },
    /// Goroutine launch.
    Go(CallExpr),
    /// Deferred call.
    Defer(CallExpr),
    /// Run-time panic.
    Panic {
        /// The panic value.
        x: NodeId,
    },
}

impl NodeKind {
    /// The values this node reads, in a stable order.
    #[must_use]
    pub fn operands(&self) -> SmallVec<[NodeId; 4]> {
        let mut ops = SmallVec::new();
        match self {
            NodeKind::Param { .. }
            | NodeKind::FreeVar { .. }
            | NodeKind::Global { .. }
            | NodeKind::Const { .. }
            | NodeKind::Alloc { .. }
            | NodeKind::MakeMap
            | NodeKind::MakeChan
            | NodeKind::Jump { .. } => {}
            NodeKind::FieldAddr { base, .. } | NodeKind::Field { base, .. } => ops.push(*base),
            NodeKind::IndexAddr { base, index } | NodeKind::Index { base, index } => {
                ops.push(*base);
                ops.push(*index);
            }
            NodeKind::Load { addr } => ops.push(*addr),
            NodeKind::BinOp { x, y, .. } => {
                ops.push(*x);
                ops.push(*y);
            }
            NodeKind::UnOp { x, .. }
            | NodeKind::Convert { x }
            | NodeKind::MakeInterface { x }
            | NodeKind::TypeAssert { x, .. }
            | NodeKind::Range { x }
            | NodeKind::Panic { x } => ops.push(*x),
            NodeKind::Phi { edges } => ops.extend(edges.iter().copied()),
            NodeKind::Extract { tuple, .. } => ops.push(*tuple),
            NodeKind::Call(call) | NodeKind::Go(call) | NodeKind::Defer(call) => {
                match &call.callee {
                    Callee::Static(_) => {}
                    Callee::Value(v) => ops.push(*v),
                    Callee::Invoke { recv, .. } => ops.push(*recv),
                }
                ops.extend(call.args.iter().copied());
            }
            NodeKind::MakeSlice { len, cap } => {
                ops.push(*len);
                ops.push(*cap);
            }
            NodeKind::MakeClosure { bindings, .. } => ops.extend(bindings.iter().copied()),
            NodeKind::Slice { x, low, high } => {
                ops.push(*x);
                if let Some(l) = low {
                    ops.push(*l);
                }
                if let Some(h) = high {
                    ops.push(*h);
                }
            }
            NodeKind::Lookup { x, index, .. } => {
                ops.push(*x);
                ops.push(*index);
            }
            NodeKind::Next { iter } => ops.push(*iter),
            NodeKind::Recv { chan } => ops.push(*chan),
            NodeKind::Store { addr, value } => {
                ops.push(*addr);
                ops.push(*value);
            }
            NodeKind::Send { chan, value } => {
                ops.push(*chan);
                ops.push(*value);
            }
            NodeKind::MapUpdate { map, key, value } => {
                ops.push(*map);
                ops.push(*key);
                ops.push(*value);
            }
            NodeKind::CondBranch { cond, .. } => ops.push(*cond),
            NodeKind::Return { results } => ops.extend(results.iter().copied()),
        }
        ops
    }

    /// The call expression of call-like nodes.
    #[must_use]
    pub fn as_call(&self) -> Option<&CallExpr> {
        match self {
            NodeKind::Call(call) | NodeKind::Go(call) | NodeKind::Defer(call) => Some(call),
            _ => None,
        }
    }
}

/// One node: its kind, value type and source position.
///
/// Effect instructions carry the empty tuple type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// What the node is.
    pub kind: NodeKind,
    /// The node's value type.
    pub ty: TypeId,
    /// Source position.
    #[serde(default)]
    pub pos: Pos,
}

/// A basic block: an ordered run of instruction node ids ending in a
/// terminator (`Jump`, `CondBranch`, `Return` or `Panic`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    /// Instruction ids in program order.
    pub instrs: Vec<NodeId>,
}

/// A function body plus identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    /// Function name.
    pub name: CompactString,
    /// Declaring package path.
    pub package: CompactString,
    /// Receiver type name for methods; `None` for plain functions.
    #[serde(default)]
    pub receiver: Option<CompactString>,
    /// The signature.
    pub sig: Signature,
    /// Parameter nodes, one per signature parameter.
    #[serde(default)]
    pub params: Vec<NodeId>,
    /// Free-variable nodes for closures.
    #[serde(default)]
    pub free_vars: Vec<NodeId>,
    /// All nodes of the function.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Basic blocks in layout order.
    #[serde(default)]
    pub blocks: Vec<Block>,
    /// The entry block.
    #[serde(default)]
    pub entry: BlockId,
    /// The recovery block reached after a recovered panic, if any. Excluded
    /// from source identification.
    #[serde(default)]
    pub recover_block: Option<BlockId>,
    /// True when the body is not available (external/declared-only).
    #[serde(default)]
    pub is_external: bool,
}

impl Function {
    /// The function's canonical identity string:
    /// `pkg.Name` or `pkg.(Recv).Name` for methods.
    #[must_use]
    pub fn canonical_name(&self) -> String {
        match &self.receiver {
            Some(recv) => format!("{}.({}).{}", self.package, recv, self.name),
            None => format!("{}.{}", self.package, self.name),
        }
    }
}

/// A package: path plus its member functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    /// Import path.
    pub path: CompactString,
    /// Member functions, by id.
    pub functions: Vec<FuncId>,
}

/// A whole SSA program, as produced by the front end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    /// File table; positions index into it.
    pub files: Vec<CompactString>,
    /// The interned type table.
    pub types: TypeTable,
    /// Packages, each an analysis unit.
    pub packages: Vec<Package>,
    /// All functions across packages.
    pub functions: Vec<Function>,
}

impl Program {
    /// Returns the function for an id.
    #[must_use]
    pub fn func(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    /// The file name of a position, if it carries one.
    #[must_use]
    pub fn file_name(&self, pos: Pos) -> &str {
        if pos.is_none() {
            return "";
        }
        self.files
            .get(pos.file as usize)
            .map_or("", CompactString::as_str)
    }

    /// Loads a program dump from JSON text.
    pub fn from_json(text: &str) -> Result<Program> {
        serde_json::from_str(text).map_err(|e| Error::Parse {
            path: Path::new("<inline>").to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Loads a program dump from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Program> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
