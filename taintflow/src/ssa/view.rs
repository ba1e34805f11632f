//! Read-only per-function view over the SSA arena.
//!
//! A [`FuncView`] precomputes what the taint engine walks repeatedly:
//! referrer edges (value → using instructions), instruction locations, the
//! dominator tree of the CFG, and which blocks sit on a cycle. It also hosts
//! call resolution and the structural queries the engine needs.

use super::program::{
    Block, BlockId, CallExpr, Callee, FuncId, Function, Node, NodeId, NodeKind, Pos, Program,
};
use super::types::{Type, TypeId};
use crate::errors::{Error, Result};
use petgraph::algo::dominators::simple_fast;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use smallvec::SmallVec;

/// The dominator tree of a function's CFG.
///
/// Dominance queries use pre/post interval numbering over the tree, so
/// `dominates` is O(1).
#[derive(Debug)]
pub struct DomTree {
    pre: Vec<u32>,
    post: Vec<u32>,
    preorder: Vec<BlockId>,
}

const UNREACHED: u32 = u32::MAX;

impl DomTree {
    fn new(num_blocks: usize, entry: BlockId, succs: &[Vec<BlockId>]) -> DomTree {
        let mut graph: DiGraph<(), ()> = DiGraph::new();
        for _ in 0..num_blocks {
            graph.add_node(());
        }
        for (b, outs) in succs.iter().enumerate() {
            for &s in outs {
                graph.add_edge(NodeIndex::new(b), NodeIndex::new(s.0 as usize), ());
            }
        }
        let doms = simple_fast(&graph, NodeIndex::new(entry.0 as usize));

        let mut children: Vec<Vec<BlockId>> = vec![Vec::new(); num_blocks];
        for b in 0..num_blocks {
            if b == entry.0 as usize {
                continue;
            }
            if let Some(d) = doms.immediate_dominator(NodeIndex::new(b)) {
                children[d.index()].push(BlockId(u32::try_from(b).unwrap_or(0)));
            }
        }

        // Iterative pre/post numbering of the dominator tree.
        let mut pre = vec![UNREACHED; num_blocks];
        let mut post = vec![UNREACHED; num_blocks];
        let mut preorder = Vec::with_capacity(num_blocks);
        let mut clock = 0u32;
        let mut stack: Vec<(BlockId, usize)> = vec![(entry, 0)];
        pre[entry.0 as usize] = clock;
        preorder.push(entry);
        clock += 1;
        while let Some(frame) = stack.last_mut() {
            let b = frame.0;
            let i = frame.1;
            if i < children[b.0 as usize].len() {
                frame.1 += 1;
                let child = children[b.0 as usize][i];
                pre[child.0 as usize] = clock;
                preorder.push(child);
                clock += 1;
                stack.push((child, 0));
            } else {
                post[b.0 as usize] = clock;
                clock += 1;
                stack.pop();
            }
        }

        DomTree { pre, post, preorder }
    }

    /// True when block `a` dominates block `b` (reflexively).
    #[must_use]
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let (pa, pb) = (self.pre[a.0 as usize], self.pre[b.0 as usize]);
        if pa == UNREACHED || pb == UNREACHED {
            return a == b;
        }
        pa <= pb && self.post[b.0 as usize] <= self.post[a.0 as usize]
    }

    /// Reachable blocks in dominator-tree pre-order.
    #[must_use]
    pub fn preorder(&self) -> &[BlockId] {
        &self.preorder
    }
}

/// Read-only adapter over one function.
pub struct FuncView<'a> {
    /// The owning program.
    pub program: &'a Program,
    /// The viewed function's id.
    pub id: FuncId,
    /// The viewed function.
    pub func: &'a Function,
    referrers: Vec<SmallVec<[NodeId; 4]>>,
    location: Vec<Option<(BlockId, u32)>>,
    dom: DomTree,
    in_cycle: Vec<bool>,
}

impl<'a> FuncView<'a> {
    /// Builds the view: referrer edges, locations, dominators, cycle marks.
    #[must_use]
    pub fn new(program: &'a Program, id: FuncId) -> FuncView<'a> {
        let func = program.func(id);
        let n = func.nodes.len();

        let mut referrers: Vec<SmallVec<[NodeId; 4]>> = vec![SmallVec::new(); n];
        for (i, node) in func.nodes.iter().enumerate() {
            let user = NodeId(u32::try_from(i).unwrap_or(u32::MAX));
            for op in node.kind.operands() {
                referrers[op.0 as usize].push(user);
            }
        }

        let mut location: Vec<Option<(BlockId, u32)>> = vec![None; n];
        for (bi, block) in func.blocks.iter().enumerate() {
            let bid = BlockId(u32::try_from(bi).unwrap_or(u32::MAX));
            for (ii, &instr) in block.instrs.iter().enumerate() {
                location[instr.0 as usize] = Some((bid, u32::try_from(ii).unwrap_or(u32::MAX)));
            }
        }

        let succs: Vec<Vec<BlockId>> = func
            .blocks
            .iter()
            .map(|b| Self::block_successors(func, b))
            .collect();
        let dom = DomTree::new(func.blocks.len().max(1), func.entry, &succs);

        let in_cycle = Self::cycle_blocks(func.blocks.len(), &succs);

        FuncView { program, id, func, referrers, location, dom, in_cycle }
    }

    fn block_successors(func: &Function, block: &Block) -> Vec<BlockId> {
        // Only the terminator transfers control.
        match block.instrs.last().map(|&t| &func.nodes[t.0 as usize].kind) {
            Some(NodeKind::Jump { target }) => vec![*target],
            Some(NodeKind::CondBranch { then_block, else_block, .. }) => {
                vec![*then_block, *else_block]
            }
            _ => Vec::new(),
        }
    }

    fn cycle_blocks(num_blocks: usize, succs: &[Vec<BlockId>]) -> Vec<bool> {
        let mut graph: DiGraph<(), ()> = DiGraph::new();
        for _ in 0..num_blocks {
            graph.add_node(());
        }
        let mut self_loop = vec![false; num_blocks];
        for (b, outs) in succs.iter().enumerate() {
            for &s in outs {
                if s.0 as usize == b {
                    self_loop[b] = true;
                }
                graph.add_edge(NodeIndex::new(b), NodeIndex::new(s.0 as usize), ());
            }
        }
        let mut in_cycle = self_loop;
        for scc in tarjan_scc(&graph) {
            if scc.len() > 1 {
                for ni in scc {
                    in_cycle[ni.index()] = true;
                }
            }
        }
        in_cycle
    }

    /// The node for an id.
    #[must_use]
    pub fn node(&self, n: NodeId) -> &Node {
        &self.func.nodes[n.0 as usize]
    }

    /// Instructions using a value.
    #[must_use]
    pub fn referrers(&self, n: NodeId) -> &[NodeId] {
        &self.referrers[n.0 as usize]
    }

    /// `(block, index)` of an instruction; `None` for non-instruction values.
    #[must_use]
    pub fn location(&self, n: NodeId) -> Option<(BlockId, u32)> {
        self.location[n.0 as usize]
    }

    /// Position of a node.
    #[must_use]
    pub fn pos(&self, n: NodeId) -> Pos {
        self.node(n).pos
    }

    /// The dominator tree.
    #[must_use]
    pub fn dom(&self) -> &DomTree {
        &self.dom
    }

    /// True when the block sits on a CFG cycle (including self-loops).
    #[must_use]
    pub fn block_in_cycle(&self, b: BlockId) -> bool {
        self.in_cycle.get(b.0 as usize).copied().unwrap_or(false)
    }

    /// True when instruction `a` executes before instruction `b` on every
    /// path: `a`'s block strictly dominates `b`'s, or both share a block and
    /// `a` comes first.
    #[must_use]
    pub fn executes_before(&self, a: NodeId, b: NodeId) -> bool {
        match (self.location(a), self.location(b)) {
            (Some((ba, ia)), Some((bb, ib))) => {
                if ba == bb {
                    ia < ib
                } else {
                    self.dom.dominates(ba, bb)
                }
            }
            // Non-instruction values (parameters, globals) precede everything.
            (None, Some(_)) => true,
            _ => false,
        }
    }

    /// Resolves the statically known callee of a call, following closure
    /// construction one level.
    #[must_use]
    pub fn static_callee(&self, call: &CallExpr) -> Option<FuncId> {
        match &call.callee {
            Callee::Static(fid) => Some(*fid),
            Callee::Value(v) => match &self.node(*v).kind {
                NodeKind::MakeClosure { func, .. } => Some(*func),
                _ => None,
            },
            Callee::Invoke { .. } => None,
        }
    }

    /// Number of results a call-like node produces.
    #[must_use]
    pub fn result_count(&self, call_node: NodeId) -> usize {
        match self.program.types.get(self.node(call_node).ty) {
            Type::Tuple(elems) => elems.len(),
            _ => 1,
        }
    }

    /// The `Extract` referrers of a tuple-valued node, as `(index, extract)`.
    #[must_use]
    pub fn extracts(&self, tuple: NodeId) -> SmallVec<[(u32, NodeId); 4]> {
        let mut out = SmallVec::new();
        for &u in self.referrers(tuple) {
            if let NodeKind::Extract { index, .. } = self.node(u).kind {
                out.push((index, u));
            }
        }
        out
    }

    /// Resolves the name of the field read by a `FieldAddr`/`Field` node.
    ///
    /// Fails with [`Error::UnresolvedField`] when the base does not resolve
    /// to a struct type; the engine logs and skips such sites.
    pub fn field_name(&self, n: NodeId) -> Result<&'a str> {
        let (base, field) = match self.node(n).kind {
            NodeKind::FieldAddr { base, field } | NodeKind::Field { base, field } => (base, field),
            _ => {
                return Err(Error::UnresolvedField(format!(
                    "node {} is not a field access",
                    n.0
                )))
            }
        };
        let types = &self.program.types;
        let base_ty = types.underlying(types.deref(self.node(base).ty));
        match types.get(base_ty) {
            Type::Struct { fields } => fields
                .get(field as usize)
                .map(|f| f.name.as_str())
                .ok_or_else(|| {
                    Error::UnresolvedField(format!(
                        "field index {field} out of range in {}",
                        types.short_name(base_ty)
                    ))
                }),
            _ => Err(Error::UnresolvedField(format!(
                "field access through non-struct type {}",
                types.short_name(base_ty)
            ))),
        }
    }

    /// The named type `(package, type-name)` owning a field access, plus the
    /// field index, when the base is a named struct.
    #[must_use]
    pub fn field_owner(&self, n: NodeId) -> Option<(TypeId, u32)> {
        let (base, field) = match self.node(n).kind {
            NodeKind::FieldAddr { base, field } | NodeKind::Field { base, field } => (base, field),
            _ => return None,
        };
        let types = &self.program.types;
        let owner = types.deref(self.node(base).ty);
        matches!(types.get(owner), Type::Named { .. }).then_some((owner, field))
    }

    /// Flattens the synthetic variadic slice of a call into its elements.
    ///
    /// Returns `None` when the last argument is not a recognizable variadic
    /// slice; an empty vector for the `f(fixed...)`-with-no-elements case.
    #[must_use]
    pub fn variadic_elements(&self, call: &CallExpr) -> Option<SmallVec<[NodeId; 4]>> {
        let &last = call.args.last()?;
        match &self.node(last).kind {
            NodeKind::Const { .. } => Some(SmallVec::new()),
            NodeKind::Slice { x, .. } => {
                let backing = *x;
                if !matches!(self.node(backing).kind, NodeKind::Alloc { .. }) {
                    return None;
                }
                let mut elems = SmallVec::new();
                for &ia in self.referrers(backing) {
                    if !matches!(self.node(ia).kind, NodeKind::IndexAddr { .. }) {
                        continue;
                    }
                    for &st in self.referrers(ia) {
                        if let NodeKind::Store { addr, value } = self.node(st).kind {
                            if addr == ia {
                                elems.push(value);
                            }
                        }
                    }
                }
                Some(elems)
            }
            _ => None,
        }
    }

    /// Chases `FieldAddr`/`IndexAddr`/`Slice` chains down to the value whose
    /// storage an address names.
    ///
    /// With `through_structs` false the chase refuses to cross a field access
    /// into a plain struct allocation and returns `None`; array-backed
    /// allocations are always crossed.
    #[must_use]
    pub fn alloc_root(&self, mut addr: NodeId, through_structs: bool) -> Option<NodeId> {
        loop {
            match &self.node(addr).kind {
                NodeKind::FieldAddr { base, .. } => {
                    if !through_structs && self.is_struct_alloc(*base) {
                        return None;
                    }
                    addr = *base;
                }
                NodeKind::IndexAddr { base, .. } => addr = *base,
                NodeKind::Slice { x, .. } => addr = *x,
                _ => return Some(addr),
            }
        }
    }

    fn is_struct_alloc(&self, n: NodeId) -> bool {
        if !matches!(self.node(n).kind, NodeKind::Alloc { .. }) {
            return false;
        }
        let types = &self.program.types;
        let cell = types.underlying(types.deref(self.node(n).ty));
        matches!(types.get(cell), Type::Struct { .. })
    }

    /// The erased signature of an invoke call's method, resolved against the
    /// receiver's interface declaration.
    #[must_use]
    pub fn erased_invoke_sig(&self, call: &CallExpr) -> Option<String> {
        let Callee::Invoke { recv, method } = &call.callee else {
            return None;
        };
        let types = &self.program.types;
        let iface = types.underlying(self.node(*recv).ty);
        let Type::Interface { methods } = types.get(iface) else {
            return None;
        };
        methods
            .iter()
            .find(|m| m.name == *method)
            .map(|m| types.erase_signature(&m.sig))
    }
}
