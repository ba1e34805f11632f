//! Static call graph over SSA functions.
//!
//! Drives the summary fixpoint in callees-before-callers order so acyclic
//! call chains converge in one sweep; cycles are handled by the fixpoint.

use crate::ssa::{FuncId, NodeKind, Program};
use rustc_hash::{FxHashMap, FxHashSet};

/// Call edges between a set of functions.
#[derive(Debug, Default)]
pub struct CallGraph {
    /// Static callees per function.
    pub calls: FxHashMap<FuncId, FxHashSet<FuncId>>,
}

impl CallGraph {
    /// Builds the graph over the given functions, following static call
    /// edges and closure construction.
    #[must_use]
    pub fn build(program: &Program, funcs: &[FuncId]) -> CallGraph {
        let mut graph = CallGraph::default();
        for &fid in funcs {
            let entry = graph.calls.entry(fid).or_default();
            for node in &program.func(fid).nodes {
                match &node.kind {
                    NodeKind::Call(call) | NodeKind::Go(call) | NodeKind::Defer(call) => {
                        if let crate::ssa::Callee::Static(callee) = call.callee {
                            entry.insert(callee);
                        }
                    }
                    NodeKind::MakeClosure { func, .. } => {
                        entry.insert(*func);
                    }
                    _ => {}
                }
            }
        }
        graph
    }

    /// Analysis order: DFS post-order restricted to the graph's functions,
    /// so callees come before callers where the graph is acyclic. The order
    /// is deterministic given the function enumeration.
    #[must_use]
    pub fn analysis_order(&self, funcs: &[FuncId]) -> Vec<FuncId> {
        let mut visited: FxHashSet<FuncId> = FxHashSet::default();
        let mut order = Vec::with_capacity(funcs.len());
        for &f in funcs {
            self.post_order(f, &mut visited, &mut order);
        }
        order.retain(|f| self.calls.contains_key(f));
        order
    }

    fn post_order(&self, f: FuncId, visited: &mut FxHashSet<FuncId>, order: &mut Vec<FuncId>) {
        if !visited.insert(f) {
            return;
        }
        if let Some(callees) = self.calls.get(&f) {
            let mut sorted: Vec<FuncId> = callees.iter().copied().collect();
            sorted.sort_unstable();
            for callee in sorted {
                self.post_order(callee, visited, order);
            }
        }
        order.push(f);
    }
}
