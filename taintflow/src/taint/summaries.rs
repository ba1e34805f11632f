//! Cross-function summaries.
//!
//! For every analyzable function this computes which parameters reach a sink
//! and which result indices each parameter taints, by a depth-first walk of
//! the def–use graph from each parameter. Mutually recursive functions
//! converge through a monotone fixpoint: a callee without a summary yet
//! contributes bottom (no sinks, no taints) and the sweep repeats until no
//! summary changes.

use super::analyzer::{AnalysisOptions, CancelToken};
use super::propagation::propagates_value;
use super::types::{Bits, GenericSummary, Summary};
use crate::config::Matchers;
use crate::errors::{Error, Result};
use crate::ssa::{CallExpr, FuncId, FuncView, NodeId, NodeKind, Pos, Program};
use rustc_hash::{FxHashMap, FxHashSet};

/// Database of function summaries, filled unit by unit.
pub struct SummaryDatabase<'a> {
    program: &'a Program,
    matchers: &'a Matchers,
    options: &'a AnalysisOptions,
    summaries: FxHashMap<FuncId, Summary>,
}

struct ParamFacts {
    reaches_sink: bool,
    rets: Bits,
    sites: Vec<Pos>,
}

impl<'a> SummaryDatabase<'a> {
    /// An empty database over a program.
    #[must_use]
    pub fn new(
        program: &'a Program,
        matchers: &'a Matchers,
        options: &'a AnalysisOptions,
    ) -> SummaryDatabase<'a> {
        SummaryDatabase {
            program,
            matchers,
            options,
            summaries: FxHashMap::default(),
        }
    }

    /// The frozen summary of a function, if computed.
    #[must_use]
    pub fn get(&self, fid: FuncId) -> Option<&Summary> {
        self.summaries.get(&fid)
    }

    /// Runs the fixpoint over one unit's functions in the given analysis
    /// order. Cancellation is checked between sweeps.
    pub fn compute_unit(
        &mut self,
        order: &[FuncId],
        views: &FxHashMap<FuncId, FuncView<'a>>,
        cancel: &CancelToken,
    ) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let mut changed = false;
            for &fid in order {
                let func = self.program.func(fid);
                if func.is_external || self.matchers.is_excluded(func) {
                    continue;
                }
                let summary = if self.matchers.is_sink(func) {
                    Summary::Sink
                } else if self.matchers.is_sanitizer(func) {
                    Summary::Sanitizer
                } else {
                    let Some(view) = views.get(&fid) else { continue };
                    Summary::Generic(self.summarize(view))
                };
                if self.summaries.get(&fid) != Some(&summary) {
                    self.summaries.insert(fid, summary);
                    changed = true;
                }
            }
            if !changed {
                return Ok(());
            }
        }
    }

    fn summarize(&self, view: &FuncView<'_>) -> GenericSummary {
        let mut g = GenericSummary::bottom(view.func.params.len());
        for (p, &pnode) in view.func.params.iter().enumerate() {
            let facts = self.walk_param(view, pnode);
            if facts.reaches_sink {
                g.sinks.set(p);
            }
            if let Some(slot) = g.taints.get_mut(p) {
                *slot = facts.rets;
            }
            for pos in facts.sites {
                g.sites.insert((u32::try_from(p).unwrap_or(u32::MAX), pos));
            }
        }
        g
    }

    /// Depth-first reachability from one parameter over the def–use graph.
    fn walk_param(&self, view: &FuncView<'_>, start: NodeId) -> ParamFacts {
        let mut facts = ParamFacts {
            reaches_sink: false,
            rets: Bits::EMPTY,
            sites: Vec::new(),
        };
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        let mut stack = vec![start];
        while let Some(v) = stack.pop() {
            if !visited.insert(v) {
                continue;
            }
            for &u in view.referrers(v) {
                match &view.node(u).kind {
                    // The return is a boundary; record which result indices
                    // the walked value occupies and stop.
                    NodeKind::Return { results } => {
                        for (i, &r) in results.iter().enumerate() {
                            if r == v {
                                facts.rets.set(i);
                            }
                        }
                    }
                    NodeKind::Call(call) | NodeKind::Go(call) | NodeKind::Defer(call) => {
                        self.walk_call(view, u, call, &visited, &mut stack, &mut facts);
                    }
                    NodeKind::Store { addr, value } => {
                        if *value == v {
                            if let Some(root) =
                                view.alloc_root(*addr, self.options.traverse_struct_allocs)
                            {
                                stack.push(root);
                            }
                        }
                    }
                    _ => {
                        if propagates_value(view, u, v) {
                            stack.push(u);
                        }
                    }
                }
            }
        }
        facts
    }

    fn walk_call(
        &self,
        view: &FuncView<'_>,
        call_node: NodeId,
        call: &CallExpr,
        visited: &FxHashSet<NodeId>,
        stack: &mut Vec<NodeId>,
        facts: &mut ParamFacts,
    ) {
        let visited_arg = |args: &[NodeId]| args.iter().any(|a| visited.contains(a));

        if let Some(fid2) = view.static_callee(call) {
            let f2 = self.program.func(fid2);
            if self.matchers.is_sanitizer(f2) {
                return;
            }
            if self.matchers.is_sink(f2) {
                if visited_arg(&call.args) {
                    facts.reaches_sink = true;
                    facts.sites.push(view.pos(call_node));
                }
                return;
            }
            if !f2.is_external && !self.matchers.is_excluded(f2) {
                match self.summaries.get(&fid2) {
                    Some(Summary::Sanitizer) => return,
                    Some(Summary::Sink) => {
                        if visited_arg(&call.args) {
                            facts.reaches_sink = true;
                            facts.sites.push(view.pos(call_node));
                        }
                        return;
                    }
                    Some(Summary::Generic(g)) => {
                        let mut candidates = Bits::EMPTY;
                        for (i, a) in call.args.iter().enumerate() {
                            if !visited.contains(a) {
                                continue;
                            }
                            if g.sinks.contains(i) {
                                facts.reaches_sink = true;
                                for &(p, pos) in &g.sites {
                                    if p as usize == i {
                                        facts.sites.push(pos);
                                    }
                                }
                            }
                            if let Some(&t) = g.taints.get(i) {
                                candidates.union(t);
                            }
                        }
                        let results = view.result_count(call_node);
                        if results == 0 || candidates.is_empty() {
                            return;
                        }
                        if results == 1 {
                            stack.push(call_node);
                            return;
                        }
                        for (idx, ext) in view.extracts(call_node) {
                            if candidates.contains(idx as usize) {
                                stack.push(ext);
                            }
                        }
                        return;
                    }
                    // In-progress cycle: bottom summary, nothing flows yet.
                    // A later sweep sees the computed summary.
                    None => return,
                }
            }
        }
        // Unknown callee (dynamic, invoke, external or excluded): continue
        // through the call's referrers without crossing its operands.
        stack.push(call_node);
    }
}
