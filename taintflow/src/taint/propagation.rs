//! Intra-function taint propagation.
//!
//! Given one source value, compute the set of tainted SSA values by a
//! forward worklist over referrer edges. Calls dispatch through function
//! summaries, then the external table, then a conservative default.
//! Sanitizer calls consuming tainted values are recorded for the reporter's
//! dominance check; sink calls are left untouched for the reporter.

use super::externals::ExternalSummaries;
use super::summaries::SummaryDatabase;
use super::types::{Bits, ExternalSummary, SourceValue, Summary};
use crate::config::Matchers;
use crate::ssa::{BlockId, CallExpr, FuncView, NodeId, NodeKind, Pos, UnOpKind};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// The outcome of propagating one source through one function.
#[derive(Debug, Default)]
pub struct Propagation {
    /// Every value the source taints, including the source itself.
    pub tainted: FxHashSet<NodeId>,
    /// Sanitizer calls that consumed a tainted value; a finding is dropped
    /// when one of these dominates the sink.
    pub sanitizers: Vec<NodeId>,
    /// Sinks reached inside callees, discovered through summaries: the call
    /// site in this function plus the position of the sink call itself.
    pub summary_sinks: Vec<SummarySink>,
}

/// A sink reached through a callee's summary.
#[derive(Debug, Clone, Copy)]
pub struct SummarySink {
    /// The call in the analyzed function whose callee reaches the sink.
    pub call: NodeId,
    /// Position of the sink call inside the callee (transitively).
    pub site: Pos,
}

/// Propagates taint from one source value.
#[must_use]
pub fn propagate(
    view: &FuncView<'_>,
    source: &SourceValue,
    matchers: &Matchers,
    summaries: &SummaryDatabase<'_>,
    externals: &ExternalSummaries,
) -> Propagation {
    let mut state = Propagation::default();
    // Highest instruction index taint has reached, per block. Uses below the
    // mark in the same block would run before the taint exists, so they are
    // skipped unless the block sits on a loop.
    let mut marks: FxHashMap<BlockId, u32> = FxHashMap::default();
    let mut stack = vec![source.node];

    while let Some(v) = stack.pop() {
        if !state.tainted.insert(v) {
            continue;
        }
        if let Some((b, i)) = view.location(v) {
            bump_mark(&mut marks, b, i);
        }
        for &u in view.referrers(v) {
            if skip_backwards(view, &marks, u) {
                continue;
            }
            match &view.node(u).kind {
                NodeKind::Store { addr, value } => {
                    if *value == v {
                        if let Some((b, i)) = view.location(u) {
                            bump_mark(&mut marks, b, i);
                        }
                        if let Some(root) = view.alloc_root(*addr, true) {
                            stack.push(root);
                        }
                    }
                }
                NodeKind::Send { chan, value } => {
                    if *value == v {
                        if let Some(root) = view.alloc_root(*chan, true) {
                            stack.push(root);
                        }
                    }
                }
                NodeKind::MapUpdate { map, value, .. } => {
                    if *value == v {
                        if let Some(root) = view.alloc_root(*map, true) {
                            stack.push(root);
                        }
                    }
                }
                NodeKind::Call(call) | NodeKind::Go(call) | NodeKind::Defer(call) => {
                    handle_call(view, u, call, matchers, summaries, externals, &mut state, &mut stack);
                }
                // The return itself is a boundary.
                NodeKind::Return { .. } => {}
                _ => {
                    if propagates_value(view, u, v) {
                        stack.push(u);
                    }
                }
            }
        }
    }

    state
}

fn bump_mark(marks: &mut FxHashMap<BlockId, u32>, b: BlockId, i: u32) {
    let m = marks.entry(b).or_insert(0);
    if i > *m {
        *m = i;
    }
}

fn skip_backwards(view: &FuncView<'_>, marks: &FxHashMap<BlockId, u32>, u: NodeId) -> bool {
    let Some((b, i)) = view.location(u) else {
        return false;
    };
    marks.get(&b).is_some_and(|&m| i < m) && !view.block_in_cycle(b)
}

/// Whether instruction `u` passes taint from operand `from` into its own
/// value. Booleans and integers that carry no payload (comparison results,
/// `len`/`cap`, the `ok` of two-result forms) do not inherit taint; element
/// reads inherit only from the container, not from the index.
pub(crate) fn propagates_value(view: &FuncView<'_>, u: NodeId, from: NodeId) -> bool {
    match &view.node(u).kind {
        NodeKind::Extract { tuple, index } => !extract_is_payload_free(view, *tuple, *index),
        NodeKind::UnOp { op, .. } => !matches!(op, UnOpKind::Len | UnOpKind::Cap),
        NodeKind::BinOp { op, .. } => !op.is_comparison(),
        NodeKind::IndexAddr { base, .. } | NodeKind::Index { base, .. } => *base == from,
        NodeKind::Lookup { x, .. } | NodeKind::Slice { x, .. } => *x == from,
        NodeKind::MakeSlice { .. } => false,
        NodeKind::FieldAddr { .. }
        | NodeKind::Field { .. }
        | NodeKind::Load { .. }
        | NodeKind::Phi { .. }
        | NodeKind::Convert { .. }
        | NodeKind::MakeInterface { .. }
        | NodeKind::TypeAssert { .. }
        | NodeKind::Range { .. }
        | NodeKind::Next { .. }
        | NodeKind::Recv { .. }
        | NodeKind::MakeClosure { .. } => true,
        _ => false,
    }
}

fn extract_is_payload_free(view: &FuncView<'_>, tuple: NodeId, index: u32) -> bool {
    match &view.node(tuple).kind {
        NodeKind::TypeAssert { comma_ok: true, .. } | NodeKind::Lookup { comma_ok: true, .. } => {
            index == 1
        }
        NodeKind::Next { .. } => index == 0,
        _ => false,
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_call(
    view: &FuncView<'_>,
    call_node: NodeId,
    call: &CallExpr,
    matchers: &Matchers,
    summaries: &SummaryDatabase<'_>,
    externals: &ExternalSummaries,
    state: &mut Propagation,
    stack: &mut Vec<NodeId>,
) {
    if let Some(fid2) = view.static_callee(call) {
        let f2 = view.program.func(fid2);
        if matchers.is_sanitizer(f2) {
            record_sanitizer(state, call_node);
            return;
        }
        if matchers.is_sink(f2) {
            // The reporter inspects sink calls; their value stays clean.
            return;
        }
        if let Some(summary) = summaries.get(fid2) {
            match summary {
                Summary::Sanitizer => {
                    record_sanitizer(state, call_node);
                    return;
                }
                Summary::Sink => return,
                Summary::Generic(g) => {
                    let mut candidates = Bits::EMPTY;
                    for (i, a) in call.args.iter().enumerate() {
                        if !state.tainted.contains(a) {
                            continue;
                        }
                        if g.sinks.contains(i) {
                            for &(p, pos) in &g.sites {
                                if p as usize == i {
                                    state
                                        .summary_sinks
                                        .push(SummarySink { call: call_node, site: pos });
                                }
                            }
                        }
                        if let Some(&t) = g.taints.get(i) {
                            candidates.union(t);
                        }
                    }
                    taint_results(view, call_node, candidates, stack);
                    return;
                }
            }
        }
        if !f2.is_external {
            // Excluded or not summarized: conservative unknown.
            unknown_default(view, call_node, call, state, stack);
            return;
        }
        if let Some(entry) = externals.lookup_static(&f2.canonical_name()) {
            apply_external(view, call_node, call, &entry, state, stack);
            return;
        }
        unknown_default(view, call_node, call, state, stack);
        return;
    }

    if call.is_invoke() {
        if let (Some(method), Some(sig)) = (call.method_name(), view.erased_invoke_sig(call)) {
            if let Some(entry) = externals.lookup_invoke(method, &sig) {
                apply_external(view, call_node, call, &entry, state, stack);
                return;
            }
        }
    }
    unknown_default(view, call_node, call, state, stack);
}

fn record_sanitizer(state: &mut Propagation, call_node: NodeId) {
    if !state.sanitizers.contains(&call_node) {
        state.sanitizers.push(call_node);
    }
}

/// The call's inputs in contract order: the receiver occupies position 0 for
/// invoke calls, arguments follow; static calls number arguments from 0.
fn call_inputs(call: &CallExpr) -> SmallVec<[NodeId; 6]> {
    let mut inputs = SmallVec::new();
    if let crate::ssa::Callee::Invoke { recv, .. } = &call.callee {
        inputs.push(*recv);
    }
    inputs.extend(call.args.iter().copied());
    inputs
}

fn tainted_input_positions(
    view: &FuncView<'_>,
    call: &CallExpr,
    inputs: &[NodeId],
    tainted: &FxHashSet<NodeId>,
) -> Bits {
    let mut positions = Bits::EMPTY;
    for (i, a) in inputs.iter().enumerate() {
        if tainted.contains(a) {
            positions.set(i);
        }
    }
    // Variadic flattening: taint on any element taints the position.
    if let Some(elems) = view.variadic_elements(call) {
        if elems.iter().any(|e| tainted.contains(e)) && !inputs.is_empty() {
            positions.set(inputs.len() - 1);
        }
    }
    positions
}

fn apply_external(
    view: &FuncView<'_>,
    call_node: NodeId,
    call: &CallExpr,
    entry: &ExternalSummary,
    state: &mut Propagation,
    stack: &mut Vec<NodeId>,
) {
    let inputs = call_inputs(call);
    let positions = tainted_input_positions(view, call, &inputs, &state.tainted);
    if positions.is_empty() {
        return;
    }
    if !entry.if_tainted.is_empty() && !entry.if_tainted.intersects(positions) {
        return;
    }
    for i in entry.tainted_args.iter() {
        if let Some(&a) = inputs.get(i) {
            if let Some(root) = view.alloc_root(a, true) {
                stack.push(root);
            }
        }
    }
    taint_results(view, call_node, entry.tainted_rets, stack);
}

/// Conservative treatment of a call with no summary and no contract: every
/// result and the storage of every reference-like input become tainted.
fn unknown_default(
    view: &FuncView<'_>,
    call_node: NodeId,
    call: &CallExpr,
    state: &mut Propagation,
    stack: &mut Vec<NodeId>,
) {
    let inputs = call_inputs(call);
    let positions = tainted_input_positions(view, call, &inputs, &state.tainted);
    if positions.is_empty() {
        return;
    }
    let types = &view.program.types;
    for &a in &inputs {
        if types.is_reference_like(view.node(a).ty) {
            if let Some(root) = view.alloc_root(a, true) {
                stack.push(root);
            }
        }
    }
    let results = view.result_count(call_node);
    if results > 0 {
        stack.push(call_node);
    }
}

fn taint_results(view: &FuncView<'_>, call_node: NodeId, rets: Bits, stack: &mut Vec<NodeId>) {
    if rets.is_empty() {
        return;
    }
    let results = view.result_count(call_node);
    if results == 0 {
        return;
    }
    if results == 1 {
        if rets.contains(0) {
            stack.push(call_node);
        }
        return;
    }
    for (idx, ext) in view.extracts(call_node) {
        if rets.contains(idx as usize) {
            stack.push(ext);
        }
    }
}
