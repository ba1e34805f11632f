//! Finding emission.
//!
//! Inspects every sink call of a function against one source's propagation
//! result: a tainted argument produces a finding unless a recorded sanitizer
//! dominates the sink or the sink's line is suppressed. Findings deduplicate
//! by `(sink position, source value)`.

use super::propagation::Propagation;
use super::suppression::SuppressionMap;
use super::types::{Finding, SourceValue};
use crate::config::Matchers;
use crate::ssa::{CallExpr, FuncView, NodeId, Pos};
use rustc_hash::FxHashSet;

/// Emits findings for one source into `findings`, deduplicating through
/// `seen` (shared across the function's sources).
pub fn report(
    view: &FuncView<'_>,
    source: &SourceValue,
    prop: &Propagation,
    matchers: &Matchers,
    suppression: &SuppressionMap,
    seen: &mut FxHashSet<(Pos, NodeId)>,
    findings: &mut Vec<Finding>,
) {
    for &b in view.dom().preorder() {
        for &instr in &view.func.blocks[b.0 as usize].instrs {
            let node = view.node(instr);
            let Some(call) = node.kind.as_call() else {
                continue;
            };
            let Some(callee) = view.static_callee(call) else {
                continue;
            };
            let callee_fn = view.program.func(callee);
            if !matchers.is_sink(callee_fn) {
                continue;
            }
            if !sink_receives_taint(view, call, prop, callee_fn.sig.variadic) {
                continue;
            }
            emit(view, instr, node.pos, source, prop, suppression, seen, findings);
        }
    }

    // Sinks reached inside callees, surfaced through summaries.
    for s in &prop.summary_sinks {
        emit(view, s.call, s.site, source, prop, suppression, seen, findings);
    }
}

fn sink_receives_taint(
    view: &FuncView<'_>,
    call: &CallExpr,
    prop: &Propagation,
    variadic: bool,
) -> bool {
    if call.args.iter().any(|a| prop.tainted.contains(a)) {
        return true;
    }
    // A variadic sink takes every element of its synthetic slice.
    if variadic {
        if let Some(elems) = view.variadic_elements(call) {
            return elems.iter().any(|e| prop.tainted.contains(e));
        }
    }
    false
}

#[allow(clippy::too_many_arguments)]
fn emit(
    view: &FuncView<'_>,
    sink_call: NodeId,
    sink_pos: Pos,
    source: &SourceValue,
    prop: &Propagation,
    suppression: &SuppressionMap,
    seen: &mut FxHashSet<(Pos, NodeId)>,
    findings: &mut Vec<Finding>,
) {
    if suppression.is_suppressed(sink_pos) {
        return;
    }
    // Sanitized when a recorded sanitizer call executes before the sink on
    // every path: its block dominates the sink's block (same block: earlier).
    if prop
        .sanitizers
        .iter()
        .any(|&s| view.executes_before(s, sink_call))
    {
        return;
    }
    if !seen.insert((sink_pos, source.node)) {
        return;
    }
    findings.push(Finding::new(view.program, sink_pos, source.pos));
}
