//! Taint source identification.
//!
//! Scans one function for the values at which sensitive data enters:
//! parameters and closure captures of source type, locally produced values
//! whose type is a source, and calls to configured propagators.

use super::types::SourceValue;
use crate::config::{Matchers, PropagatorKind};
use crate::ssa::{FuncView, NodeId, NodeKind, TypeId};
use compact_str::CompactString;
use rustc_hash::FxHashSet;

/// Enumerates the source values of a function, deduplicated by value.
#[must_use]
pub fn identify(view: &FuncView<'_>, matchers: &Matchers) -> Vec<SourceValue> {
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut out = Vec::new();

    let mut add = |node: NodeId, description: &str, out: &mut Vec<SourceValue>| {
        if seen.insert(node) {
            out.push(SourceValue {
                node,
                func: view.id,
                pos: view.pos(node),
                description: CompactString::from(description),
            });
        }
    };

    let types = &view.program.types;

    // Parameters: pointer params are checked through the pointee; interface
    // params are never sources by themselves.
    for &p in &view.func.params {
        let ty = view.node(p).ty;
        if types.is_interface(ty) {
            continue;
        }
        if matchers.is_source_type(types, types.deref(ty)) {
            add(p, "parameter", &mut out);
        }
    }

    // Free variables carry one implicit pointer indirection.
    for &fv in &view.func.free_vars {
        let ty = types.deref(view.node(fv).ty);
        if !types.is_interface(ty) && matchers.is_source_type(types, ty) {
            add(fv, "captured variable", &mut out);
        }
    }

    // Globals are address-valued; check the pointee.
    for (i, node) in view.func.nodes.iter().enumerate() {
        if matches!(node.kind, NodeKind::Global { .. })
            && matchers.is_source_type(types, types.deref(node.ty))
        {
            add(NodeId(u32::try_from(i).unwrap_or(u32::MAX)), "global", &mut out);
        }
    }

    // Block scan, skipping the recovery block.
    for (bi, block) in view.func.blocks.iter().enumerate() {
        if view
            .func
            .recover_block
            .is_some_and(|r| r.0 as usize == bi)
        {
            continue;
        }
        for &instr in &block.instrs {
            scan_instr(view, matchers, instr, &mut |n, d| add(n, d, &mut out));
        }
    }

    out
}

/// A struct literal holding a source-typed field is itself a source.
fn struct_has_source_typed_field(view: &FuncView<'_>, matchers: &Matchers, cell: TypeId) -> bool {
    let types = &view.program.types;
    match types.get(types.underlying(cell)) {
        crate::ssa::Type::Struct { fields } => fields
            .iter()
            .any(|f| matchers.is_source_type(types, f.ty)),
        _ => false,
    }
}

fn scan_instr(
    view: &FuncView<'_>,
    matchers: &Matchers,
    instr: NodeId,
    add: &mut dyn FnMut(NodeId, &str),
) {
    let types = &view.program.types;
    let node = view.node(instr);
    let source_typed = |ty: TypeId| matchers.is_source_type(types, types.deref(ty));

    match &node.kind {
        NodeKind::Alloc { .. } => {
            let cell = types.deref(node.ty);
            if matchers.is_source_type(types, cell)
                || matchers.struct_has_source_field(types, cell)
                || struct_has_source_typed_field(view, matchers, cell)
            {
                add(instr, "allocation");
            }
        }
        NodeKind::FieldAddr { .. } | NodeKind::Field { .. } => {
            if let Err(e) = view.field_name(instr) {
                // Structural inconsistency: log and skip this site.
                log::warn!("{}: {e}", view.func.canonical_name());
                return;
            }
            if source_typed(node.ty) {
                add(instr, "field read");
            } else if let Some((owner, field)) = view.field_owner(instr) {
                if matchers.is_source_field(types, owner, field as usize) {
                    add(instr, "tagged field");
                }
            }
        }
        NodeKind::IndexAddr { .. } | NodeKind::Index { .. } => {
            if source_typed(node.ty) {
                add(instr, "element read");
            }
        }
        NodeKind::Extract { .. } => {
            if source_typed(node.ty) {
                add(instr, "extracted result");
            }
        }
        NodeKind::Recv { .. } => {
            if source_typed(node.ty) {
                add(instr, "channel receive");
            }
        }
        NodeKind::Lookup { .. } => {
            if source_typed(node.ty) {
                add(instr, "map lookup");
            }
        }
        NodeKind::Call(call) => {
            let Some(callee) = view.static_callee(call) else {
                return;
            };
            let callee_fn = view.program.func(callee);
            match matchers.propagator_kind(callee_fn) {
                Some(PropagatorKind::TaintsResult) => add(instr, "propagator result"),
                Some(PropagatorKind::TaintsFirstArg) => {
                    if let Some(&writer) = call.args.first() {
                        add(writer, "propagator writer argument");
                    }
                }
                None => {}
            }
        }
        _ => {}
    }
}
