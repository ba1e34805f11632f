//! Core types for taint analysis.

use crate::ssa::{FuncId, NodeId, Pos, Program};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A small bit-set over parameter or result indices.
///
/// The lattice of summaries is finite because these sets are bounded by the
/// function's parameter and result counts; indices past 63 are ignored,
/// which only ever under-approximates pathological signatures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bits(u64);

impl Bits {
    /// The empty set.
    pub const EMPTY: Bits = Bits(0);

    /// Builds a set from indices.
    #[must_use]
    pub fn of(indices: &[usize]) -> Bits {
        let mut b = Bits::EMPTY;
        for &i in indices {
            b.set(i);
        }
        b
    }

    /// Inserts an index.
    pub fn set(&mut self, i: usize) {
        if i < 64 {
            self.0 |= 1 << i;
        }
    }

    /// Membership test.
    #[must_use]
    pub fn contains(self, i: usize) -> bool {
        i < 64 && self.0 & (1 << i) != 0
    }

    /// True when no index is set.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// In-place union.
    pub fn union(&mut self, other: Bits) {
        self.0 |= other.0;
    }

    /// True when the sets intersect.
    #[must_use]
    pub fn intersects(self, other: Bits) -> bool {
        self.0 & other.0 != 0
    }

    /// Iterates set indices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..64).filter(move |&i| self.contains(i))
    }
}

/// The computed taint behavior of one parameter-indexed function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericSummary {
    /// Parameter indices that reach a sink inside the function (transitively).
    pub sinks: Bits,
    /// For each parameter index, the result indices it taints.
    pub taints: Vec<Bits>,
    /// Positions of the sink calls reached, per parameter index. Carried so
    /// findings through wrappers point at the actual sink call.
    pub sites: BTreeSet<(u32, Pos)>,
}

impl GenericSummary {
    /// An all-bottom summary for a function with `params` parameters.
    #[must_use]
    pub fn bottom(params: usize) -> GenericSummary {
        GenericSummary {
            sinks: Bits::EMPTY,
            taints: vec![Bits::EMPTY; params],
            sites: BTreeSet::new(),
        }
    }
}

/// A function summary: the three specializations of §interprocedural facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    /// Every parameter reaches a sink; nothing is tainted.
    Sink,
    /// No parameter reaches a sink; nothing is tainted.
    Sanitizer,
    /// Computed parameter-to-sink and parameter-to-result facts.
    Generic(GenericSummary),
}

/// Canonical identity of a function across analysis units.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncKey {
    /// Declaring package path.
    pub package: CompactString,
    /// Receiver type name; empty for plain functions.
    pub receiver: CompactString,
    /// Function name.
    pub name: CompactString,
}

impl FuncKey {
    /// The key of a function in a program.
    #[must_use]
    pub fn of(program: &Program, id: FuncId) -> FuncKey {
        let f = program.func(id);
        FuncKey {
            package: f.package.clone(),
            receiver: f.receiver.clone().unwrap_or_default(),
            name: f.name.clone(),
        }
    }
}

impl std::fmt::Display for FuncKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.receiver.is_empty() {
            write!(f, "{}.{}", self.package, self.name)
        } else {
            write!(f, "{}.({}).{}", self.package, self.receiver, self.name)
        }
    }
}

/// A taint-propagation contract for an external function or interface method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalSummary {
    /// Input positions that must be tainted to trigger propagation; empty
    /// means "propagate from any tainted input". For invoke calls position 0
    /// is the receiver and arguments follow.
    pub if_tainted: Bits,
    /// Input positions whose storage becomes tainted by the call.
    pub tainted_args: Bits,
    /// Result indices that become tainted.
    pub tainted_rets: Bits,
}

/// An SSA value at which sensitive data enters a function.
#[derive(Debug, Clone)]
pub struct SourceValue {
    /// The source value.
    pub node: NodeId,
    /// The containing function.
    pub func: FuncId,
    /// Defining position, for reporting.
    pub pos: Pos,
    /// Short human description of where the taint comes from.
    pub description: CompactString,
}

/// A reported source-reaches-sink flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// File of the sink call.
    pub sink_file: String,
    /// Line of the sink call.
    pub sink_line: u32,
    /// Column of the sink call.
    pub sink_col: u32,
    /// File of the source.
    pub source_file: String,
    /// Line of the source.
    pub source_line: u32,
    /// Column of the source.
    pub source_col: u32,
    /// Human-readable message.
    pub message: String,
}

impl Finding {
    /// Builds a finding from resolved positions.
    #[must_use]
    pub fn new(program: &Program, sink: Pos, source: Pos) -> Finding {
        let source_file = program.file_name(source).to_owned();
        let message = format!(
            "a source has reached a sink, source: {}:{}:{}",
            source_file, source.line, source.col
        );
        Finding {
            sink_file: program.file_name(sink).to_owned(),
            sink_line: sink.line,
            sink_col: sink.col,
            source_file,
            source_line: source.line,
            source_col: source.col,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_ignores_out_of_range_indices() {
        let mut b = Bits::EMPTY;
        b.set(3);
        b.set(200);
        assert!(b.contains(3));
        assert!(!b.contains(200));
        assert_eq!(b.iter().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn bits_union_and_intersection() {
        let a = Bits::of(&[0, 2]);
        let b = Bits::of(&[2, 5]);
        assert!(a.intersects(b));
        let mut c = a;
        c.union(b);
        assert_eq!(c.iter().collect::<Vec<_>>(), vec![0, 2, 5]);
    }
}
