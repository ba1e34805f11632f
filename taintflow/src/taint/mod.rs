//! Taint Analysis Module
//!
//! Tracks sensitive data from configured sources to configured sinks over an
//! SSA program, honoring sanitizers under dominance.
//!
//! # Pipeline
//! - **Summaries**: per-function parameter-to-sink / parameter-to-result
//!   facts, fixpointed across each analysis unit
//! - **Sources**: where sensitive values enter a function
//! - **Propagation**: the per-source forward dataflow
//! - **Reporting**: findings at sink calls, gated by suppression

/// The analysis driver and its options.
pub mod analyzer;
/// Static call graph used to order summary computation.
pub mod call_graph;
/// Contracts for external (unanalyzed) functions.
pub mod externals;
/// Intra-function taint propagation.
pub mod propagation;
/// Finding emission and deduplication.
pub mod reporter;
/// Taint source identification.
pub mod sources;
/// Comment-driven finding suppression.
pub mod suppression;
/// Cross-function summary computation.
pub mod summaries;
/// Common types used throughout taint analysis.
pub mod types;

pub use analyzer::{AnalysisOptions, CancelToken, SharedSummaries, TaintAnalyzer};
pub use suppression::SuppressionMap;
pub use types::{Bits, ExternalSummary, Finding, FuncKey, GenericSummary, SourceValue, Summary};
