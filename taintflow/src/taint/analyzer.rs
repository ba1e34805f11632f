//! The analysis driver.
//!
//! Orchestrates the pipeline per analysis unit (package): call graph →
//! summary fixpoint → source identification → propagation → reporting.
//! Summaries are computed in package dependency order so callees precede
//! callers where the graph is acyclic, then propagation runs per package
//! under rayon with findings drained through a bounded channel. Summaries
//! publish into a shared map keyed by canonical function identity; the first
//! writer wins and an unequal re-publication is a conflict error.

use super::call_graph::CallGraph;
use super::externals::ExternalSummaries;
use super::reporter;
use super::sources;
use super::suppression::SuppressionMap;
use super::summaries::SummaryDatabase;
use super::types::{Finding, FuncKey, Summary};
use super::{propagation, types::SourceValue};
use crate::config::Matchers;
use crate::errors::{Error, Result};
use crate::ssa::{Callee, FuncId, FuncView, NodeKind, Program};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

/// Tunable analysis behavior.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Let the cross-function walk traverse operand chains through plain
    /// struct allocations. Off by default: co-located call arguments inside
    /// one allocation over-taint each other.
    pub traverse_struct_allocs: bool,
    /// Capacity of the bounded findings channel; producers block when the
    /// driver falls behind.
    pub findings_channel_bound: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            traverse_struct_allocs: false,
            findings_channel_bound: 256,
        }
    }
}

/// Cooperative cancellation token, checked between functions and between
/// fixpoint sweeps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Cross-run summary map, keyed by canonical function identity.
pub type SharedSummaries = DashMap<FuncKey, Summary>;

/// The taint analysis engine.
pub struct TaintAnalyzer {
    matchers: Matchers,
    externals: ExternalSummaries,
    options: AnalysisOptions,
    shared: Arc<SharedSummaries>,
}

impl TaintAnalyzer {
    /// An analyzer with default options and a fresh shared summary map.
    #[must_use]
    pub fn new(matchers: Matchers) -> TaintAnalyzer {
        TaintAnalyzer::with_options(matchers, AnalysisOptions::default())
    }

    /// An analyzer with explicit options.
    #[must_use]
    pub fn with_options(matchers: Matchers, options: AnalysisOptions) -> TaintAnalyzer {
        TaintAnalyzer {
            matchers,
            externals: ExternalSummaries::builtin(),
            options,
            shared: Arc::new(SharedSummaries::default()),
        }
    }

    /// The shared summary map, for reuse across programs.
    #[must_use]
    pub fn shared_summaries(&self) -> Arc<SharedSummaries> {
        Arc::clone(&self.shared)
    }

    /// Analyzes a whole program and returns its findings, sorted by sink
    /// position then source position.
    pub fn analyze_program(
        &self,
        program: &Program,
        suppression: &SuppressionMap,
        cancel: &CancelToken,
    ) -> Result<Vec<Finding>> {
        self.matchers.check_disjoint(&program.functions)?;

        let views = build_views(program);
        let db = self.compute_summaries(program, &views, cancel)?;
        self.collect_findings(program, &views, &db, suppression, cancel)
    }

    /// Phase 1: summaries per unit, units in dependency order.
    fn compute_summaries<'a>(
        &'a self,
        program: &'a Program,
        views: &FxHashMap<FuncId, FuncView<'a>>,
        cancel: &CancelToken,
    ) -> Result<SummaryDatabase<'a>> {
        let mut db = SummaryDatabase::new(program, &self.matchers, &self.options);
        for pi in package_order(program) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let pkg = &program.packages[pi];
            let unit: Vec<FuncId> = pkg
                .functions
                .iter()
                .copied()
                .filter(|&f| !program.func(f).is_external)
                .collect();

            let graph = CallGraph::build(program, &unit);
            let order = graph.analysis_order(&unit);
            db.compute_unit(&order, views, cancel)?;

            // Publish: the first writer wins; an equal re-publication is a
            // no-op, an unequal one is a conflict.
            for &fid in &unit {
                let Some(summary) = db.get(fid) else { continue };
                let key = FuncKey::of(program, fid);
                match self.shared.entry(key.clone()) {
                    MapEntry::Vacant(slot) => {
                        slot.insert(summary.clone());
                    }
                    MapEntry::Occupied(existing) => {
                        if existing.get() != summary {
                            return Err(Error::SummaryConflict(key.to_string()));
                        }
                    }
                }
            }
            log::debug!(
                "package {}: {} function summaries computed",
                pkg.path,
                unit.len()
            );
        }
        Ok(db)
    }

    /// Phase 2: per-package propagation and reporting under rayon, findings
    /// drained through a bounded channel.
    fn collect_findings(
        &self,
        program: &Program,
        views: &FxHashMap<FuncId, FuncView<'_>>,
        db: &SummaryDatabase<'_>,
        suppression: &SuppressionMap,
        cancel: &CancelToken,
    ) -> Result<Vec<Finding>> {
        let (tx, rx) = mpsc::sync_channel::<Finding>(self.options.findings_channel_bound);

        std::thread::scope(|scope| {
            let worker = scope.spawn(move || {
                program
                    .packages
                    .par_iter()
                    .try_for_each_with(tx, |tx, pkg| -> Result<()> {
                        if cancel.is_cancelled() {
                            return Err(Error::Cancelled);
                        }
                        for &fid in &pkg.functions {
                            if cancel.is_cancelled() {
                                return Err(Error::Cancelled);
                            }
                            self.analyze_function(program, views, db, suppression, fid, tx)?;
                        }
                        Ok(())
                    })
            });

            let mut findings: Vec<Finding> = rx.into_iter().collect();
            match worker.join() {
                Ok(Ok(())) => {
                    findings.sort_by(|a, b| {
                        (&a.sink_file, a.sink_line, a.sink_col, &a.source_file, a.source_line)
                            .cmp(&(&b.sink_file, b.sink_line, b.sink_col, &b.source_file, b.source_line))
                    });
                    Ok(findings)
                }
                Ok(Err(e)) => Err(e),
                Err(_) => Err(Error::Internal("analysis worker panicked".to_owned())),
            }
        })
    }

    fn analyze_function(
        &self,
        program: &Program,
        views: &FxHashMap<FuncId, FuncView<'_>>,
        db: &SummaryDatabase<'_>,
        suppression: &SuppressionMap,
        fid: FuncId,
        tx: &mpsc::SyncSender<Finding>,
    ) -> Result<()> {
        let func = program.func(fid);
        if func.is_external || self.matchers.is_excluded(func) {
            return Ok(());
        }
        let Some(view) = views.get(&fid) else {
            return Ok(());
        };
        let source_values: Vec<SourceValue> = sources::identify(view, &self.matchers);
        if source_values.is_empty() {
            return Ok(());
        }
        log::debug!(
            "{}: {} source value(s)",
            func.canonical_name(),
            source_values.len()
        );

        let mut seen = FxHashSet::default();
        let mut findings = Vec::new();
        for source in &source_values {
            let prop = propagation::propagate(view, source, &self.matchers, db, &self.externals);
            reporter::report(
                view,
                source,
                &prop,
                &self.matchers,
                suppression,
                &mut seen,
                &mut findings,
            );
        }
        for finding in findings {
            tx.send(finding)
                .map_err(|_| Error::Internal("findings channel closed".to_owned()))?;
        }
        Ok(())
    }
}

/// Builds views for every function with a body.
fn build_views(program: &Program) -> FxHashMap<FuncId, FuncView<'_>> {
    let mut views = FxHashMap::default();
    for (i, func) in program.functions.iter().enumerate() {
        if func.is_external || func.blocks.is_empty() {
            continue;
        }
        let fid = FuncId(u32::try_from(i).unwrap_or(u32::MAX));
        views.insert(fid, FuncView::new(program, fid));
    }
    views
}

/// Packages in dependency order: a package's static callees come first where
/// the package graph is acyclic; cycles fall back to enumeration order.
fn package_order(program: &Program) -> Vec<usize> {
    let mut func_pkg: FxHashMap<FuncId, usize> = FxHashMap::default();
    for (pi, pkg) in program.packages.iter().enumerate() {
        for &fid in &pkg.functions {
            func_pkg.insert(fid, pi);
        }
    }

    let mut deps: Vec<Vec<usize>> = vec![Vec::new(); program.packages.len()];
    for (pi, pkg) in program.packages.iter().enumerate() {
        let mut seen: FxHashSet<usize> = FxHashSet::default();
        for &fid in &pkg.functions {
            for node in &program.func(fid).nodes {
                let callee = match &node.kind {
                    NodeKind::Call(c) | NodeKind::Go(c) | NodeKind::Defer(c) => match c.callee {
                        Callee::Static(f) => Some(f),
                        _ => None,
                    },
                    NodeKind::MakeClosure { func, .. } => Some(*func),
                    _ => None,
                };
                if let Some(target) = callee.and_then(|f| func_pkg.get(&f)).copied() {
                    if target != pi && seen.insert(target) {
                        deps[pi].push(target);
                    }
                }
            }
        }
        deps[pi].sort_unstable();
    }

    let mut visited = vec![false; program.packages.len()];
    let mut order = Vec::with_capacity(program.packages.len());
    for pi in 0..program.packages.len() {
        post_order(pi, &deps, &mut visited, &mut order);
    }
    order
}

fn post_order(pi: usize, deps: &[Vec<usize>], visited: &mut [bool], order: &mut Vec<usize>) {
    if visited[pi] {
        return;
    }
    visited[pi] = true;
    for &d in &deps[pi] {
        post_order(d, deps, visited, order);
    }
    order.push(pi);
}
