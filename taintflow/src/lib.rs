//! Core library for the taintflow static taint analyzer.
//!
//! taintflow reads a configuration declaring source types, sink functions,
//! sanitizers and propagators, consumes a program lowered to SSA by an
//! external front end, and reports every call at which a value originating
//! from a source reaches a sink argument without first flowing through a
//! sanitizer.

// Allow common complexity warnings - these are intentional design choices
#![allow(clippy::similar_names, clippy::items_after_statements)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Module defining the command-line interface arguments.
pub mod cli;

/// Module for loading and compiling the analysis configuration.
pub mod config;

/// Module defining the crate's error type.
pub mod errors;

/// Module for rich CLI output formatting with colored text and tables.
pub mod output;

/// Module containing the SSA program model and its read-only views.
pub mod ssa;

/// Module for taint analysis (data flow from sources to sinks).
pub mod taint;

/// Module containing test utilities.
/// This helps in writing tests for the engine without a front end.
pub mod test_utils;

pub use config::{ConfigDoc, Matchers};
pub use errors::{Error, Result};
pub use taint::{CancelToken, Finding, SuppressionMap, TaintAnalyzer};
