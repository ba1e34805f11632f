//! Error types for the analyzer.

use std::path::PathBuf;

/// Errors produced by configuration loading and analysis.
///
/// Configuration errors are fatal before analysis begins; structural errors
/// are logged per site by the engine and surface here only when the caller
/// asks for a failed resolution directly (e.g. [`crate::ssa::FuncView::field_name`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration document is invalid (bad option, contradictory predicates).
    #[error("config error: {0}")]
    Config(String),

    /// A configured pattern failed to compile.
    #[error("invalid regex `{pattern}`: {source}")]
    Regex {
        /// The offending pattern text.
        pattern: String,
        /// The underlying compile error.
        #[source]
        source: Box<regex::Error>,
    },

    /// A field access could not be resolved against a struct type.
    #[error("unresolved field: {0}")]
    UnresolvedField(String),

    /// Two analysis units published different summaries for the same function.
    #[error("summary conflict for `{0}`")]
    SummaryConflict(String),

    /// Analysis was cancelled cooperatively; no findings were produced.
    #[error("analysis cancelled")]
    Cancelled,

    /// A file could not be read.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An invariant the engine relies on was violated at run time.
    #[error("internal error: {0}")]
    Internal(String),

    /// An input document could not be parsed.
    #[error("failed to parse `{path}`: {message}")]
    Parse {
        /// The path that failed.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
