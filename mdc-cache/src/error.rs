//! Error types for mdc-cache
//!
//! Three independent failure families:
//! - [`FileAccessError`]: signature computation could not read the bytes it needs
//! - [`GenerationError`]: the external generator failed (never cached)
//! - [`DecisionError`]: a duplicate decision was rejected, abandoned or timed out

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Failure to read the bytes a content signature needs
///
/// Never retried internally; the caller decides whether to retry or abort.
#[derive(Debug, Error)]
pub enum FileAccessError {
    /// Source could not be opened
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Size of the source could not be determined
    #[error("Failed to read metadata for {name}: {source}")]
    Metadata {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A ranged read failed part way
    #[error("Failed to read {length} bytes at offset {offset} from {name}: {source}")]
    Read {
        name: String,
        offset: u64,
        length: u64,
        #[source]
        source: std::io::Error,
    },

    /// Requested range lies (partly) beyond the end of the source
    #[error("Range {offset}+{length} is outside {name} ({size} bytes)")]
    OutOfRange {
        name: String,
        offset: u64,
        length: u64,
        size: u64,
    },

    /// Background read task did not complete
    #[error("Read task for {name} failed: {reason}")]
    Task { name: String, reason: String },
}

/// Failure of the external generation capability
///
/// `Clone` so the identical error can be handed to every caller joined on the same
/// in-flight generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Generator reported a failure
    #[error("Generation failed: {0}")]
    Failed(String),

    /// External tool exited unsuccessfully
    #[error("{tool} exited with status {status}: {stderr}")]
    Tool {
        tool: String,
        status: i32,
        stderr: String,
    },

    /// Generator returned something unusable
    #[error("Invalid generator output: {0}")]
    InvalidOutput(String),

    /// Generator panicked
    #[error("Generator panicked: {0}")]
    Panicked(String),

    /// Generation task ended without publishing an outcome
    #[error("Generation task ended without a result")]
    Abandoned,

    /// Concurrency limiter was closed before a permit was granted
    #[error("Generation limiter closed")]
    LimiterClosed,
}

/// Failure of a duplicate decision round-trip
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    /// Batch mapping did not cover every presented item
    #[error("Decision mapping is missing {} item(s)", missing.len())]
    Incomplete { missing: Vec<Uuid> },

    /// Batch mapping named items that were never presented
    #[error("Decision mapping names {} unknown item(s)", unknown.len())]
    UnknownItems { unknown: Vec<Uuid> },

    /// Another decision of the same kind is already awaiting the UI
    #[error("A duplicate decision is already pending")]
    DecisionPending,

    /// Resolution attempted with nothing pending
    #[error("No duplicate decision is pending")]
    NoPendingDecision,

    /// Pending decision was dropped without being resolved
    #[error("Duplicate decision was abandoned")]
    Abandoned,

    /// Configured decision timeout elapsed
    #[error("Duplicate decision timed out after {waited_ms} ms")]
    TimedOut { waited_ms: u64 },
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    FileAccess(#[from] FileAccessError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Decision(#[from] DecisionError),

    /// mdc-common error
    #[error("Common error: {0}")]
    Common(#[from] mdc_common::Error),
}

/// Result type for mdc-cache operations
pub type Result<T> = std::result::Result<T, Error>;
