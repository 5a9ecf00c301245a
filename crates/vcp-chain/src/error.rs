//! Error types for chain production and file-level verification.

use std::path::PathBuf;

use thiserror::Error;
use vcp_chain_anchor::AnchorError;
use vcp_chain_core::CoreError;

/// Errors that can occur while producing or loading a chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Core error (canonicalization, malformed input, bad key material).
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Anchoring error.
    #[error("anchor error: {0}")]
    Anchor(#[from] AnchorError),

    /// File could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Appended event is older than the chain head.
    #[error("timestamp regression: {got} is before chain head {previous}")]
    TimestampRegression { previous: i64, got: i64 },

    /// `close_batch` called with no unbatched events.
    #[error("no open batch: every event is already sealed")]
    NoOpenBatch,

    /// Event is not part of any sealed batch.
    #[error("event {0} is not in a sealed batch")]
    NotBatched(usize),

    /// Anchor record attests a root no sealed batch has.
    #[error("no sealed batch has Merkle root {0}")]
    UnknownAnchorRoot(String),

    /// A background anchoring task died.
    #[error("anchor task failed: {0}")]
    AnchorTask(String),
}

impl ChainError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;
