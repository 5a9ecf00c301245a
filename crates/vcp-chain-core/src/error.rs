//! Error types for the VCP chain core.

use thiserror::Error;

/// Fatal errors raised while building or checking a chain.
///
/// Integrity findings (a hash that does not match, a broken link) are not
/// errors: the verifier records them as [`crate::report::Violation`]s and keeps
/// scanning. A `CoreError` means the input could not be processed at all.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    #[error("empty batch: a Merkle tree needs at least one leaf")]
    EmptyBatch,

    #[error("invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    #[error("invalid digest length: expected 32 bytes, got {0}")]
    InvalidDigestLength(usize),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("malformed event at line {line}: {reason}")]
    MalformedEvent { line: usize, reason: String },

    #[error("leaf index {index} out of range for {leaf_count} leaves")]
    LeafIndexOutOfRange { index: usize, leaf_count: usize },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
