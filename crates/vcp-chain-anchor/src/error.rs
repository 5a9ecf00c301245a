//! Error types for anchor binding.

use std::time::Duration;

use thiserror::Error;
use vcp_chain_core::{AnchorRecord, CoreError};

/// Errors that can occur while anchoring a Merkle root.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// Service unreachable. Transient, retried.
    #[error("anchor service unavailable: {0}")]
    Unavailable(String),

    /// No answer within the request timeout. Transient, retried.
    #[error("anchor request timed out after {0:?}")]
    Timeout(Duration),

    /// Service refused the submission. Not retried.
    #[error("anchor rejected by service: {0}")]
    Rejected(String),

    /// Retry budget spent. Carries the local PENDING record so the caller can
    /// persist it and escalate.
    #[error("anchor retry budget exhausted after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: String,
        pending: Box<AnchorRecord>,
    },

    /// Core operation failed.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl AnchorError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }

    /// The PENDING record, if this error carries one.
    pub fn into_pending(self) -> Option<AnchorRecord> {
        match self {
            Self::Exhausted { pending, .. } => Some(*pending),
            _ => None,
        }
    }
}

/// Result type for anchor operations.
pub type Result<T> = std::result::Result<T, AnchorError>;
