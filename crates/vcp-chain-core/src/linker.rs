//! ChainLinker: the producer-side PrevHash cursor.
//!
//! Owned by exactly one producer session and passed by `&mut` to each
//! append, so independent chains never share state. The linker only builds
//! correct-by-construction links; checking them is the verifier's job.

use crate::crypto::{Digest, GENESIS_HASH};

/// Tracks the last EventHash of a chain under construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainLinker {
    last_hash: Option<Digest>,
    linked: u64,
}

impl ChainLinker {
    /// A fresh linker: the next event is the genesis event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue an existing chain whose last EventHash is `last_hash`.
    pub fn resume(last_hash: Digest, linked: u64) -> Self {
        Self {
            last_hash: Some(last_hash),
            linked,
        }
    }

    /// PrevHash for the next event: the genesis sentinel, or the last hash.
    pub fn next_prev_hash(&self) -> String {
        match &self.last_hash {
            Some(hash) => hash.to_hex(),
            None => GENESIS_HASH.to_string(),
        }
    }

    /// Advance the cursor after an event has been hashed.
    pub fn record(&mut self, event_hash: Digest) {
        self.last_hash = Some(event_hash);
        self.linked += 1;
    }

    /// The last recorded EventHash.
    pub fn last_hash(&self) -> Option<&Digest> {
        self.last_hash.as_ref()
    }

    /// Number of events linked so far.
    pub fn linked(&self) -> u64 {
        self.linked
    }

    pub fn is_genesis(&self) -> bool {
        self.last_hash.is_none()
    }
}
