//! Anchor service abstraction.
//!
//! An anchor service takes a Merkle root and returns an opaque proof that the
//! root existed at some point in time. Implementations may talk to a public
//! timestamping calendar, a blockchain, or anything else that can attest.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use vcp_chain_core::{AnchorTarget, Digest};

use crate::error::Result;

/// A successful attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    /// Target-specific proof blob.
    pub proof: String,
    /// Unix milliseconds of the attestation.
    pub attested_at: i64,
}

/// External attestation service.
///
/// Implementations must be thread-safe (Send + Sync). One call is one
/// request; retries and timeouts are the binder's concern.
#[async_trait]
pub trait AnchorService: Send + Sync {
    /// Where this service publishes.
    fn target(&self) -> AnchorTarget;

    /// Submit a batch root for attestation.
    async fn submit(&self, merkle_root: &Digest, event_count: u64) -> Result<Attestation>;
}

pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// An in-memory anchor service for testing.
///
/// Proofs are deterministic digests over the target and the root, checked by
/// [`memory::MemoryAttestationVerifier`]. Failures and latency can be injected.
pub mod memory {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use sha2::{Digest as _, Sha256};
    use vcp_chain_core::AttestationVerifier;

    use crate::error::AnchorError;

    const PROOF_DOMAIN: &[u8] = b"vcp-memory-anchor-v1";

    /// Proof the memory service issues for `merkle_root` at `target`.
    pub fn memory_proof(target: &AnchorTarget, merkle_root: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(PROOF_DOMAIN);
        hasher.update(target.identifier.as_bytes());
        hasher.update(merkle_root.to_ascii_lowercase().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// In-memory anchor service.
    pub struct MemoryAnchorService {
        target: AnchorTarget,
        fail_first: u32,
        reject: bool,
        latency: Option<Duration>,
        calls: AtomicU32,
        anchored: Mutex<Vec<(Digest, u64)>>,
    }

    impl MemoryAnchorService {
        /// A service that attests every submission immediately.
        pub fn new() -> Self {
            Self {
                target: AnchorTarget::new("MEMORY", "memory-calendar"),
                fail_first: 0,
                reject: false,
                latency: None,
                calls: AtomicU32::new(0),
                anchored: Mutex::new(Vec::new()),
            }
        }

        /// Answer the first `n` calls with `Unavailable`.
        pub fn failing_first(mut self, n: u32) -> Self {
            self.fail_first = n;
            self
        }

        /// Reject every submission.
        pub fn rejecting(mut self) -> Self {
            self.reject = true;
            self
        }

        /// Delay every answer.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        /// Number of `submit` calls so far.
        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        /// Roots attested so far, in order.
        pub fn anchored(&self) -> Vec<(Digest, u64)> {
            self.anchored
                .lock()
                .map(|guard| guard.clone())
                .unwrap_or_default()
        }
    }

    impl Default for MemoryAnchorService {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl AnchorService for MemoryAnchorService {
        fn target(&self) -> AnchorTarget {
            self.target.clone()
        }

        async fn submit(&self, merkle_root: &Digest, event_count: u64) -> Result<Attestation> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if self.reject {
                return Err(AnchorError::Rejected("memory service rejects all roots".into()));
            }
            if call <= self.fail_first {
                return Err(AnchorError::Unavailable(format!("injected failure {call}")));
            }

            if let Ok(mut anchored) = self.anchored.lock() {
                anchored.push((*merkle_root, event_count));
            }
            Ok(Attestation {
                proof: memory_proof(&self.target, &merkle_root.to_hex()),
                attested_at: unix_millis(),
            })
        }
    }

    /// Checks proofs issued by [`MemoryAnchorService`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct MemoryAttestationVerifier;

    impl AttestationVerifier for MemoryAttestationVerifier {
        fn attests(&self, target: &AnchorTarget, merkle_root: &str, proof: &str) -> bool {
            memory_proof(target, merkle_root) == proof
        }
    }
}
