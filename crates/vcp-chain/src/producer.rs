//! ChainProducer: one append-only production session.
//!
//! The producer owns the only mutable chain state there is: the linker cursor
//! and the events written so far. Each `append` links, hashes and signs one
//! event in persisted order. Batches are sealed explicitly; anchoring runs in
//! the background and is back-filled when it resolves.

use std::ops::Range;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};
use vcp_chain_anchor::{AnchorBinder, AnchorService};
use vcp_chain_core::event::VCP_VERSION;
use vcp_chain_core::{
    segment_batches, to_jsonl, AnchorRecord, AuditPath, ChainLinker, ConformanceTier, Digest,
    DigestSigner, Event, HashAlgorithm, Keypair, MerkleTree, PolicyIdentification,
};

use crate::error::{ChainError, Result};

/// Configuration for a production session.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Link each event to its predecessor via PrevHash.
    pub use_prev_hash: bool,
    /// Hash function for EventHashes and batch trees.
    pub hash_algo: HashAlgorithm,
    /// Written to events that carry no VCPVersion.
    pub vcp_version: String,
    /// Written to events that carry no Tier.
    pub tier: Option<ConformanceTier>,
    /// KeyID stamped next to each signature.
    pub key_id: String,
    /// Injected into every payload that has no policy block.
    pub policy: Option<PolicyIdentification>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            use_prev_hash: true,
            hash_algo: HashAlgorithm::Sha256,
            vcp_version: VCP_VERSION.to_string(),
            tier: None,
            key_id: "vcp-key-001".to_string(),
            policy: None,
        }
    }
}

impl ProducerConfig {
    /// Session defaults for a conformance tier.
    pub fn for_tier(tier: ConformanceTier) -> Self {
        Self {
            tier: Some(tier),
            policy: Some(PolicyIdentification::for_tier(tier)),
            ..Self::default()
        }
    }

    /// Leave PrevHash absent; ordering then rests on Merkle roots and
    /// timestamps alone.
    pub fn without_prev_hash(mut self) -> Self {
        self.use_prev_hash = false;
        self
    }
}

/// A sealed batch: its events, root and tree.
#[derive(Debug, Clone)]
pub struct BatchSeal {
    pub range: Range<usize>,
    pub root: Digest,
    pub tree: MerkleTree,
}

impl BatchSeal {
    pub fn first_index(&self) -> usize {
        self.range.start
    }

    pub fn event_count(&self) -> u64 {
        self.range.len() as u64
    }
}

/// An append-only production session for one chain.
pub struct ChainProducer {
    config: ProducerConfig,
    signer: Option<Keypair>,
    linker: ChainLinker,
    events: Vec<Event>,
    sealed: Vec<BatchSeal>,
}

impl ChainProducer {
    /// Start a new chain.
    pub fn new(config: ProducerConfig) -> Self {
        Self {
            config,
            signer: None,
            linker: ChainLinker::new(),
            events: Vec::new(),
            sealed: Vec::new(),
        }
    }

    /// Continue an existing chain.
    ///
    /// The linker resumes from the last stored EventHash and the batches
    /// already sealed in `events` are rebuilt.
    pub fn resume(config: ProducerConfig, events: Vec<Event>) -> Result<Self> {
        let linker = match events.last() {
            Some(last) => ChainLinker::resume(
                Digest::from_hex(&last.security.event_hash)?,
                events.len() as u64,
            ),
            None => ChainLinker::new(),
        };

        let mut sealed = Vec::new();
        for range in segment_batches(&events) {
            let tree = build_batch_tree(config.hash_algo, &events[range.clone()])?;
            sealed.push(BatchSeal {
                root: tree.root(),
                range,
                tree,
            });
        }

        info!(
            events = events.len(),
            batches = sealed.len(),
            "production session resumed"
        );
        Ok(Self {
            config,
            signer: None,
            linker,
            events,
            sealed,
        })
    }

    /// Sign every appended event with this key.
    pub fn with_signer(mut self, keypair: Keypair) -> Self {
        self.signer = Some(keypair);
        self
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Append
    // ─────────────────────────────────────────────────────────────────────────

    /// Link, hash and sign an event, then append it.
    ///
    /// Any Security fields the caller set are overwritten.
    pub fn append(&mut self, mut event: Event) -> Result<&Event> {
        // 1. Timestamps never go backwards
        if let Some(head) = self.events.last() {
            if event.header.timestamp < head.header.timestamp {
                return Err(ChainError::TimestampRegression {
                    previous: head.header.timestamp,
                    got: event.header.timestamp,
                });
            }
        }

        // 2. Session defaults
        event.header.default_vcp_version(&self.config.vcp_version);
        if let Some(tier) = self.config.tier {
            event.header.default_tier(tier);
        }
        if let Some(policy) = &self.config.policy {
            if !event.payload.has_policy_identification() {
                event.payload.set_policy_identification(policy)?;
            }
        }

        // 3. Link
        let algo = self.config.hash_algo;
        let security = &mut event.security;
        security.hash_algo = Some(algo.as_tag().to_string());
        security.prev_hash = self
            .config
            .use_prev_hash
            .then(|| self.linker.next_prev_hash());
        security.merkle_index = None;
        security.merkle_root = None;
        security.anchor_reference = None;

        // 4. Hash
        let digest = event.compute_hash(algo)?;
        event.security.event_hash = digest.to_hex();

        // 5. Sign
        match &self.signer {
            Some(signer) => {
                event.security.sign_algo = Some(signer.algorithm().as_tag().to_string());
                event.security.signature = Some(signer.sign_digest(&digest));
                event.security.key_id = Some(self.config.key_id.clone());
            }
            None => {
                event.security.sign_algo = None;
                event.security.signature = None;
                event.security.key_id = None;
            }
        }

        self.linker.record(digest);
        debug!(
            index = self.events.len(),
            event_id = %event.header.event_id,
            event_type = %event.header.event_type,
            hash = %digest,
            "event appended"
        );

        let index = self.events.len();
        self.events.push(event);
        Ok(&self.events[index])
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Batches
    // ─────────────────────────────────────────────────────────────────────────

    /// Seal every event appended since the last batch.
    ///
    /// Builds the tree over their EventHashes and back-fills `MerkleIndex`
    /// and `MerkleRoot`.
    pub fn close_batch(&mut self) -> Result<BatchSeal> {
        let range = self.unsealed_start()..self.events.len();
        if range.is_empty() {
            return Err(ChainError::NoOpenBatch);
        }

        let tree = build_batch_tree(self.config.hash_algo, &self.events[range.clone()])?;
        let root = tree.root();
        let root_hex = root.to_hex();
        for (position, event) in self.events[range.clone()].iter_mut().enumerate() {
            event.security.merkle_index = Some(position as u64);
            event.security.merkle_root = Some(root_hex.clone());
        }

        info!(
            first = range.start,
            events = range.len(),
            root = %root_hex,
            "batch sealed"
        );

        let seal = BatchSeal { range, root, tree };
        self.sealed.push(seal.clone());
        Ok(seal)
    }

    /// Back-fill an anchor record's reference into the batch it attests.
    ///
    /// Returns the number of events updated.
    pub fn attach_anchor(&mut self, record: &AnchorRecord) -> Result<usize> {
        let range = self
            .sealed
            .iter()
            .find(|seal| seal.root.to_hex().eq_ignore_ascii_case(&record.merkle_root))
            .map(|seal| seal.range.clone())
            .ok_or_else(|| ChainError::UnknownAnchorRoot(record.merkle_root.clone()))?;

        let reference = record.reference();
        for event in &mut self.events[range.clone()] {
            event.security.anchor_reference = Some(reference.clone());
        }

        info!(
            anchor_id = %record.anchor_id,
            status = ?record.status(),
            events = range.len(),
            "anchor reference back-filled"
        );
        Ok(range.len())
    }

    /// Inclusion proof for a sealed event.
    pub fn audit_path(&self, index: usize) -> Result<AuditPath> {
        let seal = self
            .sealed
            .iter()
            .find(|seal| seal.range.contains(&index))
            .ok_or(ChainError::NotBatched(index))?;
        Ok(seal.tree.audit_path(index - seal.range.start)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn sealed(&self) -> &[BatchSeal] {
        &self.sealed
    }

    /// Events appended since the last sealed batch.
    pub fn unsealed(&self) -> &[Event] {
        &self.events[self.unsealed_start()..]
    }

    pub fn last_hash(&self) -> Option<&Digest> {
        self.linker.last_hash()
    }

    /// The chain as JSONL, one event per line.
    pub fn to_jsonl(&self) -> Result<String> {
        Ok(to_jsonl(&self.events)?)
    }

    fn unsealed_start(&self) -> usize {
        self.sealed.last().map_or(0, |seal| seal.range.end)
    }
}

fn build_batch_tree(algo: HashAlgorithm, events: &[Event]) -> Result<MerkleTree> {
    let leaves = events
        .iter()
        .map(|e| Digest::from_hex(&e.security.event_hash))
        .collect::<vcp_chain_core::Result<Vec<_>>>()?;
    Ok(MerkleTree::build_with(algo, &leaves)?)
}

/// Anchor a sealed batch in the background.
///
/// Production continues while the task runs. Pass the task to
/// [`await_anchor`] and the resulting record to
/// [`ChainProducer::attach_anchor`].
pub fn spawn_anchor<S>(
    binder: Arc<AnchorBinder<S>>,
    seal: &BatchSeal,
) -> JoinHandle<vcp_chain_anchor::Result<AnchorRecord>>
where
    S: AnchorService + 'static,
{
    let root = seal.root;
    let event_count = seal.event_count();
    tokio::spawn(async move { binder.bind_anchor(&root, event_count).await })
}

/// Wait for a background anchoring task.
pub async fn await_anchor(
    task: JoinHandle<vcp_chain_anchor::Result<AnchorRecord>>,
) -> Result<AnchorRecord> {
    let outcome = task
        .await
        .map_err(|e| ChainError::AnchorTask(e.to_string()))?;
    Ok(outcome?)
}
