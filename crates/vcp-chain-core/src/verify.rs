//! ChainVerifier: replays chain construction over a persisted sequence.
//!
//! Verification is one pass of independent checks. Integrity findings are
//! collected as [`Violation`]s and never stop the scan; only structural
//! problems (an empty sequence, an unknown hash algorithm) abort with a
//! [`CoreError`].
//!
//! Each check decides for itself whether it applies. A check whose inputs
//! are absent and which nothing makes mandatory is reported `SKIPPED`, never
//! `PASS`.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, info};

use crate::anchor::{verify_anchor, AnchorRecord, AnchorStatus, AttestationVerifier};
use crate::crypto::{
    Digest, HashAlgorithm, PublicKeyRecord, SignAlgorithm, SignatureVerifier, GENESIS_HASH,
};
use crate::error::{CoreError, Result};
use crate::event::{ConformanceTier, Event, VerificationDepth};
use crate::merkle::MerkleTree;
use crate::report::{
    BatchSummary, Check, CheckResult, CheckStatus, VerificationReport, Verdict, Violation,
    ViolationKind,
};

/// Placeholder written as `actual` when a field is missing.
pub const ABSENT: &str = "<absent>";

/// Which checks are mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierConfig {
    /// PrevHash linking must be in use.
    pub require_hash_chain: bool,
    /// Every event must belong to a Merkle batch.
    pub require_merkle_root: bool,
    /// Every payload must carry a non-empty `PolicyIdentification.PolicyID`.
    pub require_policy_identification: bool,
    /// Every batched event must carry an `AnchorReference`.
    pub require_anchor_reference: bool,
    /// Also apply the `VerificationDepth` each event declares for itself.
    pub honor_declared_depth: bool,
    /// Used when an event declares no `HashAlgo`.
    pub default_hash_algo: HashAlgorithm,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            require_hash_chain: false,
            require_merkle_root: false,
            require_policy_identification: false,
            require_anchor_reference: false,
            honor_declared_depth: true,
            default_hash_algo: HashAlgorithm::Sha256,
        }
    }
}

impl VerifierConfig {
    /// Mandatory checks for a conformance tier.
    pub fn for_tier(tier: ConformanceTier) -> Self {
        let depth = VerificationDepth::for_tier(tier);
        let v11 = tier != ConformanceTier::Bronze;
        Self {
            require_hash_chain: depth.hash_chain,
            require_merkle_root: depth.merkle_tree,
            require_policy_identification: v11,
            require_anchor_reference: depth.external_anchor,
            ..Self::default()
        }
    }

    /// Require PrevHash linking.
    pub fn with_hash_chain(mut self, required: bool) -> Self {
        self.require_hash_chain = required;
        self
    }

    /// Require policy identification on every event.
    pub fn with_policy_identification(mut self, required: bool) -> Self {
        self.require_policy_identification = required;
        self
    }
}

struct TrustedKey {
    key_id: String,
    verifier: Box<dyn SignatureVerifier>,
}

/// Verifies persisted event sequences.
///
/// ```
/// use vcp_chain_core::{ChainVerifier, VerifierConfig};
///
/// let verifier = ChainVerifier::new(VerifierConfig::default());
/// assert!(verifier.verify(&[]).is_err());
/// ```
pub struct ChainVerifier {
    config: VerifierConfig,
    key: Option<TrustedKey>,
    anchor: Option<AnchorRecord>,
    oracle: Option<Arc<dyn AttestationVerifier>>,
}

impl ChainVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            key: None,
            anchor: None,
            oracle: None,
        }
    }

    /// Check signatures against this key.
    pub fn with_public_key(mut self, record: &PublicKeyRecord) -> Result<Self> {
        self.key = Some(TrustedKey {
            key_id: record.key_id.clone(),
            verifier: record.verifier()?,
        });
        Ok(self)
    }

    /// Cross-check this anchor record.
    pub fn with_anchor(mut self, record: AnchorRecord) -> Self {
        self.anchor = Some(record);
        self
    }

    /// Judge anchor proofs with this oracle.
    pub fn with_attestation_verifier(mut self, oracle: Arc<dyn AttestationVerifier>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Run every check over `events` in persisted order.
    pub fn verify(&self, events: &[Event]) -> Result<VerificationReport> {
        if events.is_empty() {
            return Err(CoreError::EmptyBatch);
        }

        let algos = events
            .iter()
            .map(|e| e.declared_hash_algo().unwrap_or(Ok(self.config.default_hash_algo)))
            .collect::<Result<Vec<_>>>()?;

        info!(
            events = events.len(),
            key = self.key.as_ref().map(|k| k.key_id.as_str()),
            anchor = self.anchor.as_ref().map(|a| a.anchor_id.as_str()),
            "verifying chain"
        );

        let batches = segment_batches(events)
            .into_iter()
            .map(|range| Batch::compute(events, range, &algos))
            .collect::<Vec<_>>();

        let mut scan = Scan {
            config: &self.config,
            events,
            algos: &algos,
            batches: &batches,
            checks: Vec::with_capacity(Check::ALL.len()),
            violations: Vec::new(),
        };

        // 1. Genesis sentinel
        let linking = scan.linking_in_use();
        scan.run(Check::Genesis, |s| s.check_genesis(linking))?;

        // 2. Recompute every EventHash
        scan.run(Check::EventHashes, Scan::check_event_hashes)?;

        // 3. PrevHash links
        scan.run(Check::HashChain, |s| s.check_links(linking))?;

        // 4. Timestamps never decrease
        scan.run(Check::TimestampOrder, Scan::check_timestamps)?;
        scan.run(Check::SequenceNumbers, Scan::check_sequence_numbers)?;

        // 5. Merkle roots per batch
        scan.run(Check::MerkleRoot, Scan::check_merkle)?;

        // 6. Policy and anchor presence
        scan.run(Check::PolicyIdentification, Scan::check_policy)?;
        scan.run(Check::AnchorReference, Scan::check_anchor_references)?;

        // 7. Signatures
        scan.run(Check::Signatures, |s| s.check_signatures(self.key.as_ref()))?;

        // 8. Anchor record
        scan.run(Check::AnchorRecord, |s| {
            s.check_anchor_record(self.anchor.as_ref(), self.key.as_ref(), self.oracle.as_deref())
        })?;

        let report = scan.into_report();
        info!(
            verdict = ?report.verdict,
            violations = report.violations.len(),
            "verification finished"
        );
        Ok(report)
    }
}

/// A contiguous run of events sharing one stored root.
struct Batch {
    range: Range<usize>,
    stored_root: String,
    computed_root: Option<Digest>,
}

impl Batch {
    fn compute(events: &[Event], range: Range<usize>, algos: &[HashAlgorithm]) -> Self {
        let stored_root = events[range.start]
            .security
            .batch_root()
            .unwrap_or_default()
            .to_string();
        let computed_root = merkle_root_over(&events[range.clone()], algos[range.start]);
        Self {
            range,
            stored_root,
            computed_root,
        }
    }

    fn contains(&self, index: usize) -> bool {
        self.range.contains(&index)
    }

    fn summary(&self) -> BatchSummary {
        BatchSummary {
            first_index: self.range.start,
            event_count: self.range.len(),
            stored_root: self.stored_root.clone(),
            computed_root: self.computed_root.map(|d| d.to_hex()),
        }
    }
}

/// Split a sequence into batches: maximal runs with the same stored root,
/// restarted by `MerkleIndex == 0`. Events without a root belong to none.
pub fn segment_batches(events: &[Event]) -> Vec<Range<usize>> {
    let mut batches = Vec::new();
    let mut open: Option<(usize, &str)> = None;

    for (i, event) in events.iter().enumerate() {
        let Some(root) = event.security.batch_root() else {
            if let Some((start, _)) = open.take() {
                batches.push(start..i);
            }
            continue;
        };

        let restart = match open {
            Some((_, current)) => {
                !current.eq_ignore_ascii_case(root) || event.security.merkle_index == Some(0)
            }
            None => true,
        };
        if restart {
            if let Some((start, _)) = open.take() {
                batches.push(start..i);
            }
            open = Some((i, root));
        }
    }

    if let Some((start, _)) = open {
        batches.push(start..events.len());
    }
    batches
}

/// Root over the stored EventHashes, `None` if any of them is not a digest.
fn merkle_root_over(events: &[Event], algo: HashAlgorithm) -> Option<Digest> {
    let leaves = events
        .iter()
        .map(|e| Digest::from_hex(&e.security.event_hash))
        .collect::<Result<Vec<_>>>()
        .ok()?;
    MerkleTree::build_with(algo, &leaves).ok().map(|t| t.root())
}

fn same_hex(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Per-run state threaded through the checks.
struct Scan<'a> {
    config: &'a VerifierConfig,
    events: &'a [Event],
    algos: &'a [HashAlgorithm],
    batches: &'a [Batch],
    checks: Vec<CheckResult>,
    violations: Vec<Violation>,
}

/// What a check reports back to [`Scan::run`].
enum Outcome {
    Ran,
    Skipped(&'static str),
}

impl<'a> Scan<'a> {
    fn run<F>(&mut self, check: Check, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<Outcome>,
    {
        let before = self.violations.len();
        let outcome = f(self)?;
        let (status, note) = match outcome {
            Outcome::Skipped(why) => (CheckStatus::Skipped, Some(why.to_string())),
            Outcome::Ran if self.violations.len() > before => (CheckStatus::Fail, None),
            Outcome::Ran => (CheckStatus::Pass, None),
        };
        self.checks.push(CheckResult {
            check,
            status,
            note,
        });
        Ok(())
    }

    fn record(&mut self, violation: Violation) {
        debug!(
            kind = %violation.kind,
            index = violation.index,
            expected = violation.expected.as_deref(),
            actual = violation.actual.as_deref(),
            "violation"
        );
        self.violations.push(violation);
    }

    fn violation_at(&self, kind: ViolationKind, index: usize) -> Violation {
        Violation::new(kind).at(index, &self.events[index].header.event_id)
    }

    fn declared_depth(&self, index: usize) -> VerificationDepth {
        if !self.config.honor_declared_depth {
            return VerificationDepth::default();
        }
        self.events[index]
            .payload
            .verification_depth()
            .unwrap_or_default()
    }

    /// Index of the first event after the last batch, if any batch exists.
    /// Events from there on form the open, not yet sealed tail.
    fn open_tail_start(&self) -> Option<usize> {
        self.batches.last().map(|b| b.range.end)
    }

    fn in_open_tail(&self, index: usize) -> bool {
        self.open_tail_start().is_some_and(|start| index >= start)
    }

    fn linking_in_use(&self) -> bool {
        self.config.require_hash_chain
            || self
                .events
                .iter()
                .any(|e| e.security.linked_prev_hash().is_some())
            || (0..self.events.len()).any(|i| self.declared_depth(i).hash_chain)
    }

    fn check_genesis(&mut self, linking: bool) -> Result<Outcome> {
        if !linking {
            return Ok(Outcome::Skipped("PrevHash linking not in use"));
        }
        let stored = self.events[0].security.linked_prev_hash();
        if stored != Some(GENESIS_HASH) {
            let v = self
                .violation_at(ViolationKind::PrevHashMismatch, 0)
                .expected(GENESIS_HASH)
                .actual(stored.unwrap_or(ABSENT))
                .detail("genesis event must link to the zero sentinel");
            self.record(v);
        }
        Ok(Outcome::Ran)
    }

    fn check_event_hashes(&mut self) -> Result<Outcome> {
        let events = self.events;
        for (i, event) in events.iter().enumerate() {
            let computed = event.compute_hash(self.algos[i])?.to_hex();
            if !same_hex(&computed, &event.security.event_hash) {
                let stored = if event.security.event_hash.is_empty() {
                    ABSENT
                } else {
                    event.security.event_hash.as_str()
                };
                let v = self
                    .violation_at(ViolationKind::HashMismatch, i)
                    .expected(computed)
                    .actual(stored);
                self.record(v);
            }
        }
        Ok(Outcome::Ran)
    }

    fn check_links(&mut self, linking: bool) -> Result<Outcome> {
        if !linking {
            return Ok(Outcome::Skipped("PrevHash linking not in use"));
        }
        for i in 1..self.events.len() {
            let expected = &self.events[i - 1].security.event_hash;
            let actual = self.events[i].security.linked_prev_hash();
            if !actual.is_some_and(|a| same_hex(a, expected)) {
                let v = self
                    .violation_at(ViolationKind::PrevHashMismatch, i)
                    .expected(expected.as_str())
                    .actual(actual.unwrap_or(ABSENT));
                self.record(v);
            }
        }
        Ok(Outcome::Ran)
    }

    fn check_timestamps(&mut self) -> Result<Outcome> {
        for i in 1..self.events.len() {
            let prev = self.events[i - 1].header.timestamp;
            let current = self.events[i].header.timestamp;
            if current < prev {
                let v = self
                    .violation_at(ViolationKind::TimestampOrderViolation, i)
                    .expected(format!(">= {prev}"))
                    .actual(current.to_string());
                self.record(v);
            }
        }
        Ok(Outcome::Ran)
    }

    fn check_sequence_numbers(&mut self) -> Result<Outcome> {
        if self
            .events
            .iter()
            .all(|e| e.header.sequence_number().is_none())
        {
            return Ok(Outcome::Skipped("no SequenceNumber present"));
        }

        let mut last: Option<u64> = None;
        for i in 0..self.events.len() {
            let current = self.events[i].header.sequence_number();
            match (last, current) {
                (Some(prev), Some(seq)) if seq != prev.saturating_add(1) => {
                    let v = self
                        .violation_at(ViolationKind::SequenceGap, i)
                        .expected((prev.saturating_add(1)).to_string())
                        .actual(seq.to_string());
                    self.record(v);
                }
                (_, None) => {
                    let mut v = self.violation_at(ViolationKind::SequenceGap, i).actual(ABSENT);
                    if let Some(prev) = last {
                        v = v.expected(prev.saturating_add(1).to_string());
                    }
                    self.record(v);
                }
                _ => {}
            }
            if current.is_some() {
                last = current;
            }
        }
        Ok(Outcome::Ran)
    }

    fn check_merkle(&mut self) -> Result<Outcome> {
        let required: Vec<usize> = (0..self.events.len())
            .filter(|&i| self.config.require_merkle_root || self.declared_depth(i).merkle_tree)
            .collect();

        if self.batches.is_empty() && required.is_empty() {
            return Ok(Outcome::Skipped("no MerkleRoot stored"));
        }

        for batch in self.batches {
            let first = batch.range.start;
            match batch.computed_root {
                Some(root) if same_hex(&root.to_hex(), &batch.stored_root) => {}
                Some(root) => {
                    let v = self
                        .violation_at(ViolationKind::MerkleRootMismatch, first)
                        .expected(root.to_hex())
                        .actual(batch.stored_root.as_str())
                        .detail(format!("batch of {} events", batch.range.len()));
                    self.record(v);
                }
                None => {
                    let v = self
                        .violation_at(ViolationKind::MerkleRootMismatch, first)
                        .actual(batch.stored_root.as_str())
                        .detail("batch contains an EventHash that is not a digest");
                    self.record(v);
                }
            }

            for (position, i) in batch.range.clone().enumerate() {
                let stored = self.events[i].security.merkle_index;
                if stored != Some(position as u64) {
                    let v = self
                        .violation_at(ViolationKind::MerkleIndexMismatch, i)
                        .expected(position.to_string())
                        .actual(stored.map_or_else(|| ABSENT.to_string(), |m| m.to_string()));
                    self.record(v);
                }
            }
        }

        for i in required {
            let covered = self.batches.iter().any(|b| b.contains(i));
            if !covered && !self.in_open_tail(i) {
                let v = self
                    .violation_at(ViolationKind::MerkleRootMismatch, i)
                    .actual(ABSENT)
                    .detail("event is not covered by any Merkle batch");
                self.record(v);
            }
        }
        Ok(Outcome::Ran)
    }

    fn check_policy(&mut self) -> Result<Outcome> {
        // Only the configuration makes the block mandatory; a declared depth
        // lives inside the very block being checked.
        if !self.config.require_policy_identification {
            return Ok(Outcome::Skipped("policy identification not required"));
        }
        for i in 0..self.events.len() {
            if self.events[i].payload.policy_id().is_none() {
                let v = self
                    .violation_at(ViolationKind::PolicyIdentificationMissing, i)
                    .actual(ABSENT);
                self.record(v);
            }
        }
        Ok(Outcome::Ran)
    }

    fn check_anchor_references(&mut self) -> Result<Outcome> {
        let required: Vec<usize> = (0..self.events.len())
            .filter(|&i| {
                self.config.require_anchor_reference || self.declared_depth(i).external_anchor
            })
            .collect();
        if required.is_empty() {
            return Ok(Outcome::Skipped("anchor reference not required"));
        }

        for i in required {
            if self.in_open_tail(i) {
                continue;
            }
            if !self.events[i].security.has_anchor_reference() {
                let v = self
                    .violation_at(ViolationKind::AnchorReferenceMissing, i)
                    .actual(ABSENT);
                self.record(v);
            }
        }
        Ok(Outcome::Ran)
    }

    fn check_signatures(&mut self, key: Option<&TrustedKey>) -> Result<Outcome> {
        let Some(key) = key else {
            return Ok(Outcome::Skipped("no public key supplied"));
        };
        let key_algo = key.verifier.algorithm();

        let events = self.events;
        for (i, event) in events.iter().enumerate() {
            let security = &event.security;
            let failure = match (security.signature.as_deref(), security.sign_algo.as_deref()) {
                (None, _) => Some("missing Signature".to_string()),
                (Some(_), Some(tag)) if SignAlgorithm::from_tag(tag) != Some(key_algo) => Some(
                    format!("SignAlgo {tag} does not match {key_algo} key {}", key.key_id),
                ),
                (Some(signature), _) => match Digest::from_hex(&security.event_hash) {
                    Err(_) => Some("EventHash is not a digest".to_string()),
                    Ok(digest) => key
                        .verifier
                        .verify_hex(digest.as_bytes(), signature)
                        .err()
                        .map(|_| format!("signature does not verify under key {}", key.key_id)),
                },
            };

            if let Some(detail) = failure {
                let v = self
                    .violation_at(ViolationKind::InvalidSignature, i)
                    .detail(detail);
                self.record(v);
            }
        }
        Ok(Outcome::Ran)
    }

    /// Batch an anchor record attests: the one whose events reference it,
    /// else the one with the same stored root, else the last one.
    fn anchored_batch(&self, record: &AnchorRecord) -> Option<&'a Batch> {
        let references = |b: &&Batch| {
            self.events[b.range.clone()].iter().any(|e| {
                e.security
                    .anchor_reference
                    .as_ref()
                    .is_some_and(|r| r.anchor_id == record.anchor_id)
            })
        };
        self.batches
            .iter()
            .find(references)
            .or_else(|| {
                self.batches
                    .iter()
                    .find(|b| same_hex(&b.stored_root, &record.merkle_root))
            })
            .or_else(|| self.batches.last())
    }

    fn check_anchor_record(
        &mut self,
        record: Option<&AnchorRecord>,
        key: Option<&TrustedKey>,
        oracle: Option<&dyn AttestationVerifier>,
    ) -> Result<Outcome> {
        let Some(record) = record else {
            return Ok(Outcome::Skipped("no anchor record supplied"));
        };

        let (expected_root, expected_count) = match self.anchored_batch(record) {
            Some(batch) => (batch.computed_root, batch.range.len()),
            None => (
                merkle_root_over(self.events, self.algos[0]),
                self.events.len(),
            ),
        };

        // Root
        let root_matches = match expected_root {
            Some(root) if same_hex(&root.to_hex(), &record.merkle_root) => true,
            Some(root) => {
                let v = Violation::new(ViolationKind::AnchorRootMismatch)
                    .expected(root.to_hex())
                    .actual(record.merkle_root.as_str())
                    .detail(format!("anchor {}", record.anchor_id));
                self.record(v);
                false
            }
            None => {
                let v = Violation::new(ViolationKind::AnchorRootMismatch)
                    .actual(record.merkle_root.as_str())
                    .detail("anchored batch has no computable root");
                self.record(v);
                false
            }
        };

        // Event count
        if record.event_count != expected_count as u64 {
            let v = Violation::new(ViolationKind::AnchorEventCountMismatch)
                .expected(expected_count.to_string())
                .actual(record.event_count.to_string())
                .detail(format!("anchor {}", record.anchor_id));
            self.record(v);
        }

        // Attestation proof
        if let (Some(oracle), Some(root)) = (oracle, expected_root.filter(|_| root_matches)) {
            let detail = match record.status() {
                AnchorStatus::Pending => Some("anchor record is still PENDING"),
                AnchorStatus::Confirmed if !verify_anchor(record, &root, oracle) => {
                    Some("attestation proof rejected")
                }
                AnchorStatus::Confirmed => None,
            };
            if let Some(detail) = detail {
                let v = Violation::new(ViolationKind::AnchorProofInvalid).detail(detail);
                self.record(v);
            }
        }

        // Object signature
        if let (Some(key), Some(_)) = (key, record.object_signature.as_ref()) {
            if record.verify_signature(key.verifier.as_ref()).is_err() {
                let v = Violation::new(ViolationKind::AnchorProofInvalid)
                    .detail(format!("ObjectSignature does not verify under key {}", key.key_id));
                self.record(v);
            }
        }

        Ok(Outcome::Ran)
    }

    fn into_report(self) -> VerificationReport {
        let unique_traces = self
            .events
            .iter()
            .map(|e| e.header.trace_id.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        let mut event_types = BTreeMap::new();
        for event in self.events {
            *event_types.entry(event.header.event_type.clone()).or_insert(0) += 1;
        }

        let verdict = if self.violations.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };

        VerificationReport {
            total_events: self.events.len(),
            unique_traces,
            event_types,
            merkle_root: merkle_root_over(self.events, self.algos[0]).map(|d| d.to_hex()),
            batches: self.batches.iter().map(Batch::summary).collect(),
            checks: self.checks,
            violations: self.violations,
            verdict,
        }
    }
}
