//! Verification report: per-check status plus every violation found.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    /// Prerequisite data absent and the check not mandatory.
    Skipped,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skipped => "SKIPPED",
        })
    }
}

/// The checks the verifier runs, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Genesis,
    EventHashes,
    HashChain,
    TimestampOrder,
    SequenceNumbers,
    MerkleRoot,
    PolicyIdentification,
    AnchorReference,
    Signatures,
    AnchorRecord,
}

impl Check {
    pub const ALL: [Check; 10] = [
        Check::Genesis,
        Check::EventHashes,
        Check::HashChain,
        Check::TimestampOrder,
        Check::SequenceNumbers,
        Check::MerkleRoot,
        Check::PolicyIdentification,
        Check::AnchorReference,
        Check::Signatures,
        Check::AnchorRecord,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Genesis => "Genesis",
            Self::EventHashes => "Event Hashes",
            Self::HashChain => "Hash Chain",
            Self::TimestampOrder => "Timestamp Monotonicity",
            Self::SequenceNumbers => "Sequence Numbers",
            Self::MerkleRoot => "Merkle Root",
            Self::PolicyIdentification => "Policy Identification",
            Self::AnchorReference => "Anchor Reference",
            Self::Signatures => "Signatures",
            Self::AnchorRecord => "Anchor Record",
        }
    }
}

/// Kinds of integrity violations. All are non-fatal to the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    HashMismatch,
    /// Includes a genesis event whose PrevHash is not the sentinel.
    PrevHashMismatch,
    TimestampOrderViolation,
    SequenceGap,
    MerkleRootMismatch,
    MerkleIndexMismatch,
    PolicyIdentificationMissing,
    AnchorReferenceMissing,
    InvalidSignature,
    AnchorRootMismatch,
    AnchorEventCountMismatch,
    AnchorProofInvalid,
}

impl ViolationKind {
    /// The check that records this kind.
    pub fn check(self) -> Check {
        match self {
            Self::HashMismatch => Check::EventHashes,
            Self::PrevHashMismatch => Check::HashChain,
            Self::TimestampOrderViolation => Check::TimestampOrder,
            Self::SequenceGap => Check::SequenceNumbers,
            Self::MerkleRootMismatch | Self::MerkleIndexMismatch => Check::MerkleRoot,
            Self::PolicyIdentificationMissing => Check::PolicyIdentification,
            Self::AnchorReferenceMissing => Check::AnchorReference,
            Self::InvalidSignature => Check::Signatures,
            Self::AnchorRootMismatch
            | Self::AnchorEventCountMismatch
            | Self::AnchorProofInvalid => Check::AnchorRecord,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One integrity finding.
///
/// `expected` is what the verifier recomputed or derived; `actual` is what
/// the persisted data holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Position in the persisted sequence; `None` for findings about the
    /// anchor record itself.
    pub index: Option<usize>,
    pub event_id: Option<String>,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub detail: Option<String>,
}

impl Violation {
    pub fn new(kind: ViolationKind) -> Self {
        Self {
            kind,
            index: None,
            event_id: None,
            expected: None,
            actual: None,
            detail: None,
        }
    }

    pub fn at(mut self, index: usize, event_id: &str) -> Self {
        self.index = Some(index);
        self.event_id = Some(event_id.to_string());
        self
    }

    pub fn expected(mut self, value: impl Into<String>) -> Self {
        self.expected = Some(value.into());
        self
    }

    pub fn actual(mut self, value: impl Into<String>) -> Self {
        self.actual = Some(value.into());
        self
    }

    pub fn detail(mut self, value: impl Into<String>) -> Self {
        self.detail = Some(value.into());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.index, &self.event_id) {
            (Some(i), Some(id)) => write!(f, "event {i} ({id}): {}", self.kind)?,
            (Some(i), None) => write!(f, "event {i}: {}", self.kind)?,
            _ => write!(f, "{}", self.kind)?,
        }
        if let Some(detail) = &self.detail {
            write!(f, " - {detail}")?;
        }
        if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
            write!(f, " (expected {expected}, got {actual})")?;
        }
        Ok(())
    }
}

/// Status of one check with an optional note (e.g. why it was skipped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: Check,
    pub status: CheckStatus,
    pub note: Option<String>,
}

/// A contiguous run of events sharing one stored MerkleRoot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub first_index: usize,
    pub event_count: usize,
    pub stored_root: String,
    /// `None` when a leaf digest could not be decoded.
    pub computed_root: Option<String>,
}

/// Overall judgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

/// Structured result of a verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub total_events: usize,
    pub unique_traces: usize,
    pub event_types: BTreeMap<String, usize>,
    /// Root over the whole sequence, as a reference value.
    pub merkle_root: Option<String>,
    pub batches: Vec<BatchSummary>,
    pub checks: Vec<CheckResult>,
    pub violations: Vec<Violation>,
    pub verdict: Verdict,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// Process exit status: 0 for PASS, 1 for FAIL.
    pub fn exit_code(&self) -> i32 {
        match self.verdict {
            Verdict::Pass => 0,
            Verdict::Fail => 1,
        }
    }

    /// Status of a check; `Skipped` if it never ran.
    pub fn status(&self, check: Check) -> CheckStatus {
        self.checks
            .iter()
            .find(|c| c.check == check)
            .map(|c| c.status)
            .unwrap_or(CheckStatus::Skipped)
    }

    /// Violations of one kind, in index order.
    pub fn violations_of(&self, kind: ViolationKind) -> Vec<&Violation> {
        self.violations.iter().filter(|v| v.kind == kind).collect()
    }

    /// Indexes at which a kind was recorded.
    pub fn indexes_of(&self, kind: ViolationKind) -> Vec<usize> {
        self.violations
            .iter()
            .filter(|v| v.kind == kind)
            .filter_map(|v| v.index)
            .collect()
    }

    pub fn has(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Events: {}", self.total_events)?;
        writeln!(f, "Unique TraceIDs: {}", self.unique_traces)?;
        for (event_type, count) in &self.event_types {
            writeln!(f, "  {event_type}: {count}")?;
        }
        for result in &self.checks {
            write!(f, "{:<24} {}", result.check.label(), result.status)?;
            if let Some(note) = &result.note {
                write!(f, " ({note})")?;
            }
            writeln!(f)?;
        }
        for violation in &self.violations {
            writeln!(f, "  - {violation}")?;
        }
        if let Some(root) = &self.merkle_root {
            writeln!(f, "Merkle Root: {root}")?;
        }
        match self.verdict {
            Verdict::Pass => write!(f, "VERIFICATION: PASS"),
            Verdict::Fail => write!(f, "VERIFICATION: FAIL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_display() {
        let v = Violation::new(ViolationKind::PrevHashMismatch)
            .at(3, "evt-3")
            .expected("aa")
            .actual("bb");
        assert_eq!(
            v.to_string(),
            "event 3 (evt-3): PrevHashMismatch (expected aa, got bb)"
        );
    }

    #[test]
    fn test_every_kind_maps_to_a_check() {
        assert_eq!(ViolationKind::MerkleIndexMismatch.check(), Check::MerkleRoot);
        assert_eq!(ViolationKind::AnchorProofInvalid.check(), Check::AnchorRecord);
        assert_eq!(ViolationKind::SequenceGap.check(), Check::SequenceNumbers);
    }

    #[test]
    fn test_status_defaults_to_skipped() {
        let report = VerificationReport {
            total_events: 0,
            unique_traces: 0,
            event_types: BTreeMap::new(),
            merkle_root: None,
            batches: vec![],
            checks: vec![CheckResult {
                check: Check::Genesis,
                status: CheckStatus::Pass,
                note: None,
            }],
            violations: vec![],
            verdict: Verdict::Pass,
        };
        assert_eq!(report.status(Check::Genesis), CheckStatus::Pass);
        assert_eq!(report.status(Check::Signatures), CheckStatus::Skipped);
        assert_eq!(report.exit_code(), 0);
    }
}
