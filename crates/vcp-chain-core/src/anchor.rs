//! Anchor records: external attestations over a batch's Merkle root.
//!
//! The core only defines the records and the pure cross-checks. Talking to
//! the attestation service is the job of the `vcp-chain-anchor` crate; proof
//! blobs are opaque here and judged by an [`AttestationVerifier`] oracle.

use serde::{Deserialize, Serialize};

use crate::canonical::canonicalize_serialize;
use crate::crypto::{Digest, DigestSigner, SignatureVerifier};
use crate::error::{CoreError, Result};

/// Where an anchor was (or will be) published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnchorTarget {
    #[serde(rename = "Type")]
    pub target_type: String,
    pub identifier: String,
}

impl AnchorTarget {
    pub fn new(target_type: &str, identifier: &str) -> Self {
        Self {
            target_type: target_type.to_string(),
            identifier: identifier.to_string(),
        }
    }

    /// The public OpenTimestamps calendar.
    pub fn open_timestamps() -> Self {
        Self::new("PUBLIC_TIMESTAMP", "OpenTimestamps")
    }
}

/// Attestation state of an anchor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnchorStatus {
    /// Kept locally, not yet attested.
    Pending,
    /// Attested; `Proof` is set.
    Confirmed,
}

/// One anchoring cycle: a Merkle root bound to an external target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnchorRecord {
    #[serde(rename = "AnchorID")]
    pub anchor_id: String,

    pub merkle_root: String,

    pub event_count: u64,

    pub anchor_target: AnchorTarget,

    /// Unix milliseconds at which the record was created or confirmed.
    pub timestamp: i64,

    /// Absent in records written by other producers; see [`AnchorRecord::status`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AnchorStatus>,

    /// Target-specific proof blob, never parsed by the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,

    #[serde(rename = "KeyID", default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_signature: Option<String>,
}

impl AnchorRecord {
    /// A local record awaiting attestation.
    pub fn pending(
        anchor_id: &str,
        merkle_root: &Digest,
        event_count: u64,
        anchor_target: AnchorTarget,
        timestamp: i64,
    ) -> Self {
        Self {
            anchor_id: anchor_id.to_string(),
            merkle_root: merkle_root.to_hex(),
            event_count,
            anchor_target,
            timestamp,
            status: Some(AnchorStatus::Pending),
            proof: None,
            key_id: None,
            object_signature: None,
        }
    }

    /// Attach the attestation proof.
    ///
    /// Any object signature is dropped since it no longer covers the record.
    pub fn confirm(&mut self, proof: String, timestamp: i64) {
        self.proof = Some(proof);
        self.status = Some(AnchorStatus::Confirmed);
        self.timestamp = timestamp;
        self.object_signature = None;
    }

    /// Declared status, or CONFIRMED when a proof is attached and PENDING
    /// otherwise.
    pub fn status(&self) -> AnchorStatus {
        match (self.status, &self.proof) {
            (Some(status), _) => status,
            (None, Some(_)) => AnchorStatus::Confirmed,
            (None, None) => AnchorStatus::Pending,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status() == AnchorStatus::Confirmed && self.proof.is_some()
    }

    /// The reference embedded into each event of the anchored batch.
    pub fn reference(&self) -> AnchorReference {
        AnchorReference {
            anchor_id: self.anchor_id.clone(),
            anchor_target: Some(self.anchor_target.clone()),
            anchor_timestamp: Some(self.timestamp),
        }
    }

    /// SHA-256 over the canonical record without its signature.
    pub fn object_digest(&self) -> Result<Digest> {
        let mut unsigned = self.clone();
        unsigned.object_signature = None;
        let bytes = canonicalize_serialize(&unsigned)?;
        Ok(Digest::sha256(&bytes))
    }

    /// Sign the record with the producer's key.
    pub fn sign(&mut self, key_id: &str, signer: &dyn DigestSigner) -> Result<()> {
        self.key_id = Some(key_id.to_string());
        self.object_signature = None;
        let digest = self.object_digest()?;
        self.object_signature = Some(signer.sign_digest(&digest));
        Ok(())
    }

    /// Check the object signature.
    pub fn verify_signature(&self, verifier: &dyn SignatureVerifier) -> Result<()> {
        let signature = self
            .object_signature
            .as_deref()
            .ok_or(CoreError::InvalidSignature)?;
        let digest = self.object_digest()?;
        verifier.verify_hex(digest.as_bytes(), signature)
    }
}

/// Link from an event back to the anchor record covering its batch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnchorReference {
    #[serde(rename = "AnchorID", default)]
    pub anchor_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_target: Option<AnchorTarget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_timestamp: Option<i64>,
}

/// Target-specific proof checker.
///
/// Answers one question: does `proof` show that `merkle_root` existed at the
/// target before the record's timestamp?
pub trait AttestationVerifier: Send + Sync {
    fn attests(&self, target: &AnchorTarget, merkle_root: &str, proof: &str) -> bool;
}

/// Pure anchor check: the record attests `expected_root` and its proof holds.
pub fn verify_anchor(
    record: &AnchorRecord,
    expected_root: &Digest,
    oracle: &dyn AttestationVerifier,
) -> bool {
    let root = expected_root.to_hex();
    if !record.merkle_root.eq_ignore_ascii_case(&root) {
        return false;
    }
    match record.proof.as_deref() {
        Some(proof) => oracle.attests(&record.anchor_target, &root, proof),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    struct AcceptPrefix(&'static str);

    impl AttestationVerifier for AcceptPrefix {
        fn attests(&self, _target: &AnchorTarget, _root: &str, proof: &str) -> bool {
            proof.starts_with(self.0)
        }
    }

    fn sample_record() -> AnchorRecord {
        AnchorRecord::pending(
            "anchor-001",
            &Digest::sha256(b"root"),
            5,
            AnchorTarget::open_timestamps(),
            1736870400000,
        )
    }

    #[test]
    fn test_pending_then_confirmed() {
        let mut record = sample_record();
        assert_eq!(record.status(), AnchorStatus::Pending);
        assert!(!record.is_confirmed());

        record.confirm("ots:abc".into(), 1736870401000);
        assert!(record.is_confirmed());
        assert_eq!(record.timestamp, 1736870401000);
    }

    #[test]
    fn test_verify_anchor() {
        let root = Digest::sha256(b"root");
        let mut record = sample_record();
        let oracle = AcceptPrefix("ots:");

        // No proof yet
        assert!(!verify_anchor(&record, &root, &oracle));

        record.confirm("ots:abc".into(), 1);
        assert!(verify_anchor(&record, &root, &oracle));
        assert!(!verify_anchor(&record, &Digest::sha256(b"other"), &oracle));
        assert!(!verify_anchor(&record, &root, &AcceptPrefix("btc:")));
    }

    #[test]
    fn test_verify_anchor_ignores_root_case() {
        let root = Digest::sha256(b"root");
        let mut record = sample_record();
        record.confirm("ots:abc".into(), 1);
        record.merkle_root = record.merkle_root.to_uppercase();

        struct ExactRoot(String);
        impl AttestationVerifier for ExactRoot {
            fn attests(&self, _target: &AnchorTarget, root: &str, _proof: &str) -> bool {
                root == self.0
            }
        }

        assert!(verify_anchor(&record, &root, &ExactRoot(root.to_hex())));
    }

    #[test]
    fn test_status_inferred_when_absent() {
        let root = Digest::sha256(b"root").to_hex();
        let confirmed: AnchorRecord = serde_json::from_value(serde_json::json!({
            "AnchorID": "a-1",
            "MerkleRoot": root,
            "EventCount": 3,
            "AnchorTarget": {"Type": "PUBLIC_TIMESTAMP", "Identifier": "OpenTimestamps"},
            "Timestamp": 1736870400000i64,
            "Proof": "ots:abc",
        }))
        .unwrap();
        assert_eq!(confirmed.status, None);
        assert_eq!(confirmed.status(), AnchorStatus::Confirmed);
        assert!(confirmed.is_confirmed());

        let mut pending = confirmed.clone();
        pending.proof = None;
        assert_eq!(pending.status(), AnchorStatus::Pending);

        // Absent status stays absent on the way out
        let json = serde_json::to_value(&confirmed).unwrap();
        assert!(json.get("Status").is_none());
    }

    #[test]
    fn test_record_json_shape() {
        let record = sample_record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["AnchorID"], "anchor-001");
        assert_eq!(json["EventCount"], 5);
        assert_eq!(json["AnchorTarget"]["Type"], "PUBLIC_TIMESTAMP");
        assert_eq!(json["AnchorTarget"]["Identifier"], "OpenTimestamps");
        assert_eq!(json["Status"], "PENDING");
        assert!(json.get("Proof").is_none());

        let back: AnchorRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_object_signature() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let mut record = sample_record();
        record.sign("vcp-key-001", &keypair).unwrap();
        assert!(record.verify_signature(&keypair.public_key()).is_ok());

        let mut tampered = record.clone();
        tampered.event_count = 4;
        assert!(matches!(
            tampered.verify_signature(&keypair.public_key()),
            Err(CoreError::InvalidSignature)
        ));

        let other = Keypair::from_seed(&[0x07; 32]);
        assert!(record.verify_signature(&other.public_key()).is_err());
    }

    #[test]
    fn test_reference_carries_target() {
        let record = sample_record();
        let reference = record.reference();
        assert_eq!(reference.anchor_id, "anchor-001");
        assert_eq!(reference.anchor_timestamp, Some(1736870400000));
        assert_eq!(reference.anchor_target, Some(AnchorTarget::open_timestamps()));
    }
}
