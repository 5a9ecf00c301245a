//! # VCP Chain Core
//!
//! Pure primitives for VCP event chains: canonical hashing, hash linking,
//! Merkle aggregation, anchor records and verification.
//!
//! This crate contains no I/O and no networking. Everything here is
//! deterministic computation over in-memory events.
//!
//! ## Key Types
//!
//! - [`Event`] - One record: Header, Payload, Security
//! - [`Digest`] - 32-byte EventHash / Merkle node, hex on the wire
//! - [`ChainLinker`] - Producer-side PrevHash cursor
//! - [`MerkleTree`] - RFC 6962 style batch tree with audit paths
//! - [`AnchorRecord`] - External attestation over a batch root
//! - [`ChainVerifier`] - Replays construction and reports every violation
//!
//! ## Canonicalization
//!
//! EventHashes cover canonical JSON: sorted keys, no whitespace, one number
//! form. See the [`canonical`] module.

pub mod anchor;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod event;
pub mod hasher;
pub mod linker;
pub mod merkle;
pub mod report;
pub mod verify;

pub use anchor::{
    verify_anchor, AnchorRecord, AnchorReference, AnchorStatus, AnchorTarget, AttestationVerifier,
};
pub use canonical::{canonicalize, canonicalize_serialize};
pub use crypto::{
    Digest, DigestSigner, Ed25519PublicKey, Ed25519Signature, HashAlgorithm, Keypair,
    PublicKeyRecord, SignAlgorithm, SignatureVerifier, GENESIS_HASH,
};
pub use error::{CoreError, Result};
pub use event::{
    parse_jsonl, to_jsonl, ConformanceTier, Event, EventBuilder, EventType, Header, Payload,
    PolicyIdentification, Security, VerificationDepth,
};
pub use hasher::compute_event_hash;
pub use linker::ChainLinker;
pub use merkle::{build_tree, compute_root, verify_audit_path, AuditPath, MerkleTree};
pub use report::{
    Check, CheckStatus, VerificationReport, Verdict, Violation, ViolationKind,
};
pub use verify::{segment_batches, ChainVerifier, VerifierConfig};
