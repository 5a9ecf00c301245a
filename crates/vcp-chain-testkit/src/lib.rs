//! # VCP Chain Testkit
//!
//! Testing utilities for VCP event chains.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Canonical bytes, EventHashes and Merkle roots every
//!   implementation must reproduce
//! - **Generators**: Proptest strategies for events, payloads and leaves
//! - **Fixtures**: Keyed helpers that build signed, linked, sealed chains
//!
//! ## Golden Vectors
//!
//! ```rust
//! use vcp_chain_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, hash) in verify_all_vectors() {
//!     assert!(matches, "{name}: {hash}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use vcp_chain_testkit::generators::{event_from_params, EventParams};
//! use vcp_chain_core::HashAlgorithm;
//!
//! proptest! {
//!     #[test]
//!     fn event_hash_is_deterministic(params: EventParams) {
//!         let a = event_from_params(&params, 0, 1000);
//!         let b = event_from_params(&params, 0, 1000);
//!         prop_assert_eq!(
//!             a.compute_hash(HashAlgorithm::Sha256).unwrap(),
//!             b.compute_hash(HashAlgorithm::Sha256).unwrap()
//!         );
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use vcp_chain_testkit::fixtures::{ChainShape, TestFixture};
//! use vcp_chain_core::VerifierConfig;
//!
//! let fixture = TestFixture::new();
//! let events = fixture.build_chain(4, ChainShape::default());
//! let report = fixture.verifier(VerifierConfig::default()).verify(&events).unwrap();
//! assert!(report.passed());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_fixtures, trade_event, ChainShape, TestFixture};
pub use generators::{event_from_params, events_from_params, EventParams};
pub use vectors::{all_vectors, merkle_leaves, verify_all_vectors, EventVector, MERKLE_ROOTS};
