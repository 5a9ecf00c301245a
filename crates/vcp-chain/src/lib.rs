//! # VCP Chain
//!
//! Tamper-evident event chains for algorithmic trading logs: production,
//! batching, external anchoring and independent verification.
//!
//! ## Overview
//!
//! A chain is an ordered sequence of VCP events. Each event commits to its
//! Header and Payload through an EventHash, and optionally to its
//! predecessor through PrevHash. Batches of events are sealed under a Merkle
//! root, and each root is bound to an external timestamping service.
//!
//! - **Producer**: [`ChainProducer`] links, hashes and signs in append order
//! - **Anchoring**: [`spawn_anchor`] binds a sealed batch in the background
//! - **Verifier**: [`ChainVerifier`] replays construction and reports every
//!   violation it finds
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vcp_chain::{
//!     await_anchor, spawn_anchor, ChainProducer, ChainVerifier, EventBuilder, EventType,
//!     Keypair, ProducerConfig, VerifierConfig,
//! };
//! use vcp_chain::anchor::{AnchorBinder, AnchorConfig, MemoryAnchorService};
//!
//! async fn example() -> vcp_chain::Result<()> {
//!     let keypair = Keypair::generate();
//!     let public_key = keypair.public_key_record("vcp-key-001");
//!     let mut producer = ChainProducer::new(ProducerConfig::default()).with_signer(keypair);
//!
//!     producer.append(EventBuilder::new(EventType::Signal, "trace-1").timestamp(1).build())?;
//!     producer.append(EventBuilder::new(EventType::Order, "trace-1").timestamp(2).build())?;
//!     let seal = producer.close_batch()?;
//!
//!     let binder = Arc::new(AnchorBinder::new(MemoryAnchorService::new(), AnchorConfig::default()));
//!     let record = await_anchor(spawn_anchor(binder, &seal)).await?;
//!     producer.attach_anchor(&record)?;
//!
//!     let report = ChainVerifier::new(VerifierConfig::default())
//!         .with_public_key(&public_key)?
//!         .with_anchor(record)
//!         .verify(producer.events())?;
//!     assert!(report.passed());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `vcp_chain::core` - Events, hashing, Merkle trees, verification
//! - `vcp_chain::anchor` - Anchor services and the retrying binder

pub mod error;
pub mod loader;
pub mod producer;

pub use vcp_chain_anchor as anchor;
pub use vcp_chain_core as core;

pub use error::{ChainError, Result};
pub use loader::{
    read_anchor_record, read_events, read_public_key, verify_files, write_events, write_json,
};
pub use producer::{await_anchor, spawn_anchor, BatchSeal, ChainProducer, ProducerConfig};

pub use vcp_chain_core::{
    AnchorRecord, ChainVerifier, ConformanceTier, Digest, Event, EventBuilder, EventType,
    HashAlgorithm, Keypair, Payload, PublicKeyRecord, VerificationReport, VerifierConfig,
    Violation, ViolationKind,
};
