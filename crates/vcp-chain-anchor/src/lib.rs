//! # VCP Chain Anchor
//!
//! Binds closed Merkle batches to an external attestation service.
//!
//! ## Overview
//!
//! Anchoring is the one step of chain production with an outside side effect.
//! It runs as a single outstanding request per batch and never blocks
//! production: the producer keeps appending while the binder works, and the
//! resulting record is back-filled into the batch once it resolves.
//!
//! ## Key Properties
//!
//! - **Local first**: a PENDING record exists before the first submission
//! - **Bounded**: jittered exponential backoff, per-request timeout, fixed budget
//! - **Never dropped**: exhaustion returns the PENDING record in the error
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vcp_chain_anchor::{AnchorBinder, AnchorConfig, MemoryAnchorService};
//! use vcp_chain_core::Digest;
//!
//! async fn example() -> vcp_chain_anchor::Result<()> {
//!     let binder = AnchorBinder::new(MemoryAnchorService::new(), AnchorConfig::default());
//!     let record = binder.bind_anchor(&Digest::sha256(b"root"), 5).await?;
//!     assert!(record.is_confirmed());
//!     Ok(())
//! }
//! ```
//!
//! ## Record Lifecycle
//!
//! ```text
//! begin() ──> PENDING ──submit ok──> CONFIRMED (Proof set)
//!                │
//!                └──budget spent──> Exhausted { pending }
//! ```

pub mod binder;
pub mod error;
pub mod service;

pub use binder::{AnchorBinder, AnchorConfig};
pub use error::{AnchorError, Result};
pub use service::{
    memory::MemoryAnchorService, memory::MemoryAttestationVerifier, AnchorService, Attestation,
};
