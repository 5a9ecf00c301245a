//! File-level input and output.
//!
//! Chains are stored as JSONL, one event per line. Public keys and anchor
//! records are single JSON documents.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use vcp_chain_core::{
    parse_jsonl, to_jsonl, AnchorRecord, ChainVerifier, CoreError, Event, PublicKeyRecord,
    VerificationReport, VerifierConfig,
};

use crate::error::{ChainError, Result};

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| ChainError::io(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| ChainError::Core(CoreError::from(e)))
}

/// Read a JSONL chain. Blank lines are skipped.
pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<Event>> {
    let path = path.as_ref();
    let events = parse_jsonl(&read_text(path)?)?;
    debug!(path = %path.display(), events = events.len(), "chain loaded");
    Ok(events)
}

/// Write a chain as JSONL.
pub fn write_events(path: impl AsRef<Path>, events: &[Event]) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, to_jsonl(events)?).map_err(|e| ChainError::io(path, e))?;
    debug!(path = %path.display(), events = events.len(), "chain written");
    Ok(())
}

pub fn read_public_key(path: impl AsRef<Path>) -> Result<PublicKeyRecord> {
    read_json(path.as_ref())
}

pub fn read_anchor_record(path: impl AsRef<Path>) -> Result<AnchorRecord> {
    read_json(path.as_ref())
}

/// Write any record as pretty-printed JSON.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(value).map_err(CoreError::from)?;
    fs::write(path, text).map_err(|e| ChainError::io(path, e))
}

/// Verify a chain file, optionally against a public key and an anchor record.
///
/// The report's [`VerificationReport::exit_code`] is 0 on PASS and 1 on FAIL.
/// Unreadable or malformed input is an error, not a FAIL.
pub fn verify_files(
    events: &Path,
    public_key: Option<&Path>,
    anchor: Option<&Path>,
    config: VerifierConfig,
) -> Result<VerificationReport> {
    let chain = read_events(events)?;

    let mut verifier = ChainVerifier::new(config);
    if let Some(path) = public_key {
        verifier = verifier.with_public_key(&read_public_key(path)?)?;
    }
    if let Some(path) = anchor {
        verifier = verifier.with_anchor(read_anchor_record(path)?);
    }

    Ok(verifier.verify(&chain)?)
}
