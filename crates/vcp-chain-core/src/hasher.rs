//! EventHash computation.
//!
//! `EventHash = H(canonical(Header) || canonical(Payload) || PrevHash)`, where
//! PrevHash contributes the UTF-8 bytes of its hex string, or nothing when
//! linking is not in use. The verifier never trusts a stored EventHash; it
//! calls this function and compares.

use crate::canonical::canonicalize_serialize;
use crate::crypto::{Digest, HashAlgorithm};
use crate::error::Result;
use crate::event::{Header, Payload};

/// Compute the content digest of an event.
pub fn compute_event_hash(
    header: &Header,
    payload: &Payload,
    prev_hash: Option<&str>,
    algo: HashAlgorithm,
) -> Result<Digest> {
    let header_bytes = canonicalize_serialize(header)?;
    let payload_bytes = canonicalize_serialize(payload)?;
    let prev_bytes = prev_hash.unwrap_or("").as_bytes();

    Ok(algo.digest_parts(&[&header_bytes, &payload_bytes, prev_bytes]))
}

/// Hex form of [`compute_event_hash`].
pub fn compute_event_hash_hex(
    header: &Header,
    payload: &Payload,
    prev_hash: Option<&str>,
    algo: HashAlgorithm,
) -> Result<String> {
    compute_event_hash(header, payload, prev_hash, algo).map(|d| d.to_hex())
}
