//! Event: one immutable record in a VCP chain.
//!
//! An event has three groups: `Header` and `Payload` are committed to by the
//! EventHash, `Security` carries the hash, the chain link, the signature and
//! the batch/anchor metadata that is back-filled after the fact.
//!
//! Typed fields cover what the integrity engine reads. Everything else is kept
//! verbatim in `extra` maps so that re-serializing a parsed event yields the
//! same canonical bytes it was hashed over.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::anchor::AnchorReference;
use crate::crypto::{Digest, HashAlgorithm};
use crate::error::{CoreError, Result};
use crate::hasher::compute_event_hash;

/// Protocol version written by this crate.
pub const VCP_VERSION: &str = "1.1";

/// Policy identifier for the Silver conformance profile.
pub const SILVER_POLICY_ID: &str = "org.veritaschain.vcp.v1.1.silver";

/// Header field keys that live in `Header::extra`.
mod keys {
    pub const TIMESTAMP_ISO: &str = "TimestampISO";
    pub const VCP_VERSION: &str = "VCPVersion";
    pub const TIER: &str = "Tier";
    pub const EVENT_TYPE_CODE: &str = "EventTypeCode";
    pub const SEQUENCE_NUMBER: &str = "SequenceNumber";
    pub const HASH_ALGO: &str = "HashAlgo";
    pub const POLICY_IDENTIFICATION: &str = "PolicyIdentification";
    pub const POLICY_ID: &str = "PolicyID";
}

/// The discrete lifecycle step an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum EventType {
    /// Strategy or model decision.
    Signal = 1,
    /// Order submitted.
    Order = 2,
    /// Broker acknowledgment.
    Ack = 3,
    /// Order filled.
    Execute = 4,
    /// Partial fill.
    Partial = 5,
    /// Order rejected or vetoed.
    Reject = 6,
    /// Order modified.
    Modify = 8,
    /// Position closed.
    Close = 9,
    /// Liveness record.
    Heartbeat = 98,
}

impl EventType {
    /// Numeric `EventTypeCode`.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Parse a numeric code.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Signal),
            2 => Some(Self::Order),
            3 => Some(Self::Ack),
            4 => Some(Self::Execute),
            5 => Some(Self::Partial),
            6 => Some(Self::Reject),
            8 => Some(Self::Modify),
            9 => Some(Self::Close),
            98 => Some(Self::Heartbeat),
            _ => None,
        }
    }

    /// Short tag written to `Header.EventType`.
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Signal => "SIG",
            Self::Order => "ORD",
            Self::Ack => "ACK",
            Self::Execute => "EXE",
            Self::Partial => "PRT",
            Self::Reject => "REJ",
            Self::Modify => "MOD",
            Self::Close => "CLS",
            Self::Heartbeat => "HBT",
        }
    }

    /// Parse either the short tag or the long name.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "SIG" | "SIGNAL" => Some(Self::Signal),
            "ORD" | "ORDER" => Some(Self::Order),
            "ACK" => Some(Self::Ack),
            "EXE" | "EXECUTE" | "EXECUTION" => Some(Self::Execute),
            "PRT" | "PARTIAL" => Some(Self::Partial),
            "REJ" | "REJECT" => Some(Self::Reject),
            "MOD" | "MODIFY" => Some(Self::Modify),
            "CLS" | "CLOSE" => Some(Self::Close),
            "HBT" | "HEARTBEAT" => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Declared conformance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConformanceTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl ConformanceTier {
    /// Tag as written in records.
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Bronze => "BRONZE",
            Self::Silver => "SILVER",
            Self::Gold => "GOLD",
            Self::Platinum => "PLATINUM",
        }
    }

    /// Parse a tag, ignoring case.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "BRONZE" => Some(Self::Bronze),
            "SILVER" => Some(Self::Silver),
            "GOLD" => Some(Self::Gold),
            "PLATINUM" => Some(Self::Platinum),
            _ => None,
        }
    }
}

/// Which verification layers a deployment commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VerificationDepth {
    pub hash_chain: bool,
    pub signature: bool,
    pub merkle_tree: bool,
    pub external_anchor: bool,
}

impl VerificationDepth {
    /// Depth implied by a conformance tier.
    pub fn for_tier(tier: ConformanceTier) -> Self {
        match tier {
            ConformanceTier::Bronze => Self {
                hash_chain: false,
                signature: true,
                merkle_tree: false,
                external_anchor: false,
            },
            ConformanceTier::Silver => Self {
                hash_chain: false,
                signature: true,
                merkle_tree: true,
                external_anchor: true,
            },
            ConformanceTier::Gold | ConformanceTier::Platinum => Self {
                hash_chain: true,
                signature: true,
                merkle_tree: true,
                external_anchor: true,
            },
        }
    }
}

/// The policy block carried in each v1.1 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyIdentification {
    #[serde(rename = "PolicyID")]
    pub policy_id: String,
    pub conformance_tier: ConformanceTier,
    #[serde(default)]
    pub verification_depth: VerificationDepth,
}

impl PolicyIdentification {
    /// Standard policy block for a tier.
    pub fn for_tier(tier: ConformanceTier) -> Self {
        Self {
            policy_id: format!("org.veritaschain.vcp.v1.1.{}", tier.as_tag().to_lowercase()),
            conformance_tier: tier,
            verification_depth: VerificationDepth::for_tier(tier),
        }
    }
}

/// Event metadata committed to by the EventHash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "EventID")]
    pub event_id: String,

    #[serde(rename = "TraceID")]
    pub trace_id: String,

    /// Unix milliseconds.
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,

    /// Raw tag; see [`Header::kind`] for the parsed form.
    #[serde(rename = "EventType")]
    pub event_type: String,

    /// Remaining header fields exactly as persisted, explicit nulls included
    /// (TimestampISO, VCPVersion, Tier, VenueID, Symbol, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Header {
    /// Parsed event type, if the tag is a known one.
    pub fn kind(&self) -> Option<EventType> {
        EventType::from_tag(&self.event_type)
    }

    /// `EventTypeCode`, if present.
    pub fn event_type_code(&self) -> Option<u64> {
        self.extra.get(keys::EVENT_TYPE_CODE).and_then(Value::as_u64)
    }

    /// `SequenceNumber`, if present.
    pub fn sequence_number(&self) -> Option<u64> {
        self.extra.get(keys::SEQUENCE_NUMBER).and_then(Value::as_u64)
    }

    /// `HashAlgo` declared in the header, if present.
    pub fn hash_algo(&self) -> Option<&str> {
        self.extra.get(keys::HASH_ALGO).and_then(Value::as_str)
    }

    /// `TimestampISO`, if present and a string.
    pub fn timestamp_iso(&self) -> Option<&str> {
        self.extra.get(keys::TIMESTAMP_ISO).and_then(Value::as_str)
    }

    /// `VCPVersion`, if present and a string.
    pub fn vcp_version(&self) -> Option<&str> {
        self.extra.get(keys::VCP_VERSION).and_then(Value::as_str)
    }

    /// `Tier`, if it names a known conformance tier.
    pub fn tier(&self) -> Option<ConformanceTier> {
        self.extra
            .get(keys::TIER)
            .and_then(Value::as_str)
            .and_then(ConformanceTier::from_tag)
    }

    /// Fill `VCPVersion` unless the header already carries the key, even as null.
    pub fn default_vcp_version(&mut self, version: &str) {
        self.extra
            .entry(keys::VCP_VERSION)
            .or_insert_with(|| Value::from(version));
    }

    /// Fill `Tier` unless the header already carries the key.
    pub fn default_tier(&mut self, tier: ConformanceTier) {
        self.extra
            .entry(keys::TIER)
            .or_insert_with(|| Value::from(tier.as_tag()));
    }
}

/// Domain payload. Opaque to the integrity engine apart from the policy block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(pub Map<String, Value>);

impl Payload {
    /// Empty payload.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Insert a field, returning `self` for chaining.
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    /// `PolicyIdentification.PolicyID` when it is a non-empty string.
    pub fn policy_id(&self) -> Option<&str> {
        self.0
            .get(keys::POLICY_IDENTIFICATION)
            .and_then(|block| block.get(keys::POLICY_ID))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// The policy block, if present and well formed.
    pub fn policy_identification(&self) -> Option<PolicyIdentification> {
        self.0
            .get(keys::POLICY_IDENTIFICATION)
            .and_then(|block| serde_json::from_value(block.clone()).ok())
    }

    /// Declared verification depth, if the policy block carries one.
    pub fn verification_depth(&self) -> Option<VerificationDepth> {
        self.policy_identification().map(|p| p.verification_depth)
    }

    /// Store a policy block.
    pub fn set_policy_identification(&mut self, policy: &PolicyIdentification) -> Result<()> {
        let value = serde_json::to_value(policy)?;
        self.0.insert(keys::POLICY_IDENTIFICATION.to_string(), value);
        Ok(())
    }

    pub fn has_policy_identification(&self) -> bool {
        self.0.contains_key(keys::POLICY_IDENTIFICATION)
    }
}

/// Integrity metadata. Not covered by the EventHash.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Security {
    #[serde(default)]
    pub event_hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_algo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_algo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(rename = "KeyID", default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_index: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_reference: Option<AnchorReference>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Security {
    /// PrevHash when linking is in use. An empty string counts as absent.
    pub fn linked_prev_hash(&self) -> Option<&str> {
        self.prev_hash.as_deref().filter(|h| !h.is_empty())
    }

    /// MerkleRoot, ignoring empty strings.
    pub fn batch_root(&self) -> Option<&str> {
        self.merkle_root.as_deref().filter(|h| !h.is_empty())
    }

    /// Whether a usable AnchorReference is attached.
    pub fn has_anchor_reference(&self) -> bool {
        self.anchor_reference
            .as_ref()
            .map(|r| !r.anchor_id.is_empty())
            .unwrap_or(false)
    }
}

/// A complete VCP event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    pub header: Header,
    pub payload: Payload,
    #[serde(default)]
    pub security: Security,
}

impl Event {
    /// Hash algorithm declared by the event itself.
    ///
    /// `Security.HashAlgo` wins over `Header.HashAlgo`; `None` when neither is set.
    pub fn declared_hash_algo(&self) -> Option<Result<HashAlgorithm>> {
        self.security
            .hash_algo
            .as_deref()
            .or_else(|| self.header.hash_algo())
            .map(str::parse)
    }

    /// Recompute the EventHash from header, payload and the stored PrevHash.
    pub fn compute_hash(&self, algo: HashAlgorithm) -> Result<Digest> {
        compute_event_hash(
            &self.header,
            &self.payload,
            self.security.linked_prev_hash(),
            algo,
        )
    }

    /// Serialize as one JSONL line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Fluent construction of unsealed events.
///
/// ```
/// use vcp_chain_core::{EventBuilder, EventType, Payload};
/// use serde_json::json;
///
/// let event = EventBuilder::new(EventType::Signal, "trace-001")
///     .timestamp(1736870400000)
///     .header_field("Symbol", json!("USDJPY"))
///     .payload(Payload::new().with("Direction", json!("BUY")))
///     .build();
/// assert_eq!(event.header.event_type, "SIG");
/// ```
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event_type: EventType,
    trace_id: String,
    event_id: Option<String>,
    timestamp: i64,
    timestamp_iso: Option<String>,
    vcp_version: String,
    tier: Option<ConformanceTier>,
    extra: Map<String, Value>,
    payload: Payload,
}

impl EventBuilder {
    /// Start a builder for an event in the given trace.
    pub fn new(event_type: EventType, trace_id: &str) -> Self {
        Self {
            event_type,
            trace_id: trace_id.to_string(),
            event_id: None,
            timestamp: 0,
            timestamp_iso: None,
            vcp_version: VCP_VERSION.to_string(),
            tier: None,
            extra: Map::new(),
            payload: Payload::new(),
        }
    }

    /// Event timestamp in Unix milliseconds.
    pub fn timestamp(mut self, millis: i64) -> Self {
        self.timestamp = millis;
        self
    }

    /// ISO-8601 twin of the timestamp.
    pub fn timestamp_iso(mut self, iso: &str) -> Self {
        self.timestamp_iso = Some(iso.to_string());
        self
    }

    /// Fixed event id. Defaults to a fresh time-ordered id.
    pub fn event_id(mut self, id: &str) -> Self {
        self.event_id = Some(id.to_string());
        self
    }

    pub fn vcp_version(mut self, version: &str) -> Self {
        self.vcp_version = version.to_string();
        self
    }

    pub fn tier(mut self, tier: ConformanceTier) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Any additional header field.
    pub fn header_field(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn sequence_number(self, seq: u64) -> Self {
        self.header_field(keys::SEQUENCE_NUMBER, Value::from(seq))
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Build the event with an empty `Security` block.
    pub fn build(self) -> Event {
        let mut extra = self.extra;
        extra
            .entry(keys::EVENT_TYPE_CODE)
            .or_insert_with(|| Value::from(self.event_type.code()));
        extra
            .entry(keys::VCP_VERSION)
            .or_insert_with(|| Value::from(self.vcp_version));
        if let Some(iso) = self.timestamp_iso {
            extra.entry(keys::TIMESTAMP_ISO).or_insert_with(|| Value::from(iso));
        }
        if let Some(tier) = self.tier {
            extra.entry(keys::TIER).or_insert_with(|| Value::from(tier.as_tag()));
        }

        Event {
            header: Header {
                event_id: self
                    .event_id
                    .unwrap_or_else(|| generate_event_id(self.timestamp)),
                trace_id: self.trace_id,
                timestamp: self.timestamp,
                event_type: self.event_type.as_tag().to_string(),
                extra,
            },
            payload: self.payload,
            security: Security::default(),
        }
    }
}

/// Generate a time-ordered event id in UUIDv7 layout.
///
/// 48-bit millisecond prefix, version nibble 7, RFC 4122 variant, random tail.
/// Ids sort by creation time to the millisecond.
pub fn generate_event_id(timestamp_millis: i64) -> String {
    let millis = (timestamp_millis.max(0) as u64) & 0xFFFF_FFFF_FFFF;
    let mut rng = rand::thread_rng();
    let rand_a: u16 = rng.gen::<u16>() & 0x0FFF;
    let rand_b: u64 = rng.gen::<u64>() & 0x3FFF_FFFF_FFFF_FFFF;

    format!(
        "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
        millis >> 16,
        millis & 0xFFFF,
        0x7000 | rand_a,
        0x8000 | (rand_b >> 48),
        rand_b & 0xFFFF_FFFF_FFFF
    )
}

/// Parse a JSONL event sequence.
///
/// Blank lines are skipped. The first line that does not parse aborts the
/// whole read with its 1-based line number.
pub fn parse_jsonl(input: &str) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = serde_json::from_str(line).map_err(|e| CoreError::MalformedEvent {
            line: i + 1,
            reason: e.to_string(),
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Serialize events as JSONL, one event per line, in order.
pub fn to_jsonl(events: &[Event]) -> Result<String> {
    let mut out = String::new();
    for event in events {
        out.push_str(&event.to_json_line()?);
        out.push('\n');
    }
    Ok(out)
}
