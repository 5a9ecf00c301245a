//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the canonical encoding, the EventHash construction and
//! the Merkle tree shape. Any implementation that reads or writes VCP chains
//! must reproduce them byte for byte.

use vcp_chain_core::{
    canonicalize_serialize, compute_event_hash, compute_root, Digest, HashAlgorithm, Header,
    Payload, Result, GENESIS_HASH,
};

/// One EventHash vector.
#[derive(Debug, Clone)]
pub struct EventVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Header as written by a producer.
    pub header: &'static str,
    /// Payload as written by a producer.
    pub payload: &'static str,
    /// PrevHash, or `None` when linking is off.
    pub prev_hash: Option<&'static str>,
    pub canonical_header: &'static str,
    pub canonical_payload: &'static str,
    /// Expected SHA-256 EventHash (hex).
    pub expected_hash: &'static str,
}

/// Get all EventHash vectors.
pub fn all_vectors() -> Vec<EventVector> {
    vec![
        EventVector {
            name: "order at genesis",
            header: r#"{"EventID":"0194658b-1000-7000-8000-000000000001","TraceID":"trace-golden","Timestamp":1736870400000,"EventType":"ORD","VCPVersion":"1.1","EventTypeCode":2,"Symbol":"USDJPY"}"#,
            payload: r#"{"Side":"BUY","Quantity":1000,"Price":150.25,"Note":"café"}"#,
            prev_hash: Some(GENESIS_HASH),
            canonical_header: r#"{"EventID":"0194658b-1000-7000-8000-000000000001","EventType":"ORD","EventTypeCode":2,"Symbol":"USDJPY","Timestamp":1736870400000,"TraceID":"trace-golden","VCPVersion":"1.1"}"#,
            canonical_payload: r#"{"Note":"café","Price":150.25,"Quantity":1000,"Side":"BUY"}"#,
            expected_hash: "96eb45cd8c80dbddd0c4bd7f47408a14e1b8916e470b74a0917bfb71ea77f86a",
        },
        EventVector {
            name: "order without linking",
            header: r#"{"EventID":"0194658b-1000-7000-8000-000000000001","TraceID":"trace-golden","Timestamp":1736870400000,"EventType":"ORD","VCPVersion":"1.1","EventTypeCode":2,"Symbol":"USDJPY"}"#,
            payload: r#"{"Side":"BUY","Quantity":1000,"Price":150.25,"Note":"café"}"#,
            prev_hash: None,
            canonical_header: r#"{"EventID":"0194658b-1000-7000-8000-000000000001","EventType":"ORD","EventTypeCode":2,"Symbol":"USDJPY","Timestamp":1736870400000,"TraceID":"trace-golden","VCPVersion":"1.1"}"#,
            canonical_payload: r#"{"Note":"café","Price":150.25,"Quantity":1000,"Side":"BUY"}"#,
            expected_hash: "537df55cc9f83b84e899558bd62449a47140fac1ad2f73111b0c7f9c159a7096",
        },
        EventVector {
            name: "nested payload with integral floats",
            header: r#"{"EventID":"vec-3","TraceID":"trace-vec","Timestamp":0,"EventType":"SIG","EventTypeCode":1}"#,
            payload: r#"{"Model":{"Name":"m1","Weights":[1.0,0.5,-2]},"Confidence":100.0,"Flag":true,"Empty":null}"#,
            prev_hash: Some("abababababababababababababababababababababababababababababababab"),
            canonical_header: r#"{"EventID":"vec-3","EventType":"SIG","EventTypeCode":1,"Timestamp":0,"TraceID":"trace-vec"}"#,
            canonical_payload: r#"{"Confidence":100,"Empty":null,"Flag":true,"Model":{"Name":"m1","Weights":[1,0.5,-2]}}"#,
            expected_hash: "d817ed4136b3a778b9075b3ddfc7642b8fd0f3c861b61bc96d621cb526557212",
        },
        EventVector {
            name: "string escapes and non-ASCII keys",
            header: r#"{"EventID":"vec-4","TraceID":"trace-vec","Timestamp":1736870400000,"EventType":"REJ","EventTypeCode":6}"#,
            payload: r#"{"Text":"line\nbreak \"quoted\" \\ tab\t","Ünïcode":"日本"}"#,
            prev_hash: Some(GENESIS_HASH),
            canonical_header: r#"{"EventID":"vec-4","EventType":"REJ","EventTypeCode":6,"Timestamp":1736870400000,"TraceID":"trace-vec"}"#,
            canonical_payload: r#"{"Text":"line\nbreak \"quoted\" \\ tab\t","Ünïcode":"日本"}"#,
            expected_hash: "a28ea7d5a0b45f6c5125792798dda98ea11072a168539b7cd907344b92225933",
        },
        EventVector {
            name: "heartbeat with empty payload",
            header: r#"{"EventID":"vec-5","TraceID":"trace-vec","Timestamp":1736870400001,"EventType":"HBT","EventTypeCode":98}"#,
            payload: "{}",
            prev_hash: None,
            canonical_header: r#"{"EventID":"vec-5","EventType":"HBT","EventTypeCode":98,"Timestamp":1736870400001,"TraceID":"trace-vec"}"#,
            canonical_payload: "{}",
            expected_hash: "cb2d5586896402c0dbd1efccdde88ffa56ceca743141700844d9721cb13333a2",
        },
    ]
}

/// Parse a vector's header and payload.
pub fn parse_vector(vector: &EventVector) -> Result<(Header, Payload)> {
    let header = serde_json::from_str(vector.header)?;
    let payload = serde_json::from_str(vector.payload)?;
    Ok((header, payload))
}

/// EventHash of a vector as this implementation computes it.
pub fn compute_vector_hash(vector: &EventVector) -> Result<Digest> {
    let (header, payload) = parse_vector(vector)?;
    compute_event_hash(&header, &payload, vector.prev_hash, HashAlgorithm::Sha256)
}

/// Check every vector: `(name, matches, computed hash)`.
///
/// Call this to verify your implementation matches the reference.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let computed = compute_vector_hash(v)
                .map(|d| d.to_hex())
                .unwrap_or_else(|e| format!("error: {e}"));
            (v.name.to_string(), computed == v.expected_hash, computed)
        })
        .collect()
}

/// Expected roots over `merkle_leaves(n)` for n = 1..=8.
pub const MERKLE_ROOTS: [&str; 8] = [
    "3f16c0c2cd28088814f15c300b46158e83203cde690169a74602ca926fa2a8bc",
    "d3b4dcb90fabca433a71833cdc3f15c8827a424cf3f138675bccd1fca5b5bc76",
    "17b728310cebcc8bacd012024a708aa1a537ee01a4ce8881d2a803ebb3156d05",
    "3c83971924586eff51ef0248eb89b444439bad1cf54802638da4b099b91a8f6f",
    "2547bc21863a7989f484cf2be15bf376a8a726f31381ebece03a8431603f5a5d",
    "9bceba39e5808962841a04cd2c69391a9b12afbc11f1a3a06f26e90d3b466815",
    "5d1a589fae6e1b4d2b212b90976159488957ddc2e2e0ec40d8e7a8b5fbdd3424",
    "c94e876e476d5257af7de8633699075cae82e4cfeea7844b363651c79e9ff523",
];

/// Leaves `SHA-256("leaf-0")`, `SHA-256("leaf-1")`, ...
pub fn merkle_leaves(n: usize) -> Vec<Digest> {
    (0..n)
        .map(|i| Digest::sha256(format!("leaf-{i}").as_bytes()))
        .collect()
}
