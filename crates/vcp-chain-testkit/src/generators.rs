//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use vcp_chain_core::{Digest, Event, EventBuilder, EventType, Keypair, Payload};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random digest.
pub fn digest() -> impl Strategy<Value = Digest> {
    any::<[u8; 32]>().prop_map(Digest::from_bytes)
}

/// Generate a batch of leaf digests.
pub fn leaves(max_len: usize) -> impl Strategy<Value = Vec<Digest>> {
    prop::collection::vec(digest(), 1..=max_len)
}

/// Generate an EventType.
pub fn event_type() -> impl Strategy<Value = EventType> {
    prop_oneof![
        Just(EventType::Signal),
        Just(EventType::Order),
        Just(EventType::Ack),
        Just(EventType::Execute),
        Just(EventType::Partial),
        Just(EventType::Reject),
        Just(EventType::Modify),
        Just(EventType::Close),
        Just(EventType::Heartbeat),
    ]
}

/// Generate a payload field name.
pub fn field_name() -> impl Strategy<Value = String> {
    "[A-Z][A-Za-z0-9]{0,11}".prop_map(String::from)
}

/// Generate a JSON scalar.
///
/// Floats are quarter steps so they survive a JSON round trip exactly.
pub fn json_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-4_000_000i32..4_000_000).prop_map(|q| Value::from(f64::from(q) / 4.0)),
        "[ -~àéü日本]{0,16}".prop_map(Value::String),
    ]
}

/// Generate a JSON value nested a few levels deep.
pub fn json_value() -> impl Strategy<Value = Value> {
    json_scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(field_name(), inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generate a payload.
pub fn payload() -> impl Strategy<Value = Payload> {
    prop::collection::btree_map(field_name(), json_value(), 0..6)
        .prop_map(|m| Payload(m.into_iter().collect::<Map<String, Value>>()))
}

/// Parameters for generating an event.
#[derive(Debug, Clone)]
pub struct EventParams {
    pub event_type: EventType,
    pub trace_id: String,
    /// Milliseconds after the previous event.
    pub delay: i64,
    pub payload: Payload,
}

impl Arbitrary for EventParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            event_type(),
            "trace-[a-z0-9]{1,8}",
            0i64..=60_000, // delay
            payload(),
        )
            .prop_map(|(event_type, trace_id, delay, payload)| EventParams {
                event_type,
                trace_id,
                delay,
                payload,
            })
            .boxed()
    }
}

/// Generate parameters for a chain of `1..=max_len` events.
pub fn chain_params(max_len: usize) -> impl Strategy<Value = Vec<EventParams>> {
    prop::collection::vec(any::<EventParams>(), 1..=max_len)
}

/// Build an event from parameters.
pub fn event_from_params(params: &EventParams, index: usize, timestamp: i64) -> Event {
    EventBuilder::new(params.event_type, &params.trace_id)
        .event_id(&format!("evt-{index}"))
        .timestamp(timestamp)
        .payload(params.payload.clone())
        .build()
}

/// Build a chain of events with non-decreasing timestamps.
pub fn events_from_params(params: &[EventParams], start: i64) -> Vec<Event> {
    let mut timestamp = start;
    params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            timestamp += p.delay;
            event_from_params(p, i, timestamp)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcp_chain::{ChainProducer, ProducerConfig};
    use vcp_chain_core::{
        canonicalize, parse_jsonl, to_jsonl, verify_audit_path, ChainVerifier, HashAlgorithm,
        MerkleTree, VerifierConfig, ViolationKind,
    };

    proptest! {
        #[test]
        fn test_event_hash_deterministic(params: EventParams) {
            let e1 = event_from_params(&params, 0, 1000);
            let e2 = event_from_params(&params, 0, 1000);

            prop_assert_eq!(
                e1.compute_hash(HashAlgorithm::Sha256).unwrap(),
                e2.compute_hash(HashAlgorithm::Sha256).unwrap()
            );
        }

        #[test]
        fn test_canonical_bytes_ignore_insertion_order(value in json_value()) {
            let reversed = match &value {
                Value::Object(map) => {
                    let mut entries: Vec<_> = map.iter().collect();
                    entries.reverse();
                    Value::Object(
                        entries
                            .into_iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                    )
                }
                other => other.clone(),
            };

            prop_assert_eq!(canonicalize(&value).unwrap(), canonicalize(&reversed).unwrap());
        }

        #[test]
        fn test_jsonl_round_trip_preserves_hashes(params in chain_params(6)) {
            let mut producer = ChainProducer::new(ProducerConfig::default());
            for event in events_from_params(&params, 1736870400000) {
                producer.append(event).unwrap();
            }

            let reread = parse_jsonl(&to_jsonl(producer.events()).unwrap()).unwrap();
            for (original, copy) in producer.events().iter().zip(&reread) {
                prop_assert_eq!(
                    &copy.compute_hash(HashAlgorithm::Sha256).unwrap().to_hex(),
                    &original.security.event_hash
                );
            }
        }

        #[test]
        fn test_any_payload_tamper_detected(
            params in chain_params(8),
            pick in any::<prop::sample::Index>(),
            value in json_scalar(),
        ) {
            let mut producer = ChainProducer::new(ProducerConfig::default());
            for event in events_from_params(&params, 1736870400000) {
                producer.append(event).unwrap();
            }
            producer.close_batch().unwrap();

            let mut events = producer.into_events();
            let target = pick.index(events.len());
            let tampered = events[target].payload.0.insert("Tampered".to_string(), value);
            prop_assume!(tampered.is_none());

            let report = ChainVerifier::new(VerifierConfig::default())
                .verify(&events)
                .unwrap();
            prop_assert_eq!(report.indexes_of(ViolationKind::HashMismatch), vec![target]);
            prop_assert_eq!(report.violations.len(), 1);
        }

        #[test]
        fn test_every_audit_path_verifies(leaves in leaves(40)) {
            let tree = MerkleTree::build(&leaves).unwrap();
            let root = tree.root();
            for (i, leaf) in leaves.iter().enumerate() {
                let path = tree.audit_path(i).unwrap();
                prop_assert!(verify_audit_path(leaf, i, &path, &root));
            }
        }

        #[test]
        fn test_audit_path_rejects_foreign_leaf(leaves in leaves(40), stranger in digest()) {
            prop_assume!(!leaves.contains(&stranger));
            let tree = MerkleTree::build(&leaves).unwrap();
            let path = tree.audit_path(0).unwrap();
            prop_assert!(!verify_audit_path(&stranger, 0, &path, &tree.root()));
        }
    }
}
