//! End-to-end chain scenarios: produce, tamper, verify.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use serde_json::json;
use vcp_chain::anchor::{
    AnchorBinder, AnchorConfig, AnchorError, MemoryAnchorService, MemoryAttestationVerifier,
};
use vcp_chain::core::{
    verify_audit_path, Check, CheckStatus, PolicyIdentification, VerificationDepth,
};
use vcp_chain::{
    await_anchor, spawn_anchor, ChainError, ChainProducer, ChainVerifier, ConformanceTier,
    Digest, Event, EventBuilder, EventType, HashAlgorithm, Keypair, Payload, ProducerConfig,
    VerifierConfig, ViolationKind,
};

const T0: i64 = 1736870400000;

fn make_test_keypair() -> Keypair {
    Keypair::from_seed(&[0x42; 32])
}

/// `evt-1`, `evt-2`, ... alternating orders and executions, 100 ms apart.
fn trade_event(i: usize) -> Event {
    let kind = if i % 2 == 0 {
        EventType::Order
    } else {
        EventType::Execute
    };
    EventBuilder::new(kind, "trace-001")
        .event_id(&format!("evt-{}", i + 1))
        .timestamp(T0 + 100 * i as i64)
        .header_field("Symbol", json!("USDJPY"))
        .payload(
            Payload::new()
                .with("Side", json!("BUY"))
                .with("Quantity", json!(1000 + i))
                .with("Price", json!(150.25)),
        )
        .build()
}

fn produce(n: usize, config: ProducerConfig, sealed: bool) -> Vec<Event> {
    let mut producer = ChainProducer::new(config).with_signer(make_test_keypair());
    for i in 0..n {
        producer.append(trade_event(i)).unwrap();
    }
    if sealed {
        producer.close_batch().unwrap();
    }
    producer.into_events()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn signed_verifier(config: VerifierConfig) -> ChainVerifier {
    let key = make_test_keypair().public_key_record("vcp-key-001");
    ChainVerifier::new(config).with_public_key(&key).unwrap()
}

#[test]
fn test_clean_chain_passes() {
    let events = produce(5, ProducerConfig::default(), true);
    let report = signed_verifier(VerifierConfig::default().with_hash_chain(true))
        .verify(&events)
        .unwrap();

    assert!(report.passed(), "{report}");
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.total_events, 5);
    assert_eq!(report.unique_traces, 1);
    assert_eq!(report.event_types.get("ORD"), Some(&3));
    assert_eq!(report.event_types.get("EXE"), Some(&2));
    assert_eq!(report.status(Check::Genesis), CheckStatus::Pass);
    assert_eq!(report.status(Check::Signatures), CheckStatus::Pass);
    assert_eq!(report.status(Check::MerkleRoot), CheckStatus::Pass);
    assert_eq!(report.status(Check::AnchorRecord), CheckStatus::Skipped);
}

#[test]
fn test_deleted_event_breaks_link_after_gap() {
    let mut events = produce(5, ProducerConfig::default(), false);
    events.remove(2);

    let report = signed_verifier(VerifierConfig::default()).verify(&events).unwrap();
    assert!(!report.passed());
    assert_eq!(report.exit_code(), 1);

    // E3 now sits at persisted index 2
    let links = report.violations_of(ViolationKind::PrevHashMismatch);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].index, Some(2));
    assert_eq!(links[0].event_id.as_deref(), Some("evt-4"));
    assert_eq!(
        links[0].expected.as_deref(),
        Some(events[1].security.event_hash.as_str())
    );
    assert_eq!(report.violations.len(), 1);
}

#[test]
fn test_deleted_event_in_sealed_batch() {
    let mut events = produce(5, ProducerConfig::default(), true);
    events.remove(2);

    let report = ChainVerifier::new(VerifierConfig::default())
        .verify(&events)
        .unwrap();

    assert_eq!(report.indexes_of(ViolationKind::PrevHashMismatch), vec![2]);
    assert_eq!(report.indexes_of(ViolationKind::MerkleRootMismatch), vec![0]);
    assert_eq!(report.indexes_of(ViolationKind::MerkleIndexMismatch), vec![2, 3]);
    assert!(!report.has(ViolationKind::HashMismatch));
}

#[test]
fn test_signatures_against_wrong_key() {
    let events = produce(5, ProducerConfig::default(), true);

    let good = signed_verifier(VerifierConfig::default()).verify(&events).unwrap();
    assert!(good.passed(), "{good}");

    let stranger = Keypair::from_seed(&[0x43; 32]).public_key_record("vcp-key-001");
    let bad = ChainVerifier::new(VerifierConfig::default())
        .with_public_key(&stranger)
        .unwrap()
        .verify(&events)
        .unwrap();
    assert_eq!(
        bad.indexes_of(ViolationKind::InvalidSignature),
        vec![0, 1, 2, 3, 4]
    );
    assert_eq!(bad.status(Check::Signatures), CheckStatus::Fail);
}

#[test]
fn test_forged_signature_on_one_event() {
    let mut events = produce(5, ProducerConfig::default(), true);
    let forged = events[2].security.signature.clone().unwrap();
    let flipped = if forged.starts_with('0') { "1" } else { "0" };
    events[2].security.signature = Some(format!("{flipped}{}", &forged[1..]));

    let report = signed_verifier(VerifierConfig::default()).verify(&events).unwrap();
    assert_eq!(report.indexes_of(ViolationKind::InvalidSignature), vec![2]);
    assert_eq!(report.violations.len(), 1);
}

#[test]
fn test_policy_identification_gating() {
    let policy = PolicyIdentification {
        policy_id: "org.example.desk-7".to_string(),
        conformance_tier: ConformanceTier::Silver,
        verification_depth: VerificationDepth::default(),
    };

    let mut producer = ChainProducer::new(ProducerConfig::default());
    for i in 0..5 {
        let mut event = trade_event(i);
        if i != 2 {
            event.payload.set_policy_identification(&policy).unwrap();
        }
        producer.append(event).unwrap();
    }
    let events = producer.into_events();

    let required = ChainVerifier::new(VerifierConfig::default().with_policy_identification(true))
        .verify(&events)
        .unwrap();
    assert_eq!(
        required.indexes_of(ViolationKind::PolicyIdentificationMissing),
        vec![2]
    );
    assert_eq!(required.violations.len(), 1);

    let optional = ChainVerifier::new(VerifierConfig::default())
        .verify(&events)
        .unwrap();
    assert!(optional.passed(), "{optional}");
    assert_eq!(
        optional.status(Check::PolicyIdentification),
        CheckStatus::Skipped
    );
}

#[test]
fn test_genesis_tamper() {
    let mut events = produce(3, ProducerConfig::default(), false);
    events[0].security.prev_hash = Some("11".repeat(32));

    let report = ChainVerifier::new(VerifierConfig::default())
        .verify(&events)
        .unwrap();
    assert_eq!(report.status(Check::Genesis), CheckStatus::Fail);
    assert_eq!(report.indexes_of(ViolationKind::PrevHashMismatch), vec![0]);
    assert_eq!(report.indexes_of(ViolationKind::HashMismatch), vec![0]);
}

#[test]
fn test_field_tamper_detected_at_its_index() {
    let pristine = produce(5, ProducerConfig::default(), true);

    for i in 0..pristine.len() {
        let mut events = pristine.clone();
        events[i]
            .payload
            .0
            .insert("Quantity".to_string(), json!(999_999));

        let report = signed_verifier(VerifierConfig::default()).verify(&events).unwrap();
        assert_eq!(
            report.indexes_of(ViolationKind::HashMismatch),
            vec![i],
            "tamper at {i}"
        );
        assert_eq!(report.violations.len(), 1, "tamper at {i}: {report}");
    }
}

#[test]
fn test_rehashed_tamper_breaks_next_link_and_root() {
    let pristine = produce(5, ProducerConfig::default(), true);

    for i in 0..pristine.len() {
        let mut events = pristine.clone();
        events[i].header.timestamp += 1;
        events[i].security.event_hash = events[i]
            .compute_hash(HashAlgorithm::Sha256)
            .unwrap()
            .to_hex();

        let report = ChainVerifier::new(VerifierConfig::default())
            .verify(&events)
            .unwrap();
        assert!(!report.has(ViolationKind::HashMismatch), "tamper at {i}");
        assert!(report.has(ViolationKind::MerkleRootMismatch), "tamper at {i}");

        let expected_links: Vec<usize> = if i + 1 < events.len() { vec![i + 1] } else { vec![] };
        assert_eq!(
            report.indexes_of(ViolationKind::PrevHashMismatch),
            expected_links,
            "tamper at {i}"
        );
    }
}

#[test]
fn test_reordered_linked_chain() {
    let mut events = produce(5, ProducerConfig::default(), false);
    events.swap(1, 2);

    let report = ChainVerifier::new(VerifierConfig::default())
        .verify(&events)
        .unwrap();
    assert_eq!(report.indexes_of(ViolationKind::TimestampOrderViolation), vec![2]);
    assert_eq!(report.indexes_of(ViolationKind::PrevHashMismatch), vec![1, 2, 3]);
    assert!(!report.has(ViolationKind::HashMismatch));
}

#[test]
fn test_reordered_unlinked_chain() {
    let mut events = produce(5, ProducerConfig::default().without_prev_hash(), false);
    events.swap(1, 2);

    let report = ChainVerifier::new(VerifierConfig::default())
        .verify(&events)
        .unwrap();
    assert_eq!(report.status(Check::HashChain), CheckStatus::Skipped);
    assert_eq!(report.indexes_of(ViolationKind::TimestampOrderViolation), vec![2]);
    assert_eq!(report.violations.len(), 1);
}

#[test]
fn test_odd_batch_sizes() {
    for n in [1usize, 3, 7] {
        let mut producer = ChainProducer::new(ProducerConfig::default());
        for i in 0..n {
            producer.append(trade_event(i)).unwrap();
        }
        let seal = producer.close_batch().unwrap();

        for i in 0..n {
            let leaf = Digest::from_hex(&producer.events()[i].security.event_hash).unwrap();
            let path = producer.audit_path(i).unwrap();
            assert!(verify_audit_path(&leaf, i, &path, &seal.root), "n={n} i={i}");
        }

        let report = ChainVerifier::new(VerifierConfig::default())
            .verify(producer.events())
            .unwrap();
        assert!(report.passed(), "n={n}: {report}");
        assert_eq!(report.batches.len(), 1);
        assert_eq!(
            report.batches[0].computed_root.as_deref(),
            Some(seal.root.to_hex().as_str())
        );
    }
}

proptest! {
    #[test]
    fn test_any_batch_split_verifies(cuts in prop::collection::vec(1usize..5, 1..5)) {
        let mut producer = ChainProducer::new(ProducerConfig::default());
        let mut next = 0;
        for len in &cuts {
            for _ in 0..*len {
                producer.append(trade_event(next)).unwrap();
                next += 1;
            }
            producer.close_batch().unwrap();
        }

        let report = ChainVerifier::new(VerifierConfig::default())
            .verify(producer.events())
            .unwrap();
        prop_assert!(report.passed(), "{}", report);
        prop_assert_eq!(report.batches.len(), cuts.len());
    }
}

#[test]
fn test_merkle_required_without_batches() {
    let events = produce(3, ProducerConfig::default(), false);
    let config = VerifierConfig {
        require_merkle_root: true,
        ..VerifierConfig::default()
    };
    let report = ChainVerifier::new(config).verify(&events).unwrap();
    assert_eq!(
        report.indexes_of(ViolationKind::MerkleRootMismatch),
        vec![0, 1, 2]
    );
}

#[tokio::test]
async fn test_concurrent_anchoring_passes_silver() {
    init_tracing();
    let mut producer = ChainProducer::new(ProducerConfig::for_tier(ConformanceTier::Silver))
        .with_signer(make_test_keypair());
    for i in 0..3 {
        producer.append(trade_event(i)).unwrap();
    }
    let seal = producer.close_batch().unwrap();

    let service = MemoryAnchorService::new().with_latency(Duration::from_millis(50));
    let binder = Arc::new(
        AnchorBinder::new(service, AnchorConfig::default())
            .with_signer("vcp-key-001", make_test_keypair()),
    );
    let task = spawn_anchor(Arc::clone(&binder), &seal);

    // Production continues while the root is out for attestation.
    for i in 3..5 {
        producer.append(trade_event(i)).unwrap();
    }

    let record = await_anchor(task).await.unwrap();
    assert!(record.is_confirmed());
    assert_eq!(producer.attach_anchor(&record).unwrap(), 3);
    assert_eq!(binder.service().anchored(), vec![(seal.root, 3)]);

    let report = signed_verifier(VerifierConfig::for_tier(ConformanceTier::Silver))
        .with_anchor(record)
        .with_attestation_verifier(Arc::new(MemoryAttestationVerifier))
        .verify(producer.events())
        .unwrap();
    assert!(report.passed(), "{report}");
    assert_eq!(report.status(Check::AnchorRecord), CheckStatus::Pass);
    assert_eq!(report.status(Check::AnchorReference), CheckStatus::Pass);
}

#[tokio::test]
async fn test_exhausted_anchoring_leaves_pending_record() {
    init_tracing();
    let mut producer = ChainProducer::new(ProducerConfig::default());
    for i in 0..4 {
        producer.append(trade_event(i)).unwrap();
    }
    let seal = producer.close_batch().unwrap();

    let config = AnchorConfig {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
        ..AnchorConfig::default()
    };
    let binder = Arc::new(AnchorBinder::new(
        MemoryAnchorService::new().failing_first(10),
        config,
    ));

    let pending = match await_anchor(spawn_anchor(Arc::clone(&binder), &seal)).await {
        Err(ChainError::Anchor(error @ AnchorError::Exhausted { .. })) => {
            error.into_pending().unwrap()
        }
        other => panic!("expected exhaustion, got {other:?}"),
    };
    assert_eq!(binder.service().calls(), 2);
    assert!(!pending.is_confirmed());
    assert_eq!(pending.merkle_root, seal.root.to_hex());

    producer.attach_anchor(&pending).unwrap();
    let report = ChainVerifier::new(VerifierConfig::default())
        .with_anchor(pending)
        .with_attestation_verifier(Arc::new(MemoryAttestationVerifier))
        .verify(producer.events())
        .unwrap();
    assert_eq!(report.violations_of(ViolationKind::AnchorProofInvalid).len(), 1);
    assert_eq!(report.status(Check::AnchorRecord), CheckStatus::Fail);
}

#[tokio::test]
async fn test_anchor_record_for_wrong_batch() {
    let mut producer = ChainProducer::new(ProducerConfig::default());
    for i in 0..3 {
        producer.append(trade_event(i)).unwrap();
    }
    producer.close_batch().unwrap();

    let binder = AnchorBinder::new(MemoryAnchorService::new(), AnchorConfig::default());
    let record = binder
        .bind_anchor(&Digest::sha256(b"some other batch"), 5)
        .await
        .unwrap();

    let report = ChainVerifier::new(VerifierConfig::default())
        .with_anchor(record)
        .verify(producer.events())
        .unwrap();
    assert!(report.has(ViolationKind::AnchorRootMismatch));
    assert!(report.has(ViolationKind::AnchorEventCountMismatch));
}

#[tokio::test]
async fn test_uppercase_anchor_root_still_attests() {
    let mut producer = ChainProducer::new(ProducerConfig::default());
    for i in 0..3 {
        producer.append(trade_event(i)).unwrap();
    }
    let seal = producer.close_batch().unwrap();

    let binder = AnchorBinder::new(MemoryAnchorService::new(), AnchorConfig::default());
    let mut record = binder.bind_anchor(&seal.root, seal.event_count()).await.unwrap();
    record.merkle_root = record.merkle_root.to_uppercase();

    let report = ChainVerifier::new(VerifierConfig::default())
        .with_anchor(record)
        .with_attestation_verifier(Arc::new(MemoryAttestationVerifier))
        .verify(producer.events())
        .unwrap();
    assert!(report.passed(), "{report}");
    assert_eq!(report.status(Check::AnchorRecord), CheckStatus::Pass);
}
