//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use serde_json::json;
use vcp_chain::{ChainProducer, ProducerConfig};
use vcp_chain_core::{
    ChainVerifier, Event, EventBuilder, EventType, Keypair, Payload, PublicKeyRecord,
    VerifierConfig,
};

/// First timestamp of every fixture chain (2025-01-14T16:00:00Z).
pub const FIXTURE_EPOCH: i64 = 1736870400000;

/// How a fixture chain is built.
#[derive(Debug, Clone, Copy)]
pub struct ChainShape {
    pub linked: bool,
    pub signed: bool,
    pub sealed: bool,
}

impl Default for ChainShape {
    fn default() -> Self {
        Self {
            linked: true,
            signed: true,
            sealed: true,
        }
    }
}

impl ChainShape {
    pub fn unlinked(mut self) -> Self {
        self.linked = false;
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.signed = false;
        self
    }

    pub fn unsealed(mut self) -> Self {
        self.sealed = false;
        self
    }
}

/// A test fixture with a signing key.
pub struct TestFixture {
    pub seed: [u8; 32],
    pub keypair: Keypair,
    pub key_id: String,
}

impl TestFixture {
    /// Create a new test fixture with a random keypair.
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            seed,
            keypair: Keypair::from_seed(&seed),
            key_id: format!("key-{}", &hex::encode(seed)[..8]),
        }
    }

    pub fn public_key_record(&self) -> PublicKeyRecord {
        self.keypair.public_key_record(&self.key_id)
    }

    /// A producer that signs with this fixture's key.
    pub fn producer(&self, config: ProducerConfig) -> ChainProducer {
        let config = ProducerConfig {
            key_id: self.key_id.clone(),
            ..config
        };
        ChainProducer::new(config).with_signer(self.keypair.clone())
    }

    /// A verifier that trusts this fixture's key.
    pub fn verifier(&self, config: VerifierConfig) -> ChainVerifier {
        let verifier = ChainVerifier::new(config);
        match verifier.with_public_key(&self.public_key_record()) {
            Ok(verifier) => verifier,
            Err(e) => panic!("fixture key rejected: {e}"),
        }
    }

    /// Build a chain of `n` trade events.
    pub fn build_chain(&self, n: usize, shape: ChainShape) -> Vec<Event> {
        let config = ProducerConfig {
            use_prev_hash: shape.linked,
            ..ProducerConfig::default()
        };

        let mut producer = if shape.signed {
            self.producer(config)
        } else {
            ChainProducer::new(config)
        };

        for i in 0..n {
            if let Err(e) = producer.append(trade_event(i)) {
                panic!("fixture append {i} failed: {e}");
            }
        }
        if shape.sealed && n > 0 {
            if let Err(e) = producer.close_batch() {
                panic!("fixture seal failed: {e}");
            }
        }
        producer.into_events()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple test fixtures with distinct keys.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::with_seed(seed)
        })
        .collect()
}

/// Deterministic trade event `evt-{i+1}`: orders and executions in turn,
/// 100 ms apart.
pub fn trade_event(i: usize) -> Event {
    let kind = if i % 2 == 0 {
        EventType::Order
    } else {
        EventType::Execute
    };
    EventBuilder::new(kind, "trace-fixture")
        .event_id(&format!("evt-{}", i + 1))
        .timestamp(FIXTURE_EPOCH + 100 * i as i64)
        .header_field("Symbol", json!("USDJPY"))
        .payload(
            Payload::new()
                .with("Side", json!(if i % 4 < 2 { "BUY" } else { "SELL" }))
                .with("Quantity", json!(1000 * (i + 1)))
                .with("Price", json!(150.25 + i as f64 * 0.25)),
        )
        .build()
}
