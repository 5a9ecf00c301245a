//! AnchorBinder: one outstanding attestation request with bounded retries.
//!
//! A closed batch's root is first captured as a local PENDING record, so it
//! exists before any network call is made. The binder then submits the root,
//! retrying transient failures with jittered exponential backoff and an
//! explicit per-request timeout. When the budget runs out the PENDING record
//! is handed back inside [`AnchorError::Exhausted`].

use std::time::Duration;

use rand::Rng;
use tracing::{error, info, warn};
use vcp_chain_core::event::generate_event_id;
use vcp_chain_core::{AnchorRecord, Digest, Keypair};

use crate::error::{AnchorError, Result};
use crate::service::{unix_millis, AnchorService};

/// Retry and timeout policy.
#[derive(Debug, Clone)]
pub struct AnchorConfig {
    /// Total submissions before giving up (at least one is always made).
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Random spread applied to each delay, as a fraction in `[0, 1]`.
    pub jitter: f64,
    /// Limit for one submission.
    pub request_timeout: Duration,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.2,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl AnchorConfig {
    /// Delay after failed attempt `attempt` (1-based), before jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// [`Self::delay_for_attempt`] spread by up to `jitter` in either direction.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        let spread = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if spread == 0.0 {
            return base;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-spread..=spread);
        base.mul_f64(factor).min(self.max_backoff)
    }
}

/// Binds batch roots to an external anchor service.
pub struct AnchorBinder<S: AnchorService> {
    service: S,
    config: AnchorConfig,
    signer: Option<(String, Keypair)>,
}

impl<S: AnchorService> AnchorBinder<S> {
    pub fn new(service: S, config: AnchorConfig) -> Self {
        Self {
            service,
            config,
            signer: None,
        }
    }

    /// Sign every record this binder produces.
    pub fn with_signer(mut self, key_id: &str, keypair: Keypair) -> Self {
        self.signer = Some((key_id.to_string(), keypair));
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// Capture a closed batch as a local PENDING record.
    pub fn begin(&self, merkle_root: &Digest, event_count: u64) -> Result<AnchorRecord> {
        let now = unix_millis();
        let mut record = AnchorRecord::pending(
            &generate_event_id(now),
            merkle_root,
            event_count,
            self.service.target(),
            now,
        );
        self.sign(&mut record)?;
        Ok(record)
    }

    /// Attest a PENDING record in place.
    ///
    /// On failure `record` is left PENDING; on exhaustion a copy of it also
    /// travels in the error.
    pub async fn confirm(&self, record: &mut AnchorRecord) -> Result<()> {
        let root = Digest::from_hex(&record.merkle_root)?;
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            // Phase 1: Submit under the request timeout
            let submission = self.service.submit(&root, record.event_count);
            let outcome = match tokio::time::timeout(self.config.request_timeout, submission).await
            {
                Ok(result) => result,
                Err(_) => Err(AnchorError::Timeout(self.config.request_timeout)),
            };

            // Phase 2: Confirm, back off, or give up
            match outcome {
                Ok(attestation) => {
                    record.confirm(attestation.proof, attestation.attested_at);
                    self.sign(record)?;
                    info!(
                        anchor_id = %record.anchor_id,
                        root = %record.merkle_root,
                        events = record.event_count,
                        attempt,
                        "anchor confirmed"
                    );
                    return Ok(());
                }
                Err(e) if e.is_transient() => {
                    if attempt < max_attempts {
                        let delay = self.config.jittered_delay(attempt);
                        warn!(
                            anchor_id = %record.anchor_id,
                            attempt,
                            ?delay,
                            error = %e,
                            "anchor attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
                Err(e) => {
                    error!(anchor_id = %record.anchor_id, error = %e, "anchor rejected");
                    return Err(e);
                }
            }
        }

        let last_error = last_error.map(|e| e.to_string()).unwrap_or_default();
        error!(
            anchor_id = %record.anchor_id,
            attempts = max_attempts,
            last_error = %last_error,
            "anchor retry budget exhausted, record stays PENDING"
        );
        Err(AnchorError::Exhausted {
            attempts: max_attempts,
            last_error,
            pending: Box::new(record.clone()),
        })
    }

    /// Capture and attest a closed batch's root.
    pub async fn bind_anchor(
        &self,
        merkle_root: &Digest,
        event_count: u64,
    ) -> Result<AnchorRecord> {
        let mut record = self.begin(merkle_root, event_count)?;
        self.confirm(&mut record).await?;
        Ok(record)
    }

    fn sign(&self, record: &mut AnchorRecord) -> Result<()> {
        if let Some((key_id, keypair)) = &self.signer {
            record.sign(key_id, keypair)?;
        }
        Ok(())
    }
}
