// src/core/services/enrollment.rs
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::crypto::TemplateVault;
use crate::core::features::{KeystrokeSample, Modality, VoiceFeatures};
use crate::core::verify::delegate::DelegatedKeystrokeVerifier;
use crate::core::verify::{keystroke, voice};
use crate::storage::template::{normalize_owner, TemplatePayload, TemplateRecord};
use crate::storage::TemplateStore;
use crate::utils::error::{BiometricError, Result};

/// Result of a successful training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainOutcome {
    pub accepted: bool,
    pub template_version: u32,
    /// First 8 hex characters of the payload checksum, echoed for receipts.
    pub checksum_prefix: String,
    pub sample_count: usize,
}

/// Verification verdict with diagnostic sub-scores. Callers always get the
/// score breakdown, never a bare boolean, so a failed attempt can be
/// explained ("spectral similarity low") rather than just denied.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub authenticated: bool,
    pub score: f64,
    pub sub_scores: SubScores,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "modality", rename_all = "lowercase")]
pub enum SubScores {
    Keystroke {
        mse: f64,
        threshold: f64,
    },
    Voice {
        mfcc: f64,
        spectral: f64,
        tempo: f64,
        pitch: f64,
        confidence: f64,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum ResetScope {
    Modality(Modality),
    All,
}

/// Read-only enrollment view. "Fully set up" is derived, not stored.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub has_keystroke: bool,
    pub has_voice: bool,
    pub keystroke_enrolled_at: Option<DateTime<Utc>>,
    pub voice_enrolled_at: Option<DateTime<Utc>>,
    pub setup_complete: bool,
}

/// Per-(owner, modality) training slots. A second training request for a
/// key already mid-aggregation is rejected rather than queued, so two runs
/// can never interleave into a corrupted template.
#[derive(Default)]
struct TrainingSlots {
    active: Mutex<HashSet<(String, Modality)>>,
}

impl TrainingSlots {
    fn acquire(self: &Arc<Self>, owner: &str, modality: Modality) -> Result<SlotGuard> {
        let key = (owner.to_string(), modality);
        if !self.active.lock().insert(key.clone()) {
            return Err(BiometricError::TrainingInProgress(format!(
                "{owner}/{modality}"
            )));
        }
        Ok(SlotGuard {
            slots: Arc::clone(self),
            key,
        })
    }
}

struct SlotGuard {
    slots: Arc<TrainingSlots>,
    key: (String, Modality),
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slots.active.lock().remove(&self.key);
    }
}

/// Drives the enrollment and verification lifecycle for both modalities.
///
/// Training is all-or-nothing per (owner, modality): samples are validated
/// and aggregated, the delegate retrained where applicable, and only then is
/// the sealed template persisted in a single replace. An abort anywhere
/// before the final write leaves no partial state. Verification never
/// mutates the stored template.
pub struct BiometricService {
    store: Arc<dyn TemplateStore>,
    vault: Arc<TemplateVault>,
    delegate: Arc<dyn DelegatedKeystrokeVerifier>,
    slots: Arc<TrainingSlots>,
}

impl BiometricService {
    pub fn new(
        store: Arc<dyn TemplateStore>,
        vault: Arc<TemplateVault>,
        delegate: Arc<dyn DelegatedKeystrokeVerifier>,
    ) -> Self {
        Self {
            store,
            vault,
            delegate,
            slots: Arc::new(TrainingSlots::default()),
        }
    }

    /// Trains the keystroke template from a full enrollment batch. The raw
    /// sample set is what gets persisted: the delegated verifier retrains
    /// on it and owns the learned model.
    pub async fn train_keystroke(
        &self,
        owner: &str,
        samples: Vec<KeystrokeSample>,
    ) -> Result<TrainOutcome> {
        let owner = normalize_owner(owner)?;
        Self::check_batch_size(Modality::Keystroke, samples.len())?;
        for sample in &samples {
            sample.validate()?;
        }

        let _guard = self.slots.acquire(&owner, Modality::Keystroke)?;

        // Retrain the delegate before persisting anything: a template whose
        // model never trained could only ever fail closed.
        self.delegate.train(&owner, &samples).await?;

        let sample_count = samples.len();
        let payload = TemplatePayload::Keystroke { samples };
        self.persist_template(&owner, Modality::Keystroke, &payload, sample_count)
            .await
    }

    /// Trains the voice template: the persisted reference is the sample-wise
    /// average across the enrollment batch.
    pub async fn train_voice(
        &self,
        owner: &str,
        samples: Vec<VoiceFeatures>,
    ) -> Result<TrainOutcome> {
        let owner = normalize_owner(owner)?;
        Self::check_batch_size(Modality::Voice, samples.len())?;
        for sample in &samples {
            sample.validate_enrollment()?;
        }

        let _guard = self.slots.acquire(&owner, Modality::Voice)?;

        let sample_count = samples.len();
        let reference = VoiceFeatures::average(&samples)?;
        let payload = TemplatePayload::Voice { reference };
        self.persist_template(&owner, Modality::Voice, &payload, sample_count)
            .await
    }

    /// Verifies a fresh keystroke sample via the delegated verifier and the
    /// lenient acceptance policy. Fails closed when the delegate is
    /// unreachable.
    pub async fn verify_keystroke(
        &self,
        owner: &str,
        sample: &KeystrokeSample,
    ) -> Result<VerifyOutcome> {
        let owner = normalize_owner(owner)?;
        sample.validate()?;

        // The stored template must exist and decrypt cleanly even though
        // the delegate holds the model; a corrupt record means the
        // enrollment itself can no longer be trusted.
        match self.load_payload(&owner, Modality::Keystroke).await? {
            TemplatePayload::Keystroke { .. } => {}
            _ => {
                return Err(BiometricError::Integrity(
                    "stored template does not match the requested modality".into(),
                ))
            }
        }

        let decision = self.delegate.verify(&owner, sample).await?;
        let matched = keystroke::evaluate(&decision)?;

        info!(
            owner = owner.as_str(),
            authenticated = matched.authenticated,
            score = matched.score,
            mse = matched.mse,
            "keystroke verification"
        );

        Ok(VerifyOutcome {
            authenticated: matched.authenticated,
            score: matched.score,
            sub_scores: SubScores::Keystroke {
                mse: matched.mse,
                threshold: matched.threshold,
            },
        })
    }

    /// Verifies a fresh voice sample against the stored averaged reference.
    pub async fn verify_voice(
        &self,
        owner: &str,
        sample: &VoiceFeatures,
    ) -> Result<VerifyOutcome> {
        let owner = normalize_owner(owner)?;

        let reference = match self.load_payload(&owner, Modality::Voice).await? {
            TemplatePayload::Voice { reference } => reference,
            _ => {
                return Err(BiometricError::Integrity(
                    "stored template does not match the requested modality".into(),
                ))
            }
        };

        let matched = voice::compare(sample, &reference)?;

        info!(
            owner = owner.as_str(),
            authenticated = matched.authenticated,
            overall = matched.overall,
            confidence = matched.confidence,
            "voice verification"
        );

        Ok(VerifyOutcome {
            authenticated: matched.authenticated,
            score: matched.overall,
            sub_scores: SubScores::Voice {
                mfcc: matched.sub_scores.mfcc,
                spectral: matched.sub_scores.spectral,
                tempo: matched.sub_scores.tempo,
                pitch: matched.sub_scores.pitch,
                confidence: matched.confidence,
            },
        })
    }

    /// Removes templates for one modality or both. Returns how many were
    /// removed; a partial all-reset is reported, never swallowed.
    pub async fn reset(&self, owner: &str, scope: ResetScope) -> Result<usize> {
        let owner = normalize_owner(owner)?;

        let removed = match scope {
            ResetScope::Modality(modality) => self.store.delete(&owner, modality).await? as usize,
            ResetScope::All => {
                let mut removed = 0;
                for modality in [Modality::Keystroke, Modality::Voice] {
                    match self.store.delete(&owner, modality).await {
                        Ok(true) => removed += 1,
                        Ok(false) => {}
                        Err(e) => {
                            return Err(BiometricError::Storage(format!(
                                "reset incomplete: removed {removed} template(s), \
                                 then {modality} failed: {e}"
                            )))
                        }
                    }
                }
                removed
            }
        };

        info!(owner = owner.as_str(), removed, "templates reset");
        Ok(removed)
    }

    /// Read-only enrollment view; looks at record metadata only and never
    /// decrypts a payload.
    pub async fn status(&self, owner: &str) -> Result<StatusReport> {
        let owner = normalize_owner(owner)?;

        let keystroke = self.store.get(&owner, Modality::Keystroke).await?;
        let voice = self.store.get(&owner, Modality::Voice).await?;

        let has_keystroke = keystroke.is_some();
        let has_voice = voice.is_some();
        Ok(StatusReport {
            has_keystroke,
            has_voice,
            keystroke_enrolled_at: keystroke.map(|r| r.updated_at),
            voice_enrolled_at: voice.map(|r| r.updated_at),
            setup_complete: has_keystroke && has_voice,
        })
    }

    fn check_batch_size(modality: Modality, got: usize) -> Result<()> {
        let required = modality.required_samples();
        if got < required {
            return Err(BiometricError::Validation(format!(
                "{modality} enrollment requires at least {required} samples, got {got}"
            )));
        }
        Ok(())
    }

    /// Fingerprint, seal and replace in one guarded sequence. Version
    /// increments across re-enrollments; the original enrollment time
    /// survives.
    async fn persist_template(
        &self,
        owner: &str,
        modality: Modality,
        payload: &TemplatePayload,
        sample_count: usize,
    ) -> Result<TrainOutcome> {
        let plaintext = serde_json::to_vec(payload)
            .map_err(|e| BiometricError::Storage(format!("failed to encode payload: {e}")))?;
        let checksum = self.vault.fingerprint(&plaintext);
        let sealed = self.vault.seal(&plaintext)?;

        let now = Utc::now();
        let (version, created_at) = match self.store.get(owner, modality).await? {
            Some(previous) => (previous.version + 1, previous.created_at),
            None => (1, now),
        };

        self.store
            .put(TemplateRecord {
                owner: owner.to_string(),
                modality,
                encrypted_payload: sealed.ciphertext,
                iv: sealed.iv,
                checksum: checksum.clone(),
                sample_count,
                version,
                created_at,
                updated_at: now,
            })
            .await?;

        info!(
            owner,
            modality = modality.as_str(),
            version,
            sample_count,
            "template trained"
        );

        Ok(TrainOutcome {
            accepted: true,
            template_version: version,
            checksum_prefix: checksum[..8].to_string(),
            sample_count,
        })
    }

    /// Loads, unseals and integrity-checks the stored template. A missing
    /// record is `NotEnrolled`; anything unusable is `Integrity`, kept
    /// distinct so callers can tell "never enrolled" from "enrolled but
    /// corrupt".
    async fn load_payload(&self, owner: &str, modality: Modality) -> Result<TemplatePayload> {
        let record = self
            .store
            .get(owner, modality)
            .await?
            .ok_or_else(|| BiometricError::NotEnrolled(format!("{owner}/{modality}")))?;

        let plaintext = self.vault.unseal(&record.encrypted_payload, &record.iv)?;

        if self.vault.fingerprint(&plaintext) != record.checksum {
            warn!(
                owner,
                modality = modality.as_str(),
                "template checksum mismatch"
            );
            return Err(BiometricError::Integrity(
                "template checksum mismatch".into(),
            ));
        }

        serde_json::from_slice(&plaintext)
            .map_err(|e| BiometricError::Integrity(format!("template payload is corrupt: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::KeyProvider;
    use crate::core::features::{KEYSTROKE_DIMS, MFCC_COEFFS};
    use crate::core::verify::delegate::DelegateDecision;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    struct StubDelegate {
        decision: DelegateDecision,
        fail_train: bool,
        fail_verify: bool,
    }

    impl Default for StubDelegate {
        fn default() -> Self {
            Self {
                decision: DelegateDecision {
                    mse: 0.05,
                    threshold: 0.2,
                    authenticated: true,
                },
                fail_train: false,
                fail_verify: false,
            }
        }
    }

    #[async_trait]
    impl DelegatedKeystrokeVerifier for StubDelegate {
        async fn train(&self, _owner: &str, _samples: &[KeystrokeSample]) -> Result<()> {
            if self.fail_train {
                return Err(BiometricError::VerifierUnavailable("stub offline".into()));
            }
            Ok(())
        }

        async fn verify(
            &self,
            _owner: &str,
            _sample: &KeystrokeSample,
        ) -> Result<DelegateDecision> {
            if self.fail_verify {
                return Err(BiometricError::VerifierUnavailable("stub offline".into()));
            }
            Ok(self.decision.clone())
        }
    }

    /// Store whose delete fails for one modality, for exercising partial
    /// reset reporting.
    struct FailingDeleteStore {
        inner: MemoryStore,
        fail_on: Modality,
    }

    #[async_trait]
    impl TemplateStore for FailingDeleteStore {
        async fn put(&self, record: TemplateRecord) -> Result<()> {
            self.inner.put(record).await
        }

        async fn get(&self, owner: &str, modality: Modality) -> Result<Option<TemplateRecord>> {
            self.inner.get(owner, modality).await
        }

        async fn delete(&self, owner: &str, modality: Modality) -> Result<bool> {
            if modality == self.fail_on {
                return Err(BiometricError::Storage("disk failure".into()));
            }
            self.inner.delete(owner, modality).await
        }
    }

    /// Delegate whose train call blocks until released, for exercising the
    /// per-key training guard.
    struct GatedDelegate {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl DelegatedKeystrokeVerifier for GatedDelegate {
        async fn train(&self, _owner: &str, _samples: &[KeystrokeSample]) -> Result<()> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }

        async fn verify(
            &self,
            _owner: &str,
            _sample: &KeystrokeSample,
        ) -> Result<DelegateDecision> {
            Ok(DelegateDecision {
                mse: 0.05,
                threshold: 0.2,
                authenticated: true,
            })
        }
    }

    fn service_with(
        delegate: Arc<dyn DelegatedKeystrokeVerifier>,
    ) -> (Arc<BiometricService>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let vault = Arc::new(TemplateVault::new(KeyProvider::derive(
            "test-secret",
            "test-salt",
        )));
        let service = Arc::new(BiometricService::new(store.clone(), vault, delegate));
        (service, store)
    }

    fn keystroke_batch(n: usize) -> Vec<KeystrokeSample> {
        vec![KeystrokeSample::new(vec![0.1; KEYSTROKE_DIMS]); n]
    }

    fn voice_sample() -> VoiceFeatures {
        VoiceFeatures {
            mfcc_mean: vec![0.1; MFCC_COEFFS],
            mfcc_variance: vec![0.01; MFCC_COEFFS],
            spectral_centroid_mean: 500.0,
            spectral_centroid_variance: 20.0,
            spectral_flatness_mean: 0.4,
            spectral_flatness_variance: 0.01,
            zcr_mean: 0.1,
            zcr_variance: 0.002,
            rms_mean: 0.3,
            rms_variance: 0.01,
            energy_mean: 0.5,
            energy_variance: 0.03,
            pitch_mean: Some(120.0),
            pitch_variance: Some(8.0),
            pitch_range: Some(35.0),
        }
    }

    fn voice_batch(n: usize) -> Vec<VoiceFeatures> {
        vec![voice_sample(); n]
    }

    #[tokio::test]
    async fn voice_enrollment_then_self_verification_authenticates() {
        let (service, _) = service_with(Arc::new(StubDelegate::default()));

        let outcome = service.train_voice("0xOwner", voice_batch(3)).await.unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.template_version, 1);
        assert_eq!(outcome.sample_count, 3);
        assert_eq!(outcome.checksum_prefix.len(), 8);

        let verdict = service
            .verify_voice("0xowner", &voice_sample())
            .await
            .unwrap();
        assert!(verdict.authenticated);
        assert!(verdict.score >= 0.95);
        match verdict.sub_scores {
            SubScores::Voice { confidence, .. } => assert!(confidence >= 0.95),
            _ => panic!("expected voice sub-scores"),
        }
    }

    #[tokio::test]
    async fn undersized_batches_are_rejected_without_persisting() {
        let (service, store) = service_with(Arc::new(StubDelegate::default()));

        let err = service.train_voice("0xowner", voice_batch(2)).await.unwrap_err();
        assert!(matches!(err, BiometricError::Validation(_)));

        let err = service
            .train_keystroke("0xowner", keystroke_batch(4))
            .await
            .unwrap_err();
        assert!(matches!(err, BiometricError::Validation(_)));

        assert!(store.get("0xowner", Modality::Voice).await.unwrap().is_none());
        assert!(store
            .get("0xowner", Modality::Keystroke)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn malformed_sample_in_batch_rejects_the_whole_batch() {
        let (service, store) = service_with(Arc::new(StubDelegate::default()));

        let mut batch = keystroke_batch(5);
        batch[3] = KeystrokeSample::new(vec![0.1; KEYSTROKE_DIMS - 1]);

        let err = service.train_keystroke("0xowner", batch).await.unwrap_err();
        assert!(matches!(err, BiometricError::Validation(_)));
        assert!(store
            .get("0xowner", Modality::Keystroke)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn keystroke_flow_reports_delegate_sub_scores() {
        let (service, _) = service_with(Arc::new(StubDelegate::default()));

        service
            .train_keystroke("0xowner", keystroke_batch(5))
            .await
            .unwrap();

        let sample = KeystrokeSample::new(vec![0.1; KEYSTROKE_DIMS]);
        let verdict = service.verify_keystroke("0xowner", &sample).await.unwrap();
        assert!(verdict.authenticated);
        assert!((verdict.score - 0.95).abs() < 1e-12);
        match verdict.sub_scores {
            SubScores::Keystroke { mse, threshold } => {
                assert!((mse - 0.05).abs() < 1e-12);
                assert!((threshold - 0.2).abs() < 1e-12);
            }
            _ => panic!("expected keystroke sub-scores"),
        }
    }

    #[tokio::test]
    async fn delegate_training_failure_leaves_no_template() {
        let (service, store) = service_with(Arc::new(StubDelegate {
            fail_train: true,
            ..StubDelegate::default()
        }));

        let err = service
            .train_keystroke("0xowner", keystroke_batch(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BiometricError::VerifierUnavailable(_)));
        assert!(store
            .get("0xowner", Modality::Keystroke)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn unreachable_delegate_fails_verification_closed() {
        let (service, _) = service_with(Arc::new(StubDelegate {
            fail_verify: true,
            ..StubDelegate::default()
        }));

        service
            .train_keystroke("0xowner", keystroke_batch(5))
            .await
            .unwrap();

        let sample = KeystrokeSample::new(vec![0.1; KEYSTROKE_DIMS]);
        let err = service.verify_keystroke("0xowner", &sample).await.unwrap_err();
        assert!(matches!(err, BiometricError::VerifierUnavailable(_)));
    }

    #[tokio::test]
    async fn verification_without_enrollment_is_not_enrolled() {
        let (service, _) = service_with(Arc::new(StubDelegate::default()));

        let err = service
            .verify_voice("0xowner", &voice_sample())
            .await
            .unwrap_err();
        assert!(matches!(err, BiometricError::NotEnrolled(_)));

        let sample = KeystrokeSample::new(vec![0.1; KEYSTROKE_DIMS]);
        let err = service.verify_keystroke("0xowner", &sample).await.unwrap_err();
        assert!(matches!(err, BiometricError::NotEnrolled(_)));
    }

    #[tokio::test]
    async fn re_enrollment_replaces_in_place_and_increments_version() {
        let (service, store) = service_with(Arc::new(StubDelegate::default()));

        service.train_voice("0xowner", voice_batch(3)).await.unwrap();
        let first = store.get("0xowner", Modality::Voice).await.unwrap().unwrap();

        let outcome = service.train_voice("0xowner", voice_batch(4)).await.unwrap();
        assert_eq!(outcome.template_version, 2);

        let second = store.get("0xowner", Modality::Voice).await.unwrap().unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.sample_count, 4);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn tampered_ciphertext_surfaces_as_integrity() {
        let (service, store) = service_with(Arc::new(StubDelegate::default()));
        service.train_voice("0xowner", voice_batch(3)).await.unwrap();

        let mut record = store.get("0xowner", Modality::Voice).await.unwrap().unwrap();
        record.encrypted_payload[0] ^= 0x01;
        store.put(record).await.unwrap();

        let err = service
            .verify_voice("0xowner", &voice_sample())
            .await
            .unwrap_err();
        assert!(matches!(err, BiometricError::Integrity(_)));
    }

    #[tokio::test]
    async fn checksum_mismatch_surfaces_as_integrity() {
        let (service, store) = service_with(Arc::new(StubDelegate::default()));
        service.train_voice("0xowner", voice_batch(3)).await.unwrap();

        let mut record = store.get("0xowner", Modality::Voice).await.unwrap().unwrap();
        record.checksum = "0".repeat(64);
        store.put(record).await.unwrap();

        let err = service
            .verify_voice("0xowner", &voice_sample())
            .await
            .unwrap_err();
        assert!(matches!(err, BiometricError::Integrity(_)));
    }

    #[tokio::test]
    async fn reset_all_is_idempotent() {
        let (service, _) = service_with(Arc::new(StubDelegate::default()));

        service.train_voice("0xowner", voice_batch(3)).await.unwrap();
        service
            .train_keystroke("0xowner", keystroke_batch(5))
            .await
            .unwrap();

        assert_eq!(service.reset("0xowner", ResetScope::All).await.unwrap(), 2);
        assert_eq!(service.reset("0xowner", ResetScope::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn partial_reset_failure_reports_removed_count() {
        let store = Arc::new(FailingDeleteStore {
            inner: MemoryStore::new(),
            fail_on: Modality::Voice,
        });
        let vault = Arc::new(TemplateVault::new(KeyProvider::derive(
            "test-secret",
            "test-salt",
        )));
        let service =
            BiometricService::new(store.clone(), vault, Arc::new(StubDelegate::default()));

        service.train_voice("0xowner", voice_batch(3)).await.unwrap();
        service
            .train_keystroke("0xowner", keystroke_batch(5))
            .await
            .unwrap();

        // Keystroke is deleted first, then the voice delete fails: the error
        // must name how far the reset got instead of swallowing it.
        let err = service.reset("0xowner", ResetScope::All).await.unwrap_err();
        match err {
            BiometricError::Storage(msg) => {
                assert!(msg.contains("reset incomplete"), "got: {msg}");
                assert!(msg.contains("removed 1"), "got: {msg}");
                assert!(msg.contains("voice"), "got: {msg}");
            }
            other => panic!("expected a storage error, got {other:?}"),
        }

        assert!(store
            .get("0xowner", Modality::Keystroke)
            .await
            .unwrap()
            .is_none());
        assert!(store.get("0xowner", Modality::Voice).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn reset_can_target_a_single_modality() {
        let (service, _) = service_with(Arc::new(StubDelegate::default()));

        service.train_voice("0xowner", voice_batch(3)).await.unwrap();
        service
            .train_keystroke("0xowner", keystroke_batch(5))
            .await
            .unwrap();

        let removed = service
            .reset("0xowner", ResetScope::Modality(Modality::Voice))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let status = service.status("0xowner").await.unwrap();
        assert!(status.has_keystroke);
        assert!(!status.has_voice);
        assert!(!status.setup_complete);
    }

    #[tokio::test]
    async fn status_is_a_derived_view() {
        let (service, _) = service_with(Arc::new(StubDelegate::default()));

        let empty = service.status("0xowner").await.unwrap();
        assert!(!empty.has_keystroke && !empty.has_voice && !empty.setup_complete);
        assert!(empty.voice_enrolled_at.is_none());

        service.train_voice("0xowner", voice_batch(3)).await.unwrap();
        let partial = service.status("0xowner").await.unwrap();
        assert!(partial.has_voice && !partial.setup_complete);
        assert!(partial.voice_enrolled_at.is_some());

        service
            .train_keystroke("0xowner", keystroke_batch(5))
            .await
            .unwrap();
        let complete = service.status("0xowner").await.unwrap();
        assert!(complete.setup_complete);
    }

    #[tokio::test]
    async fn owners_are_lowercase_normalized_across_operations() {
        let (service, _) = service_with(Arc::new(StubDelegate::default()));

        service
            .train_voice("  0xOwNeR  ", voice_batch(3))
            .await
            .unwrap();

        let verdict = service
            .verify_voice("0XOWNER", &voice_sample())
            .await
            .unwrap();
        assert!(verdict.authenticated);
        assert!(service.status("0xOwner").await.unwrap().has_voice);
    }

    #[tokio::test]
    async fn concurrent_training_for_one_key_is_rejected() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let (service, _) = service_with(Arc::new(GatedDelegate {
            entered: entered.clone(),
            release: release.clone(),
        }));

        let racing = service.clone();
        let first = tokio::spawn(async move {
            racing.train_keystroke("0xowner", keystroke_batch(5)).await
        });

        // Wait until the first run is mid-aggregation, then collide.
        entered.notified().await;
        let err = service
            .train_keystroke("0xOwner", keystroke_batch(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BiometricError::TrainingInProgress(_)));

        release.notify_one();
        first.await.unwrap().unwrap();

        // The slot is released once the first run completes.
        release.notify_one();
        service
            .train_keystroke("0xowner", keystroke_batch(5))
            .await
            .unwrap();
    }
}
