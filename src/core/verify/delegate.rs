// src/core/verify/delegate.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::features::KeystrokeSample;
use crate::utils::config::DelegateConfig;
use crate::utils::error::{BiometricError, Result};

/// Verdict returned by the delegated keystroke verifier. The tuple shape is
/// the whole contract; the model behind it is opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateDecision {
    pub mse: f64,
    pub threshold: f64,
    pub authenticated: bool,
}

/// External deep-learning collaborator for keystroke dynamics. It retrains
/// on the owner's full enrollment sample set and scores fresh samples by
/// reconstruction error against a learned threshold.
#[async_trait]
pub trait DelegatedKeystrokeVerifier: Send + Sync {
    async fn train(&self, owner: &str, samples: &[KeystrokeSample]) -> Result<()>;
    async fn verify(&self, owner: &str, sample: &KeystrokeSample) -> Result<DelegateDecision>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrainRequest<'a> {
    wallet_address: &'a str,
    keystroke_samples: &'a [KeystrokeSample],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    wallet_address: &'a str,
    keystroke_data: &'a KeystrokeSample,
}

/// HTTP client for the delegated verifier with a bounded round-trip
/// timeout. Every transport failure, timeout, non-success status, and
/// malformed body maps to `VerifierUnavailable`: verification fails closed,
/// never defaulting to authenticated.
pub struct HttpDelegateVerifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDelegateVerifier {
    pub fn new(config: &DelegateConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| BiometricError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn unavailable(context: &str, e: impl std::fmt::Display) -> BiometricError {
        warn!("delegated keystroke verifier {context}: {e}");
        BiometricError::VerifierUnavailable(format!("{context}: {e}"))
    }
}

#[async_trait]
impl DelegatedKeystrokeVerifier for HttpDelegateVerifier {
    async fn train(&self, owner: &str, samples: &[KeystrokeSample]) -> Result<()> {
        let url = format!("{}/api/biometrics/keystroke/train", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&TrainRequest {
                wallet_address: owner,
                keystroke_samples: samples,
            })
            .send()
            .await
            .map_err(|e| Self::unavailable("train request failed", e))?;

        if !response.status().is_success() {
            return Err(Self::unavailable(
                "train rejected",
                format!("status {}", response.status()),
            ));
        }
        Ok(())
    }

    async fn verify(&self, owner: &str, sample: &KeystrokeSample) -> Result<DelegateDecision> {
        let url = format!("{}/api/biometrics/keystroke/verify", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&VerifyRequest {
                wallet_address: owner,
                keystroke_data: sample,
            })
            .send()
            .await
            .map_err(|e| Self::unavailable("verify request failed", e))?;

        if !response.status().is_success() {
            return Err(Self::unavailable(
                "verify rejected",
                format!("status {}", response.status()),
            ));
        }

        response
            .json::<DelegateDecision>()
            .await
            .map_err(|e| Self::unavailable("verify returned malformed data", e))
    }
}
