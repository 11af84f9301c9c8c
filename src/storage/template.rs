// src/storage/template.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::features::{KeystrokeSample, Modality, VoiceFeatures};
use crate::utils::error::{BiometricError, Result};

/// The persisted unit: one record per (owner, modality).
///
/// `checksum` is the hex SHA-256 of the plaintext payload, computed before
/// encryption. Re-enrollment replaces the record in place, increments
/// `version` and refreshes `updated_at`; `created_at` survives from the
/// first enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub owner: String,
    pub modality: Modality,
    pub encrypted_payload: Vec<u8>,
    pub iv: Vec<u8>,
    pub checksum: String,
    pub sample_count: usize,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TemplateRecord {
    pub fn storage_key(owner: &str, modality: Modality) -> String {
        format!("{owner}:{modality}")
    }
}

/// Decrypted template payload.
///
/// Keystroke keeps the raw enrollment sample set because the delegated
/// verifier retrains on it; voice keeps the sample-wise average as the
/// matching reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "modality", rename_all = "lowercase")]
pub enum TemplatePayload {
    Keystroke { samples: Vec<KeystrokeSample> },
    Voice { reference: VoiceFeatures },
}

impl TemplatePayload {
    pub fn modality(&self) -> Modality {
        match self {
            TemplatePayload::Keystroke { .. } => Modality::Keystroke,
            TemplatePayload::Voice { .. } => Modality::Voice,
        }
    }
}

/// Lowercase-normalizes an owner handle. Lookup is exact-match on the
/// normalized string; there is no fuzzy owner matching.
pub fn normalize_owner(raw: &str) -> Result<String> {
    let owner = raw.trim().to_lowercase();
    if owner.is_empty() {
        return Err(BiometricError::Validation("owner must not be empty".into()));
    }
    Ok(owner)
}
