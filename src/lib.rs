//! Behavioral biometric template and similarity engine.
//!
//! Two modalities protect a wallet-style identity: keystroke dynamics,
//! scored by an external delegated verifier, and voice, scored locally
//! against an encrypted averaged reference. Templates are sealed at rest
//! and fingerprinted for tamper detection.

pub mod core;
pub mod storage;
pub mod utils;

use std::sync::Arc;
use tracing::info;

use crate::{
    core::crypto::{KeyProvider, TemplateVault},
    core::verify::delegate::HttpDelegateVerifier,
    storage::RocksDbStore,
    utils::{config::Config, error::Result},
};

pub use crate::core::features::{KeystrokeSample, Modality, VoiceFeatures};
pub use crate::core::services::{
    BiometricService, ResetScope, StatusReport, SubScores, TrainOutcome, VerifyOutcome,
};
pub use crate::core::verify::delegate::{DelegateDecision, DelegatedKeystrokeVerifier};
pub use crate::core::verify::keystroke::KeystrokeMatch;
pub use crate::core::verify::voice::{VoiceMatch, VoiceSubScores, VOICE_THRESHOLD};
pub use crate::storage::{MemoryStore, TemplateRecord, TemplateStore};
pub use crate::utils::error::BiometricError;

/// Fully wired engine: configured key, durable store, HTTP delegate and the
/// enrollment service on top. Embedders that need custom wiring (an
/// in-memory store, a stubbed delegate) construct `BiometricService`
/// directly instead.
pub struct BiometricEngine {
    config: Arc<Config>,
    service: Arc<BiometricService>,
}

impl BiometricEngine {
    pub fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        info!("Initializing template storage...");
        let store = Arc::new(RocksDbStore::open(&config.storage.path)?);

        info!("Deriving template encryption key...");
        let vault = Arc::new(TemplateVault::new(KeyProvider::from_config(
            &config.security,
        )));

        info!("Initializing delegated keystroke verifier...");
        let delegate = Arc::new(HttpDelegateVerifier::new(&config.delegate)?);

        let service = Arc::new(BiometricService::new(store, vault, delegate));

        info!("Biometric engine ready");
        Ok(Self { config, service })
    }

    pub fn service(&self) -> Arc<BiometricService> {
        self.service.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
