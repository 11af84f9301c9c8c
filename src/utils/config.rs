use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::Deserialize;

use crate::utils::error::{BiometricError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub delegate: DelegateConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory for the template database.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Process-wide secret the template encryption key is derived from.
    pub secret: String,
    /// Salt mixed into key derivation.
    pub salt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelegateConfig {
    /// Base URL of the delegated keystroke verification service.
    pub url: String,
    /// Round-trip timeout for delegate calls, in seconds.
    pub timeout: u64,
}

impl Config {
    pub fn new() -> Result<Self> {
        let config = ConfigLib::builder()
            // Start with default values
            .set_default("storage.path", "data/templates")?
            .set_default("security.salt", "sentinel-biometrics-v1")?
            .set_default("delegate.url", "http://127.0.0.1:25000")?
            .set_default("delegate.timeout", 5)?
            // Load from config file
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (e.g., SENTINEL_SECURITY_SECRET).
            // The separator doubles as the key separator, so config keys stay
            // single-word to remain addressable.
            .add_source(
                Environment::with_prefix("SENTINEL")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.storage.path.is_empty() {
            return Err(BiometricError::Config("storage.path must be set".into()));
        }
        if self.security.secret.is_empty() {
            return Err(BiometricError::Config("security.secret must be set".into()));
        }
        if self.security.salt.is_empty() {
            return Err(BiometricError::Config("security.salt must be set".into()));
        }
        if self.delegate.url.is_empty() {
            return Err(BiometricError::Config("delegate.url must be set".into()));
        }
        if self.delegate.timeout == 0 {
            return Err(BiometricError::Config(
                "delegate.timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

impl From<ConfigError> for BiometricError {
    fn from(error: ConfigError) -> Self {
        BiometricError::Config(error.to_string())
    }
}
