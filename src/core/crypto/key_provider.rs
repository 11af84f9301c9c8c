// src/core/crypto/key_provider.rs
use sha3::{Digest, Sha3_256};

use crate::utils::config::SecurityConfig;

/// Derives the template encryption key once from the process-wide secret.
///
/// The derivation is a salted SHA3-256 hash; the resulting key is held for
/// the process lifetime and never re-derived per call. Tests construct one
/// from a fixed secret.
pub struct KeyProvider {
    key: [u8; 32],
}

impl KeyProvider {
    pub fn derive(secret: &str, salt: &str) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(salt.as_bytes());
        hasher.update(secret.as_bytes());
        let digest = hasher.finalize();

        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::derive(&config.secret, &config.salt)
    }

    pub(crate) fn into_key(self) -> [u8; 32] {
        self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a = KeyProvider::derive("secret", "salt").into_key();
        let b = KeyProvider::derive("secret", "salt").into_key();
        assert_eq!(a, b);
    }

    #[test]
    fn salt_changes_the_key() {
        let a = KeyProvider::derive("secret", "salt-a").into_key();
        let b = KeyProvider::derive("secret", "salt-b").into_key();
        assert_ne!(a, b);
    }
}
