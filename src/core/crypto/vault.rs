// src/core/crypto/vault.rs
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::utils::error::{BiometricError, Result};
use super::key_provider::KeyProvider;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Ciphertext plus the IV it was sealed with. The IV is generated fresh per
/// seal and never reused.
#[derive(Debug, Clone)]
pub struct SealedPayload {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
}

/// Encrypts template payloads at rest and fingerprints them for tamper
/// detection.
///
/// The fingerprint is computed over the canonical serialized plaintext
/// before encryption and stored alongside the ciphertext. It is an
/// integrity check only, never a matching input.
pub struct TemplateVault {
    key: [u8; 32],
}

impl TemplateVault {
    pub fn new(key_provider: KeyProvider) -> Self {
        Self {
            key: key_provider.into_key(),
        }
    }

    /// AES-256-CBC with PKCS#7 padding and a random per-call IV.
    pub fn seal(&self, plaintext: &[u8]) -> Result<SealedPayload> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|e| BiometricError::Crypto(format!("cipher init failed: {e}")))?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        Ok(SealedPayload {
            ciphertext,
            iv: iv.to_vec(),
        })
    }

    /// Decrypts a sealed payload. Malformed IVs, truncated ciphertext, and
    /// padding failures all surface as `Integrity` so callers can treat the
    /// template as unusable without crashing.
    pub fn unseal(&self, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        if iv.len() != IV_LEN {
            return Err(BiometricError::Integrity(format!(
                "malformed iv: expected {IV_LEN} bytes, got {}",
                iv.len()
            )));
        }
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(BiometricError::Integrity(format!(
                "malformed ciphertext length {}",
                ciphertext.len()
            )));
        }

        let cipher = Aes256CbcDec::new_from_slices(&self.key, iv)
            .map_err(|e| BiometricError::Integrity(format!("cipher init failed: {e}")))?;
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| BiometricError::Integrity("ciphertext failed to decrypt".into()))
    }

    /// Hex SHA-256 of the canonical serialized plaintext.
    pub fn fingerprint(&self, plaintext: &[u8]) -> String {
        hex::encode(Sha256::digest(plaintext))
    }
}
