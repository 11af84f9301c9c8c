// src/utils/error.rs
use thiserror::Error;

/// Error taxonomy for the biometric engine.
///
/// Every boundary operation returns one of these as a typed result; no
/// variant is ever converted into a passing authentication.
#[derive(Debug, Error)]
pub enum BiometricError {
    /// Malformed or undersized sample input. Caller's fault, recoverable by
    /// resubmission.
    #[error("validation error: {0}")]
    Validation(String),

    /// Checksum mismatch or corrupt ciphertext on read. The stored template
    /// is unusable and should be treated as absent, but surfaced distinctly
    /// from "not enrolled".
    #[error("integrity error: {0}")]
    Integrity(String),

    /// The delegated keystroke service is unreachable, timed out, or
    /// returned malformed data. Verification fails closed.
    #[error("delegated verifier unavailable: {0}")]
    VerifierUnavailable(String),

    /// A training run is already in flight for this (owner, modality).
    /// Caller should retry once it completes.
    #[error("training already in progress for {0}")]
    TrainingInProgress(String),

    /// Verification attempted with no template present.
    #[error("not enrolled: {0}")]
    NotEnrolled(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BiometricError>;
