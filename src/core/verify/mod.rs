//! Modality-specific verification.

pub mod delegate;
pub mod keystroke;
pub mod voice;

pub use delegate::{DelegateDecision, DelegatedKeystrokeVerifier, HttpDelegateVerifier};
pub use keystroke::KeystrokeMatch;
pub use voice::{VoiceMatch, VoiceSubScores};
