//! Core biometric domain: feature vectors, crypto, verification, lifecycle.

pub mod crypto;
pub mod features;
pub mod services;
pub mod verify;
