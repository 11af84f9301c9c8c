//! Template encryption and integrity primitives.

pub mod key_provider;
pub mod vault;

pub use key_provider::KeyProvider;
pub use vault::{SealedPayload, TemplateVault};
