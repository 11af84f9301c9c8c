//! Encrypted template persistence.

pub mod store;
pub mod template;

pub use store::{MemoryStore, RocksDbStore, TemplateStore};
pub use template::{normalize_owner, TemplatePayload, TemplateRecord};
