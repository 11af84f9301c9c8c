// src/storage/store.rs
use async_trait::async_trait;
use parking_lot::RwLock;
use rocksdb::{Options, DB};
use std::collections::HashMap;
use std::path::Path;

use crate::core::features::Modality;
use crate::utils::error::{BiometricError, Result};
use super::template::TemplateRecord;

/// Durable keyed storage for templates. `put` is a last-write-wins replace
/// of the whole record, so readers always observe a consistent snapshot.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn put(&self, record: TemplateRecord) -> Result<()>;
    async fn get(&self, owner: &str, modality: Modality) -> Result<Option<TemplateRecord>>;
    /// Returns whether a record existed.
    async fn delete(&self, owner: &str, modality: Modality) -> Result<bool>;
}

pub struct RocksDbStore {
    db: DB,
}

impl RocksDbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path)
            .map_err(|e| BiometricError::Storage(format!("failed to open database: {e}")))?;

        Ok(Self { db })
    }
}

#[async_trait]
impl TemplateStore for RocksDbStore {
    async fn put(&self, record: TemplateRecord) -> Result<()> {
        let key = TemplateRecord::storage_key(&record.owner, record.modality);
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| BiometricError::Storage(format!("failed to encode record: {e}")))?;

        self.db
            .put(key.as_bytes(), bytes)
            .map_err(|e| BiometricError::Storage(format!("failed to write record: {e}")))?;
        Ok(())
    }

    async fn get(&self, owner: &str, modality: Modality) -> Result<Option<TemplateRecord>> {
        let key = TemplateRecord::storage_key(owner, modality);
        let bytes = match self
            .db
            .get(key.as_bytes())
            .map_err(|e| BiometricError::Storage(format!("failed to read record: {e}")))?
        {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        let record = serde_json::from_slice(&bytes).map_err(|e| {
            BiometricError::Integrity(format!("stored template record is corrupt: {e}"))
        })?;
        Ok(Some(record))
    }

    async fn delete(&self, owner: &str, modality: Modality) -> Result<bool> {
        let key = TemplateRecord::storage_key(owner, modality);
        let existed = self
            .db
            .get(key.as_bytes())
            .map_err(|e| BiometricError::Storage(format!("failed to read record: {e}")))?
            .is_some();

        self.db
            .delete(key.as_bytes())
            .map_err(|e| BiometricError::Storage(format!("failed to delete record: {e}")))?;
        Ok(existed)
    }
}

/// In-memory store for tests and embedded use.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, TemplateRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn put(&self, record: TemplateRecord) -> Result<()> {
        let key = TemplateRecord::storage_key(&record.owner, record.modality);
        self.records.write().insert(key, record);
        Ok(())
    }

    async fn get(&self, owner: &str, modality: Modality) -> Result<Option<TemplateRecord>> {
        let key = TemplateRecord::storage_key(owner, modality);
        Ok(self.records.read().get(&key).cloned())
    }

    async fn delete(&self, owner: &str, modality: Modality) -> Result<bool> {
        let key = TemplateRecord::storage_key(owner, modality);
        Ok(self.records.write().remove(&key).is_some())
    }
}
