//! Metadata store contract and the in-memory implementation

use async_trait::async_trait;
use chrono::Utc;
use lockbox_core::{FileRecord, NewFileRecord, UserId, VaultError, VaultResult};
use tokio::sync::RwLock;

/// Persistence for `FileRecord` rows.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record, assigning its id and creation time.
    /// Fails if another record already references the same storage path.
    async fn insert(&self, record: NewFileRecord) -> VaultResult<FileRecord>;

    async fn get(&self, id: &str) -> VaultResult<FileRecord>;

    /// All records owned by `owner`, newest first.
    async fn list(&self, owner: &UserId) -> VaultResult<Vec<FileRecord>>;

    async fn delete(&self, id: &str) -> VaultResult<()>;
}

/// Assign id + timestamp, enforcing storage path uniqueness against `existing`.
pub(crate) fn assign(existing: &[FileRecord], new: NewFileRecord) -> VaultResult<FileRecord> {
    if existing.iter().any(|r| r.storage_path == new.storage_path) {
        return Err(VaultError::Storage(format!(
            "duplicate storage path: {}",
            new.storage_path
        )));
    }
    Ok(FileRecord::from_new(
        uuid::Uuid::new_v4().to_string(),
        Utc::now(),
        new,
    ))
}

/// Owner's records, newest first; ties go to the later insertion.
pub(crate) fn newest_first(records: &[FileRecord], owner: &UserId) -> Vec<FileRecord> {
    let mut owned: Vec<FileRecord> = records
        .iter()
        .rev()
        .filter(|r| &r.user_id == owner)
        .cloned()
        .collect();
    owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    owned
}

fn not_found(id: &str) -> VaultError {
    VaultError::NotFound(format!("file record {id}"))
}

/// Volatile metadata store, used for tests and `memory` sessions
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: RwLock<Vec<FileRecord>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert(&self, record: NewFileRecord) -> VaultResult<FileRecord> {
        let mut records = self.records.write().await;
        let record = assign(&records, record)?;
        records.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> VaultResult<FileRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn list(&self, owner: &UserId) -> VaultResult<Vec<FileRecord>> {
        Ok(newest_first(&self.records.read().await, owner))
    }

    async fn delete(&self, id: &str) -> VaultResult<()> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }
}
