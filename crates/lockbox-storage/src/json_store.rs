//! File-backed metadata store.
//!
//! Several `lockbox` processes may share one table. Reads go to disk every
//! time. Mutations hold the table lock, re-read the current table, apply the
//! change, and replace the file through a temp file and rename, so a crash
//! leaves either the old or the new table on disk, never a torn one.

use async_trait::async_trait;
use lockbox_core::lockfile::temp_path;
use lockbox_core::{FileRecord, NewFileRecord, TableLock, UserId, VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::metadata::{assign, newest_first, MetadataStore};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Table {
    version: u32,
    records: Vec<FileRecord>,
}

pub struct JsonMetadataStore {
    db_path: PathBuf,
}

impl JsonMetadataStore {
    /// Open a record table at the given path, checking that an existing
    /// table is readable. A missing file is an empty table.
    pub async fn open(db_path: &Path) -> VaultResult<Self> {
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        let records = store.load().await?;
        debug!(path = %db_path.display(), records = records.len(), "opened record table");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn load(&self) -> VaultResult<Vec<FileRecord>> {
        let content = match tokio::fs::read_to_string(&self.db_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let table: Table = serde_json::from_str(&content).map_err(|e| {
            VaultError::Storage(format!("parsing record table {}: {e}", self.db_path.display()))
        })?;
        if table.version != FORMAT_VERSION {
            return Err(VaultError::Storage(format!(
                "unsupported record table version {} in {}",
                table.version,
                self.db_path.display()
            )));
        }
        Ok(table.records)
    }

    /// Must be called with the table lock held.
    async fn flush(&self, records: Vec<FileRecord>) -> VaultResult<()> {
        if let Some(parent) = self.db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let table = Table {
            version: FORMAT_VERSION,
            records,
        };
        let json = serde_json::to_string_pretty(&table)
            .map_err(|e| VaultError::Storage(format!("serializing record table: {e}")))?;

        let tmp_path = temp_path(&self.db_path);
        tokio::fs::write(&tmp_path, &json).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.db_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for JsonMetadataStore {
    async fn insert(&self, record: NewFileRecord) -> VaultResult<FileRecord> {
        let _lock = TableLock::acquire(&self.db_path).await?;
        let mut records = self.load().await?;
        let record = assign(&records, record)?;

        records.push(record.clone());
        self.flush(records).await?;
        Ok(record)
    }

    async fn get(&self, id: &str) -> VaultResult<FileRecord> {
        self.load()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| VaultError::NotFound(format!("file record {id}")))
    }

    async fn list(&self, owner: &UserId) -> VaultResult<Vec<FileRecord>> {
        Ok(newest_first(&self.load().await?, owner))
    }

    async fn delete(&self, id: &str) -> VaultResult<()> {
        let _lock = TableLock::acquire(&self.db_path).await?;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(VaultError::NotFound(format!("file record {id}")));
        }

        self.flush(records).await
    }
}
