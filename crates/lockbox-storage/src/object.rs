//! Object store contract and its OpenDAL implementation

use async_trait::async_trait;
use lockbox_core::{VaultError, VaultResult};
use opendal::{ErrorKind, Operator};
use std::time::Duration;
use tracing::debug;

/// Blob storage for encrypted files. Names are unique within the store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under a new `name`. An existing name is never overwritten.
    async fn store(&self, name: &str, bytes: Vec<u8>) -> VaultResult<()>;

    async fn fetch(&self, name: &str) -> VaultResult<Vec<u8>>;

    /// Remove `name`. Removing an absent object succeeds.
    async fn delete(&self, name: &str) -> VaultResult<()>;

    async fn exists(&self, name: &str) -> VaultResult<bool>;

    /// Round-trip time of a trivial request
    async fn check_health(&self) -> VaultResult<Duration>;

    fn backend_name(&self) -> &'static str;
}

/// `ObjectStore` over any OpenDAL operator
#[derive(Clone)]
pub struct OpendalObjectStore {
    op: Operator,
    backend: &'static str,
}

impl OpendalObjectStore {
    pub fn new(op: Operator, backend: &'static str) -> Self {
        Self { op, backend }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }
}

/// Flat names only: no separators, no leading dot, not empty
fn validate_name(name: &str) -> VaultResult<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
        return Err(VaultError::Storage(format!("invalid object name: {name:?}")));
    }
    Ok(())
}

fn map_err(name: &str, e: opendal::Error) -> VaultError {
    match e.kind() {
        ErrorKind::NotFound => VaultError::NotFound(format!("object {name}")),
        _ => VaultError::storage(e),
    }
}

#[async_trait]
impl ObjectStore for OpendalObjectStore {
    async fn store(&self, name: &str, bytes: Vec<u8>) -> VaultResult<()> {
        validate_name(name)?;
        if self.exists(name).await? {
            return Err(VaultError::Storage(format!("object already exists: {name}")));
        }

        let len = bytes.len();
        self.op.write(name, bytes).await.map_err(|e| map_err(name, e))?;
        debug!(name, bytes = len, backend = self.backend, "stored object");
        Ok(())
    }

    async fn fetch(&self, name: &str) -> VaultResult<Vec<u8>> {
        validate_name(name)?;
        let buf = self.op.read(name).await.map_err(|e| map_err(name, e))?;
        Ok(buf.to_vec())
    }

    async fn delete(&self, name: &str) -> VaultResult<()> {
        validate_name(name)?;
        self.op.delete(name).await.map_err(|e| map_err(name, e))?;
        debug!(name, backend = self.backend, "deleted object");
        Ok(())
    }

    async fn exists(&self, name: &str) -> VaultResult<bool> {
        validate_name(name)?;
        self.op.exists(name).await.map_err(|e| map_err(name, e))
    }

    async fn check_health(&self) -> VaultResult<Duration> {
        crate::health::ping(&self.op).await
    }

    fn backend_name(&self) -> &'static str {
        self.backend
    }
}
