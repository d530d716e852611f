//! Cross-process coordination for the JSON tables under the data directory.
//!
//! Every mutation of a table runs while holding an exclusive advisory lock on
//! a sidecar `<table>.lock` file, re-reads the table, and replaces it through
//! a uniquely named temp file. Readers never lock; the rename keeps them from
//! seeing a torn table.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{VaultError, VaultResult};

const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Exclusive lock on a table, released on drop
#[derive(Debug)]
pub struct TableLock {
    file: File,
    path: PathBuf,
}

impl TableLock {
    /// Wait (up to a timeout) for the lock guarding `table`.
    pub async fn acquire(table: &Path) -> VaultResult<Self> {
        let path = lock_path(table);
        tokio::task::spawn_blocking(move || Self::acquire_blocking(path))
            .await
            .map_err(|e| VaultError::Other(anyhow::anyhow!("lock task failed: {e}")))?
    }

    fn acquire_blocking(path: PathBuf) -> VaultResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        let contended = fs2::lock_contended_error().raw_os_error();
        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.raw_os_error() == contended => {
                    if start.elapsed() > LOCK_TIMEOUT {
                        return Err(VaultError::Storage(format!(
                            "timed out after {LOCK_TIMEOUT:?} waiting for {}; another lockbox process may be holding it",
                            path.display()
                        )));
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }

        debug!(lock = %path.display(), waited_ms = start.elapsed().as_millis() as u64, "table locked");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TableLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// `files.json` -> `files.json.lock`
pub fn lock_path(table: &Path) -> PathBuf {
    let mut name = table.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    table.with_file_name(name)
}

/// A temp name next to `path` that no other writer will pick
pub fn temp_path(path: &Path) -> PathBuf {
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    path.with_file_name(format!(
        ".{name}.{}.{}.tmp",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ))
}
