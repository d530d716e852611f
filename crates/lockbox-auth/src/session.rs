//! Signed-in user persistence

use chrono::{DateTime, Utc};
use lockbox_core::lockfile::temp_path;
use lockbox_core::{UserId, VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The currently signed-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
    pub signed_in_at: DateTime<Utc>,
}

/// Session stored as a small JSON file. Absent file = signed out.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub async fn load(&self) -> VaultResult<Option<Session>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        match serde_json::from_str(&content) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "ignoring unreadable session file: {e}");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, session: &Session) -> VaultResult<()> {
        let json = serde_json::to_vec_pretty(session)
            .map_err(|e| VaultError::Other(anyhow::anyhow!("serializing session: {e}")))?;
        write_private(&self.path, &json).await
    }

    pub async fn clear(&self) -> VaultResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Atomic write (temp + rename) of a file only the owner may read.
pub(crate) async fn write_private(path: &Path, bytes: &[u8]) -> VaultResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = temp_path(path);
    let result = write_then_rename(&tmp_path, path, bytes).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}

async fn write_then_rename(tmp_path: &Path, path: &Path, bytes: &[u8]) -> VaultResult<()> {
    tokio::fs::write(tmp_path, bytes).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(tmp_path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    tokio::fs::rename(tmp_path, path).await?;
    Ok(())
}
