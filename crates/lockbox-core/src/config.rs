use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{VaultError, VaultResult};
use crate::types::KeyProtection;

/// Top-level configuration (loaded from lockbox.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LockboxConfig {
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    pub auth: AuthConfig,
    pub vault: VaultConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Which object store backs the encrypted blobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Fs,
    S3,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket name (default: encrypted-files)
    pub bucket: String,
    /// Enforce HTTPS for S3 connections (error on HTTP endpoints)
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// JSON file holding the file records
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JSON file holding registered users and their password hashes
    pub users_path: PathBuf,
    /// File holding the currently signed-in user
    pub session_path: PathBuf,
    /// Argon2id memory cost in KiB (default: 19456 = 19 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 2)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 1)
    pub argon2_parallelism: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// How per-file keys are stored: "rsa-oaep" (default) or "plain"
    pub key_protection: KeyProtection,
    /// Upload size limit in MiB (0 = unlimited)
    pub max_file_size_mb: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: PathBuf::from("~/.local/share/lockbox/objects"),
            endpoint: "http://localhost:9000".into(),
            region: "us-east-1".into(),
            bucket: "encrypted-files".into(),
            enforce_tls: false,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/lockbox/files.json"),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users_path: PathBuf::from("~/.local/share/lockbox/users.json"),
            session_path: PathBuf::from("~/.local/share/lockbox/session.json"),
            argon2_mem_cost_kib: 19456,
            argon2_time_cost: 2,
            argon2_parallelism: 1,
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            key_protection: KeyProtection::RsaOaep,
            max_file_size_mb: 50,
        }
    }
}

impl VaultConfig {
    /// Size limit in bytes, `None` when unlimited
    pub fn max_file_size_bytes(&self) -> Option<u64> {
        match self.max_file_size_mb {
            0 => None,
            mb => Some(mb.saturating_mul(1024 * 1024)),
        }
    }
}

impl LockboxConfig {
    /// Parse a config from TOML text
    pub fn from_toml(text: &str) -> VaultResult<Self> {
        toml::from_str(text).map_err(|e| VaultError::Config(e.to_string()))
    }

    /// Load a config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> VaultResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| VaultError::Config(format!("parsing {}: {e}", path.display())))
    }
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_prefix("~/")) {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}
