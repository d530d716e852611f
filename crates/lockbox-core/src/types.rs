use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of an authenticated user (UUID string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the per-file symmetric key is held in the metadata record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyProtection {
    /// Raw 32-byte key, base64. The declared public key is informational only.
    #[default]
    Plain,
    /// Key wrapped with RSA-OAEP-SHA256 under the declared public key, base64.
    RsaOaep,
}

impl fmt::Display for KeyProtection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyProtection::Plain => f.write_str("plain"),
            KeyProtection::RsaOaep => f.write_str("rsa-oaep"),
        }
    }
}

/// A file record before the metadata store assigns `id` and `created_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFileRecord {
    pub file_name: String,
    pub storage_path: String,
    /// Symmetric key as stored (raw or wrapped, see `key_protection`), base64
    pub encrypted_key: String,
    /// 96-bit AES-GCM IV, base64
    pub iv: String,
    pub public_key: String,
    pub original_size: u64,
    pub mime_type: String,
    pub user_id: UserId,
    pub key_protection: KeyProtection,
}

/// Metadata for one uploaded file. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub file_name: String,
    pub storage_path: String,
    pub encrypted_key: String,
    pub iv: String,
    pub public_key: String,
    pub original_size: u64,
    pub mime_type: String,
    pub user_id: UserId,
    /// Records written before wrapping existed carry no tag and are plain
    #[serde(default)]
    pub key_protection: KeyProtection,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn from_new(id: String, created_at: DateTime<Utc>, new: NewFileRecord) -> Self {
        Self {
            id,
            file_name: new.file_name,
            storage_path: new.storage_path,
            encrypted_key: new.encrypted_key,
            iv: new.iv,
            public_key: new.public_key,
            original_size: new.original_size,
            mime_type: new.mime_type,
            user_id: new.user_id,
            key_protection: new.key_protection,
            created_at,
        }
    }
}
