//! The vault: encrypted upload, download, delete and listing over injected
//! cipher, object store, metadata store and auth provider.

use lockbox_auth::AuthProvider;
use lockbox_core::config::VaultConfig;
use lockbox_core::{FileRecord, KeyProtection, NewFileRecord, UserId, VaultError, VaultResult};
use lockbox_crypto::{
    export_private, export_public, from_text, generate_key_pair, import_private, import_public,
    to_text, unwrap_key, wrap_key, CipherProvider, FileKey,
};
use lockbox_storage::{MetadataStore, ObjectStore};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::download::DecryptedFile;
use crate::naming::storage_name;
use crate::workflow::{DownloadStage, ProgressFn, Tracker, UploadStage, Workflow, WorkflowError};

const MISSING_INPUT: &str = "Please select a file and enter your public key";
const MISSING_PRIVATE_KEY: &str = "Please enter your private key";
const DEFAULT_MIME: &str = "application/octet-stream";

/// Per-vault behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultSettings {
    /// How new uploads store their file key
    pub key_protection: KeyProtection,
    /// Upload size limit in bytes; `None` = unlimited
    pub max_file_size: Option<u64>,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self::from(&VaultConfig::default())
    }
}

impl From<&VaultConfig> for VaultSettings {
    fn from(config: &VaultConfig) -> Self {
        Self {
            key_protection: config.key_protection,
            max_file_size: config.max_file_size_bytes(),
        }
    }
}

/// Where upload bytes come from
#[derive(Debug, Clone)]
pub enum UploadSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub source: UploadSource,
    pub mime_type: String,
    /// Recipient public key as supplied by the user
    pub public_key: String,
}

impl UploadRequest {
    pub fn from_bytes(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            source: UploadSource::Bytes(bytes),
            mime_type: mime_type.into(),
            public_key: public_key.into(),
        }
    }

    /// Upload a local file, naming it after its last path component and
    /// guessing the MIME type from the extension.
    pub fn from_path(path: &Path, public_key: impl Into<String>) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name,
            source: UploadSource::Path(path.to_path_buf()),
            mime_type,
            public_key: public_key.into(),
        }
    }
}

/// Both halves of a new key pair, exported as text
pub struct GeneratedKeys {
    /// base64 SPKI DER
    pub public_key: String,
    /// base64 PKCS#8 DER
    pub private_key: SecretString,
}

pub struct Vault {
    cipher: Arc<dyn CipherProvider>,
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    auth: Arc<dyn AuthProvider>,
    settings: VaultSettings,
}

impl Vault {
    pub fn new(
        cipher: Arc<dyn CipherProvider>,
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        auth: Arc<dyn AuthProvider>,
        settings: VaultSettings,
    ) -> Self {
        Self {
            cipher,
            objects,
            metadata,
            auth,
            settings,
        }
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    // ── auth ─────────────────────────────────────────────────────────────

    pub async fn sign_up(&self, email: &str, password: &SecretString) -> Result<UserId, WorkflowError> {
        let user = self
            .auth
            .sign_up(email, password)
            .await
            .map_err(|e| WorkflowError::new(Workflow::SignUp, e))?;
        info!(user_id = %user, "signed up");
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<UserId, WorkflowError> {
        self.auth
            .sign_in(email, password)
            .await
            .map_err(|e| WorkflowError::new(Workflow::SignIn, e))
    }

    pub async fn sign_out(&self) -> Result<(), WorkflowError> {
        self.auth
            .sign_out()
            .await
            .map_err(|e| WorkflowError::new(Workflow::SignOut, e))
    }

    pub async fn current_user(&self) -> VaultResult<UserId> {
        self.auth.current_user().await
    }

    // ── keygen ───────────────────────────────────────────────────────────

    /// Generate an RSA-2048 key pair for the user to keep.
    pub async fn generate_keys(&self) -> Result<GeneratedKeys, WorkflowError> {
        let fail = |e| WorkflowError::new(Workflow::KeyGen, e);

        // RSA prime search is CPU-bound; keep it off the async workers
        let pair = tokio::task::spawn_blocking(generate_key_pair)
            .await
            .map_err(|e| fail(VaultError::Other(anyhow_join(e))))?
            .map_err(fail)?;

        Ok(GeneratedKeys {
            public_key: export_public(&pair.public).map_err(fail)?,
            private_key: export_private(&pair.private).map_err(fail)?,
        })
    }

    // ── upload ───────────────────────────────────────────────────────────

    /// Encrypt a file under a fresh key and store it with its metadata record.
    ///
    /// A stored object is not removed if the metadata insert fails afterwards;
    /// the orphan is logged with its name.
    pub async fn upload(
        &self,
        request: UploadRequest,
        progress: Option<&ProgressFn>,
    ) -> Result<FileRecord, WorkflowError> {
        let mut tracker = Tracker::new(Workflow::Upload, UploadStage::Idle, progress);

        let public_key = request.public_key.trim().to_string();
        if request.file_name.trim().is_empty() || public_key.is_empty() {
            return Err(tracker.fail(VaultError::validation(MISSING_INPUT)));
        }
        let wrapping_key = match self.settings.key_protection {
            KeyProtection::Plain => None,
            KeyProtection::RsaOaep => Some(import_public(&public_key).map_err(|e| {
                tracker.fail(VaultError::validation(format!(
                    "The public key is not a valid RSA public key ({e})"
                )))
            })?),
        };
        let user = self.auth.current_user().await.map_err(|e| tracker.fail(e))?;

        tracker.advance(UploadStage::Reading);
        let plaintext = self
            .read_source(&request.source)
            .await
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(UploadStage::Encrypting);
        let key = self.cipher.generate_key();
        let sealed = self
            .cipher
            .encrypt(&plaintext, &key)
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(UploadStage::Encoding);
        let encrypted_key = match &wrapping_key {
            None => {
                let raw = self.cipher.export_raw(&key);
                to_text(&raw)
            }
            Some(public) => {
                let wrapped = wrap_key(public, &key).map_err(|e| tracker.fail(e))?;
                to_text(&wrapped)
            }
        };
        let iv = to_text(&sealed.iv);
        let name = storage_name(&request.file_name);

        tracker.advance(UploadStage::StoringObject);
        self.objects
            .store(&name, sealed.ciphertext)
            .await
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(UploadStage::StoringMetadata);
        let mime_type = match request.mime_type.trim() {
            "" => DEFAULT_MIME.to_string(),
            m => m.to_string(),
        };
        let new_record = NewFileRecord {
            file_name: request.file_name,
            storage_path: name.clone(),
            encrypted_key,
            iv,
            public_key,
            original_size: plaintext.len() as u64,
            mime_type,
            user_id: user,
            key_protection: self.settings.key_protection,
        };
        let record = match self.metadata.insert(new_record).await {
            Ok(record) => record,
            Err(e) => {
                warn!(object = %name, "metadata insert failed; stored object is orphaned");
                return Err(tracker.fail(e));
            }
        };

        tracker.advance(UploadStage::Done);
        info!(
            id = %record.id,
            object = %record.storage_path,
            bytes = record.original_size,
            protection = %record.key_protection,
            "uploaded"
        );
        Ok(record)
    }

    async fn read_source(&self, source: &UploadSource) -> VaultResult<Zeroizing<Vec<u8>>> {
        let bytes = match source {
            UploadSource::Bytes(bytes) => {
                self.check_size(bytes.len() as u64)?;
                Zeroizing::new(bytes.clone())
            }
            UploadSource::Path(path) => {
                let meta = tokio::fs::metadata(path).await?;
                self.check_size(meta.len())?;
                Zeroizing::new(tokio::fs::read(path).await?)
            }
        };
        // The file may have grown between stat and read
        self.check_size(bytes.len() as u64)?;
        Ok(bytes)
    }

    fn check_size(&self, len: u64) -> VaultResult<()> {
        match self.settings.max_file_size {
            Some(max) if len > max => Err(VaultError::validation(format!(
                "File is too large ({len} bytes, limit {max} bytes)"
            ))),
            _ => Ok(()),
        }
    }

    // ── list ─────────────────────────────────────────────────────────────

    /// The signed-in user's files, newest first.
    pub async fn list(&self) -> Result<Vec<FileRecord>, WorkflowError> {
        let fail = |e| WorkflowError::new(Workflow::List, e);
        let user = self.auth.current_user().await.map_err(fail)?;
        self.metadata.list(&user).await.map_err(fail)
    }

    /// Fetch one of the signed-in user's records. Records owned by someone
    /// else are reported as not found.
    async fn owned_record(&self, id: &str) -> VaultResult<FileRecord> {
        let user = self.auth.current_user().await?;
        let record = self.metadata.get(id).await?;
        if record.user_id != user {
            return Err(VaultError::NotFound(format!("file record {id}")));
        }
        Ok(record)
    }

    // ── download ─────────────────────────────────────────────────────────

    /// Fetch and decrypt a file. `credential` is used for this call only.
    ///
    /// For `rsa-oaep` records it must be the RSA private key matching the
    /// public key given at upload. For `plain` records it is required but
    /// the key comes from the record itself: any non-empty credential
    /// decrypts a `plain` record, so only `rsa-oaep` records reject a wrong
    /// private key. The RSA import and unwrap run on the blocking pool.
    pub async fn download(
        &self,
        id: &str,
        credential: &SecretString,
        progress: Option<&ProgressFn>,
    ) -> Result<DecryptedFile, WorkflowError> {
        let mut tracker = Tracker::new(Workflow::Download, DownloadStage::Idle, progress);

        if credential.expose_secret().trim().is_empty() {
            return Err(tracker.fail(VaultError::validation(MISSING_PRIVATE_KEY)));
        }
        let record = self.owned_record(id).await.map_err(|e| tracker.fail(e))?;

        tracker.advance(DownloadStage::FetchingObject);
        let ciphertext = self
            .objects
            .fetch(&record.storage_path)
            .await
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(DownloadStage::Decoding);
        let encoded_key = Zeroizing::new(from_text(&record.encrypted_key).map_err(|e| tracker.fail(e))?);
        let iv = from_text(&record.iv).map_err(|e| tracker.fail(e))?;
        let key = self
            .reconstruct_key(&record, encoded_key, credential)
            .await
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(DownloadStage::Decrypting);
        let plaintext = self
            .cipher
            .decrypt(&ciphertext, &key, &iv)
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(DownloadStage::Materializing);
        let file = DecryptedFile::new(record.file_name.clone(), record.mime_type.clone(), plaintext);

        tracker.advance(DownloadStage::Done);
        info!(id = %record.id, bytes = file.len(), "downloaded");
        Ok(file)
    }

    async fn reconstruct_key(
        &self,
        record: &FileRecord,
        encoded_key: Zeroizing<Vec<u8>>,
        credential: &SecretString,
    ) -> VaultResult<FileKey> {
        match record.key_protection {
            KeyProtection::Plain => self.cipher.import_raw(&encoded_key),
            KeyProtection::RsaOaep => {
                let credential = SecretString::from(credential.expose_secret().to_string());
                tokio::task::spawn_blocking(move || {
                    let private = import_private(credential.expose_secret())?;
                    unwrap_key(&private, &encoded_key)
                })
                .await
                .map_err(|e| VaultError::Other(anyhow_join(e)))?
            }
        }
    }

    // ── delete ───────────────────────────────────────────────────────────

    /// Remove the stored object, then the metadata record.
    pub async fn delete(&self, id: &str) -> Result<(), WorkflowError> {
        let fail = |e| WorkflowError::new(Workflow::Delete, e);

        let record = self.owned_record(id).await.map_err(fail)?;
        self.objects
            .delete(&record.storage_path)
            .await
            .map_err(fail)?;
        self.metadata.delete(&record.id).await.map_err(fail)?;

        info!(id = %record.id, object = %record.storage_path, "deleted");
        Ok(())
    }
}

fn anyhow_join(e: tokio::task::JoinError) -> anyhow::Error {
    anyhow::anyhow!("RSA task failed: {e}")
}
