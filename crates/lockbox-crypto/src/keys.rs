//! Per-file symmetric keys: generation and raw export/import

use lockbox_core::{VaultError, VaultResult};
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::KEY_SIZE;

/// A per-file 256-bit encryption key. Zeroized on drop.
#[derive(Clone)]
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit file encryption key.
pub fn generate_file_key() -> FileKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    FileKey::from_bytes(bytes)
}

/// Raw byte form of a key, wiped when the returned buffer drops.
pub fn export_raw(key: &FileKey) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(key.as_bytes().to_vec())
}

/// Rebuild a key from its raw form. Anything but exactly 32 bytes is rejected.
pub fn import_raw(bytes: &[u8]) -> VaultResult<FileKey> {
    if bytes.len() != KEY_SIZE {
        return Err(VaultError::MalformedKey(format!(
            "raw key has wrong size: {} bytes (expected {})",
            bytes.len(),
            KEY_SIZE
        )));
    }
    let mut key_bytes = [0u8; KEY_SIZE];
    key_bytes.copy_from_slice(bytes);
    Ok(FileKey::from_bytes(key_bytes))
}
