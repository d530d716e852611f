//! Injectable symmetric cipher interface

use lockbox_core::VaultResult;
use zeroize::Zeroizing;

use crate::cipher::{self, Sealed};
use crate::keys::{self, FileKey};

/// The symmetric operations the vault workflows need. Implementations must be
/// authenticated encryption with a fresh IV per `encrypt` call.
pub trait CipherProvider: Send + Sync {
    fn generate_key(&self) -> FileKey;

    fn encrypt(&self, plaintext: &[u8], key: &FileKey) -> VaultResult<Sealed>;

    /// Fails with `AuthenticationFailure` on any tag mismatch.
    fn decrypt(&self, ciphertext: &[u8], key: &FileKey, iv: &[u8]) -> VaultResult<Vec<u8>>;

    fn export_raw(&self, key: &FileKey) -> Zeroizing<Vec<u8>>;

    fn import_raw(&self, bytes: &[u8]) -> VaultResult<FileKey>;
}

/// AES-256-GCM with 96-bit random IVs
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmProvider;

impl CipherProvider for AesGcmProvider {
    fn generate_key(&self) -> FileKey {
        keys::generate_file_key()
    }

    fn encrypt(&self, plaintext: &[u8], key: &FileKey) -> VaultResult<Sealed> {
        cipher::encrypt(plaintext, key)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &FileKey, iv: &[u8]) -> VaultResult<Vec<u8>> {
        cipher::decrypt(ciphertext, key, iv)
    }

    fn export_raw(&self, key: &FileKey) -> Zeroizing<Vec<u8>> {
        keys::export_raw(key)
    }

    fn import_raw(&self, bytes: &[u8]) -> VaultResult<FileKey> {
        keys::import_raw(bytes)
    }
}
