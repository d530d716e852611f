//! Whole-file AES-256-GCM encryption/decryption
//!
//! The IV is returned separately (it lives in the metadata record), so the
//! stored object is just `[N bytes: ciphertext][16 bytes: GCM tag]`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use lockbox_core::{VaultError, VaultResult};
use rand::RngCore;

use crate::keys::FileKey;
use crate::{IV_SIZE, TAG_SIZE};

/// Output of [`encrypt`]: ciphertext with appended tag, plus the IV used
#[derive(Debug, Clone)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_SIZE],
}

/// Encrypt `plaintext` under `key` with a freshly drawn 96-bit IV.
pub fn encrypt(plaintext: &[u8], key: &FileKey) -> VaultResult<Sealed> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| VaultError::Other(anyhow::anyhow!("AES-GCM encryption failed: {e}")))?;

    Ok(Sealed { ciphertext, iv })
}

/// Decrypt `ciphertext` (tag appended) with `key` and `iv`.
///
/// A wrong key, wrong IV, truncated input or any flipped bit all produce the
/// same `AuthenticationFailure`.
pub fn decrypt(ciphertext: &[u8], key: &FileKey, iv: &[u8]) -> VaultResult<Vec<u8>> {
    if iv.len() != IV_SIZE || ciphertext.len() < TAG_SIZE {
        return Err(VaultError::AuthenticationFailure);
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| VaultError::AuthenticationFailure)
}
