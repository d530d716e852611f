//! Argon2id password hashing for the local account store

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use lockbox_core::{VaultError, VaultResult};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};

/// Argon2id parameters
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 19456 = 19 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 2)
    pub time_cost: u32,
    /// Parallelism (default: 1)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 19456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// Hash a password into a self-describing PHC string (`$argon2id$v=19$...`).
pub fn hash_password(password: &SecretString, params: &KdfParams) -> VaultResult<String> {
    let argon2_params = Params::new(params.mem_cost_kib, params.time_cost, params.parallelism, None)
        .map_err(|e| VaultError::Config(format!("invalid Argon2id params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| VaultError::Other(anyhow::anyhow!("salt encoding failed: {e}")))?;
    let hash = argon2
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map_err(|e| VaultError::Other(anyhow::anyhow!("Argon2id hashing failed: {e}")))?;

    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. Parameters come from the string.
pub fn verify_password(password: &SecretString, phc: &str) -> VaultResult<bool> {
    let parsed = PasswordHash::new(phc)
        .map_err(|e| VaultError::MalformedEncoding(format!("password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.expose_secret().as_bytes(), &parsed)
        .is_ok())
}
