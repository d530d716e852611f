//! RSA-OAEP key pairs: generation, export/import, and file-key wrapping
//!
//! Exported text is base64 of the DER container (SPKI for public keys,
//! PKCS#8 for private keys). Imports also accept PEM armour.

use lockbox_core::{VaultError, VaultResult};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use secrecy::SecretString;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::encoding::{from_text, to_text};
use crate::keys::FileKey;
use crate::{KEY_SIZE, RSA_BITS};

const PEM_PREFIX: &str = "-----BEGIN";

/// A freshly generated RSA-2048 key pair (public exponent 65537)
#[derive(Clone)]
pub struct KeyPair {
    pub public: RsaPublicKey,
    pub private: RsaPrivateKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &(self.public.size() * 8))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// Generate a new RSA key pair for OAEP-SHA256 use.
pub fn generate_key_pair() -> VaultResult<KeyPair> {
    let private = RsaPrivateKey::new(&mut rand::thread_rng(), RSA_BITS)
        .map_err(|e| VaultError::Other(anyhow::anyhow!("RSA key generation failed: {e}")))?;
    let public = RsaPublicKey::from(&private);
    Ok(KeyPair { public, private })
}

/// Export a public key as base64 SPKI DER.
pub fn export_public(key: &RsaPublicKey) -> VaultResult<String> {
    let der = key
        .to_public_key_der()
        .map_err(|e| VaultError::MalformedKey(format!("SPKI encoding: {e}")))?;
    Ok(to_text(der.as_bytes()))
}

/// Export a private key as base64 PKCS#8 DER.
pub fn export_private(key: &RsaPrivateKey) -> VaultResult<SecretString> {
    let der = key
        .to_pkcs8_der()
        .map_err(|e| VaultError::MalformedKey(format!("PKCS#8 encoding: {e}")))?;
    Ok(SecretString::from(to_text(der.as_bytes())))
}

pub fn import_public(text: &str) -> VaultResult<RsaPublicKey> {
    let text = text.trim();
    if text.starts_with(PEM_PREFIX) {
        return RsaPublicKey::from_public_key_pem(text)
            .map_err(|e| VaultError::MalformedKey(format!("public key PEM: {e}")));
    }
    let der = from_text(text).map_err(|e| VaultError::MalformedKey(e.to_string()))?;
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| VaultError::MalformedKey(format!("public key SPKI: {e}")))
}

pub fn import_private(text: &str) -> VaultResult<RsaPrivateKey> {
    let text = text.trim();
    if text.starts_with(PEM_PREFIX) {
        return RsaPrivateKey::from_pkcs8_pem(text)
            .map_err(|e| VaultError::MalformedKey(format!("private key PEM: {e}")));
    }
    let mut der = from_text(text).map_err(|e| VaultError::MalformedKey(e.to_string()))?;
    let key = RsaPrivateKey::from_pkcs8_der(&der)
        .map_err(|e| VaultError::MalformedKey(format!("private key PKCS#8: {e}")));
    der.zeroize();
    key
}

/// Wrap (encrypt) a file key under a recipient's public key with RSA-OAEP-SHA256.
pub fn wrap_key(public: &RsaPublicKey, file_key: &FileKey) -> VaultResult<Vec<u8>> {
    public
        .encrypt(
            &mut rand::thread_rng(),
            Oaep::new::<Sha256>(),
            file_key.as_bytes(),
        )
        .map_err(|e| VaultError::Other(anyhow::anyhow!("key wrapping failed: {e}")))
}

/// Unwrap (decrypt) a file key. A foreign private key and a damaged blob are
/// indistinguishable: both are `AuthenticationFailure`.
pub fn unwrap_key(private: &RsaPrivateKey, wrapped: &[u8]) -> VaultResult<FileKey> {
    let mut plaintext = private
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map_err(|_| VaultError::AuthenticationFailure)?;

    if plaintext.len() != KEY_SIZE {
        plaintext.zeroize();
        return Err(VaultError::AuthenticationFailure);
    }

    let mut key_bytes = [0u8; KEY_SIZE];
    key_bytes.copy_from_slice(&plaintext);
    plaintext.zeroize();

    Ok(FileKey::from_bytes(key_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_file_key;
    use rsa::pkcs8::LineEnding;
    use rsa::traits::PrivateKeyParts;
    use secrecy::ExposeSecret;

    #[test]
    fn test_generated_pair_shape() {
        let pair = generate_key_pair().unwrap();
        assert_eq!(pair.public.size() * 8, RSA_BITS);
        assert_eq!(pair.public.e(), &rsa::BigUint::from(65537u32));
    }

    #[test]
    fn test_export_import_roundtrip() {
        let pair = generate_key_pair().unwrap();

        let public_text = export_public(&pair.public).unwrap();
        let private_text = export_private(&pair.private).unwrap();

        assert_eq!(import_public(&public_text).unwrap(), pair.public);
        assert_eq!(import_private(private_text.expose_secret()).unwrap(), pair.private);
    }

    #[test]
    fn test_import_pem() {
        let pair = generate_key_pair().unwrap();
        let pem = pair.public.to_public_key_pem(LineEnding::LF).unwrap();
        assert_eq!(import_public(&pem).unwrap(), pair.public);

        let pem = pair.private.to_pkcs8_pem(LineEnding::LF).unwrap();
        assert_eq!(import_private(&pem).unwrap(), pair.private);
    }

    #[test]
    fn test_import_malformed() {
        assert!(matches!(import_public("not base64 at all!"), Err(VaultError::MalformedKey(_))));
        assert!(matches!(import_public("AAAA"), Err(VaultError::MalformedKey(_))));
        assert!(matches!(import_private("AAAA"), Err(VaultError::MalformedKey(_))));
        assert!(matches!(
            import_public("-----BEGIN PUBLIC KEY-----\ngarbage\n-----END PUBLIC KEY-----"),
            Err(VaultError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_public_text_is_not_a_private_key() {
        let pair = generate_key_pair().unwrap();
        let public_text = export_public(&pair.public).unwrap();
        assert!(matches!(import_private(&public_text), Err(VaultError::MalformedKey(_))));
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let pair = generate_key_pair().unwrap();
        let file_key = generate_file_key();

        let wrapped = wrap_key(&pair.public, &file_key).unwrap();
        assert_eq!(wrapped.len(), RSA_BITS / 8);

        let unwrapped = unwrap_key(&pair.private, &wrapped).unwrap();
        assert_eq!(unwrapped.as_bytes(), file_key.as_bytes());
    }

    #[test]
    fn test_unwrap_with_foreign_key() {
        let alice = generate_key_pair().unwrap();
        let mallory = generate_key_pair().unwrap();
        let file_key = generate_file_key();

        let wrapped = wrap_key(&alice.public, &file_key).unwrap();
        let result = unwrap_key(&mallory.private, &wrapped);

        assert!(matches!(result, Err(VaultError::AuthenticationFailure)));
    }

    #[test]
    fn test_unwrap_tampered() {
        let pair = generate_key_pair().unwrap();
        let mut wrapped = wrap_key(&pair.public, &generate_file_key()).unwrap();
        wrapped[10] ^= 0x40;

        let result = unwrap_key(&pair.private, &wrapped);
        assert!(matches!(result, Err(VaultError::AuthenticationFailure)));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let pair = generate_key_pair().unwrap();
        let dbg = format!("{pair:?}");

        assert!(dbg.contains("[REDACTED]"));
        assert!(dbg.contains("bits: 2048"));
        assert!(!dbg.contains(&pair.private.d().to_string()));
        assert!(!dbg.contains(&pair.private.primes()[0].to_string()));
        assert!(!dbg.contains("primes"));
    }
}
