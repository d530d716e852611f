//! lockbox-crypto: client-side encryption for lockbox
//!
//! Every uploaded file gets its own AES-256-GCM key and a fresh 96-bit IV.
//! The ciphertext (with the 16-byte tag appended) goes to the object store;
//! the key and IV go to the metadata record as base64 text.
//!
//! ```text
//! FileKey (256-bit random, single use)
//!   ├── AES-256-GCM(key, iv=random_96bit)  → object store
//!   └── stored in the record either
//!         plain:    base64(key)
//!         rsa-oaep: base64(RSA-OAEP-SHA256(recipient public key, key))
//! ```

pub mod cipher;
pub mod encoding;
pub mod keypair;
pub mod keys;
pub mod password;
pub mod provider;

pub use cipher::{decrypt, encrypt, Sealed};
pub use encoding::{from_text, to_text};
pub use keypair::{
    export_private, export_public, generate_key_pair, import_private, import_public, unwrap_key,
    wrap_key, KeyPair,
};
pub use keys::{export_raw, generate_file_key, import_raw, FileKey};
pub use password::{hash_password, verify_password, KdfParams};
pub use provider::{AesGcmProvider, CipherProvider};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM initialization vector (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// RSA modulus size for generated key pairs
pub const RSA_BITS: usize = 2048;
