//! Base64 text form for key material and IVs stored in metadata records

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lockbox_core::{VaultError, VaultResult};

/// Standard-alphabet, padded base64 of `bytes`.
pub fn to_text(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Inverse of [`to_text`]. Surrounding whitespace is ignored.
pub fn from_text(text: &str) -> VaultResult<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| VaultError::MalformedEncoding(e.to_string()))
}
