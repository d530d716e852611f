//! Storage-safe object names
//!
//! `{unix-millis}-{8 hex}_{base}.{ext}` where base and extension keep only
//! ASCII alphanumerics (everything else becomes `_`) and are lower-cased.
//! The random suffix keeps two uploads of the same name in the same
//! millisecond apart.

use rand::Rng;

const EMPTY_BASE: &str = "file";

/// Derive a fresh object name for `file_name`.
pub fn storage_name(file_name: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let nonce: u32 = rand::thread_rng().gen();
    storage_name_with(file_name, millis, nonce)
}

pub(crate) fn storage_name_with(file_name: &str, millis: i64, nonce: u32) -> String {
    // Only the final path component counts
    let leaf = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);

    let (base, ext) = match leaf.rsplit_once('.') {
        Some((base, ext)) => (base, sanitize(ext)),
        None => (leaf, String::new()),
    };

    let mut base = sanitize(base);
    if base.is_empty() {
        base = EMPTY_BASE.to_string();
    }

    if ext.is_empty() {
        format!("{millis}-{nonce:08x}_{base}")
    } else {
        format!("{millis}-{nonce:08x}_{base}.{ext}")
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
