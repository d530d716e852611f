//! Decrypted download materialization

use lockbox_core::{VaultError, VaultResult};
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

const FALLBACK_NAME: &str = "download";
const MAX_SUFFIX: u32 = 999;

/// Plaintext of a downloaded file, wiped from memory on drop
pub struct DecryptedFile {
    file_name: String,
    mime_type: String,
    bytes: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for DecryptedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptedFile")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl DecryptedFile {
    pub fn new(file_name: String, mime_type: String, bytes: Vec<u8>) -> Self {
        Self {
            file_name,
            mime_type,
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write into `dir` under the original file name and return the path.
    ///
    /// Existing files are never replaced: `name.ext` becomes `name (1).ext`,
    /// `name (2).ext`, ... The content is written to a temp file first and
    /// then linked into place, so a partial file never appears under the
    /// final name.
    pub async fn write_into(&self, dir: &Path) -> VaultResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;

        let leaf = local_name(&self.file_name);
        let tmp_path = dir.join(format!(".{leaf}.{}.partial", std::process::id()));
        tokio::fs::write(&tmp_path, self.bytes.as_slice()).await?;

        let result = link_unique(&tmp_path, dir, &leaf).await;
        // The temp name is always removed; on success the content lives on
        // under the linked name
        let _ = tokio::fs::remove_file(&tmp_path).await;

        let path = result?;
        debug!(path = %path.display(), bytes = self.bytes.len(), "wrote decrypted file");
        Ok(path)
    }
}

/// A name safe to create inside the target directory
fn local_name(file_name: &str) -> String {
    let leaf = file_name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if leaf.is_empty() || leaf == "." || leaf == ".." {
        FALLBACK_NAME.to_string()
    } else {
        leaf.to_string()
    }
}

fn candidate(leaf: &str, n: u32) -> String {
    if n == 0 {
        return leaf.to_string();
    }
    match leaf.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{leaf} ({n})"),
    }
}

async fn link_unique(tmp_path: &Path, dir: &Path, leaf: &str) -> VaultResult<PathBuf> {
    for n in 0..=MAX_SUFFIX {
        let target = dir.join(candidate(leaf, n));
        match tokio::fs::hard_link(tmp_path, &target).await {
            Ok(()) => return Ok(target),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(VaultError::Storage(format!(
        "no free file name for {leaf} in {}",
        dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, bytes: &[u8]) -> DecryptedFile {
        DecryptedFile::new(name.into(), "text/plain".into(), bytes.to_vec())
    }

    #[test]
    fn test_candidate_names() {
        assert_eq!(candidate("report card.pdf", 0), "report card.pdf");
        assert_eq!(candidate("report card.pdf", 2), "report card (2).pdf");
        assert_eq!(candidate("Makefile", 1), "Makefile (1)");
        assert_eq!(candidate(".env", 1), ".env (1)");
    }

    #[test]
    fn test_local_name_strips_directories() {
        assert_eq!(local_name("../../etc/passwd"), "passwd");
        assert_eq!(local_name("dir\\x.txt"), "x.txt");
        assert_eq!(local_name(".."), "download");
        assert_eq!(local_name(""), "download");
    }

    #[tokio::test]
    async fn test_write_into_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

        let first = file("notes.txt", b"one").write_into(dir.path()).await.unwrap();
        let second = file("notes.txt", b"two").write_into(dir.path()).await.unwrap();

        assert_eq!(first, dir.path().join("notes (1).txt"));
        assert_eq!(second, dir.path().join("notes (2).txt"));
        assert_eq!(std::fs::read(dir.path().join("notes.txt")).unwrap(), b"keep me");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_write_into_leaves_no_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        file("a.bin", &[1, 2, 3]).write_into(dir.path()).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.bin".to_string()]);
    }

    #[test]
    fn test_debug_hides_content() {
        let f = file("secret.txt", b"top secret");
        let dbg = format!("{f:?}");
        assert!(!dbg.contains("top secret"));
        assert!(dbg.contains("len: 10"));
    }
}
