//! End-to-end vault workflows over in-memory stores.

use async_trait::async_trait;
use lockbox_auth::{AuthProvider, LocalAuthProvider};
use lockbox_core::{FileRecord, KeyProtection, NewFileRecord, UserId, VaultError, VaultResult};
use lockbox_crypto::{AesGcmProvider, KdfParams};
use lockbox_storage::{
    build_memory_operator, MemoryMetadataStore, MetadataStore, ObjectStore, OpendalObjectStore,
};
use lockbox_vault::{UploadRequest, Vault, VaultSettings, Workflow};
use secrecy::SecretString;
use std::sync::Arc;

struct Harness {
    vault: Vault,
    objects: Arc<OpendalObjectStore>,
    metadata: Arc<MemoryMetadataStore>,
    auth: Arc<LocalAuthProvider>,
}

fn fast_params() -> KdfParams {
    KdfParams {
        mem_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

async fn harness(key_protection: KeyProtection) -> Harness {
    let objects = Arc::new(OpendalObjectStore::new(
        build_memory_operator().unwrap(),
        "memory",
    ));
    let metadata = Arc::new(MemoryMetadataStore::new());
    let auth = Arc::new(LocalAuthProvider::in_memory(fast_params()));
    auth.sign_up("owner@example.com", &secret("correct horse"))
        .await
        .unwrap();

    let vault = Vault::new(
        Arc::new(AesGcmProvider),
        objects.clone(),
        metadata.clone(),
        auth.clone(),
        VaultSettings {
            key_protection,
            max_file_size: Some(1024 * 1024),
        },
    );
    Harness {
        vault,
        objects,
        metadata,
        auth,
    }
}

fn report_card(public_key: &str) -> UploadRequest {
    UploadRequest::from_bytes(
        "report card.pdf",
        b"%PDF-1.7 grades: A A B+".to_vec(),
        "application/pdf",
        public_key,
    )
}

#[tokio::test]
async fn report_card_roundtrip_with_wrapped_key() {
    let h = harness(KeyProtection::RsaOaep).await;
    let keys = h.vault.generate_keys().await.unwrap();

    let record = h.vault.upload(report_card(&keys.public_key), None).await.unwrap();
    assert!(!record.storage_path.contains(' '));
    assert!(record.storage_path.ends_with(".pdf"));
    assert_eq!(record.file_name, "report card.pdf");
    assert_eq!(record.original_size, 23);
    assert_eq!(record.key_protection, KeyProtection::RsaOaep);
    assert!(h.objects.exists(&record.storage_path).await.unwrap());

    let stored = h.objects.fetch(&record.storage_path).await.unwrap();
    assert_ne!(&stored[..], b"%PDF-1.7 grades: A A B+");

    let file = h
        .vault
        .download(&record.id, &keys.private_key, None)
        .await
        .unwrap();
    assert_eq!(file.bytes(), b"%PDF-1.7 grades: A A B+");
    assert_eq!(file.file_name(), "report card.pdf");
    assert_eq!(file.mime_type(), "application/pdf");
}

#[tokio::test]
async fn same_name_twice_gets_distinct_objects() {
    let h = harness(KeyProtection::Plain).await;

    let a = h.vault.upload(report_card("pk"), None).await.unwrap();
    let b = h.vault.upload(report_card("pk"), None).await.unwrap();

    assert_ne!(a.storage_path, b.storage_path);
    assert_ne!(a.encrypted_key, b.encrypted_key);
    assert_ne!(a.iv, b.iv);

    let listed = h.vault.list().await.unwrap();
    let ids: Vec<_> = listed.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec![b.id, a.id]);
}

#[tokio::test]
async fn delete_removes_object_and_record() {
    let h = harness(KeyProtection::Plain).await;
    let record = h.vault.upload(report_card("pk"), None).await.unwrap();

    h.vault.delete(&record.id).await.unwrap();

    assert!(!h.objects.exists(&record.storage_path).await.unwrap());
    assert!(h.metadata.is_empty().await);
    assert!(h.vault.list().await.unwrap().is_empty());

    let again = h.vault.delete(&record.id).await.unwrap_err();
    assert_eq!(again.to_string(), "Failed to delete file");
}

#[tokio::test]
async fn wrong_private_key_gives_one_generic_message() {
    let h = harness(KeyProtection::RsaOaep).await;
    let owner_keys = h.vault.generate_keys().await.unwrap();
    let other_keys = h.vault.generate_keys().await.unwrap();
    let record = h.vault.upload(report_card(&owner_keys.public_key), None).await.unwrap();

    let expected = "Failed to download and decrypt file. Please check your private key.";

    let foreign = h
        .vault
        .download(&record.id, &other_keys.private_key, None)
        .await
        .unwrap_err();
    assert_eq!(foreign.to_string(), expected);
    assert!(matches!(foreign.cause(), VaultError::AuthenticationFailure));

    let garbage = h
        .vault
        .download(&record.id, &secret("definitely not a key"), None)
        .await
        .unwrap_err();
    assert_eq!(garbage.to_string(), expected);
    assert_eq!(garbage.workflow(), Workflow::Download);
}

#[tokio::test]
async fn tampered_object_is_rejected() {
    let h = harness(KeyProtection::Plain).await;
    let record = h.vault.upload(report_card("pk"), None).await.unwrap();

    let mut stored = h.objects.fetch(&record.storage_path).await.unwrap();
    stored[3] ^= 0x01;
    h.objects.delete(&record.storage_path).await.unwrap();
    h.objects.store(&record.storage_path, stored).await.unwrap();

    let err = h
        .vault
        .download(&record.id, &secret("anything"), None)
        .await
        .unwrap_err();
    assert!(matches!(err.cause(), VaultError::AuthenticationFailure));
    assert_eq!(err.stage(), Some("decrypting"));
}

#[tokio::test]
async fn plain_mode_requires_credential_but_ignores_it() {
    let h = harness(KeyProtection::Plain).await;
    let record = h.vault.upload(report_card("any text at all"), None).await.unwrap();
    assert_eq!(record.key_protection, KeyProtection::Plain);
    assert_eq!(record.public_key, "any text at all");

    let empty = h.vault.download(&record.id, &secret("  "), None).await.unwrap_err();
    assert!(empty.is_validation());
    assert_eq!(empty.to_string(), "Please enter your private key");

    let file = h.vault.download(&record.id, &secret("whatever"), None).await.unwrap();
    assert_eq!(file.bytes(), b"%PDF-1.7 grades: A A B+");
}

/// Replace a stored record with a copy whose text fields were edited
async fn corrupt_record(h: &Harness, record: &FileRecord, edit: impl FnOnce(&mut NewFileRecord)) -> FileRecord {
    let mut copy = NewFileRecord {
        file_name: record.file_name.clone(),
        storage_path: record.storage_path.clone(),
        encrypted_key: record.encrypted_key.clone(),
        iv: record.iv.clone(),
        public_key: record.public_key.clone(),
        original_size: record.original_size,
        mime_type: record.mime_type.clone(),
        user_id: record.user_id.clone(),
        key_protection: record.key_protection,
    };
    edit(&mut copy);
    h.metadata.delete(&record.id).await.unwrap();
    h.metadata.insert(copy).await.unwrap()
}

#[tokio::test]
async fn corrupted_record_text_gives_generic_message() {
    let expected = "Failed to download and decrypt file. Please check your private key.";

    for protection in [KeyProtection::Plain, KeyProtection::RsaOaep] {
        let h = harness(protection).await;
        let keys = h.vault.generate_keys().await.unwrap();
        let uploaded = h.vault.upload(report_card(&keys.public_key), None).await.unwrap();

        let bad_iv = corrupt_record(&h, &uploaded, |r| r.iv = "not*base64*at*all".into()).await;
        let err = h
            .vault
            .download(&bad_iv.id, &keys.private_key, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), expected);
        assert!(matches!(err.cause(), VaultError::MalformedEncoding(_)));
        assert_eq!(err.stage(), Some("decoding"));

        let bad_key = corrupt_record(&h, &bad_iv, |r| {
            r.iv = uploaded.iv.clone();
            r.encrypted_key = "%%%".into();
        })
        .await;
        let err = h
            .vault
            .download(&bad_key.id, &keys.private_key, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), expected);
        assert!(matches!(err.cause(), VaultError::MalformedEncoding(_)));
        assert_eq!(err.stage(), Some("decoding"));
        assert_eq!(err.workflow(), Workflow::Download);
    }
}

#[tokio::test]
async fn upload_validation() {
    let h = harness(KeyProtection::RsaOaep).await;

    let no_key = h.vault.upload(report_card("   "), None).await.unwrap_err();
    assert_eq!(no_key.to_string(), "Please select a file and enter your public key");

    let no_name = h
        .vault
        .upload(UploadRequest::from_bytes("", vec![1], "", "pk"), None)
        .await
        .unwrap_err();
    assert!(no_name.is_validation());

    let not_rsa = h.vault.upload(report_card("pk"), None).await.unwrap_err();
    assert!(not_rsa.is_validation());
    assert!(not_rsa.to_string().contains("not a valid RSA public key"));

    let keys = h.vault.generate_keys().await.unwrap();
    let too_big = UploadRequest::from_bytes("big.bin", vec![0; 1024 * 1024 + 1], "", keys.public_key);
    let err = h.vault.upload(too_big, None).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.stage(), Some("reading"));

    assert!(h.metadata.is_empty().await);
}

#[tokio::test]
async fn signed_out_user_cannot_upload_or_list() {
    let h = harness(KeyProtection::Plain).await;
    h.vault.sign_out().await.unwrap();

    let upload = h.vault.upload(report_card("pk"), None).await.unwrap_err();
    assert!(matches!(upload.cause(), VaultError::Unauthenticated));

    let list = h.vault.list().await.unwrap_err();
    assert!(matches!(list.cause(), VaultError::Unauthenticated));
}

#[tokio::test]
async fn other_users_files_are_invisible() {
    let h = harness(KeyProtection::Plain).await;
    let record = h.vault.upload(report_card("pk"), None).await.unwrap();

    h.auth
        .sign_up("intruder@example.com", &secret("intruder-pw"))
        .await
        .unwrap();

    assert!(h.vault.list().await.unwrap().is_empty());
    let del = h.vault.delete(&record.id).await.unwrap_err();
    assert!(matches!(del.cause(), VaultError::NotFound(_)));
    let dl = h.vault.download(&record.id, &secret("x"), None).await.unwrap_err();
    assert!(matches!(dl.cause(), VaultError::NotFound(_)));

    assert!(h.objects.exists(&record.storage_path).await.unwrap());
}

#[tokio::test]
async fn upload_from_path_reads_file_and_guesses_mime() {
    let h = harness(KeyProtection::Plain).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("holiday photo.png");
    std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

    let record = h
        .vault
        .upload(UploadRequest::from_path(&path, "pk"), None)
        .await
        .unwrap();
    assert_eq!(record.mime_type, "image/png");
    assert_eq!(record.original_size, 4);
    assert!(record.storage_path.ends_with("_holiday_photo.png"));

    let out = tempfile::tempdir().unwrap();
    let file = h.vault.download(&record.id, &secret("pk"), None).await.unwrap();
    let written = file.write_into(out.path()).await.unwrap();
    assert_eq!(written, out.path().join("holiday photo.png"));
    assert_eq!(std::fs::read(written).unwrap(), [0x89, b'P', b'N', b'G']);
}

/// Metadata store whose inserts always fail
struct BrokenMetadata;

#[async_trait]
impl MetadataStore for BrokenMetadata {
    async fn insert(&self, _record: NewFileRecord) -> VaultResult<FileRecord> {
        Err(VaultError::storage("table is read-only"))
    }

    async fn get(&self, id: &str) -> VaultResult<FileRecord> {
        Err(VaultError::NotFound(id.to_string()))
    }

    async fn list(&self, _owner: &UserId) -> VaultResult<Vec<FileRecord>> {
        Ok(Vec::new())
    }

    async fn delete(&self, id: &str) -> VaultResult<()> {
        Err(VaultError::NotFound(id.to_string()))
    }
}

#[tokio::test]
async fn failed_metadata_insert_leaves_object_behind() {
    let objects = Arc::new(OpendalObjectStore::new(
        build_memory_operator().unwrap(),
        "memory",
    ));
    let auth = Arc::new(LocalAuthProvider::in_memory(fast_params()));
    auth.sign_up("owner@example.com", &secret("correct horse"))
        .await
        .unwrap();
    let vault = Vault::new(
        Arc::new(AesGcmProvider),
        objects.clone(),
        Arc::new(BrokenMetadata),
        auth,
        VaultSettings {
            key_protection: KeyProtection::Plain,
            max_file_size: None,
        },
    );

    let err = vault.upload(report_card("pk"), None).await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to upload file. Please try again.");
    assert_eq!(err.stage(), Some("storing metadata"));

    let entries = objects.operator().list("/").await.unwrap();
    let orphans: Vec<_> = entries
        .iter()
        .map(|e| e.path().to_string())
        .filter(|p| p.ends_with("_report_card.pdf"))
        .collect();
    assert_eq!(orphans.len(), 1);
}
