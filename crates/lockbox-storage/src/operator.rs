//! OpenDAL Operator factory for lockbox object storage backends

use anyhow::{Context, Result};
use lockbox_core::config::{expand_tilde, StorageBackend, StorageConfig};
use opendal::Operator;
use std::path::Path;

/// Minimal config needed to build an S3 operator
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Build an OpenDAL Operator for any S3-compatible endpoint
///
/// Path-style addressing (the opendal default) is kept so MinIO-style
/// endpoints work without virtual-host DNS.
pub fn build_s3_operator(cfg: &S3Config) -> Result<Operator> {
    let builder = opendal::services::S3::default()
        .endpoint(&cfg.endpoint)
        .region(&cfg.region)
        .bucket(&cfg.bucket)
        .access_key_id(&cfg.access_key_id)
        .secret_access_key(&cfg.secret_access_key);

    let op = Operator::new(builder)
        .context("creating OpenDAL S3 operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}

/// Build an operator rooted at a local directory.
pub fn build_fs_operator(root: &Path) -> Result<Operator> {
    let root = expand_tilde(root);
    std::fs::create_dir_all(&root)
        .with_context(|| format!("creating object store root: {}", root.display()))?;

    let builder = opendal::services::Fs::default().root(&root.to_string_lossy());
    let op = Operator::new(builder)
        .context("creating OpenDAL fs operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .finish();

    Ok(op)
}

/// In-process operator; contents vanish with the process.
pub fn build_memory_operator() -> Result<Operator> {
    let op = Operator::new(opendal::services::Memory::default())
        .context("creating OpenDAL memory operator")?
        .finish();
    Ok(op)
}

/// Build the configured backend.
///
/// S3 credentials are only consulted for the `s3` backend. If the endpoint is
/// plain HTTP and `enforce_tls` is set this fails; otherwise it warns.
pub fn build_operator(
    storage: &StorageConfig,
    access_key_id: &str,
    secret_access_key: &str,
) -> Result<Operator> {
    match storage.backend {
        StorageBackend::Fs => build_fs_operator(&storage.root),
        StorageBackend::Memory => build_memory_operator(),
        StorageBackend::S3 => {
            if storage.endpoint.starts_with("http://") {
                if storage.enforce_tls {
                    anyhow::bail!(
                        "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                         Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                        storage.endpoint
                    );
                }
                tracing::warn!(
                    endpoint = %storage.endpoint,
                    "S3 endpoint uses plaintext HTTP; credentials are transmitted unencrypted"
                );
            }

            build_s3_operator(&S3Config {
                endpoint: storage.endpoint.clone(),
                region: storage.region.clone(),
                bucket: storage.bucket.clone(),
                access_key_id: access_key_id.to_string(),
                secret_access_key: secret_access_key.to_string(),
            })
        }
    }
}
