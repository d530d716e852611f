use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    /// AEAD tag or key-unwrap mismatch. Deliberately carries no detail: a wrong
    /// key, a wrong IV, and a corrupted ciphertext all look the same.
    #[error("authentication failed")]
    AuthenticationFailure,

    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Validation(String),

    #[error("not signed in")]
    Unauthenticated,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Auth(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VaultError {
    pub fn storage(e: impl std::fmt::Display) -> Self {
        VaultError::Storage(e.to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        VaultError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, VaultError::Validation(_))
    }
}
