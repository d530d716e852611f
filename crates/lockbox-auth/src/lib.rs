//! lockbox-auth: who is uploading, and whose files are listed
//!
//! `AuthProvider` is the seam the vault workflows depend on. The bundled
//! `LocalAuthProvider` keeps accounts in a JSON file (Argon2id password
//! hashes) and remembers the signed-in user in a session file.

pub mod local;
pub mod session;

pub use local::LocalAuthProvider;
pub use session::{Session, SessionFile};

use async_trait::async_trait;
use lockbox_core::{UserId, VaultResult};
use secrecy::SecretString;

/// Sign-in / sign-up contract. Errors carry a human-readable message.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Register a new account and sign it in.
    async fn sign_up(&self, email: &str, password: &SecretString) -> VaultResult<UserId>;

    async fn sign_in(&self, email: &str, password: &SecretString) -> VaultResult<UserId>;

    async fn sign_out(&self) -> VaultResult<()>;

    /// The signed-in user, or `Unauthenticated`.
    async fn current_user(&self) -> VaultResult<UserId>;
}
