//! Local account store: email + Argon2id password hash per user
//!
//! The account table may be shared by several processes. Registration holds
//! the table lock while it re-reads, appends and rewrites the file; sign-in
//! and session checks read the current file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lockbox_core::config::{expand_tilde, AuthConfig};
use lockbox_core::{TableLock, UserId, VaultError, VaultResult};
use lockbox_crypto::{hash_password, verify_password, KdfParams};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::session::{write_private, Session, SessionFile};
use crate::AuthProvider;

const MIN_PASSWORD_LEN: usize = 6;
const INVALID_CREDENTIALS: &str = "Invalid login credentials";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    user_id: UserId,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountTable {
    accounts: Vec<Account>,
}

pub struct LocalAuthProvider {
    users_path: Option<PathBuf>,
    /// Sole copy for in-memory providers, last read table otherwise
    accounts: Mutex<Vec<Account>>,
    session_file: Option<SessionFile>,
    session: Mutex<Option<Session>>,
    params: KdfParams,
    /// Verified against when the email is unknown, so both failures cost one Argon2 run
    decoy_hash: OnceCell<String>,
}

impl LocalAuthProvider {
    /// Open (or create) the account table and session at the given paths.
    pub async fn open(users_path: &Path, session_path: &Path, params: KdfParams) -> VaultResult<Self> {
        let accounts = read_accounts(users_path).await?;

        let session_file = SessionFile::new(session_path);
        let session = session_file.load().await?;

        Ok(Self {
            users_path: Some(users_path.to_path_buf()),
            accounts: Mutex::new(accounts),
            session_file: Some(session_file),
            session: Mutex::new(session),
            params,
            decoy_hash: OnceCell::new(),
        })
    }

    /// Open using the `[auth]` section of the config.
    pub async fn from_config(config: &AuthConfig) -> VaultResult<Self> {
        let params = KdfParams {
            mem_cost_kib: config.argon2_mem_cost_kib,
            time_cost: config.argon2_time_cost,
            parallelism: config.argon2_parallelism,
        };
        Self::open(
            &expand_tilde(&config.users_path),
            &expand_tilde(&config.session_path),
            params,
        )
        .await
    }

    /// Accounts and session live only as long as this value.
    pub fn in_memory(params: KdfParams) -> Self {
        Self {
            users_path: None,
            accounts: Mutex::new(Vec::new()),
            session_file: None,
            session: Mutex::new(None),
            params,
            decoy_hash: OnceCell::new(),
        }
    }

    /// Email of the signed-in user, if any
    pub async fn current_email(&self) -> Option<String> {
        self.session.lock().await.as_ref().map(|s| s.email.clone())
    }

    /// Current accounts, refreshed from disk for file-backed providers
    async fn accounts(&self) -> VaultResult<Vec<Account>> {
        let mut cached = self.accounts.lock().await;
        if let Some(path) = &self.users_path {
            *cached = read_accounts(path).await?;
        }
        Ok(cached.clone())
    }

    async fn persist_accounts(&self, accounts: &[Account]) -> VaultResult<()> {
        let Some(path) = &self.users_path else {
            return Ok(());
        };
        let table = AccountTable {
            accounts: accounts.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&table)
            .map_err(|e| VaultError::Other(anyhow::anyhow!("serializing account table: {e}")))?;
        write_private(path, &json).await
    }

    async fn decoy_hash(&self) -> VaultResult<&str> {
        let hash = self
            .decoy_hash
            .get_or_try_init(|| {
                let decoy = SecretString::from(UserId::generate().to_string());
                hash_blocking(decoy, self.params.clone())
            })
            .await?;
        Ok(hash.as_str())
    }

    async fn start_session(&self, account: &Account) -> VaultResult<()> {
        let session = Session {
            user_id: account.user_id.clone(),
            email: account.email.clone(),
            signed_in_at: Utc::now(),
        };
        if let Some(file) = &self.session_file {
            file.save(&session).await?;
        }
        *self.session.lock().await = Some(session);
        Ok(())
    }
}

async fn read_accounts(path: &Path) -> VaultResult<Vec<Account>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let table: AccountTable = serde_json::from_str(&content)
        .map_err(|e| VaultError::Config(format!("parsing account table {}: {e}", path.display())))?;
    Ok(table.accounts)
}

fn owned_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}

async fn hash_blocking(password: SecretString, params: KdfParams) -> VaultResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password, &params))
        .await
        .map_err(|e| VaultError::Other(anyhow::anyhow!("password hashing task failed: {e}")))?
}

async fn verify_blocking(password: SecretString, phc: String) -> VaultResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &phc))
        .await
        .map_err(|e| VaultError::Other(anyhow::anyhow!("password check task failed: {e}")))?
}

/// Trimmed, lower-cased email, or a validation message
fn normalize_email(email: &str) -> VaultResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(VaultError::Auth("Unable to validate email address: invalid format".into()));
    }
    Ok(email)
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_up(&self, email: &str, password: &SecretString) -> VaultResult<UserId> {
        let email = normalize_email(email)?;
        if password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
            return Err(VaultError::Auth(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        // Argon2 runs outside the table lock
        let password_hash = hash_blocking(owned_secret(password), self.params.clone()).await?;

        let _lock = match &self.users_path {
            Some(path) => Some(TableLock::acquire(path).await?),
            None => None,
        };
        let account = {
            let mut accounts = self.accounts.lock().await;
            if let Some(path) = &self.users_path {
                *accounts = read_accounts(path).await?;
            }
            if accounts.iter().any(|a| a.email == email) {
                return Err(VaultError::Auth("User already registered".into()));
            }

            let account = Account {
                user_id: UserId::generate(),
                email,
                password_hash,
                created_at: Utc::now(),
            };
            let mut next = accounts.clone();
            next.push(account.clone());
            self.persist_accounts(&next).await?;
            *accounts = next;
            account
        };

        info!(user_id = %account.user_id, "account registered");
        self.start_session(&account).await?;
        Ok(account.user_id)
    }

    async fn sign_in(&self, email: &str, password: &SecretString) -> VaultResult<UserId> {
        let email = normalize_email(email).map_err(|_| VaultError::Auth(INVALID_CREDENTIALS.into()))?;

        let found = self.accounts().await?.into_iter().find(|a| a.email == email);
        let Some(account) = found else {
            let decoy = self.decoy_hash().await?.to_string();
            let _ = verify_blocking(owned_secret(password), decoy).await?;
            debug!("sign-in for unknown email");
            return Err(VaultError::Auth(INVALID_CREDENTIALS.into()));
        };

        if !verify_blocking(owned_secret(password), account.password_hash.clone()).await? {
            debug!(user_id = %account.user_id, "password mismatch");
            return Err(VaultError::Auth(INVALID_CREDENTIALS.into()));
        }

        self.start_session(&account).await?;
        info!(user_id = %account.user_id, "signed in");
        Ok(account.user_id)
    }

    async fn sign_out(&self) -> VaultResult<()> {
        if let Some(file) = &self.session_file {
            file.clear().await?;
        }
        *self.session.lock().await = None;
        Ok(())
    }

    async fn current_user(&self) -> VaultResult<UserId> {
        let session = self.session.lock().await.clone();
        let Some(session) = session else {
            return Err(VaultError::Unauthenticated);
        };

        // A session pointing at a removed account is treated as signed out
        let known = self
            .accounts()
            .await?
            .iter()
            .any(|a| a.user_id == session.user_id);
        if !known {
            return Err(VaultError::Unauthenticated);
        }
        Ok(session.user_id)
    }
}
