//! Integration tests for the local account store.

use lockbox_auth::{AuthProvider, LocalAuthProvider};
use lockbox_core::VaultError;
use lockbox_crypto::KdfParams;
use secrecy::SecretString;

fn fast_params() -> KdfParams {
    KdfParams {
        mem_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

fn pw(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

#[tokio::test]
async fn sign_up_signs_in() {
    let auth = LocalAuthProvider::in_memory(fast_params());
    assert!(matches!(auth.current_user().await, Err(VaultError::Unauthenticated)));

    let user = auth.sign_up("alice@example.com", &pw("hunter22")).await.unwrap();
    assert_eq!(auth.current_user().await.unwrap(), user);
    assert_eq!(auth.current_email().await.as_deref(), Some("alice@example.com"));
}

#[tokio::test]
async fn sign_in_sign_out_cycle() {
    let auth = LocalAuthProvider::in_memory(fast_params());
    let user = auth.sign_up("bob@example.com", &pw("s3cret-pw")).await.unwrap();

    auth.sign_out().await.unwrap();
    assert!(matches!(auth.current_user().await, Err(VaultError::Unauthenticated)));

    let again = auth.sign_in("BOB@example.com ", &pw("s3cret-pw")).await.unwrap();
    assert_eq!(again, user);
}

#[tokio::test]
async fn bad_credentials_share_one_message() {
    let auth = LocalAuthProvider::in_memory(fast_params());
    auth.sign_up("carol@example.com", &pw("right-password")).await.unwrap();
    auth.sign_out().await.unwrap();

    let wrong_pw = auth.sign_in("carol@example.com", &pw("wrong-password")).await.unwrap_err();
    let unknown = auth.sign_in("nobody@example.com", &pw("right-password")).await.unwrap_err();

    assert_eq!(wrong_pw.to_string(), "Invalid login credentials");
    assert_eq!(unknown.to_string(), wrong_pw.to_string());
    assert!(matches!(auth.current_user().await, Err(VaultError::Unauthenticated)));
}

#[tokio::test]
async fn sign_up_validation() {
    let auth = LocalAuthProvider::in_memory(fast_params());

    let short = auth.sign_up("dave@example.com", &pw("12345")).await.unwrap_err();
    assert!(short.to_string().contains("at least 6"));

    let bad_email = auth.sign_up("not-an-email", &pw("long-enough")).await.unwrap_err();
    assert!(matches!(bad_email, VaultError::Auth(_)));

    auth.sign_up("dave@example.com", &pw("long-enough")).await.unwrap();
    let dup = auth.sign_up("Dave@Example.com", &pw("another-one")).await.unwrap_err();
    assert_eq!(dup.to_string(), "User already registered");
}

#[tokio::test]
async fn accounts_and_session_persist() {
    let dir = tempfile::tempdir().unwrap();
    let users = dir.path().join("users.json");
    let session = dir.path().join("session.json");

    let user = {
        let auth = LocalAuthProvider::open(&users, &session, fast_params()).await.unwrap();
        auth.sign_up("erin@example.com", &pw("persisted")).await.unwrap()
    };

    let reopened = LocalAuthProvider::open(&users, &session, fast_params()).await.unwrap();
    assert_eq!(reopened.current_user().await.unwrap(), user);

    reopened.sign_out().await.unwrap();
    assert!(!session.exists());

    let third = LocalAuthProvider::open(&users, &session, fast_params()).await.unwrap();
    assert!(matches!(third.current_user().await, Err(VaultError::Unauthenticated)));
    assert_eq!(third.sign_in("erin@example.com", &pw("persisted")).await.unwrap(), user);

    let stored = std::fs::read_to_string(&users).unwrap();
    assert!(!stored.contains("persisted"), "plaintext password must not be stored");
}
