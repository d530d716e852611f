pub mod config;
pub mod error;
pub mod lockfile;
pub mod types;

pub use error::{VaultError, VaultResult};
pub use lockfile::TableLock;
pub use types::{FileRecord, KeyProtection, NewFileRecord, UserId};
