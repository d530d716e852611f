//! lockbox-vault: the user-facing workflows
//!
//! Upload:   read → generate key → encrypt → encode key/IV → store object → insert record
//! Download: fetch object → decode key/IV → reconstruct key → decrypt → materialize
//!
//! Every workflow returns `WorkflowError`, whose `Display` is the single
//! message meant for the user.

pub mod download;
pub mod naming;
pub mod vault;
pub mod workflow;

pub use download::DecryptedFile;
pub use naming::storage_name;
pub use vault::{GeneratedKeys, UploadRequest, UploadSource, Vault, VaultSettings};
pub use workflow::{DownloadStage, ProgressFn, Stage, UploadStage, Workflow, WorkflowError};
