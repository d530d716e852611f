//! Workflow stages and the user-facing error boundary

use lockbox_core::VaultError;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Progress callback, called with the name of each stage as it starts
pub type ProgressFn = Box<dyn Fn(&str) + Send + Sync>;

/// Upload: Idle → Reading → Encrypting → Encoding → StoringObject → StoringMetadata → Done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Idle,
    Reading,
    Encrypting,
    Encoding,
    StoringObject,
    StoringMetadata,
    Done,
}

/// Download: Idle → FetchingObject → Decoding → Decrypting → Materializing → Done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStage {
    Idle,
    FetchingObject,
    Decoding,
    Decrypting,
    Materializing,
    Done,
}

pub trait Stage: Copy + fmt::Debug {
    fn as_str(&self) -> &'static str;
}

impl Stage for UploadStage {
    fn as_str(&self) -> &'static str {
        match self {
            UploadStage::Idle => "idle",
            UploadStage::Reading => "reading",
            UploadStage::Encrypting => "encrypting",
            UploadStage::Encoding => "encoding",
            UploadStage::StoringObject => "storing object",
            UploadStage::StoringMetadata => "storing metadata",
            UploadStage::Done => "done",
        }
    }
}

impl Stage for DownloadStage {
    fn as_str(&self) -> &'static str {
        match self {
            DownloadStage::Idle => "idle",
            DownloadStage::FetchingObject => "fetching object",
            DownloadStage::Decoding => "decoding",
            DownloadStage::Decrypting => "decrypting",
            DownloadStage::Materializing => "materializing",
            DownloadStage::Done => "done",
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DownloadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current stage of one running workflow
pub(crate) struct Tracker<'a, S: Stage> {
    workflow: Workflow,
    stage: S,
    progress: Option<&'a ProgressFn>,
}

impl<'a, S: Stage> Tracker<'a, S> {
    pub(crate) fn new(workflow: Workflow, initial: S, progress: Option<&'a ProgressFn>) -> Self {
        Self {
            workflow,
            stage: initial,
            progress,
        }
    }

    pub(crate) fn advance(&mut self, next: S) {
        debug!(
            workflow = self.workflow.as_str(),
            from = self.stage.as_str(),
            to = next.as_str(),
            "stage transition"
        );
        self.stage = next;
        if let Some(progress) = self.progress {
            progress(next.as_str());
        }
    }

    /// Attach the current stage to a failure.
    pub(crate) fn fail(&self, cause: VaultError) -> WorkflowError {
        WorkflowError::at(self.workflow, Some(self.stage.as_str()), cause)
    }
}

/// User-triggered operations, each with its own failure message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    SignUp,
    SignIn,
    SignOut,
    KeyGen,
    Upload,
    Download,
    Delete,
    List,
}

impl Workflow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Workflow::SignUp => "sign-up",
            Workflow::SignIn => "sign-in",
            Workflow::SignOut => "sign-out",
            Workflow::KeyGen => "keygen",
            Workflow::Upload => "upload",
            Workflow::Download => "download",
            Workflow::Delete => "delete",
            Workflow::List => "list",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            Workflow::SignUp | Workflow::SignIn => "An unexpected error occurred. Please try again.",
            Workflow::SignOut => "Failed to sign out",
            Workflow::KeyGen => "Failed to generate keys. Please try again.",
            Workflow::Upload => "Failed to upload file. Please try again.",
            Workflow::Download => {
                "Failed to download and decrypt file. Please check your private key."
            }
            Workflow::Delete => "Failed to delete file",
            Workflow::List => "Failed to load files",
        }
    }
}

/// A failed workflow. `Display` is the message shown to the user; the
/// underlying `VaultError` is the `source()`.
#[derive(Debug, Error)]
#[error("{}", user_message(.workflow, .cause))]
pub struct WorkflowError {
    workflow: Workflow,
    stage: Option<&'static str>,
    #[source]
    cause: VaultError,
}

fn user_message(workflow: &Workflow, cause: &VaultError) -> String {
    match cause {
        VaultError::Validation(msg) => msg.clone(),
        VaultError::Unauthenticated => "You must be signed in to do that".to_string(),
        VaultError::Auth(msg) if matches!(workflow, Workflow::SignUp | Workflow::SignIn) => {
            msg.clone()
        }
        _ => workflow.failure_message().to_string(),
    }
}

impl WorkflowError {
    pub(crate) fn at(workflow: Workflow, stage: Option<&'static str>, cause: VaultError) -> Self {
        match stage {
            Some(stage) => tracing::error!(
                workflow = workflow.as_str(),
                stage,
                error = %cause,
                "workflow failed"
            ),
            None => tracing::error!(workflow = workflow.as_str(), error = %cause, "workflow failed"),
        }
        Self {
            workflow,
            stage,
            cause,
        }
    }

    pub(crate) fn new(workflow: Workflow, cause: VaultError) -> Self {
        Self::at(workflow, None, cause)
    }

    pub fn workflow(&self) -> Workflow {
        self.workflow
    }

    /// Stage the workflow was in when it failed, for staged workflows
    pub fn stage(&self) -> Option<&'static str> {
        self.stage
    }

    pub fn cause(&self) -> &VaultError {
        &self.cause
    }

    pub fn is_validation(&self) -> bool {
        self.cause.is_validation()
    }
}
