//! lockbox: client-side encrypted file vault CLI
//!
//! Account commands:
//!   signup / signin / signout / whoami
//!
//! Vault commands:
//!   keygen [--out <dir>]                      - generate an RSA key pair
//!   upload <path> --public-key[-file] ...     - encrypt and store a file
//!   list                                      - list your files, newest first
//!   download <id> [--out <dir>]               - fetch and decrypt a file
//!   delete <id> [--yes]                       - remove a file and its record
//!
//! Operations:
//!   config show / health

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lockbox_auth::LocalAuthProvider;
use lockbox_core::config::{expand_tilde, LockboxConfig, StorageBackend};
use lockbox_core::FileRecord;
use lockbox_crypto::AesGcmProvider;
use lockbox_storage::{build_operator, JsonMetadataStore, ObjectStore, OpendalObjectStore};
use lockbox_vault::{ProgressFn, UploadRequest, Vault, VaultSettings, WorkflowError};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "lockbox",
    version,
    about = "Client-side encrypted file vault",
    long_about = "lockbox: encrypt files locally with per-file AES-256-GCM keys and keep them in object storage"
)]
struct Cli {
    /// Path to lockbox.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "LOCKBOX_CONFIG",
        default_value = "~/.config/lockbox/config.toml"
    )]
    config: PathBuf,

    /// Log level (overrides config; RUST_LOG takes precedence over both)
    #[arg(long)]
    log: Option<String>,

    /// Log format: text or json (overrides config)
    #[arg(long)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account and sign in
    Signup {
        email: String,
    },

    /// Sign in to an existing account
    Signin {
        email: String,
    },

    /// Forget the signed-in account
    Signout,

    /// Show the signed-in account
    Whoami,

    /// Generate an RSA-2048 key pair
    ///
    /// The public key is given to `upload`; keep the private key safe, it is
    /// needed to decrypt files and cannot be recovered.
    Keygen {
        /// Write public.key and private.key into this directory instead of printing
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Encrypt a local file and upload it
    Upload(UploadArgs),

    /// List your files, newest first
    List,

    /// Download and decrypt a file
    Download {
        /// File id (see `lockbox list`)
        id: String,
        /// Directory to write the decrypted file into (default: current dir)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Read the private key from a file instead of prompting
        #[arg(long)]
        private_key_file: Option<PathBuf>,
    },

    /// Delete a file and its record
    Delete {
        /// File id (see `lockbox list`)
        id: String,
        /// Do not ask for confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check that storage and the metadata table are reachable
    Health,
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Local file to upload
    path: PathBuf,
    /// Recipient public key (base64 SPKI or PEM)
    #[arg(
        long,
        conflicts_with = "public_key_file",
        required_unless_present = "public_key_file"
    )]
    public_key: Option<String>,
    /// Read the recipient public key from a file
    #[arg(long)]
    public_key_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        // Workflow failures carry a message meant for the user; the cause
        // has already been logged
        match e.downcast_ref::<WorkflowError>() {
            Some(workflow) => eprintln!("error: {workflow}"),
            None => eprintln!("error: {e:#}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = expand_tilde(&cli.config);
    let config = LockboxConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.log.format.clone());
    init_logging(&level, &format);

    match cli.command {
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
        Commands::Health => cmd_health(&config).await,
        Commands::Signup { email } => cmd_signup(&App::open(&config).await?, &email).await,
        Commands::Signin { email } => cmd_signin(&App::open(&config).await?, &email).await,
        Commands::Signout => cmd_signout(&App::open(&config).await?).await,
        Commands::Whoami => cmd_whoami(&App::open(&config).await?).await,
        Commands::Keygen { out } => cmd_keygen(&App::open(&config).await?, out.as_deref()).await,
        Commands::Upload(args) => cmd_upload(&App::open(&config).await?, &args).await,
        Commands::List => cmd_list(&App::open(&config).await?).await,
        Commands::Download {
            id,
            out,
            private_key_file,
        } => {
            let app = App::open(&config).await?;
            cmd_download(&app, &id, out.as_deref(), private_key_file.as_deref()).await
        }
        Commands::Delete { id, yes } => cmd_delete(&App::open(&config).await?, &id, yes).await,
    }
}

fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

struct App {
    vault: Vault,
    auth: Arc<LocalAuthProvider>,
}

impl App {
    async fn open(config: &LockboxConfig) -> Result<Self> {
        let objects = open_object_store(config)?;

        let metadata_path = expand_tilde(&config.metadata.path);
        let metadata = JsonMetadataStore::open(&metadata_path)
            .await
            .with_context(|| format!("opening metadata table: {}", metadata_path.display()))?;

        let auth = Arc::new(
            LocalAuthProvider::from_config(&config.auth)
                .await
                .context("opening account store")?,
        );

        tracing::debug!(
            backend = objects.backend_name(),
            metadata = %metadata_path.display(),
            "vault opened"
        );
        let vault = Vault::new(
            Arc::new(AesGcmProvider),
            Arc::new(objects),
            Arc::new(metadata),
            auth.clone(),
            VaultSettings::from(&config.vault),
        );
        Ok(Self { vault, auth })
    }
}

/// Build the object store for the configured backend.
///
/// S3 credentials are read from AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY.
/// The `memory` backend is refused: every command is its own process.
fn open_object_store(config: &LockboxConfig) -> Result<OpendalObjectStore> {
    let (access_key, secret_key, backend) = match config.storage.backend {
        StorageBackend::S3 => {
            let access_key = std::env::var("AWS_ACCESS_KEY_ID").context(
                "S3 credentials not set\n\
                 Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY environment variables.\n\
                 Example:\n\
                 \texport AWS_ACCESS_KEY_ID=your-key\n\
                 \texport AWS_SECRET_ACCESS_KEY=your-secret",
            )?;
            let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
                .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
            (access_key, secret_key, "s3")
        }
        StorageBackend::Fs => (String::new(), String::new(), "fs"),
        StorageBackend::Memory => anyhow::bail!(
            "storage backend \"memory\" is not usable from the command line: objects vanish when \
             the process exits while their metadata records stay in {}\n\
             Set [storage] backend to \"fs\" or \"s3\".",
            config.metadata.path.display()
        ),
    };

    let op = build_operator(&config.storage, &access_key, &secret_key)
        .context("building storage operator")?;
    Ok(OpendalObjectStore::new(op, backend))
}

// ── Prompts ───────────────────────────────────────────────────────────────────

/// Password from LOCKBOX_PASSWORD, or an interactive prompt
fn read_password(prompt: &str) -> Result<SecretString> {
    if let Ok(pw) = std::env::var("LOCKBOX_PASSWORD") {
        return Ok(SecretString::from(pw));
    }
    let pw = rpassword::prompt_password(prompt).context("reading password")?;
    Ok(SecretString::from(pw))
}

fn read_new_password() -> Result<SecretString> {
    if std::env::var("LOCKBOX_PASSWORD").is_ok() {
        return read_password("");
    }
    let first = read_password("Password: ")?;
    let second = read_password("Confirm password: ")?;
    if first.expose_secret() != second.expose_secret() {
        anyhow::bail!("passwords do not match");
    }
    Ok(first)
}

fn read_private_key(file: Option<&Path>) -> Result<SecretString> {
    match file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading private key: {}", path.display()))?;
            Ok(SecretString::from(text))
        }
        None => {
            let text = rpassword::prompt_password("Enter your private key to decrypt the file: ")
                .context("reading private key")?;
            Ok(SecretString::from(text))
        }
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

// ── Progress helpers ──────────────────────────────────────────────────────────

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn stage_reporter(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |stage| pb.set_message(stage.to_string()))
}

// ── Account commands ──────────────────────────────────────────────────────────

async fn cmd_signup(app: &App, email: &str) -> Result<()> {
    let password = read_new_password()?;
    let user = app.vault.sign_up(email, &password).await?;
    println!("Signed up and signed in as {} ({user})", email.trim().to_lowercase());
    Ok(())
}

async fn cmd_signin(app: &App, email: &str) -> Result<()> {
    let password = read_password("Password: ")?;
    let user = app.vault.sign_in(email, &password).await?;
    println!("Signed in as {} ({user})", email.trim().to_lowercase());
    Ok(())
}

async fn cmd_signout(app: &App) -> Result<()> {
    app.vault.sign_out().await?;
    println!("Signed out");
    Ok(())
}

async fn cmd_whoami(app: &App) -> Result<()> {
    match app.vault.current_user().await {
        Ok(user) => {
            let email = app.auth.current_email().await.unwrap_or_default();
            println!("{email} ({user})");
        }
        Err(_) => println!("Not signed in"),
    }
    Ok(())
}

// ── `lockbox keygen` ──────────────────────────────────────────────────────────

async fn cmd_keygen(app: &App, out: Option<&Path>) -> Result<()> {
    let pb = make_spinner("keygen");
    pb.set_message("generating RSA-2048 key pair...");
    let keys = app.vault.generate_keys().await;
    pb.finish_and_clear();
    let keys = keys?;

    match out {
        Some(dir) => {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
            let public_path = dir.join("public.key");
            let private_path = dir.join("private.key");
            write_new_file(&public_path, keys.public_key.as_bytes(), false).await?;
            write_new_file(&private_path, keys.private_key.expose_secret().as_bytes(), true).await?;
            println!("Public key:  {}", public_path.display());
            println!("Private key: {}", private_path.display());
        }
        None => {
            println!("Public key:");
            println!("{}", keys.public_key);
            println!();
            println!("Private key:");
            println!("{}", keys.private_key.expose_secret());
        }
    }

    println!();
    println!("Important:");
    println!("  - Share your public key with people who will send you files");
    println!("  - Keep the private key safe, you'll need it to decrypt files");
    println!("  - A lost private key cannot be recovered");
    Ok(())
}

/// Create a file that must not already exist; `private` restricts it to the owner.
async fn write_new_file(path: &Path, bytes: &[u8], private: bool) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if private {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options
        .open(path)
        .with_context(|| format!("creating {}", path.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

// ── `lockbox upload` ──────────────────────────────────────────────────────────

async fn cmd_upload(app: &App, args: &UploadArgs) -> Result<()> {
    let public_key = match (&args.public_key, &args.public_key_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading public key: {}", path.display()))?,
        (None, None) => String::new(),
    };

    let request = UploadRequest::from_path(&args.path, public_key);
    let pb = make_spinner("upload");
    pb.set_message(request.file_name.clone());
    let progress = stage_reporter(&pb);

    let result = app.vault.upload(request, Some(&progress)).await;
    pb.finish_and_clear();
    let record = result?;

    println!("Uploaded {}", record.file_name);
    println!("  id:         {}", record.id);
    println!("  object:     {}", record.storage_path);
    println!("  size:       {}", fmt_bytes(record.original_size));
    println!("  type:       {}", record.mime_type);
    println!("  protection: {}", record.key_protection);
    Ok(())
}

// ── `lockbox list` ────────────────────────────────────────────────────────────

async fn cmd_list(app: &App) -> Result<()> {
    let records = app.vault.list().await?;
    if records.is_empty() {
        println!("No files uploaded yet");
        return Ok(());
    }

    println!(
        "{:<36}  {:<32}  {:>10}  {:<20}  {}",
        "ID", "NAME", "SIZE", "UPLOADED", "TYPE"
    );
    for record in &records {
        print_record(record);
    }
    Ok(())
}

fn print_record(record: &FileRecord) {
    println!(
        "{:<36}  {:<32}  {:>10}  {:<20}  {}",
        record.id,
        truncate(&record.file_name, 32),
        fmt_bytes(record.original_size),
        record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        record.mime_type,
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

// ── `lockbox download` ────────────────────────────────────────────────────────

async fn cmd_download(
    app: &App,
    id: &str,
    out: Option<&Path>,
    private_key_file: Option<&Path>,
) -> Result<()> {
    let credential = read_private_key(private_key_file)?;

    let pb = make_spinner("download");
    let progress = stage_reporter(&pb);
    let result = app.vault.download(id, &credential, Some(&progress)).await;
    pb.finish_and_clear();
    let file = result?;

    let dir = match out {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("resolving current directory")?,
    };
    let path = file
        .write_into(&dir)
        .await
        .with_context(|| format!("writing into {}", dir.display()))?;

    println!(
        "Downloaded {} ({}, {}) → {}",
        file.file_name(),
        fmt_bytes(file.len() as u64),
        file.mime_type(),
        path.display()
    );
    Ok(())
}

// ── `lockbox delete` ──────────────────────────────────────────────────────────

async fn cmd_delete(app: &App, id: &str, yes: bool) -> Result<()> {
    if !yes && !confirm("Are you sure you want to delete this file?")? {
        println!("Cancelled");
        return Ok(());
    }
    app.vault.delete(id).await?;
    println!("Deleted {id}");
    Ok(())
}

// ── `lockbox config show` ─────────────────────────────────────────────────────

fn cmd_config_show(config: &LockboxConfig, path: &Path) -> Result<()> {
    println!("# config: {}", path.display());
    let text = toml::to_string_pretty(config).context("serializing config")?;
    print!("{text}");
    Ok(())
}

// ── `lockbox health` ──────────────────────────────────────────────────────────

async fn cmd_health(config: &LockboxConfig) -> Result<()> {
    let objects = open_object_store(config)?;
    let storage = objects.check_health().await;
    match &storage {
        Ok(elapsed) => println!("storage ({}):  ok ({} ms)", objects.backend_name(), elapsed.as_millis()),
        Err(e) => println!("storage ({}):  FAILED ({e})", objects.backend_name()),
    }

    let metadata_path = expand_tilde(&config.metadata.path);
    let metadata = JsonMetadataStore::open(&metadata_path).await;
    match &metadata {
        Ok(_) => println!("metadata:      ok ({})", metadata_path.display()),
        Err(e) => println!("metadata:      FAILED ({e})"),
    }

    if storage.is_err() || metadata.is_err() {
        anyhow::bail!("health check failed");
    }
    Ok(())
}

// ── Formatting ────────────────────────────────────────────────────────────────

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GiB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MiB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KiB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_upload_requires_one_key_source() {
        assert!(Cli::try_parse_from(["lockbox", "upload", "a.pdf"]).is_err());
        assert!(Cli::try_parse_from([
            "lockbox", "upload", "a.pdf", "--public-key", "x", "--public-key-file", "k"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["lockbox", "upload", "a.pdf", "--public-key", "x"]).is_ok());
    }

    #[test]
    fn test_memory_backend_refused() {
        let mut config = LockboxConfig::default();
        config.storage.backend = StorageBackend::Memory;

        let err = open_object_store(&config).err().expect("memory backend must be refused");
        assert!(err.to_string().contains("\"memory\" is not usable"));
        assert!(err.to_string().contains("\"fs\" or \"s3\""));
    }

    #[test]
    fn test_fs_backend_opens() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LockboxConfig::default();
        config.storage.backend = StorageBackend::Fs;
        config.storage.root = dir.path().to_path_buf();

        let store = open_object_store(&config).unwrap();
        assert_eq!(store.backend_name(), "fs");
    }

    #[test]
    fn test_fmt_bytes() {
        assert_eq!(fmt_bytes(12), "12 B");
        assert_eq!(fmt_bytes(2048), "2.0 KiB");
        assert_eq!(fmt_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short.txt", 32), "short.txt");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
