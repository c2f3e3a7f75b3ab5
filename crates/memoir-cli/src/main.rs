//! Memoir CLI - end-to-end encrypted password vault
//!
//! Credentials are encrypted on this machine with a key derived from your
//! master key file; the backend only ever stores ciphertext. Log in once,
//! register the master key file with `init-key`, and later commands unlock
//! with the copy kept on this device (or with `--key-file`).

mod commands;
mod shell;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use memoir_api::ApiClient;
use memoir_core::storage::{open_storage, TokenStore};
use memoir_core::{SettingsManager, Vault};

/// Memoir - client-side encrypted credential vault
#[derive(Parser, Debug)]
#[command(name = "memoir")]
#[command(version)]
#[command(about = "Memoir - end-to-end encrypted password vault")]
struct Args {
    /// Directory for settings and local state
    #[arg(long, env = "MEMOIR_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Backend base URL (overrides the settings file)
    #[arg(long, env = "MEMOIR_API_URL", global = true)]
    api_url: Option<String>,

    /// HTTP request timeout in seconds (overrides the settings file)
    #[arg(long, env = "MEMOIR_TIMEOUT_SECS", global = true)]
    timeout_secs: Option<u64>,

    /// Master key file to unlock with instead of the stored copy
    #[arg(long, env = "MEMOIR_KEY_FILE", global = true)]
    key_file: Option<PathBuf>,

    /// Keep tokens and the master key copy in the OS keychain when available
    #[arg(long, env = "MEMOIR_USE_KEYCHAIN", global = true)]
    keychain: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in to the backend
    Login {
        #[arg(short, long)]
        username: String,

        /// Account password (prompted when omitted)
        #[arg(long, env = "MEMOIR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the session token
    Logout,
    /// Show login, key file and settings state
    Status,
    /// Register a master key file on this device
    InitKey {
        /// Path to the master key file
        file: PathBuf,
    },
    /// Remove the master key file copy from this device
    ForgetKey,
    /// List credentials
    List {
        /// Zero-based page
        #[arg(long, default_value = "0")]
        page: u32,

        /// List every page
        #[arg(long)]
        all: bool,

        /// Show passwords instead of masking them
        #[arg(long)]
        show: bool,
    },
    /// Add a credential (password is prompted)
    Add {
        organization: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        favorite: bool,
    },
    /// Replace a credential (password is prompted)
    Update {
        id: String,

        organization: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        favorite: bool,
    },
    /// Delete a credential
    Delete { id: String },
    /// Mark a credential as favourite
    Favorite {
        id: String,

        /// Remove the mark instead
        #[arg(long)]
        off: bool,
    },
    /// Export every credential as plaintext JSON
    Export {
        /// Output directory (prints to stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Switch to a new master key file and re-encrypt every credential
    ChangeKey {
        /// Path to the new master key file
        new_file: PathBuf,
    },
    /// View or change settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
    /// Interactive session that auto-locks when idle
    Shell,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the current settings
    Show,
    /// Auto-lock timeout in minutes (0, 1, 2, 5, 10, 15 or 30; 0 = never)
    AutoLock { minutes: u32 },
    /// Whether listings reveal passwords by default
    ShowPasswords {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Restore the defaults
    Reset,
}

fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("app", "memoir", "memoir")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .context("Could not determine data directory")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean for exports
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    debug!("Data directory: {:?}", data_dir);

    let mut settings_manager = SettingsManager::new(&data_dir);

    // Settings commands work without a backend
    let command = match args.command {
        Command::Settings { action } => {
            return commands::settings(&mut settings_manager, action).await;
        }
        command => command,
    };

    let mut settings = settings_manager.get().clone();
    if let Some(url) = args.api_url {
        settings.api_base_url = url;
    }
    if let Some(secs) = args.timeout_secs {
        settings.request_timeout_secs = secs;
    }
    settings.validate()?;

    let storage = open_storage(&data_dir, args.keychain)?;
    let client = ApiClient::new(
        &settings.api_base_url,
        Duration::from_secs(settings.request_timeout_secs),
        TokenStore::new(storage.clone()),
    )?;
    let client = Arc::new(client);

    let vault = Vault::new(storage, client.clone(), client, &settings);
    vault.restore_login().await?;

    let key_file = args.key_file.as_deref();

    match command {
        Command::Login { username, password } => commands::login(&vault, &username, password).await,
        Command::Logout => commands::logout(&vault).await,
        Command::Status => commands::status(&vault, &settings).await,
        Command::InitKey { file } => commands::init_key(&vault, &file).await,
        Command::ForgetKey => commands::forget_key(&vault).await,
        Command::List { page, all, show } => {
            commands::unlock(&vault, key_file).await?;
            let reveal = show || settings.show_passwords_by_default;
            commands::list(&vault, page, all, reveal).await
        }
        Command::Add {
            organization,
            email,
            favorite,
        } => {
            commands::unlock(&vault, key_file).await?;
            commands::add(&vault, &organization, email.as_deref(), favorite).await
        }
        Command::Update {
            id,
            organization,
            email,
            favorite,
        } => {
            commands::unlock(&vault, key_file).await?;
            commands::update(&vault, &id, &organization, email.as_deref(), favorite).await
        }
        Command::Delete { id } => {
            commands::unlock(&vault, key_file).await?;
            commands::delete(&vault, &id).await
        }
        Command::Favorite { id, off } => {
            commands::unlock(&vault, key_file).await?;
            commands::favorite(&vault, &id, !off).await
        }
        Command::Export { out } => {
            commands::unlock(&vault, key_file).await?;
            commands::export(&vault, out.as_deref()).await
        }
        Command::ChangeKey { new_file } => {
            commands::unlock(&vault, key_file).await?;
            commands::change_key(&vault, &new_file).await
        }
        Command::Shell => {
            commands::unlock(&vault, key_file).await?;
            shell::run(&vault, key_file, settings.show_passwords_by_default).await
        }
        Command::Settings { .. } => Ok(()),
    }
}
