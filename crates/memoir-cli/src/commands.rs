//! Subcommand handlers

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;

use memoir_core::credential::{mask_password, CredentialDraft, CredentialView, DecryptStatus};
use memoir_core::{SessionState, Settings, SettingsManager, Vault};

use crate::SettingsAction;

async fn read_key_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read master key file {}", path.display()))
}

fn prompt(label: &str) -> Result<String> {
    rpassword::prompt_password(label).context("Failed to read from terminal")
}

pub async fn login(vault: &Vault, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt("Password: ")?,
    };

    vault
        .login(username, &password)
        .await
        .context("Login failed")?;

    if !vault.has_master_key_file().await? {
        println!("Logged in. Register your master key file with `memoir init-key <FILE>`.");
    } else {
        println!("Logged in.");
    }
    Ok(())
}

pub async fn logout(vault: &Vault) -> Result<()> {
    vault.logout().await?;
    println!("Logged out.");
    Ok(())
}

pub async fn status(vault: &Vault, settings: &Settings) -> Result<()> {
    let login = match vault.state().await {
        SessionState::LoggedOut => "logged out",
        _ => "logged in",
    };

    println!("Backend:        {}", settings.api_base_url);
    println!("Session:        {}", login);
    if let Some(expiry) = vault.tokens().get_token_expiry().await? {
        println!("Token expires:  {}", expiry.to_rfc3339());
    }
    println!(
        "Key file:       {}",
        if vault.has_master_key_file().await? {
            "stored on this device"
        } else {
            "not registered"
        }
    );
    println!("Auto-lock:      {}", describe_auto_lock(settings.auto_lock_timeout_minutes));
    Ok(())
}

pub async fn init_key(vault: &Vault, file: &Path) -> Result<()> {
    if vault.state().await == SessionState::LoggedOut {
        bail!("Not logged in. Run `memoir login --username <NAME>` first.");
    }

    let content = read_key_file(file).await?;
    vault.setup_master_key_file(&content).await?;
    println!("Master key file registered.");
    Ok(())
}

pub async fn forget_key(vault: &Vault) -> Result<()> {
    vault.forget_master_key_file().await?;
    println!("Master key file removed from this device.");
    Ok(())
}

/// Bring the vault to `Unlocked` with the given key file or the stored copy
pub async fn unlock(vault: &Vault, key_file: Option<&Path>) -> Result<()> {
    if vault.state().await == SessionState::LoggedOut {
        bail!("Not logged in. Run `memoir login --username <NAME>` first.");
    }

    match key_file {
        Some(path) => {
            let content = read_key_file(path).await?;
            vault.unlock_with_master_key_file(&content).await?;
        }
        None if vault.has_master_key_file().await? => {
            vault.unlock_with_stored_master_key_file().await?;
        }
        None => bail!("No master key file on this device. Run `memoir init-key <FILE>` or pass --key-file."),
    }

    Ok(())
}

fn describe_auto_lock(minutes: u32) -> String {
    match minutes {
        0 => "never".to_string(),
        1 => "after 1 minute".to_string(),
        n => format!("after {} minutes", n),
    }
}

pub(crate) fn format_row(view: &CredentialView, reveal: bool) -> String {
    let credential = &view.credential;
    let password = match view.status {
        DecryptStatus::Decrypted if !reveal => mask_password(&credential.password),
        _ => credential.password.clone(),
    };
    let marker = if credential.favorite { "*" } else { " " };
    let note = match view.status {
        DecryptStatus::Decrypted => "",
        DecryptStatus::LegacyPlaintext => "  (legacy)",
        DecryptStatus::Failed => "  (undecryptable)",
    };

    format!(
        "{} {:<38} {:<24} {:<28} {}{}",
        marker,
        credential.id,
        credential.organization,
        credential.email.as_deref().unwrap_or("-"),
        password,
        note
    )
}

pub(crate) fn print_rows(views: &[CredentialView], reveal: bool) {
    if views.is_empty() {
        println!("No credentials.");
        return;
    }
    for view in views {
        println!("{}", format_row(view, reveal));
    }
}

pub async fn list(vault: &Vault, page: u32, all: bool, reveal: bool) -> Result<()> {
    if all {
        let views = vault.fetch_all().await?;
        print_rows(&views, reveal);
        return Ok(());
    }

    let page = vault.list_page(page).await?;
    print_rows(&page.content, reveal);
    if page.total_pages > 0 {
        println!(
            "Page {} of {} ({} credentials)",
            page.current_page + 1,
            page.total_pages,
            page.total_items
        );
    }
    Ok(())
}

fn read_draft(organization: &str, email: Option<&str>, favorite: bool) -> Result<CredentialDraft> {
    let password = prompt("Credential password: ")?;
    Ok(CredentialDraft::new(organization, &password, email, favorite))
}

pub async fn add(vault: &Vault, organization: &str, email: Option<&str>, favorite: bool) -> Result<()> {
    let draft = read_draft(organization, email, favorite)?;
    let created = vault.create_credential(&draft).await?;
    println!("Created {}", created.id);
    Ok(())
}

pub async fn update(
    vault: &Vault,
    id: &str,
    organization: &str,
    email: Option<&str>,
    favorite: bool,
) -> Result<()> {
    let draft = read_draft(organization, email, favorite)?;
    let updated = vault.update_credential(id, &draft).await?;
    println!("Updated {}", updated.id);
    Ok(())
}

pub async fn delete(vault: &Vault, id: &str) -> Result<()> {
    vault.delete_credential(id).await?;
    println!("Deleted {}", id);
    Ok(())
}

pub async fn favorite(vault: &Vault, id: &str, favorite: bool) -> Result<()> {
    let credential = vault.set_favorite(id, favorite).await?;
    if credential.favorite {
        println!("{} marked as favourite", credential.organization);
    } else {
        println!("{} unmarked", credential.organization);
    }
    Ok(())
}

pub async fn export(vault: &Vault, out: Option<&Path>) -> Result<()> {
    match out {
        Some(dir) => {
            let path = vault.export_to_dir(dir).await?;
            eprintln!("Exported to {}. The file contains plaintext passwords.", path.display());
        }
        None => println!("{}", vault.export_json().await?),
    }
    Ok(())
}

pub async fn change_key(vault: &Vault, new_file: &Path) -> Result<()> {
    let content = read_key_file(new_file).await?;
    let report = vault
        .change_master_key_file(&content)
        .await
        .context("Master key change did not finish; run the command again to resume")?;

    info!(
        "Re-encrypted {}, already migrated {}, legacy skipped {}",
        report.re_encrypted, report.already_migrated, report.legacy_skipped
    );
    println!("Master key file changed ({} credentials).", report.total);
    Ok(())
}

pub async fn settings(manager: &mut SettingsManager, action: Option<SettingsAction>) -> Result<()> {
    match action.unwrap_or(SettingsAction::Show) {
        SettingsAction::Show => {
            println!("{}", serde_json::to_string_pretty(manager.get())?);
        }
        SettingsAction::AutoLock { minutes } => {
            manager.set_auto_lock_timeout(minutes).await?;
            println!("Auto-lock {}", describe_auto_lock(minutes));
        }
        SettingsAction::ShowPasswords { enabled } => {
            manager.set_show_passwords_by_default(enabled).await?;
            println!("Show passwords by default: {}", enabled);
        }
        SettingsAction::Reset => {
            manager.reset().await?;
            println!("Settings restored to defaults");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoir_core::credential::{Credential, RemoteCredential};

    fn view(password: &str, status: DecryptStatus) -> CredentialView {
        CredentialView {
            credential: Credential {
                id: "id-1".to_string(),
                organization: "Gmail".to_string(),
                password: password.to_string(),
                email: None,
                favorite: true,
                created_at: None,
                updated_at: None,
            },
            status,
        }
    }

    #[test]
    fn test_describe_auto_lock() {
        assert_eq!(describe_auto_lock(0), "never");
        assert_eq!(describe_auto_lock(1), "after 1 minute");
        assert_eq!(describe_auto_lock(15), "after 15 minutes");
    }

    #[test]
    fn test_row_masks_password_unless_revealed() {
        let row = format_row(&view("hunter2", DecryptStatus::Decrypted), false);
        assert!(!row.contains("hunter2"));
        assert!(row.contains(&mask_password("hunter2")));
        assert!(row.starts_with('*'));

        let row = format_row(&view("hunter2", DecryptStatus::Decrypted), true);
        assert!(row.contains("hunter2"));
    }

    #[test]
    fn test_row_shows_placeholders() {
        let remote: RemoteCredential =
            serde_json::from_value(serde_json::json!({ "uuid": "id-9" })).unwrap();
        let row = format_row(&CredentialView::failed(&remote), false);
        assert!(row.contains("[Error decrypting]"));
        assert!(row.ends_with("(undecryptable)"));

        let row = format_row(&view("[No IV]", DecryptStatus::LegacyPlaintext), false);
        assert!(row.contains("[No IV]"));
    }

    #[tokio::test]
    async fn test_settings_actions_persist() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut manager = SettingsManager::new(dir.path());

        settings(&mut manager, Some(SettingsAction::AutoLock { minutes: 5 }))
            .await
            .unwrap();
        settings(&mut manager, Some(SettingsAction::ShowPasswords { enabled: true }))
            .await
            .unwrap();

        let reloaded = SettingsManager::new(dir.path());
        assert_eq!(reloaded.auto_lock_timeout(), 5);
        assert!(reloaded.show_passwords_by_default());

        assert!(settings(&mut manager, Some(SettingsAction::AutoLock { minutes: 3 }))
            .await
            .is_err());

        settings(&mut manager, Some(SettingsAction::Reset)).await.unwrap();
        assert_eq!(manager.auto_lock_timeout(), 2);
    }
}
