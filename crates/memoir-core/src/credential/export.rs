//! Plaintext JSON export of every credential

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use super::manager::CredentialManager;
use super::types::{CredentialView, DecryptStatus};
use crate::error::{MemoirError, Result};

/// Default file name for exports
pub const EXPORT_FILE_NAME: &str = "memoir_credentials_export.json";

/// One exported record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedCredential {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Set when the record could not be decrypted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&CredentialView> for ExportedCredential {
    fn from(view: &CredentialView) -> Self {
        let credential = &view.credential;

        if view.status == DecryptStatus::Failed {
            return Self {
                id: credential.id.clone(),
                organization: None,
                email: None,
                password: None,
                created_at: credential.created_at.clone(),
                updated_at: credential.updated_at.clone(),
                error: Some("Failed to decrypt".to_string()),
            };
        }

        Self {
            id: credential.id.clone(),
            organization: Some(credential.organization.clone()),
            email: credential.email.clone(),
            password: Some(credential.password.clone()),
            created_at: credential.created_at.clone(),
            updated_at: credential.updated_at.clone(),
            error: None,
        }
    }
}

/// Decrypt every credential for export
pub async fn export_all(manager: &CredentialManager) -> Result<Vec<ExportedCredential>> {
    let views = manager.fetch_all().await?;
    if views.is_empty() {
        return Err(MemoirError::NoCredentialsToExport);
    }

    Ok(views.iter().map(ExportedCredential::from).collect())
}

/// Export every credential as pretty-printed JSON
pub async fn export_json(manager: &CredentialManager) -> Result<String> {
    let exported = export_all(manager).await?;
    Ok(serde_json::to_string_pretty(&exported)?)
}

/// Write the export into `dir` and return the file path
pub async fn write_export(manager: &CredentialManager, dir: &Path) -> Result<PathBuf> {
    let json = export_json(manager).await?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(EXPORT_FILE_NAME);

    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, json.as_bytes()).await?;
    tokio::fs::rename(&temp_path, &path).await?;

    info!("Exported credentials to {:?}", path);
    Ok(path)
}
