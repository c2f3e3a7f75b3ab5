//! Credential records: wire types, encryption codec, CRUD and export

mod codec;
mod export;
mod manager;
mod types;

pub use codec::{CredentialCodec, RecordStrategy};
pub use export::{export_all, export_json, write_export, ExportedCredential, EXPORT_FILE_NAME};
pub use manager::{CredentialManager, ReEncryptReport, DEFAULT_PAGE_SIZE};
pub use types::*;
