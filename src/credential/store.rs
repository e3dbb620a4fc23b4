//! Durable credential store with atomic overwrite.
//!
//! One JSON record per credential kind under a configured directory.
//! Writes go through a temp file + rename so a concurrent reader never
//! observes a torn record. A failed read — absent file, unreadable file,
//! malformed JSON — is the normal "no cached credential yet" condition,
//! not an error.

use crate::credential::model::{Credential, CredentialKind};
use crate::errors::WxGateError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// File-backed credential store.
pub struct FileStore {
    store_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `store_dir`, creating the directory if
    /// needed.
    pub fn new(store_dir: impl Into<PathBuf>) -> Result<Self, WxGateError> {
        let store_dir = store_dir.into();
        std::fs::create_dir_all(&store_dir).map_err(|e| {
            WxGateError::StoreWrite(format!(
                "Failed to create store dir {}: {}",
                store_dir.display(),
                e
            ))
        })?;
        Ok(Self { store_dir })
    }

    fn record_path(&self, kind: CredentialKind) -> PathBuf {
        self.store_dir.join(kind.record_name())
    }

    /// Load the record for `kind`, if a usable one exists.
    ///
    /// Returns `None` for an absent or malformed record; only a missing
    /// file is silent, other failures are logged.
    pub async fn load(&self, kind: CredentialKind) -> Option<Credential> {
        let path = self.record_path(kind);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(kind = kind.label(), error = %e, "credential record unreadable, treating as absent");
                return None;
            }
        };

        match serde_json::from_slice::<Credential>(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(kind = kind.label(), error = %e, "credential record malformed, treating as absent");
                None
            }
        }
    }

    /// Overwrite the record for `kind` atomically.
    pub async fn save(&self, kind: CredentialKind, record: &Credential) -> Result<(), WxGateError> {
        let target_path = self.record_path(kind);
        let temp_path = self.store_dir.join(format!("{}.tmp", kind.record_name()));

        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| WxGateError::StoreWrite(format!("Failed to serialize record: {}", e)))?;

        fs::write(&temp_path, &json)
            .await
            .map_err(|e| WxGateError::StoreWrite(format!("Failed to write temp record: {}", e)))?;

        fs::rename(&temp_path, &target_path)
            .await
            .map_err(|e| WxGateError::StoreWrite(format!("Failed to rename record: {}", e)))?;

        Ok(())
    }

    /// Directory holding the records.
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn make_record(value: &str) -> Credential {
        Credential {
            value: value.to_string(),
            expires_at: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn save_then_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();

        let record = make_record("tok-1");
        store
            .save(CredentialKind::AccessToken, &record)
            .await
            .unwrap();

        let loaded = store.load(CredentialKind::AccessToken).await.unwrap();
        assert_eq!(loaded.value, "tok-1");
        assert_eq!(loaded.expires_at, record.expires_at);
    }

    #[tokio::test]
    async fn load_absent_record_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        assert!(store.load(CredentialKind::JsapiTicket).await.is_none());
    }

    #[tokio::test]
    async fn load_malformed_record_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();

        std::fs::write(
            temp_dir.path().join(CredentialKind::AccessToken.record_name()),
            b"{not json",
        )
        .unwrap();

        assert!(store.load(CredentialKind::AccessToken).await.is_none());
    }

    #[tokio::test]
    async fn load_record_missing_field_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();

        std::fs::write(
            temp_dir.path().join(CredentialKind::AccessToken.record_name()),
            br#"{"value":"tok-only"}"#,
        )
        .unwrap();

        assert!(store.load(CredentialKind::AccessToken).await.is_none());
    }

    #[tokio::test]
    async fn save_overwrites_previous_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();

        store
            .save(CredentialKind::AccessToken, &make_record("old"))
            .await
            .unwrap();
        store
            .save(CredentialKind::AccessToken, &make_record("new"))
            .await
            .unwrap();

        let loaded = store.load(CredentialKind::AccessToken).await.unwrap();
        assert_eq!(loaded.value, "new");

        // The temp file must not linger after the rename.
        assert!(!temp_dir
            .path()
            .join("access_token.json.tmp")
            .exists());
    }

    #[tokio::test]
    async fn kinds_do_not_collide() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();

        store
            .save(CredentialKind::AccessToken, &make_record("token"))
            .await
            .unwrap();
        store
            .save(CredentialKind::JsapiTicket, &make_record("ticket"))
            .await
            .unwrap();

        assert_eq!(
            store.load(CredentialKind::AccessToken).await.unwrap().value,
            "token"
        );
        assert_eq!(
            store.load(CredentialKind::JsapiTicket).await.unwrap().value,
            "ticket"
        );
    }
}
