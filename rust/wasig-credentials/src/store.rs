//! The enrolled key: held in memory by a [`KeyRing`], persisted by a
//! [`KeyStore`].
//!
//! The bridge supports exactly one active key. Enrolling a new credential
//! replaces the whole set, both in memory and on disk.

use crate::{CredentialError, CredentialKey, WebAuthnPublicKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// A persisted enrollment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredKey {
    /// Credential id, hex. Passed back to the browser so it can ask the
    /// authenticator for this credential.
    pub credential_id: String,
    /// The ledger-facing key.
    pub key: WebAuthnPublicKey,
}

impl From<&CredentialKey> for StoredKey {
    fn from(credential: &CredentialKey) -> Self {
        Self {
            credential_id: hex::encode(&credential.credential_id),
            key: credential.public_key(),
        }
    }
}

/// Shared, injectable holder of the active key.
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    active: Arc<RwLock<Option<StoredKey>>>,
}

impl KeyRing {
    /// An empty ring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `key` the only key in the ring.
    pub fn replace(&self, key: StoredKey) {
        *self.active.write() = Some(key);
    }

    /// Replaces the ring's contents with the first of `records`, or empties
    /// it if there are none.
    pub fn load(&self, records: Vec<StoredKey>) {
        *self.active.write() = records.into_iter().next();
    }

    /// The active key, if any.
    pub fn active(&self) -> Option<StoredKey> {
        self.active.read().clone()
    }

    /// Looks up a key by its `PUB_WA_` string.
    pub fn get(&self, key: &str) -> Option<StoredKey> {
        self.active
            .read()
            .as_ref()
            .filter(|stored| stored.key.to_string() == key)
            .cloned()
    }

    /// The `PUB_WA_` strings of every key in the ring.
    pub fn available_keys(&self) -> Vec<String> {
        self.active
            .read()
            .iter()
            .map(|stored| stored.key.to_string())
            .collect()
    }
}

/// A JSON file holding the enrollment records.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    /// A store backed by the file at `path`. The file need not exist yet.
    pub fn new<Pathlike>(path: Pathlike) -> Self
    where
        Pathlike: AsRef<Path>,
    {
        Self {
            path: path.as_ref().to_owned(),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record. A missing file holds no records.
    pub async fn load(&self) -> Result<Vec<StoredKey>, CredentialError> {
        let exists = tokio::fs::try_exists(&self.path)
            .await
            .map_err(|error| CredentialError::Store(format!("{error}")))?;
        if !exists {
            return Ok(Vec::new());
        }

        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|error| CredentialError::Store(format!("{error}")))?;
        serde_json::from_slice(&bytes).map_err(|error| {
            CredentialError::Store(format!("{}: {error}", self.path.display()))
        })
    }

    /// Rewrites the file so that `key` is its only record.
    pub async fn persist(&self, key: &StoredKey) -> Result<(), CredentialError> {
        tracing::debug!(key = %key.key, path = %self.path.display(), "Saving key");

        let bytes = serde_json::to_vec_pretty(std::slice::from_ref(key))
            .map_err(|error| CredentialError::Store(format!("{error}")))?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|error| CredentialError::Store(format!("{error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Presence;
    use testresult::TestResult;

    fn stored(seed: u8) -> StoredKey {
        StoredKey {
            credential_id: hex::encode([seed; 4]),
            key: WebAuthnPublicKey::from_coordinates(
                [seed; 32],
                &[seed; 32],
                Presence::Verified,
                "localhost",
            ),
        }
    }

    #[test]
    fn it_holds_at_most_one_key() {
        let ring = KeyRing::new();
        assert!(ring.active().is_none());
        assert!(ring.available_keys().is_empty());

        ring.replace(stored(1));
        ring.replace(stored(2));

        assert_eq!(ring.active(), Some(stored(2)));
        assert_eq!(ring.available_keys(), vec![stored(2).key.to_string()]);
    }

    #[test]
    fn it_finds_keys_by_their_string_form() {
        let ring = KeyRing::new();
        ring.replace(stored(1));

        assert_eq!(ring.get(&stored(1).key.to_string()), Some(stored(1)));
        assert_eq!(ring.get(&stored(2).key.to_string()), None);
    }

    #[test]
    fn it_loads_only_the_first_record() {
        let ring = KeyRing::new();
        ring.load(vec![stored(1), stored(2)]);
        assert_eq!(ring.active(), Some(stored(1)));

        ring.load(vec![]);
        assert_eq!(ring.active(), None);
    }

    #[test]
    fn clones_share_the_active_key() {
        let ring = KeyRing::new();
        let handle = ring.clone();
        handle.replace(stored(3));
        assert_eq!(ring.active(), Some(stored(3)));
    }

    #[tokio::test]
    async fn a_missing_file_holds_no_records() -> TestResult {
        let dir = tempfile::tempdir()?;
        let store = KeyStore::new(dir.path().join("keys.json"));
        assert!(store.load().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn it_writes_a_single_camel_case_record() -> TestResult {
        let dir = tempfile::tempdir()?;
        let store = KeyStore::new(dir.path().join("keys.json"));

        store.persist(&stored(1)).await?;
        store.persist(&stored(2)).await?;

        let json: serde_json::Value = serde_json::from_slice(&std::fs::read(store.path())?)?;
        let records = json.as_array().ok_or("expected an array")?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["credentialId"], hex::encode([2u8; 4]));
        assert_eq!(records[0]["key"], stored(2).key.to_string());

        assert_eq!(store.load().await?, vec![stored(2)]);
        Ok(())
    }

    #[tokio::test]
    async fn it_reports_a_malformed_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("keys.json");
        std::fs::write(&path, b"{ not json")?;

        assert!(matches!(
            KeyStore::new(&path).load().await,
            Err(CredentialError::Store(_))
        ));
        Ok(())
    }
}
