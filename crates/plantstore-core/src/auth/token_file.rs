use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::credentials::CredentialStore;

/// Token file name in cache directory
const TOKEN_FILE: &str = "session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    #[serde(rename = "authToken")]
    token: String,
    #[serde(rename = "savedAt")]
    saved_at: DateTime<Utc>,
}

/// Credential store backed by a JSON file in the cache directory.
///
/// Used where no OS keychain is available (containers, CI). The file is
/// rewritten whole on every `set`.
pub struct FileCredentialStore {
    cache_dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn token_path(&self) -> PathBuf {
        self.cache_dir.join(TOKEN_FILE)
    }

    fn load(&self) -> Result<Option<TokenFile>> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read session file")?;
        let data = serde_json::from_str(&contents)
            .context("Failed to parse session file")?;
        Ok(Some(data))
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<String> {
        match self.load() {
            Ok(data) => data.map(|d| d.token),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session file");
                None
            }
        }
    }

    fn set(&self, token: &str) -> Result<()> {
        let path = self.token_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = TokenFile {
            token: token.to_string(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&data)?;
        std::fs::write(&path, contents).context("Failed to write session file")?;
        debug!(path = %path.display(), "Session file saved");
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip_and_idempotent_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileCredentialStore::new(dir.path().join("nested"));

        assert_eq!(store.get(), None);
        store.set("abc").expect("set");
        assert_eq!(store.get().as_deref(), Some("abc"));

        let other = FileCredentialStore::new(dir.path().join("nested"));
        assert_eq!(other.get().as_deref(), Some("abc"));

        store.remove().expect("remove");
        store.remove().expect("remove again");
        assert_eq!(other.get(), None);
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(TOKEN_FILE), "not json").expect("write");

        let store = FileCredentialStore::new(dir.path().to_path_buf());
        assert_eq!(store.get(), None);
    }
}
