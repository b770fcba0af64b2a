use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::warn;

const SERVICE_NAME: &str = "plantstore";

/// Name of the single slot that holds the access token.
pub const TOKEN_SLOT: &str = "authToken";

/// Key-value persistence for one opaque access token.
///
/// Implementations must be safe to call from any context: a store without
/// a backend reads as empty and accepts writes silently.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str) -> Result<()>;
    fn remove(&self) -> Result<()>;
}

/// Store for contexts without persistent storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCredentialStore;

impl CredentialStore for NoopCredentialStore {
    fn get(&self) -> Option<String> {
        None
    }

    fn set(&self, _token: &str) -> Result<()> {
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        Ok(())
    }
}

/// Process-local store. Lives as long as the value that owns it.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, token: &str) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        Ok(())
    }
}

/// Token slot in the OS keychain
pub struct KeyringCredentialStore {
    entry: Entry,
}

impl KeyringCredentialStore {
    pub fn new() -> Result<Self> {
        let entry = Entry::new(SERVICE_NAME, TOKEN_SLOT)
            .context("Failed to create keyring entry")?;
        Ok(Self { entry })
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self) -> Option<String> {
        match self.entry.get_password() {
            Ok(token) => Some(token),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read token from keychain");
                None
            }
        }
    }

    fn set(&self, token: &str) -> Result<()> {
        self.entry
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn remove(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_store_is_always_empty() {
        let store = NoopCredentialStore;
        store.set("abc").expect("noop set");
        assert_eq!(store.get(), None);
        store.remove().expect("noop remove");
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_memory_store_last_write_wins() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get(), None);

        store.set("first").expect("set");
        store.set("second").expect("set");
        assert_eq!(store.get().as_deref(), Some("second"));

        store.remove().expect("remove");
        store.remove().expect("second remove is fine");
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_keyring_store_with_mock_backend() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());

        let store = KeyringCredentialStore::new().expect("mock entry");
        assert_eq!(store.get(), None);
        store.remove().expect("removing a missing entry is fine");

        store.set("tok-1").expect("set");
        assert_eq!(store.get().as_deref(), Some("tok-1"));

        store.remove().expect("remove");
        assert_eq!(store.get(), None);
    }
}
