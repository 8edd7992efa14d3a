//! API key resolution.
//!
//! The key comes from the `GEMINI_API_KEY` environment variable or, failing
//! that, from the OS keyring. When neither yields a key the result is
//! [`Credential::Unconfigured`]; no placeholder key is ever substituted.

use std::fmt;

use keyring::Entry;
use tracing::{info, warn};

use crate::core::keyring::KeyringAccessError;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
const KEYRING_SERVICE: &str = "nobelforge";
const KEYRING_USER: &str = "gemini";

/// A secret that never prints itself.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Configured(ApiKey),
    Unconfigured,
}

impl Credential {
    pub fn is_configured(&self) -> bool {
        matches!(self, Credential::Configured(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ApiKeyStore {
    use_keyring: bool,
}

impl Default for ApiKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self { use_keyring: true }
    }

    /// Construct a store that never touches the keyring (useful for tests).
    pub fn new_with_keyring(use_keyring: bool) -> Self {
        Self { use_keyring }
    }

    pub fn get_key(&self) -> Result<Option<String>, KeyringAccessError> {
        if !self.use_keyring {
            return Ok(None);
        }

        let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
        match entry.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(KeyringAccessError::from(err)),
        }
    }

    pub fn set_key(&self, key: &str) -> Result<(), KeyringAccessError> {
        if !self.use_keyring {
            return Ok(());
        }

        let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
        entry.set_password(key).map_err(KeyringAccessError::from)
    }

    pub fn remove_key(&self) -> Result<bool, KeyringAccessError> {
        if !self.use_keyring {
            return Ok(false);
        }

        let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
        match entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(KeyringAccessError::from(err)),
        }
    }
}

/// Resolves the key from the process environment, then the keyring.
pub fn resolve_api_key(store: &ApiKeyStore) -> Credential {
    resolve_api_key_from(std::env::var(API_KEY_ENV).ok(), store)
}

pub fn resolve_api_key_from(env_value: Option<String>, store: &ApiKeyStore) -> Credential {
    if let Some(key) = env_value.filter(|value| !value.trim().is_empty()) {
        info!("using API key from {API_KEY_ENV}");
        return Credential::Configured(ApiKey::new(key.trim()));
    }

    match store.get_key() {
        Ok(Some(key)) if !key.trim().is_empty() => {
            info!("using API key from system keyring");
            Credential::Configured(ApiKey::new(key.trim()))
        }
        Ok(_) => {
            warn!("no API key configured; completions will fail until one is set");
            Credential::Unconfigured
        }
        Err(err) => {
            warn!(recoverable = err.is_recoverable(), "keyring lookup failed: {err}");
            Credential::Unconfigured
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_keyring() -> ApiKeyStore {
        ApiKeyStore::new_with_keyring(false)
    }

    #[test]
    fn environment_value_wins() {
        let credential = resolve_api_key_from(Some(" env-key \n".into()), &no_keyring());
        assert_eq!(credential, Credential::Configured(ApiKey::new("env-key")));
    }

    #[test]
    fn blank_environment_value_is_ignored() {
        let credential = resolve_api_key_from(Some("   ".into()), &no_keyring());
        assert_eq!(credential, Credential::Unconfigured);
    }

    #[test]
    fn nothing_configured_is_tagged_not_substituted() {
        let credential = resolve_api_key_from(None, &no_keyring());
        assert!(!credential.is_configured());
    }

    #[test]
    fn disabled_store_is_inert() {
        let store = no_keyring();
        assert_eq!(store.get_key().unwrap(), None);
        store.set_key("ignored").unwrap();
        assert!(!store.remove_key().unwrap());
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let rendered = format!("{:?}", Credential::Configured(ApiKey::new("sk-secret")));
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
