//! Retrieval configuration types.
//!
//! Settings are persisted as JSON (default location under the user config
//! directory) and loaded once at startup by the embedding application.
//! Everything tunable about retrieval lives here: the recency window, the
//! listing bound, transport timeouts, and the OAuth provider endpoints.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level settings for the retrieval core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Matching and ranking behavior.
    pub retrieval: RetrievalSettings,
    /// OAuth provider endpoints and client registration.
    pub oauth: OAuthSettings,
    /// IMAP transport limits.
    pub imap: ImapSettings,
}

/// Matching and ranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Lookback window; messages older than this are never considered.
    #[serde(with = "duration_serde")]
    pub window: Duration,
    /// Upper bound on messages examined per retrieval.
    pub max_messages: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(12 * 60 * 60),
            max_messages: 25,
        }
    }
}

/// OAuth provider configuration.
///
/// The defaults target the public webmail provider the original
/// deployment used; a different provider only needs different endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthSettings {
    /// OAuth client id issued by the provider.
    pub client_id: String,
    /// OAuth client secret issued by the provider.
    pub client_secret: String,
    /// Authorization endpoint for the consent redirect.
    pub auth_url: String,
    /// Token endpoint for code exchange and refresh.
    pub token_url: String,
    /// Mailbox API base, already scoped to the authenticated user.
    pub api_base: String,
    /// Redirect URI registered with the provider.
    pub redirect_uri: String,
    /// Scopes requested at authorization time.
    pub scopes: Vec<String>,
    /// Address domain served by this provider. An alias under this
    /// domain is eligible for the OAuth backend during resolution.
    pub address_domain: String,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            api_base: "https://gmail.googleapis.com/gmail/v1/users/me".to_string(),
            redirect_uri: String::new(),
            scopes: vec!["https://www.googleapis.com/auth/gmail.readonly".to_string()],
            address_domain: "gmail.com".to_string(),
        }
    }
}

/// IMAP transport limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapSettings {
    /// Bound on connect + login; a dead mailbox fails fast.
    #[serde(with = "duration_serde")]
    pub auth_timeout: Duration,
    /// Bound on the search and fetch phases.
    #[serde(with = "duration_serde")]
    pub operation_timeout: Duration,
}

impl Default for ImapSettings {
    fn default() -> Self {
        Self {
            auth_timeout: Duration::from_secs(15),
            operation_timeout: Duration::from_secs(30),
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Saves settings as pretty-printed JSON, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Default settings path under the user config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("io", "aliasbox", "aliasbox")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let settings = Settings::default();
        assert_eq!(settings.retrieval.window, Duration::from_secs(43200));
        assert_eq!(settings.retrieval.max_messages, 25);
        assert_eq!(settings.oauth.address_domain, "gmail.com");
        assert!(settings.imap.auth_timeout < settings.imap.operation_timeout);
    }

    #[test]
    fn settings_round_trip() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let deserialized: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.retrieval.window, settings.retrieval.window);
        assert_eq!(deserialized.oauth.token_url, settings.oauth.token_url);
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.retrieval.max_messages = 10;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.retrieval.max_messages, 10);
    }

    #[test]
    fn load_missing_file_fails() {
        let result = Settings::load_from("/nonexistent/settings.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
