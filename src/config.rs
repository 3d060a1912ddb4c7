//! Settings
//!
//! Process-wide configuration, loaded from
//! `~/.config/shortcut-tracker/settings.toml` and falling back to defaults
//! for anything missing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::backup::BackupEngine;
use crate::error::ConfigError;
use crate::keys::HotkeyBinding;
use crate::store::SqliteStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sync: SyncSettings,
    pub ai: AiSettings,
    pub hotkey: HotkeyBinding,
    pub store: StoreSettings,
}

/// Backup / sync settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Mirror every change into the backup file and watch it
    pub auto_sync: bool,

    /// Completion time of the last successful backup or import
    pub last_sync: Option<DateTime<Utc>>,

    /// Override for the backup file location
    pub backup_path: Option<PathBuf>,

    /// Debounce for file change events
    pub debounce_ms: u64,
}

/// AI extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub provider: AiProvider,

    /// Model name; provider default when unset
    pub model: Option<String>,

    /// Replaces the built-in prompt. `{text}` marks where the input goes.
    pub prompt_override: Option<String>,

    /// Base URL for OpenAI-compatible endpoints. Gemini always uses its
    /// public endpoint.
    pub base_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Override for the SQLite database location
    pub database_path: Option<PathBuf>,
}

/// Supported AI providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Gemini,
    OpenAi,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini",
            AiProvider::OpenAi => "openai",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini-1.5-flash",
            AiProvider::OpenAi => "gpt-4o-mini",
        }
    }

    /// Environment variable consulted when no key is configured
    pub fn api_key_env(&self) -> &'static str {
        match self {
            AiProvider::Gemini => "GEMINI_API_KEY",
            AiProvider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(AiProvider::Gemini),
            "openai" | "open-ai" | "gpt" => Ok(AiProvider::OpenAi),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync: false,
            last_sync: None,
            backup_path: None,
            debounce_ms: 200,
        }
    }
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: AiProvider::default(),
            model: None,
            prompt_override: None,
            base_url: None,
            timeout_secs: 300,
            gemini_api_key: None,
            openai_api_key: None,
        }
    }
}

impl AiSettings {
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Configured key for `provider`, else its environment variable
    pub fn api_key(&self, provider: AiProvider) -> Option<String> {
        let configured = match provider {
            AiProvider::Gemini => self.gemini_api_key.clone(),
            AiProvider::OpenAi => self.openai_api_key.clone(),
        };
        configured
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(provider.api_key_env()).ok())
            .filter(|k| !k.trim().is_empty())
    }

    /// Endpoint override that applies to `provider`
    pub fn base_url_for(&self, provider: AiProvider) -> Option<&str> {
        match provider {
            AiProvider::Gemini => None,
            AiProvider::OpenAi => self.base_url.as_deref().filter(|u| !u.trim().is_empty()),
        }
    }
}

impl Settings {
    /// Get default settings file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shortcut-tracker")
            .join("settings.toml")
    }

    /// Load settings, or defaults when the file does not exist
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(Self::default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings to file
    pub fn save(&self, path: Option<&Path>) -> Result<(), ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(Self::default_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    pub fn backup_path(&self) -> PathBuf {
        self.sync
            .backup_path
            .clone()
            .unwrap_or_else(BackupEngine::default_path)
    }

    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .unwrap_or_else(SqliteStore::default_path)
    }

    /// Names accepted by [`Settings::get`] and [`Settings::set`]
    pub const KEYS: &'static [&'static str] = &[
        "sync.auto_sync",
        "sync.last_sync",
        "sync.backup_path",
        "sync.debounce_ms",
        "ai.provider",
        "ai.model",
        "ai.prompt_override",
        "ai.base_url",
        "ai.timeout_secs",
        "ai.gemini_api_key",
        "ai.openai_api_key",
        "hotkey",
        "store.database_path",
    ];

    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let path = |v: &Option<PathBuf>| v.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
        let secret = |v: &Option<String>| if v.is_some() { "********".to_string() } else { String::new() };

        Ok(match key {
            "sync.auto_sync" => self.sync.auto_sync.to_string(),
            "sync.last_sync" => self.sync.last_sync.map(|t| t.to_rfc3339()).unwrap_or_default(),
            "sync.backup_path" => path(&self.sync.backup_path),
            "sync.debounce_ms" => self.sync.debounce_ms.to_string(),
            "ai.provider" => self.ai.provider.to_string(),
            "ai.model" => self.ai.effective_model().to_string(),
            "ai.prompt_override" => opt(&self.ai.prompt_override),
            "ai.base_url" => opt(&self.ai.base_url),
            "ai.timeout_secs" => self.ai.timeout_secs.to_string(),
            "ai.gemini_api_key" => secret(&self.ai.gemini_api_key),
            "ai.openai_api_key" => secret(&self.ai.openai_api_key),
            "hotkey" => self.hotkey.display.clone(),
            "store.database_path" => path(&self.store.database_path),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        })
    }

    /// Set a value by name. An empty value clears optional settings.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let opt = || {
            let v = value.trim();
            (!v.is_empty()).then(|| v.to_string())
        };

        match key {
            "sync.auto_sync" => self.sync.auto_sync = value.parse().map_err(|_| invalid())?,
            "sync.last_sync" => {
                self.sync.last_sync = match opt() {
                    Some(v) => Some(
                        DateTime::parse_from_rfc3339(&v)
                            .map_err(|_| invalid())?
                            .with_timezone(&Utc),
                    ),
                    None => None,
                }
            }
            "sync.backup_path" => self.sync.backup_path = opt().map(PathBuf::from),
            "sync.debounce_ms" => self.sync.debounce_ms = value.parse().map_err(|_| invalid())?,
            "ai.provider" => self.ai.provider = value.parse().map_err(|_| invalid())?,
            "ai.model" => self.ai.model = opt(),
            "ai.prompt_override" => self.ai.prompt_override = opt(),
            "ai.base_url" => self.ai.base_url = opt(),
            "ai.timeout_secs" => self.ai.timeout_secs = value.parse().map_err(|_| invalid())?,
            "ai.gemini_api_key" => self.ai.gemini_api_key = opt(),
            "ai.openai_api_key" => self.ai.openai_api_key = opt(),
            "hotkey" => self.hotkey = HotkeyBinding::parse(value).ok_or_else(invalid)?,
            "store.database_path" => self.store.database_path = opt().map(PathBuf::from),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(!settings.sync.auto_sync);
        assert_eq!(settings.ai.timeout_secs, 300);
        assert_eq!(settings.ai.effective_model(), "gemini-1.5-flash");
        assert_eq!(settings.hotkey.display, "⇧⌘K");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("settings.toml");

        let mut settings = Settings::default();
        settings.set("sync.auto_sync", "true").unwrap();
        settings.set("ai.provider", "openai").unwrap();
        settings.set("ai.base_url", "http://localhost:11434/v1").unwrap();
        settings.set("hotkey", "Ctrl+Option+Space").unwrap();
        settings.sync.last_sync = Some(Utc::now());
        settings.save(Some(&path)).unwrap();

        let loaded = Settings::load(Some(&path)).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.ai.effective_model(), "gpt-4o-mini");
    }

    #[test]
    fn test_base_url_only_overrides_openai() {
        let mut settings = Settings::default();
        settings.set("ai.base_url", "http://localhost:11434/v1").unwrap();
        assert_eq!(settings.ai.base_url_for(AiProvider::Gemini), None);
        assert_eq!(
            settings.ai.base_url_for(AiProvider::OpenAi),
            Some("http://localhost:11434/v1")
        );
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[sync]\nauto_sync = true\n").unwrap();

        let loaded = Settings::load(Some(&path)).unwrap();
        assert!(loaded.sync.auto_sync);
        assert_eq!(loaded.sync.debounce_ms, 200);
        assert_eq!(loaded.ai.provider, AiProvider::Gemini);
    }

    #[test]
    fn test_get_set_errors() {
        let mut settings = Settings::default();
        assert!(matches!(settings.get("nope"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(
            settings.set("sync.auto_sync", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(settings.set("hotkey", "K").is_err());

        settings.set("ai.gemini_api_key", "abc").unwrap();
        assert_eq!(settings.get("ai.gemini_api_key").unwrap(), "********");
        settings.set("ai.gemini_api_key", "").unwrap();
        assert_eq!(settings.ai.gemini_api_key, None);
    }
}
