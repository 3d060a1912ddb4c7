//! Error types for shortcut-tracker

use std::path::PathBuf;
use thiserror::Error;

/// Failures from the local shortcut store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures from the backup/sync engine
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Cannot access backup file {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed backup document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unsupported backup version: {0}")]
    UnsupportedVersion(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Watch error: {0}")]
    Watch(String),
}

impl BackupError {
    pub(crate) fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackupError::FileAccess {
            path: path.into(),
            source,
        }
    }
}

/// Failures from the AI extraction gateway.
///
/// Grouped so the caller can tell "configure a credential" apart from
/// "retry later" and "show the raw reply".
#[derive(Error, Debug)]
pub enum AiError {
    #[error("No API key configured for {provider}")]
    MissingCredential { provider: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Provider returned an invalid response (status {status}): {body}")]
    InvalidResponse { status: u16, body: String },

    #[error("Could not parse shortcuts from reply: {reason}")]
    Parse { reason: String, raw: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

impl AiError {
    /// Whether a later retry could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::Network(_) | AiError::RateLimited(_) | AiError::Timeout(_)
        )
    }

    /// Whether the user has to configure a credential first
    pub fn needs_credential(&self) -> bool {
        matches!(self, AiError::MissingCredential { .. })
    }

    /// Raw provider text attached to the failure, if any
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            AiError::InvalidResponse { body, .. } => Some(body),
            AiError::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Settings load/save failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown setting: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_error_classification() {
        assert!(AiError::Timeout(300).is_retryable());
        assert!(AiError::RateLimited("slow down".into()).is_retryable());
        assert!(!AiError::MissingCredential { provider: "gemini".into() }.is_retryable());
        assert!(AiError::MissingCredential { provider: "gemini".into() }.needs_credential());

        let err = AiError::Parse {
            reason: "no array".into(),
            raw: "Sorry, I can't help".into(),
        };
        assert_eq!(err.raw_response(), Some("Sorry, I can't help"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_file_access_message_names_path() {
        let err = BackupError::file_access(
            "/tmp/x.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/x.json"));
    }
}
