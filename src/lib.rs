//! Shortcut Tracker - per-application keyboard shortcut library
//!
//! Provides the shortcut store, JSON backup sync with file watching, and
//! AI-assisted shortcut import.

pub mod ai;
pub mod app;
pub mod backup;
pub mod config;
pub mod error;
pub mod events;
pub mod import;
pub mod keys;
pub mod library;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use ai::{Candidate, ExtractionGateway};
pub use app::ShortcutTracker;
pub use backup::{BackupDocument, BackupEngine, ImportOutcome, ImportSummary, SyncStatus};
pub use config::{AiProvider, Settings};
pub use error::{AiError, BackupError, ConfigError, StoreError};
pub use events::{AppEvent, EventBus, Panel};
pub use import::{ImportFlow, ImportState};
pub use keys::{normalize_keys, HotkeyBinding, Modifiers};
pub use library::{Library, NewShortcut, ShortcutEdit, SortOrder};
pub use models::{Application, Shortcut};
pub use store::{MemoryStore, ShortcutStore, SqliteStore};
