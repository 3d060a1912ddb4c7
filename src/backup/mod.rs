//! Backup / Sync Module
//!
//! Mirrors the shortcut library into a single JSON file and pulls external
//! edits of that file back in.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │                 BackupEngine                   │
//! │  ┌──────────┐   ┌────────┐   ┌──────────────┐  │
//! │  │ Watcher  │──▶│ Codec  │──▶│  Reconcile   │──┼──▶ ShortcutStore
//! │  │ (notify) │   │ (JSON) │   │ (name / keys)│  │
//! │  └──────────┘   └────────┘   └──────────────┘  │
//! └────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod engine;
pub mod reconcile;
pub mod watcher;

pub use codec::{BackupApp, BackupDocument, BackupShortcut, FORMAT_VERSION};
pub use engine::{BackupEngine, ImportOutcome, SyncStatus};
pub use reconcile::{plan_import, ImportPlan, ImportSummary};
pub use watcher::{BackupWatcher, WatchEvent};
