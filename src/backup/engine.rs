//! Backup Engine
//!
//! Owns the backup file. Saves the full shortcut library into it, loads it,
//! reconciles it back into a store, and watches it for external edits.
//!
//! Every operation moves the status through
//! `Idle -> Syncing -> Success | Error(msg)`. A finished status stays put
//! until the next operation starts, which first drops it back to `Idle`.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use super::codec::BackupDocument;
use super::reconcile::{plan_import, ImportSummary};
use super::watcher::{BackupWatcher, WatchEvent};
use crate::error::{BackupError, Result};
use crate::models::Application;
use crate::store::ShortcutStore;

/// Phase of the most recent backup or import
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error(String),
}

impl SyncStatus {
    pub fn label(&self) -> &str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error(_) => "error",
        }
    }
}

/// Result of [`BackupEngine::import_from_backup`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// No backup file (or only an empty placeholder); nothing was imported
    NoBackup,
    Imported(ImportSummary),
}

type StatusCallback = Arc<dyn Fn(&SyncStatus) + Send + Sync>;
type ChangeCallback = Arc<dyn Fn(WatchEvent) + Send + Sync>;

/// The backup/sync engine
pub struct BackupEngine {
    /// Backup file location
    path: PathBuf,

    status: RwLock<SyncStatus>,

    last_sync: RwLock<Option<DateTime<Utc>>>,

    auto_sync: AtomicBool,

    watcher: Mutex<BackupWatcher>,

    status_callback: Option<StatusCallback>,

    change_callback: Option<ChangeCallback>,
}

impl BackupEngine {
    /// Engine for the default backup location
    pub fn new() -> Self {
        Self::with_path(Self::default_path())
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            watcher: Mutex::new(BackupWatcher::new(path.clone())),
            path,
            status: RwLock::new(SyncStatus::Idle),
            last_sync: RwLock::new(None),
            auto_sync: AtomicBool::new(false),
            status_callback: None,
            change_callback: None,
        }
    }

    /// `~/.shortcutTracker/shortcuts_backup.json`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".shortcutTracker")
            .join("shortcuts_backup.json")
    }

    /// Seed the last sync time, e.g. from persisted settings
    pub fn with_last_sync(self, last_sync: Option<DateTime<Utc>>) -> Self {
        *self.last_sync.write() = last_sync;
        self
    }

    /// Debounce applied to file change events
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        *self.watcher.get_mut() = BackupWatcher::new(self.path.clone()).with_debounce(debounce);
        self
    }

    /// Called on every status transition
    pub fn on_status_change<F>(&mut self, callback: F)
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.status_callback = Some(Arc::new(callback));
    }

    /// Called from the watcher's dispatcher thread when the file changes
    pub fn on_external_change<F>(&mut self, callback: F)
    where
        F: Fn(WatchEvent) + Send + Sync + 'static,
    {
        self.change_callback = Some(Arc::new(callback));
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file used for atomic replacement
    pub fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "backup.json".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    pub fn status(&self) -> SyncStatus {
        self.status.read().clone()
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read()
    }

    pub fn auto_sync_enabled(&self) -> bool {
        self.auto_sync.load(Ordering::Relaxed)
    }

    pub fn is_monitoring(&self) -> bool {
        self.watcher.lock().is_active()
    }

    /// Serialize `apps` and atomically replace the backup file
    pub async fn save_backup(&self, apps: &[Application]) -> Result<()> {
        self.begin();
        let result = self.write_backup(apps).await;
        self.finish(&result);
        if result.is_ok() {
            log::info!(
                "Saved backup of {} applications to {}",
                apps.len(),
                self.path.display()
            );
        }
        result
    }

    async fn write_backup(&self, apps: &[Application]) -> Result<()> {
        let doc = BackupDocument::from_applications(apps, Utc::now());
        let bytes = doc.encode()?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackupError::file_access(parent, e))?;
        }

        let tmp = self.temp_path();
        if let Err(e) = write_synced(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(BackupError::file_access(&tmp, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(BackupError::file_access(&self.path, e));
        }
        Ok(())
    }

    /// Raw backup content, `None` when the file does not exist
    pub async fn load_backup(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackupError::file_access(&self.path, e)),
        }
    }

    /// Reconcile the backup file into `store`
    pub async fn import_from_backup<S: ShortcutStore>(&self, store: &mut S) -> Result<ImportOutcome> {
        self.begin();

        let bytes = match self.load_backup().await {
            Ok(Some(bytes)) if !bytes.iter().all(u8::is_ascii_whitespace) => bytes,
            Ok(_) => {
                log::debug!("No backup at {}, nothing to import", self.path.display());
                self.set_status(SyncStatus::Idle);
                return Ok(ImportOutcome::NoBackup);
            }
            Err(e) => {
                let result = Err(e);
                self.finish(&result);
                return result;
            }
        };

        let result = self.reconcile(&bytes, store);
        self.finish(&result);
        result.map(|summary| {
            log::info!(
                "Imported backup: {} new applications, {} new shortcuts, {} skipped",
                summary.applications_created,
                summary.shortcuts_inserted,
                summary.shortcuts_skipped
            );
            ImportOutcome::Imported(summary)
        })
    }

    fn reconcile<S: ShortcutStore>(&self, bytes: &[u8], store: &mut S) -> Result<ImportSummary> {
        let doc = BackupDocument::decode(bytes)?;
        let existing = store.fetch_applications()?;
        let plan = plan_import(&existing, doc);
        plan.apply(store)?;
        Ok(plan.summary)
    }

    /// Begin watching the backup file. Restarts an existing watch.
    pub fn start_file_monitoring(&self) -> Result<()> {
        let callback = self.change_callback.clone();
        self.watcher.lock().start(move |event| {
            log::debug!("Backup file change: {:?}", event);
            if let Some(cb) = &callback {
                cb(event);
            }
        })
    }

    pub fn stop_file_monitoring(&self) {
        self.watcher.lock().stop();
    }

    /// Toggle auto-sync. Enabling starts monitoring; disabling stops it.
    pub fn set_auto_sync(&self, enabled: bool) -> Result<()> {
        self.auto_sync.store(enabled, Ordering::Relaxed);
        if enabled {
            self.start_file_monitoring()
        } else {
            self.stop_file_monitoring();
            Ok(())
        }
    }

    fn begin(&self) {
        let previous = self.status();
        if previous != SyncStatus::Idle {
            self.set_status(SyncStatus::Idle);
        }
        self.set_status(SyncStatus::Syncing);
    }

    fn finish<T>(&self, result: &Result<T>) {
        match result {
            Ok(_) => {
                *self.last_sync.write() = Some(Utc::now());
                self.set_status(SyncStatus::Success);
            }
            Err(e) => {
                log::warn!("Backup operation failed: {}", e);
                self.set_status(SyncStatus::Error(e.to_string()));
            }
        }
    }

    fn set_status(&self, status: SyncStatus) {
        *self.status.write() = status.clone();
        if let Some(cb) = &self.status_callback {
            cb(&status);
        }
    }
}

impl Default for BackupEngine {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}
