//! Application state
//!
//! `ShortcutTracker` wires settings, the event bus, the shortcut library and
//! the backup engine together. There are no globals; front ends own one of
//! these and call [`ShortcutTracker::pump`] from their main loop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::backup::{BackupEngine, ImportOutcome, SyncStatus, WatchEvent};
use crate::config::Settings;
use crate::error::{Result, StoreError};
use crate::events::{AppEvent, EventBus, Panel};
use crate::library::Library;
use crate::store::{ShortcutStore, SqliteStore};

pub struct ShortcutTracker<S: ShortcutStore> {
    settings: Settings,
    /// Where settings are persisted; `None` keeps them in memory only
    settings_path: Option<PathBuf>,
    bus: EventBus,
    library: Library<S>,
    engine: BackupEngine,
    save_pending: Arc<AtomicBool>,
    selection: Option<Uuid>,
}

impl ShortcutTracker<SqliteStore> {
    /// Open the SQLite library named by `settings`
    pub fn open(settings: Settings) -> std::result::Result<Self, StoreError> {
        let store = SqliteStore::open(settings.database_path())?;
        Ok(Self::with_store(settings, store))
    }
}

impl<S: ShortcutStore> ShortcutTracker<S> {
    pub fn with_store(settings: Settings, store: S) -> Self {
        let bus = EventBus::new();

        let save_pending = Arc::new(AtomicBool::new(false));
        let pending = Arc::clone(&save_pending);
        bus.subscribe(move |event| {
            if *event == AppEvent::ShortcutsChanged {
                pending.store(true, Ordering::SeqCst);
            }
        });

        let mut engine = BackupEngine::with_path(settings.backup_path())
            .with_debounce(Duration::from_millis(settings.sync.debounce_ms))
            .with_last_sync(settings.sync.last_sync);
        let status_bus = bus.clone();
        engine.on_status_change(move |status| {
            status_bus.emit(AppEvent::SyncStatusChanged(status.clone()));
        });
        let change_bus = bus.clone();
        engine.on_external_change(move |event| {
            change_bus.emit(AppEvent::ExternalBackupChanged(event));
        });

        Self {
            library: Library::new(store, bus.clone()),
            settings,
            settings_path: None,
            bus,
            engine,
            save_pending,
            selection: None,
        }
    }

    /// Persist settings changes (last sync time, auto-sync) to `path`
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn library(&self) -> &Library<S> {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut Library<S> {
        &mut self.library
    }

    pub fn engine(&self) -> &BackupEngine {
        &self.engine
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.engine.status()
    }

    pub fn selection(&self) -> Option<Uuid> {
        self.selection
    }

    pub fn select_application(&mut self, id: Option<Uuid>) {
        if self.selection != id {
            self.selection = id;
            self.bus.emit(AppEvent::SelectionChanged(id));
        }
    }

    pub fn open_panel(&self, panel: Panel) {
        self.bus.emit(AppEvent::OpenPanel(panel));
    }

    /// Apply the persisted auto-sync setting. With auto-sync on, the backup
    /// is imported once and monitoring starts.
    pub async fn start(&mut self) -> Result<()> {
        if self.settings.sync.auto_sync {
            self.engine.set_auto_sync(true)?;
            self.import_now().await?;
        }
        Ok(())
    }

    /// Write the whole library to the backup file
    pub async fn save_now(&mut self) -> Result<()> {
        self.save_pending.store(false, Ordering::SeqCst);
        let apps = self.library.applications()?;
        self.engine.save_backup(&apps).await?;
        self.record_last_sync();
        Ok(())
    }

    /// Merge the backup file into the library
    pub async fn import_now(&mut self) -> Result<ImportOutcome> {
        let outcome = self
            .engine
            .import_from_backup(self.library.store_mut())
            .await?;
        if let ImportOutcome::Imported(summary) = &outcome {
            self.record_last_sync();
            if summary.changed_anything() {
                self.library.notify_changed();
            }
        }
        Ok(outcome)
    }

    /// Turn auto-sync on or off and persist the choice.
    ///
    /// Enabling merges the existing backup into the library before the
    /// merged result is written back, so a file synced from elsewhere is
    /// never replaced by local content alone.
    pub async fn set_auto_sync(&mut self, enabled: bool) -> Result<()> {
        self.engine.set_auto_sync(enabled)?;
        self.settings.sync.auto_sync = enabled;
        self.persist_settings();
        if enabled {
            self.import_now().await?;
            self.save_now().await?;
        }
        Ok(())
    }

    /// Drain queued events and perform the sync work they ask for.
    ///
    /// External backup edits trigger an import; library changes trigger a
    /// save while auto-sync is on. Returns the drained events.
    pub async fn pump(&mut self) -> Result<Vec<AppEvent>> {
        let events = self.bus.poll();

        let external = events.iter().any(|e| match e {
            AppEvent::ExternalBackupChanged(WatchEvent::Error(msg)) => {
                log::warn!("Backup watch error: {}", msg);
                false
            }
            AppEvent::ExternalBackupChanged(WatchEvent::Deleted(_)) => false,
            AppEvent::ExternalBackupChanged(_) => true,
            _ => false,
        });

        let mut result = Ok(());
        if external && self.engine.auto_sync_enabled() {
            if let Err(e) = self.import_now().await {
                result = Err(e);
            }
        }

        if self.save_pending.swap(false, Ordering::SeqCst) && self.engine.auto_sync_enabled() {
            if let Err(e) = self.save_now().await {
                result = result.and(Err(e));
            }
        }

        result.map(|()| events)
    }

    fn record_last_sync(&mut self) {
        if let Some(time) = self.engine.last_sync_time() {
            self.settings.sync.last_sync = Some(time);
            self.persist_settings();
        }
    }

    fn persist_settings(&self) {
        if let Some(path) = &self.settings_path {
            if let Err(e) = self.settings.save(Some(path)) {
                log::warn!("Failed to save settings to {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::NewShortcut;
    use crate::store::MemoryStore;

    fn tracker(dir: &std::path::Path, auto_sync: bool) -> ShortcutTracker<MemoryStore> {
        let mut settings = Settings::default();
        settings.sync.backup_path = Some(dir.join("shortcuts_backup.json"));
        settings.sync.auto_sync = auto_sync;
        settings.sync.debounce_ms = 50;
        ShortcutTracker::with_store(settings, MemoryStore::new())
            .with_settings_path(dir.join("settings.toml"))
    }

    #[tokio::test]
    async fn test_pump_saves_after_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = tracker(dir.path(), false);
        app.set_auto_sync(true).await.unwrap();

        let notes = app.library_mut().add_application("Notes", None).unwrap();
        app.library_mut()
            .add_shortcut(
                notes.id,
                NewShortcut {
                    title: "New Note".into(),
                    keys: "⌘N".into(),
                    ..Default::default()
                },
            )
            .unwrap();

        let events = app.pump().await.unwrap();
        assert!(events.contains(&AppEvent::ShortcutsChanged));
        assert_eq!(app.sync_status(), SyncStatus::Success);

        let saved = std::fs::read_to_string(dir.path().join("shortcuts_backup.json")).unwrap();
        assert!(saved.contains("New Note"));

        let persisted = Settings::load(Some(&dir.path().join("settings.toml"))).unwrap();
        assert!(persisted.sync.auto_sync);
        assert!(persisted.sync.last_sync.is_some());
    }

    #[tokio::test]
    async fn test_enabling_auto_sync_keeps_existing_backup() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("shortcuts_backup.json");
        std::fs::write(
            &backup,
            r#"{"version":"1.0","exportDate":"2024-01-01T00:00:00Z","apps":[{"name":"Xcode","shortcuts":[{"title":"Build","keys":"⌘B"}]}]}"#,
        )
        .unwrap();

        let mut app = tracker(dir.path(), false);
        app.library_mut().add_application("Notes", None).unwrap();
        app.set_auto_sync(true).await.unwrap();

        assert!(app.library().application_by_name("Xcode").unwrap().is_some());
        let saved = std::fs::read_to_string(&backup).unwrap();
        assert!(saved.contains("Xcode"));
        assert!(saved.contains("⌘B"));
        assert!(saved.contains("Notes"));

        app.pump().await.unwrap();
        let saved = std::fs::read_to_string(&backup).unwrap();
        assert!(saved.contains("⌘B"));
        assert_eq!(
            app.library().application_by_name("Xcode").unwrap().unwrap().shortcuts.len(),
            1
        );
    }

    #[tokio::test]
    async fn test_enabling_auto_sync_over_unreadable_backup_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("shortcuts_backup.json");
        let future = r#"{"version":"2.0","exportDate":"2024-01-01T00:00:00Z","apps":[]}"#;
        std::fs::write(&backup, future).unwrap();

        let mut app = tracker(dir.path(), false);
        app.library_mut().add_application("Notes", None).unwrap();
        assert!(app.set_auto_sync(true).await.is_err());
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), future);
    }

    #[tokio::test]
    async fn test_no_save_without_auto_sync() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = tracker(dir.path(), false);
        app.library_mut().add_application("Mail", None).unwrap();
        app.pump().await.unwrap();
        assert!(!dir.path().join("shortcuts_backup.json").exists());
        assert_eq!(app.sync_status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_start_imports_existing_backup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("shortcuts_backup.json"),
            r#"{"version":"1.0","exportDate":"2024-01-01T00:00:00Z","apps":[{"name":"Xcode","shortcuts":[{"title":"Build","keys":"⌘B"}]}]}"#,
        )
        .unwrap();

        let mut app = tracker(dir.path(), true);
        app.start().await.unwrap();
        assert!(app.engine().is_monitoring());

        let xcode = app.library().application_by_name("Xcode").unwrap().unwrap();
        assert_eq!(xcode.shortcuts.len(), 1);

        // The import counts as a change and is written back on the next pump
        app.pump().await.unwrap();
        assert_eq!(app.sync_status(), SyncStatus::Success);
    }

    #[test]
    fn test_selection_emits_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = tracker(dir.path(), false);
        let id = Uuid::new_v4();
        app.select_application(Some(id));
        app.select_application(Some(id));
        app.open_panel(Panel::Overlay);
        assert_eq!(
            app.bus().poll(),
            vec![
                AppEvent::SelectionChanged(Some(id)),
                AppEvent::OpenPanel(Panel::Overlay)
            ]
        );
    }
}
