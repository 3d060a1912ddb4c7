//! Backup File Watcher
//!
//! Watches the backup file for external changes using the `notify` crate.
//! The directory holding the file is watched rather than the file itself,
//! so the watch survives the file being replaced by a rename.
//!
//! Raw notifications arrive on the notify thread and are forwarded over a
//! channel to a dispatcher thread, which debounces them and invokes the
//! change callback. The callback therefore never runs on the OS watch thread.

use notify::event::{EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::BackupError;

/// Backup file change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File content was written or extended
    Modified(PathBuf),
    /// File appeared
    Created(PathBuf),
    /// File was renamed or replaced by a rename
    Renamed(PathBuf),
    /// File was deleted
    Deleted(PathBuf),
    /// Watcher error
    Error(String),
}

/// Watches a single backup file
pub struct BackupWatcher {
    /// File being watched
    path: PathBuf,

    /// Live notify handle; dropping it closes the event channel
    watcher: Option<RecommendedWatcher>,

    /// Thread delivering events to the callback
    dispatcher: Option<JoinHandle<()>>,

    /// Quiet period used to coalesce bursts of events
    debounce: Duration,
}

impl BackupWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            watcher: None,
            dispatcher: None,
            debounce: Duration::from_millis(200),
        }
    }

    /// Set debounce duration
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. A running watch is stopped first, so calling this
    /// twice never leaves two watches behind.
    pub fn start<F>(&mut self, on_change: F) -> Result<(), BackupError>
    where
        F: Fn(WatchEvent) + Send + 'static,
    {
        if self.is_active() {
            log::debug!("Restarting watch on {}", self.path.display());
            self.stop();
        }

        ensure_placeholder(&self.path)?;

        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| BackupError::Watch(format!("not a file: {}", self.path.display())))?;

        let (tx, rx) = channel();
        let target = self.path.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => {
                    if !event.paths.iter().any(|p| p.file_name() == Some(file_name.as_os_str())) {
                        return;
                    }
                    match classify(&event.kind, &target) {
                        Some(ev) => ev,
                        None => return,
                    }
                }
                Err(e) => WatchEvent::Error(e.to_string()),
            };
            // Receiver gone means the watch is being torn down
            let _ = tx.send(event);
        })
        .map_err(|e| BackupError::Watch(e.to_string()))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| BackupError::Watch(e.to_string()))?;

        let debounce = self.debounce;
        let dispatcher = std::thread::Builder::new()
            .name("backup-watch".into())
            .spawn(move || dispatch(rx, debounce, on_change))
            .map_err(|e| BackupError::Watch(e.to_string()))?;

        log::info!("Watching backup file {}", self.path.display());
        self.watcher = Some(watcher);
        self.dispatcher = Some(dispatcher);
        Ok(())
    }

    /// Stop watching
    pub fn stop(&mut self) {
        // Dropping the watcher drops the sender and ends the dispatcher loop
        self.watcher = None;
        if let Some(handle) = self.dispatcher.take() {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
            log::info!("Stopped watching {}", self.path.display());
        }
    }

    /// Check if watcher is active
    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BackupWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Make sure the file exists so there is something to watch
fn ensure_placeholder(path: &Path) -> Result<(), BackupError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BackupError::file_access(parent, e))?;
    }
    if !path.exists() {
        std::fs::File::create(path).map_err(|e| BackupError::file_access(path, e))?;
        log::debug!("Created placeholder backup file {}", path.display());
    }
    Ok(())
}

fn classify(kind: &EventKind, path: &Path) -> Option<WatchEvent> {
    let path = path.to_path_buf();
    match kind {
        EventKind::Create(_) => Some(WatchEvent::Created(path)),
        EventKind::Modify(ModifyKind::Name(_)) => Some(WatchEvent::Renamed(path)),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(WatchEvent::Modified(path)),
        EventKind::Remove(_) => Some(WatchEvent::Deleted(path)),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// Deliver events, coalescing each burst into its last event
fn dispatch<F>(rx: Receiver<WatchEvent>, debounce: Duration, on_change: F)
where
    F: Fn(WatchEvent),
{
    while let Ok(mut event) = rx.recv() {
        loop {
            match rx.recv_timeout(debounce) {
                Ok(next) => event = next,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    on_change(event);
                    return;
                }
            }
        }
        on_change(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_start_creates_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("backup.json");
        let mut watcher = BackupWatcher::new(&path);

        watcher.start(|_| {}).unwrap();
        assert!(path.exists());
        assert!(watcher.is_active());

        watcher.stop();
        assert!(!watcher.is_active());
    }

    #[test]
    fn test_restart_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = BackupWatcher::new(dir.path().join("backup.json"));
        watcher.start(|_| {}).unwrap();
        watcher.start(|_| {}).unwrap();
        assert!(watcher.is_active());
    }

    #[test]
    fn test_write_is_reported_on_dispatcher_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        let mut watcher = BackupWatcher::new(&path).with_debounce(Duration::from_millis(50));

        let (tx, rx) = mpsc::channel();
        watcher
            .start(move |event| {
                let name = std::thread::current().name().map(str::to_string);
                let _ = tx.send((event, name));
            })
            .unwrap();

        std::fs::write(&path, b"{\"version\":\"1.0\"}").unwrap();

        let (event, thread) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(!matches!(event, WatchEvent::Error(_)));
        assert_eq!(thread.as_deref(), Some("backup-watch"));
    }

    #[test]
    fn test_classify_event_kinds() {
        let kind = EventKind::Modify(ModifyKind::Any);
        assert_eq!(
            classify(&kind, Path::new("/b.json")),
            Some(WatchEvent::Modified(PathBuf::from("/b.json")))
        );
        assert_eq!(classify(&EventKind::Access(notify::event::AccessKind::Any), Path::new("/b.json")), None);
    }
}
