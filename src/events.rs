//! Event bus for decoupled component communication.
//!
//! - subscribers are invoked immediately on `emit`, on the emitting thread
//! - every emitted event is also queued; `poll` drains the queue on the
//!   owner's thread (the main loop)
//!
//! Delivery is best-effort and at most once: no retries, no backpressure.

use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

use crate::backup::{SyncStatus, WatchEvent};

/// Panels a front end can be asked to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Overlay,
    MenuBar,
    AppSelector,
    AiImport,
    Settings,
}

/// Cross-component notifications
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The shortcut library was mutated and saved
    ShortcutsChanged,
    /// A different application was selected (or none)
    SelectionChanged(Option<Uuid>),
    /// The backup file changed outside this process
    ExternalBackupChanged(WatchEvent),
    /// Backup engine status transition
    SyncStatusChanged(SyncStatus),
    OpenPanel(Panel),
}

type Callback = Arc<dyn Fn(&AppEvent) + Send + Sync>;

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Callback>>>,
    queue: Arc<Mutex<VecDeque<AppEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for every event
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&AppEvent) + Send + Sync + 'static,
    {
        self.subscribers.write().push(Arc::new(callback));
    }

    /// Invoke subscribers, then queue the event for `poll`
    pub fn emit(&self, event: AppEvent) {
        // Clone the list so callbacks may subscribe or emit re-entrantly
        let subscribers: Vec<Callback> = self.subscribers.read().clone();
        for cb in &subscribers {
            cb(&event);
        }
        self.queue.lock().push_back(event);
    }

    /// Drain queued events in emission order
    pub fn poll(&self) -> Vec<AppEvent> {
        self.queue.lock().drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribers_called_immediately() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        bus.subscribe(move |e| {
            if *e == AppEvent::ShortcutsChanged {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        bus.emit(AppEvent::ShortcutsChanged);
        bus.emit(AppEvent::OpenPanel(Panel::Overlay));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_poll_drains_once_in_order() {
        let bus = EventBus::new();
        bus.emit(AppEvent::SelectionChanged(None));
        bus.emit(AppEvent::ShortcutsChanged);
        assert_eq!(bus.pending(), 2);

        assert_eq!(
            bus.poll(),
            vec![AppEvent::SelectionChanged(None), AppEvent::ShortcutsChanged]
        );
        assert!(bus.poll().is_empty());
    }

    #[test]
    fn test_emit_from_other_thread() {
        let bus = EventBus::new();
        let remote = bus.clone();
        std::thread::spawn(move || remote.emit(AppEvent::OpenPanel(Panel::MenuBar)))
            .join()
            .unwrap();
        assert_eq!(bus.poll(), vec![AppEvent::OpenPanel(Panel::MenuBar)]);
    }
}
