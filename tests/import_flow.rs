//! Import flow integration tests
//!
//! Offline extraction through to a persisted SQLite library.

use shortcut_tracker::import::{ImportFlow, ImportState};
use shortcut_tracker::{EventBus, Library, SqliteStore};

const SAFARI_DOCS: &str = "\
# Tabs
- Cmd+T - New Tab
- Cmd+Shift+T - Reopen Last Closed Tab
Show All Tabs: Shift+Cmd+\\

# Window
⌘N  New Window
⌘W  Close Tab

Some introductory prose that mentions Safari but no shortcut.
";

#[test]
fn test_offline_import_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("shortcuts.db");

    {
        let mut library = Library::new(SqliteStore::open(&db).unwrap(), EventBus::new());
        let mut flow = ImportFlow::new();

        match flow.extract_offline(SAFARI_DOCS) {
            ImportState::Loaded(items) => assert_eq!(items.len(), 5),
            other => panic!("unexpected state: {other:?}"),
        }
        // Leave out "Close Tab"
        assert!(flow.toggle(4));

        let summary = flow.commit(&mut library, "Safari").unwrap();
        assert_eq!(summary.applications_created, 1);
        assert_eq!(summary.shortcuts_inserted, 4);
    }

    let library = Library::new(SqliteStore::open(&db).unwrap(), EventBus::new());
    let safari = library.application_by_name("Safari").unwrap().unwrap();
    assert_eq!(safari.shortcuts.len(), 4);
    assert_eq!(safari.shortcut_by_keys("⇧⌘T").unwrap().title, "Reopen Last Closed Tab");
    assert_eq!(safari.shortcut_by_keys("⇧⌘\\").unwrap().category.as_deref(), Some("Tabs"));
    assert_eq!(safari.shortcut_by_keys("⌘N").unwrap().category.as_deref(), Some("Window"));
    assert!(safari.shortcut_by_keys("⌘W").is_none());
    assert_eq!(safari.categories(), vec!["Tabs", "Window"]);
}

#[test]
fn test_second_commit_only_adds_new_keys() {
    let mut library = Library::new(SqliteStore::open_in_memory().unwrap(), EventBus::new());

    let mut flow = ImportFlow::new();
    flow.extract_offline("⌘T  New Tab\n⌘N  New Window\n");
    flow.commit(&mut library, "Safari").unwrap();

    flow.extract_offline("⌘T  Open Tab\n⌥⌘I  Show Web Inspector\n");
    let summary = flow.commit(&mut library, "Safari").unwrap();
    assert_eq!(summary.applications_created, 0);
    assert_eq!(summary.shortcuts_inserted, 1);
    assert_eq!(summary.shortcuts_skipped, 1);

    let hits = library.search("tab").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].shortcut.title, "New Tab");
}
