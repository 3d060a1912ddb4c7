//! Shortcut Library
//!
//! Domain operations over a [`ShortcutStore`]: validation, timestamp rules,
//! commit/rollback, and a `ShortcutsChanged` event after every successful
//! mutation.

use chrono::Utc;
use uuid::Uuid;

use crate::error::StoreError;
use crate::events::{AppEvent, EventBus};
use crate::keys::normalize_keys;
use crate::models::{non_blank, Application, Shortcut};
use crate::store::ShortcutStore;

/// Fields for a new shortcut
#[derive(Debug, Clone, Default)]
pub struct NewShortcut {
    pub title: String,
    pub keys: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// Partial update of a shortcut. `None` leaves a field alone; for the
/// optional fields `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct ShortcutEdit {
    pub title: Option<String>,
    pub keys: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<Option<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Alphabetical, case-insensitive
    #[default]
    Name,
    /// Oldest first
    Created,
    /// Most recently modified first
    Modified,
}

/// A shortcut found by [`Library::search`]
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub app_id: Uuid,
    pub app_name: String,
    pub shortcut: Shortcut,
}

pub struct Library<S> {
    store: S,
    bus: EventBus,
}

impl<S: ShortcutStore> Library<S> {
    pub fn new(store: S, bus: EventBus) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access, e.g. for backup import. Changes made through it
    /// do not emit events.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn applications(&self) -> Result<Vec<Application>, StoreError> {
        self.store.fetch_applications()
    }

    pub fn sorted_applications(&self, order: SortOrder) -> Result<Vec<Application>, StoreError> {
        let mut apps = self.store.fetch_applications()?;
        match order {
            SortOrder::Name => apps.sort_by_key(|a| a.name.to_lowercase()),
            SortOrder::Created => apps.sort_by_key(|a| a.created_at),
            SortOrder::Modified => apps.sort_by(|a, b| b.modified_at.cmp(&a.modified_at)),
        }
        Ok(apps)
    }

    pub fn application(&self, id: Uuid) -> Result<Application, StoreError> {
        self.store
            .find_application(id)?
            .ok_or_else(|| StoreError::NotFound(format!("application {}", id)))
    }

    pub fn application_by_name(&self, name: &str) -> Result<Option<Application>, StoreError> {
        self.store.find_application_by_name(name)
    }

    /// Case-insensitive search over application names and shortcut fields
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>, StoreError> {
        let needle = query.trim().to_lowercase();
        let mut hits = Vec::new();
        for app in self.store.fetch_applications()? {
            let app_matches = !needle.is_empty() && app.name.to_lowercase().contains(&needle);
            for shortcut in &app.shortcuts {
                if needle.is_empty() || app_matches || shortcut.matches(&needle) {
                    hits.push(SearchHit {
                        app_id: app.id,
                        app_name: app.name.clone(),
                        shortcut: shortcut.clone(),
                    });
                }
            }
        }
        hits.sort_by(|a, b| {
            a.app_name
                .to_lowercase()
                .cmp(&b.app_name.to_lowercase())
                .then_with(|| a.shortcut.title.to_lowercase().cmp(&b.shortcut.title.to_lowercase()))
        });
        Ok(hits)
    }

    pub fn add_application(
        &mut self,
        name: &str,
        icon: Option<String>,
    ) -> Result<Application, StoreError> {
        let name = required("application name", name)?;
        let mut app = Application::new(name);
        app.icon = non_blank(icon);
        self.commit(|store| store.insert_application(&app))?;
        log::info!("Added application {}", app.name);
        Ok(app)
    }

    pub fn rename_application(&mut self, id: Uuid, name: &str) -> Result<Application, StoreError> {
        let name = required("application name", name)?;
        let mut app = self.application(id)?;
        app.name = name;
        app.modified_at = Utc::now();
        self.commit(|store| store.update_application(&app))?;
        Ok(app)
    }

    pub fn set_icon(&mut self, id: Uuid, icon: Option<String>) -> Result<Application, StoreError> {
        let mut app = self.application(id)?;
        app.icon = non_blank(icon);
        app.modified_at = Utc::now();
        self.commit(|store| store.update_application(&app))?;
        Ok(app)
    }

    /// Delete an application and every shortcut it owns
    pub fn delete_application(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.commit(|store| store.delete_application(id))?;
        log::info!("Deleted application {}", id);
        Ok(())
    }

    pub fn add_shortcut(&mut self, app_id: Uuid, new: NewShortcut) -> Result<Shortcut, StoreError> {
        let title = required("shortcut title", &new.title)?;
        let keys = required("shortcut keys", &new.keys)?;
        let mut app = self.application(app_id)?;

        let mut shortcut = Shortcut::new(app_id, title, &keys);
        shortcut.description = non_blank(new.description);
        shortcut.category = non_blank(new.category);
        app.modified_at = shortcut.modified_at;

        self.commit(|store| {
            store.insert_shortcut(app_id, &shortcut)?;
            store.update_application(&app)
        })?;
        Ok(shortcut)
    }

    /// Apply `edit`; bumps the modified time of the shortcut and its application
    pub fn edit_shortcut(&mut self, id: Uuid, edit: ShortcutEdit) -> Result<Shortcut, StoreError> {
        let mut app = self
            .store
            .fetch_applications()?
            .into_iter()
            .find(|a| a.shortcuts.iter().any(|s| s.id == id))
            .ok_or_else(|| StoreError::NotFound(format!("shortcut {}", id)))?;
        let mut shortcut = app
            .shortcuts
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("shortcut {}", id)))?;

        if let Some(title) = edit.title {
            shortcut.title = required("shortcut title", &title)?;
        }
        if let Some(keys) = edit.keys {
            shortcut.keys = normalize_keys(&required("shortcut keys", &keys)?);
        }
        if let Some(description) = edit.description {
            shortcut.description = non_blank(description);
        }
        if let Some(category) = edit.category {
            shortcut.category = non_blank(category);
        }

        let now = Utc::now();
        shortcut.modified_at = now;
        app.modified_at = now;

        self.commit(|store| {
            store.update_shortcut(&shortcut)?;
            store.update_application(&app)
        })?;
        Ok(shortcut)
    }

    pub fn delete_shortcut(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.commit(|store| store.delete_shortcut(id))
    }

    /// Announce changes made directly through [`Library::store_mut`]
    pub fn notify_changed(&self) {
        self.bus.emit(AppEvent::ShortcutsChanged);
    }

    fn commit<T>(
        &mut self,
        op: impl FnOnce(&mut S) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let result = op(&mut self.store).and_then(|v| self.store.save().map(|()| v));
        match result {
            Ok(v) => {
                self.bus.emit(AppEvent::ShortcutsChanged);
                Ok(v)
            }
            Err(e) => {
                if let Err(rb) = self.store.rollback() {
                    log::error!("Rollback failed: {}", rb);
                }
                Err(e)
            }
        }
    }
}

fn required(what: &str, value: &str) -> Result<String, StoreError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StoreError::Invalid(format!("{} must not be empty", what)));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SqliteStore};

    fn library() -> (Library<MemoryStore>, EventBus) {
        let bus = EventBus::new();
        (Library::new(MemoryStore::new(), bus.clone()), bus)
    }

    #[test]
    fn test_add_and_edit_updates_timestamps() {
        let (mut lib, bus) = library();
        let app = lib.add_application("Xcode", None).unwrap();
        let created = lib
            .add_shortcut(
                app.id,
                NewShortcut {
                    title: "Build".into(),
                    keys: "Cmd+B".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(created.keys, "⌘B");

        std::thread::sleep(std::time::Duration::from_millis(5));
        let edited = lib
            .edit_shortcut(
                created.id,
                ShortcutEdit {
                    title: Some("Build Project".into()),
                    category: Some(Some("Product".into())),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(edited.modified_at > created.modified_at);
        assert_eq!(edited.created_at, created.created_at);
        let stored = lib.application(app.id).unwrap();
        assert_eq!(stored.modified_at, edited.modified_at);
        assert_eq!(stored.shortcuts[0].category.as_deref(), Some("Product"));

        let events = bus.poll();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| *e == AppEvent::ShortcutsChanged));
    }

    #[test]
    fn test_empty_names_rejected_without_event() {
        let (mut lib, bus) = library();
        assert!(matches!(lib.add_application("   ", None), Err(StoreError::Invalid(_))));
        let app = lib.add_application("Notes", None).unwrap();
        bus.poll();

        let err = lib.add_shortcut(
            app.id,
            NewShortcut {
                title: "".into(),
                keys: "⌘N".into(),
                ..Default::default()
            },
        );
        assert!(err.is_err());
        assert!(bus.poll().is_empty());
    }

    #[test]
    fn test_rename_and_icon() {
        let (mut lib, _bus) = library();
        let app = lib.add_application("Code", Some("".into())).unwrap();
        assert_eq!(app.icon, None);

        let renamed = lib.rename_application(app.id, "Visual Studio Code").unwrap();
        assert!(renamed.modified_at >= app.modified_at);
        let with_icon = lib.set_icon(app.id, Some("vscode.png".into())).unwrap();
        assert_eq!(with_icon.icon.as_deref(), Some("vscode.png"));
        assert_eq!(lib.application(app.id).unwrap().name, "Visual Studio Code");
    }

    #[test]
    fn test_delete_cascades_on_sqlite() {
        let bus = EventBus::new();
        let mut lib = Library::new(SqliteStore::open_in_memory().unwrap(), bus);
        let app = lib.add_application("Finder", None).unwrap();
        let s = lib
            .add_shortcut(
                app.id,
                NewShortcut {
                    title: "New Folder".into(),
                    keys: "⇧⌘N".into(),
                    ..Default::default()
                },
            )
            .unwrap();

        lib.delete_application(app.id).unwrap();
        assert!(lib.applications().unwrap().is_empty());
        assert!(matches!(
            lib.edit_shortcut(s.id, ShortcutEdit::default()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_search_and_sort() {
        let (mut lib, _bus) = library();
        let safari = lib.add_application("Safari", None).unwrap();
        let mail = lib.add_application("mail", None).unwrap();
        for (app, title, keys) in [
            (safari.id, "New Tab", "⌘T"),
            (safari.id, "Reopen Closed Tab", "⇧⌘T"),
            (mail.id, "New Message", "⌘N"),
        ] {
            lib.add_shortcut(
                app,
                NewShortcut {
                    title: title.into(),
                    keys: keys.into(),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let hits = lib.search("tab").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].shortcut.title, "New Tab");

        // Application name matches pull in all of its shortcuts
        assert_eq!(lib.search("MAIL").unwrap().len(), 1);
        assert_eq!(lib.search("").unwrap().len(), 3);

        let names: Vec<String> = lib
            .sorted_applications(SortOrder::Name)
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["mail", "Safari"]);

        let newest = &lib.sorted_applications(SortOrder::Modified).unwrap()[0];
        assert_eq!(newest.name, "mail");
    }
}
