//! In-memory store
//!
//! Keeps a committed snapshot and a working copy. Used by tests and by the
//! CLI's `--ephemeral` mode.

use uuid::Uuid;

use super::ShortcutStore;
use crate::error::StoreError;
use crate::models::{Application, Shortcut};

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    committed: Vec<Application>,
    working: Vec<Application>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with committed applications
    pub fn with_applications(apps: Vec<Application>) -> Self {
        Self {
            committed: apps.clone(),
            working: apps,
        }
    }

    fn app_mut(&mut self, id: Uuid) -> Result<&mut Application, StoreError> {
        self.working
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("application {}", id)))
    }

    fn shortcut_mut(&mut self, id: Uuid) -> Result<&mut Shortcut, StoreError> {
        self.working
            .iter_mut()
            .flat_map(|a| a.shortcuts.iter_mut())
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("shortcut {}", id)))
    }
}

impl ShortcutStore for MemoryStore {
    fn fetch_applications(&self) -> Result<Vec<Application>, StoreError> {
        Ok(self.working.clone())
    }

    fn insert_application(&mut self, app: &Application) -> Result<(), StoreError> {
        if self.working.iter().any(|a| a.id == app.id) {
            return Err(StoreError::Invalid(format!(
                "application {} already exists",
                app.id
            )));
        }
        let mut app = app.clone();
        for shortcut in &mut app.shortcuts {
            shortcut.app_id = app.id;
        }
        self.working.push(app);
        Ok(())
    }

    fn insert_shortcut(&mut self, app_id: Uuid, shortcut: &Shortcut) -> Result<(), StoreError> {
        let app = self.app_mut(app_id)?;
        app.push_shortcut(shortcut.clone());
        Ok(())
    }

    fn update_application(&mut self, app: &Application) -> Result<(), StoreError> {
        let existing = self.app_mut(app.id)?;
        existing.name = app.name.clone();
        existing.icon = app.icon.clone();
        existing.created_at = app.created_at;
        existing.modified_at = app.modified_at;
        Ok(())
    }

    fn update_shortcut(&mut self, shortcut: &Shortcut) -> Result<(), StoreError> {
        let existing = self.shortcut_mut(shortcut.id)?;
        let owner = existing.app_id;
        *existing = shortcut.clone();
        existing.app_id = owner;
        Ok(())
    }

    fn delete_application(&mut self, id: Uuid) -> Result<(), StoreError> {
        let before = self.working.len();
        self.working.retain(|a| a.id != id);
        if self.working.len() == before {
            return Err(StoreError::NotFound(format!("application {}", id)));
        }
        Ok(())
    }

    fn delete_shortcut(&mut self, id: Uuid) -> Result<(), StoreError> {
        for app in &mut self.working {
            if let Some(pos) = app.shortcuts.iter().position(|s| s.id == id) {
                app.shortcuts.remove(pos);
                return Ok(());
            }
        }
        Err(StoreError::NotFound(format!("shortcut {}", id)))
    }

    fn save(&mut self) -> Result<(), StoreError> {
        self.committed = self.working.clone();
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.working = self.committed.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[test]
    fn test_cascade_delete() {
        contract::cascade_delete(&mut MemoryStore::new());
    }

    #[test]
    fn test_rollback() {
        contract::rollback_discards_staged(&mut MemoryStore::new());
    }

    #[test]
    fn test_back_reference() {
        contract::back_reference_is_owner(&mut MemoryStore::new());
    }

    #[test]
    fn test_updates() {
        contract::updates_persist(&mut MemoryStore::new());
    }

    #[test]
    fn test_duplicate_application_id_rejected() {
        let mut store = MemoryStore::new();
        let app = Application::new("Xcode");
        store.insert_application(&app).unwrap();
        assert!(store.insert_application(&app).is_err());
    }
}
