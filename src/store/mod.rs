//! Shortcut Store
//!
//! The persistent object store the rest of the crate reads from and writes
//! into. Backends stage mutations until [`ShortcutStore::save`] and can drop
//! staged mutations with [`ShortcutStore::rollback`].
//!
//! ```text
//! ┌──────────────┐    fetch / insert / save    ┌──────────────────┐
//! │ BackupEngine │ ──────────────────────────▶ │  ShortcutStore   │
//! │   Library    │                             │ Memory │ Sqlite  │
//! └──────────────┘                             └──────────────────┘
//! ```

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Application, Shortcut};

/// Capability interface over the application/shortcut graph
pub trait ShortcutStore {
    /// All applications with their shortcuts, in creation order
    fn fetch_applications(&self) -> Result<Vec<Application>, StoreError>;

    /// Exact, case-sensitive name lookup
    fn find_application_by_name(&self, name: &str) -> Result<Option<Application>, StoreError> {
        Ok(self
            .fetch_applications()?
            .into_iter()
            .find(|app| app.name == name))
    }

    fn find_application(&self, id: Uuid) -> Result<Option<Application>, StoreError> {
        Ok(self
            .fetch_applications()?
            .into_iter()
            .find(|app| app.id == id))
    }

    /// Insert an application together with any shortcuts it already owns
    fn insert_application(&mut self, app: &Application) -> Result<(), StoreError>;

    /// Insert a shortcut into an existing application. The stored
    /// back-reference is always `app_id`.
    fn insert_shortcut(&mut self, app_id: Uuid, shortcut: &Shortcut) -> Result<(), StoreError>;

    /// Persist name, icon and timestamps of an existing application
    fn update_application(&mut self, app: &Application) -> Result<(), StoreError>;

    /// Persist every field of an existing shortcut except its owner
    fn update_shortcut(&mut self, shortcut: &Shortcut) -> Result<(), StoreError>;

    /// Delete an application and all of its shortcuts
    fn delete_application(&mut self, id: Uuid) -> Result<(), StoreError>;

    fn delete_shortcut(&mut self, id: Uuid) -> Result<(), StoreError>;

    /// Commit staged mutations
    fn save(&mut self) -> Result<(), StoreError>;

    /// Drop staged mutations
    fn rollback(&mut self) -> Result<(), StoreError>;
}
