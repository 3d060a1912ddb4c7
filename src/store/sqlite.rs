//! SQLite-backed store
//!
//! Mutations open a transaction lazily; `save` commits it and `rollback`
//! drops it.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::ShortcutStore;
use crate::error::StoreError;
use crate::models::{Application, Shortcut};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS applications (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    icon TEXT,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS shortcuts (
    id TEXT PRIMARY KEY,
    app_id TEXT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    keys TEXT NOT NULL,
    description TEXT,
    category TEXT,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_shortcuts_app ON shortcuts(app_id);
CREATE INDEX IF NOT EXISTS idx_applications_name ON applications(name);
"#;

pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
    in_transaction: bool,
}

struct ShortcutRow {
    id: String,
    app_id: String,
    title: String,
    keys: String,
    description: Option<String>,
    category: Option<String>,
    created_at: String,
    modified_at: String,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Throwaway database, mostly for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    /// Default location under the user's config directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shortcut-tracker")
            .join("shortcuts.db")
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        log::debug!(
            "Opened shortcut database at {}",
            path.as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string())
        );
        Ok(Self {
            conn,
            path,
            in_transaction: false,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN IMMEDIATE;")?;
            self.in_transaction = true;
        }
        Ok(())
    }

    fn insert_shortcut_row(&self, app_id: Uuid, s: &Shortcut) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO shortcuts (id, app_id, title, keys, description, category, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                s.id.to_string(),
                app_id.to_string(),
                s.title,
                s.keys,
                s.description,
                s.category,
                fmt_time(&s.created_at),
                fmt_time(&s.modified_at),
            ],
        )?;
        Ok(())
    }

    fn load_shortcuts(&self) -> Result<HashMap<Uuid, Vec<Shortcut>>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, app_id, title, keys, description, category, created_at, modified_at
             FROM shortcuts ORDER BY created_at, rowid",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ShortcutRow {
                    id: row.get(0)?,
                    app_id: row.get(1)?,
                    title: row.get(2)?,
                    keys: row.get(3)?,
                    description: row.get(4)?,
                    category: row.get(5)?,
                    created_at: row.get(6)?,
                    modified_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_app: HashMap<Uuid, Vec<Shortcut>> = HashMap::new();
        for row in rows {
            let app_id = parse_id(&row.app_id)?;
            by_app.entry(app_id).or_default().push(Shortcut {
                id: parse_id(&row.id)?,
                app_id,
                title: row.title,
                keys: row.keys,
                description: row.description,
                category: row.category,
                created_at: parse_time(&row.created_at)?,
                modified_at: parse_time(&row.modified_at)?,
            });
        }
        Ok(by_app)
    }
}

impl ShortcutStore for SqliteStore {
    fn fetch_applications(&self) -> Result<Vec<Application>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, icon, created_at, modified_at
             FROM applications ORDER BY created_at, rowid",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut shortcuts = self.load_shortcuts()?;
        rows.into_iter()
            .map(|(id, name, icon, created, modified)| {
                let id = parse_id(&id)?;
                Ok(Application {
                    id,
                    name,
                    icon,
                    created_at: parse_time(&created)?,
                    modified_at: parse_time(&modified)?,
                    shortcuts: shortcuts.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    fn find_application_by_name(&self, name: &str) -> Result<Option<Application>, StoreError> {
        let id: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM applications WHERE name = ?1 ORDER BY created_at, rowid LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.find_application(parse_id(&id)?),
            None => Ok(None),
        }
    }

    fn insert_application(&mut self, app: &Application) -> Result<(), StoreError> {
        self.begin()?;
        self.conn.execute(
            "INSERT INTO applications (id, name, icon, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                app.id.to_string(),
                app.name,
                app.icon,
                fmt_time(&app.created_at),
                fmt_time(&app.modified_at),
            ],
        )?;
        for shortcut in &app.shortcuts {
            self.insert_shortcut_row(app.id, shortcut)?;
        }
        Ok(())
    }

    fn insert_shortcut(&mut self, app_id: Uuid, shortcut: &Shortcut) -> Result<(), StoreError> {
        self.begin()?;
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM applications WHERE id = ?1",
                params![app_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("application {}", app_id)));
        }
        self.insert_shortcut_row(app_id, shortcut)
    }

    fn update_application(&mut self, app: &Application) -> Result<(), StoreError> {
        self.begin()?;
        let changed = self.conn.execute(
            "UPDATE applications SET name = ?2, icon = ?3, created_at = ?4, modified_at = ?5
             WHERE id = ?1",
            params![
                app.id.to_string(),
                app.name,
                app.icon,
                fmt_time(&app.created_at),
                fmt_time(&app.modified_at),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("application {}", app.id)));
        }
        Ok(())
    }

    fn update_shortcut(&mut self, s: &Shortcut) -> Result<(), StoreError> {
        self.begin()?;
        let changed = self.conn.execute(
            "UPDATE shortcuts SET title = ?2, keys = ?3, description = ?4, category = ?5,
                 created_at = ?6, modified_at = ?7
             WHERE id = ?1",
            params![
                s.id.to_string(),
                s.title,
                s.keys,
                s.description,
                s.category,
                fmt_time(&s.created_at),
                fmt_time(&s.modified_at),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("shortcut {}", s.id)));
        }
        Ok(())
    }

    fn delete_application(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.begin()?;
        let changed = self.conn.execute(
            "DELETE FROM applications WHERE id = ?1",
            params![id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("application {}", id)));
        }
        Ok(())
    }

    fn delete_shortcut(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.begin()?;
        let changed = self
            .conn
            .execute("DELETE FROM shortcuts WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("shortcut {}", id)));
        }
        Ok(())
    }

    fn save(&mut self) -> Result<(), StoreError> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT;")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if self.in_transaction {
            self.conn.execute_batch("ROLLBACK;")?;
            self.in_transaction = false;
        }
        Ok(())
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if self.in_transaction {
            log::warn!("Discarding unsaved shortcut changes");
            let _ = self.conn.execute_batch("ROLLBACK;");
        }
    }
}

fn parse_id(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Invalid(format!("bad id {}: {}", s, e)))
}

/// Fixed-width UTC form so text ordering matches time ordering
fn fmt_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Invalid(format!("bad timestamp {}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[test]
    fn test_cascade_delete() {
        contract::cascade_delete(&mut SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_rollback() {
        contract::rollback_discards_staged(&mut SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_back_reference() {
        contract::back_reference_is_owner(&mut SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_updates() {
        contract::updates_persist(&mut SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_reopen_keeps_committed_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("shortcuts.db");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            let mut app = Application::new("Figma");
            let id = app.id;
            app.push_shortcut(Shortcut::new(id, "Frame", "F").with_category("Tools"));
            store.insert_application(&app).unwrap();
            store.save().unwrap();

            // Never saved, dropped with the store
            store.insert_application(&Application::new("Sketch")).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let apps = store.fetch_applications().unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].shortcuts[0].category.as_deref(), Some("Tools"));
        assert_eq!(store.path(), Some(path.as_path()));
    }
}
