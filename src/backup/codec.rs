//! Backup document format
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "exportDate": "2025-01-01T12:00:00Z",
//!   "apps": [
//!     { "name": "Xcode", "iconPath": null,
//!       "shortcuts": [ { "title": "Build", "keys": "⌘B", "description": null, "category": null } ] }
//!   ]
//! }
//! ```
//!
//! Unknown fields are ignored. A missing optional field and an explicit
//! `null` decode the same way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BackupError;
use crate::models::{non_blank, Application, Shortcut};

/// Version written by this build
pub const FORMAT_VERSION: &str = "1.0";

/// Whole-file backup document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: String,
    pub export_date: DateTime<Utc>,
    #[serde(default)]
    pub apps: Vec<BackupApp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupApp {
    pub name: String,
    #[serde(default)]
    pub icon_path: Option<String>,
    #[serde(default)]
    pub shortcuts: Vec<BackupShortcut>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupShortcut {
    pub title: String,
    pub keys: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl BackupDocument {
    /// Snapshot an application graph
    pub fn from_applications(apps: &[Application], export_date: DateTime<Utc>) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            export_date,
            apps: apps.iter().map(BackupApp::from).collect(),
        }
    }

    /// Rebuild a fresh application graph. Ids and timestamps are new;
    /// every shortcut points back at the application that owns it.
    pub fn into_applications(self) -> Vec<Application> {
        self.apps.into_iter().map(BackupApp::into_application).collect()
    }

    pub fn encode(&self) -> Result<Vec<u8>, BackupError> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parse and version-check a document
    pub fn decode(bytes: &[u8]) -> Result<Self, BackupError> {
        let doc: BackupDocument = serde_json::from_slice(bytes)?;
        let major = doc.version.split('.').next().unwrap_or_default();
        if major != "1" {
            return Err(BackupError::UnsupportedVersion(doc.version));
        }
        Ok(doc)
    }

    pub fn shortcut_count(&self) -> usize {
        self.apps.iter().map(|a| a.shortcuts.len()).sum()
    }
}

impl From<&Application> for BackupApp {
    fn from(app: &Application) -> Self {
        Self {
            name: app.name.clone(),
            icon_path: app.icon.clone(),
            shortcuts: app.shortcuts.iter().map(BackupShortcut::from).collect(),
        }
    }
}

impl From<&Shortcut> for BackupShortcut {
    fn from(s: &Shortcut) -> Self {
        Self {
            title: s.title.clone(),
            keys: s.keys.clone(),
            description: s.description.clone(),
            category: s.category.clone(),
        }
    }
}

impl BackupApp {
    pub fn into_application(self) -> Application {
        let mut app = Application::new(self.name);
        app.icon = non_blank(self.icon_path);
        let app_id = app.id;
        for shortcut in self.shortcuts {
            app.push_shortcut(shortcut.into_shortcut(app_id));
        }
        app
    }
}

impl BackupShortcut {
    /// Materialize under `app_id`. Keys are stored verbatim so that
    /// reconciliation compares exactly what the file contains.
    pub fn into_shortcut(self, app_id: uuid::Uuid) -> Shortcut {
        let mut shortcut = Shortcut::new(app_id, self.title, "");
        shortcut.keys = self.keys;
        shortcut.description = non_blank(self.description);
        shortcut.category = non_blank(self.category);
        shortcut
    }
}
