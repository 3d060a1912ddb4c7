//! Data Models
//!
//! Applications and the shortcuts recorded for them. An [`Application`]
//! owns its shortcuts; each [`Shortcut`] carries the id of its owner as a
//! back-reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::keys::normalize_keys;

/// A tracked program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Stable id, survives renames
    pub id: Uuid,

    /// Display name (non-empty)
    pub name: String,

    /// Icon path or symbolic identifier
    pub icon: Option<String>,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,

    /// Owned shortcuts
    pub shortcuts: Vec<Shortcut>,
}

/// A named key combination belonging to one application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortcut {
    pub id: Uuid,

    /// Owning application
    pub app_id: Uuid,

    /// Display name (non-empty)
    pub title: String,

    /// Canonical key combination, e.g. `⇧⌘S`
    pub keys: String,

    pub description: Option<String>,
    pub category: Option<String>,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Application {
    /// Create an application with no shortcuts
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            icon: None,
            created_at: now,
            modified_at: now,
            shortcuts: Vec::new(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Attach a shortcut, rewriting its back-reference to this application
    pub fn push_shortcut(&mut self, mut shortcut: Shortcut) {
        shortcut.app_id = self.id;
        self.shortcuts.push(shortcut);
    }

    /// Shortcut with exactly these keys, if any
    pub fn shortcut_by_keys(&self, keys: &str) -> Option<&Shortcut> {
        self.shortcuts.iter().find(|s| s.keys == keys)
    }

    /// Whether every owned shortcut points back at this application
    pub fn back_references_agree(&self) -> bool {
        self.shortcuts.iter().all(|s| s.app_id == self.id)
    }

    /// Distinct categories used by this application's shortcuts, sorted
    pub fn categories(&self) -> Vec<&str> {
        let mut cats: Vec<&str> = self
            .shortcuts
            .iter()
            .filter_map(|s| s.category.as_deref())
            .collect();
        cats.sort_unstable();
        cats.dedup();
        cats
    }
}

impl Shortcut {
    /// Create a shortcut owned by `app_id`. Keys are normalized.
    pub fn new(app_id: Uuid, title: impl Into<String>, keys: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            app_id,
            title: title.into(),
            keys: normalize_keys(keys),
            description: None,
            category: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Case-insensitive match over title, keys, description and category
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self.keys.to_lowercase().contains(&query)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&query))
            || self
                .category
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(&query))
    }
}

/// Treat blank optional text as absent
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
