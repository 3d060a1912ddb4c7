//! Reconciliation
//!
//! Merges a backup document into the store's current applications:
//!
//! - applications match by exact, case-sensitive name, otherwise they are created;
//! - shortcuts match by exact key string within the matched application;
//!   a match is skipped, never overwritten, so the first copy of a key wins;
//! - entries with a blank name, title or key string are skipped.
//!
//! An external edit that changes a shortcut's title but keeps its keys is
//! therefore never applied. Planning happens against a snapshot so that a
//! document can be rejected before anything in the store changes.

use std::collections::HashSet;
use uuid::Uuid;

use super::codec::BackupDocument;
use crate::error::StoreError;
use crate::models::{Application, Shortcut};
use crate::store::ShortcutStore;

/// One store mutation produced by planning
#[derive(Debug, Clone)]
pub enum Change {
    /// New application together with its shortcuts
    CreateApplication(Application),
    /// New shortcut for an application that already exists
    AddShortcut { app_id: Uuid, shortcut: Shortcut },
}

/// Counts reported after an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub applications_created: usize,
    pub shortcuts_inserted: usize,
    pub shortcuts_skipped: usize,
}

impl ImportSummary {
    pub fn changed_anything(&self) -> bool {
        self.applications_created > 0 || self.shortcuts_inserted > 0
    }
}

/// Ordered mutations plus their summary
#[derive(Debug, Clone, Default)]
pub struct ImportPlan {
    pub changes: Vec<Change>,
    pub summary: ImportSummary,
}

/// Target of a document application during planning
enum Target {
    Existing { id: Uuid, keys: HashSet<String> },
    Created(usize),
}

impl ImportPlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Apply every change, then save. On failure staged changes are rolled back.
    pub fn apply(&self, store: &mut impl ShortcutStore) -> Result<(), StoreError> {
        if self.is_empty() {
            return Ok(());
        }
        let result = self.apply_all(store).and_then(|()| store.save());
        if let Err(e) = &result {
            log::warn!("Import failed, rolling back: {}", e);
            if let Err(rb) = store.rollback() {
                log::error!("Rollback failed: {}", rb);
            }
        }
        result
    }

    fn apply_all(&self, store: &mut impl ShortcutStore) -> Result<(), StoreError> {
        for change in &self.changes {
            match change {
                Change::CreateApplication(app) => store.insert_application(app)?,
                Change::AddShortcut { app_id, shortcut } => {
                    store.insert_shortcut(*app_id, shortcut)?
                }
            }
        }
        Ok(())
    }
}

/// Work out which applications and shortcuts a document adds to `existing`
pub fn plan_import(existing: &[Application], doc: BackupDocument) -> ImportPlan {
    let mut plan = ImportPlan::default();
    let mut targets: Vec<(String, Target)> = Vec::new();

    for backup_app in doc.apps {
        if backup_app.name.trim().is_empty() {
            log::warn!("Skipping backup application with a blank name");
            plan.summary.shortcuts_skipped += backup_app.shortcuts.len();
            continue;
        }
        let name = backup_app.name.clone();
        let pos = match targets.iter().position(|(n, _)| *n == name) {
            Some(pos) => pos,
            None => {
                let target = match existing.iter().find(|a| a.name == name) {
                    Some(app) => Target::Existing {
                        id: app.id,
                        keys: app.shortcuts.iter().map(|s| s.keys.clone()).collect(),
                    },
                    None => {
                        let mut app = backup_app.clone();
                        app.shortcuts.clear();
                        plan.changes
                            .push(Change::CreateApplication(app.into_application()));
                        plan.summary.applications_created += 1;
                        Target::Created(plan.changes.len() - 1)
                    }
                };
                targets.push((name, target));
                targets.len() - 1
            }
        };

        for backup_shortcut in backup_app.shortcuts {
            if backup_shortcut.title.trim().is_empty() || backup_shortcut.keys.trim().is_empty() {
                log::warn!("Skipping blank shortcut entry in \"{}\"", targets[pos].0);
                plan.summary.shortcuts_skipped += 1;
                continue;
            }
            match &mut targets[pos].1 {
                Target::Existing { id, keys } => {
                    if keys.contains(&backup_shortcut.keys) {
                        plan.summary.shortcuts_skipped += 1;
                        continue;
                    }
                    keys.insert(backup_shortcut.keys.clone());
                    plan.changes.push(Change::AddShortcut {
                        app_id: *id,
                        shortcut: backup_shortcut.into_shortcut(*id),
                    });
                    plan.summary.shortcuts_inserted += 1;
                }
                Target::Created(idx) => {
                    let Change::CreateApplication(app) = &mut plan.changes[*idx] else {
                        unreachable!("created target always points at a CreateApplication");
                    };
                    if app.shortcut_by_keys(&backup_shortcut.keys).is_some() {
                        plan.summary.shortcuts_skipped += 1;
                        continue;
                    }
                    let shortcut = backup_shortcut.into_shortcut(app.id);
                    app.push_shortcut(shortcut);
                    plan.summary.shortcuts_inserted += 1;
                }
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::codec::{BackupApp, BackupShortcut};
    use chrono::Utc;

    fn doc(apps: Vec<(&str, Vec<(&str, &str)>)>) -> BackupDocument {
        BackupDocument {
            version: "1.0".into(),
            export_date: Utc::now(),
            apps: apps
                .into_iter()
                .map(|(name, shortcuts)| BackupApp {
                    name: name.into(),
                    icon_path: None,
                    shortcuts: shortcuts
                        .into_iter()
                        .map(|(title, keys)| BackupShortcut {
                            title: title.into(),
                            keys: keys.into(),
                            description: None,
                            category: None,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_matching_keys_are_skipped() {
        let mut xcode = Application::new("Xcode");
        let id = xcode.id;
        xcode.push_shortcut(Shortcut::new(id, "Save", "⌘S"));

        let plan = plan_import(&[xcode], doc(vec![("Xcode", vec![("SaveAs", "⌘S")])]));
        assert!(plan.is_empty());
        assert_eq!(plan.summary.shortcuts_skipped, 1);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let xcode = Application::new("Xcode");
        let plan = plan_import(&[xcode], doc(vec![("xcode", vec![("Build", "⌘B")])]));
        assert_eq!(plan.summary.applications_created, 1);
    }

    #[test]
    fn test_duplicate_keys_inside_document_keep_first() {
        let plan = plan_import(
            &[],
            doc(vec![
                ("Notes", vec![("Bold", "⌘B"), ("Bullet", "⌘B")]),
                ("Notes", vec![("Italic", "⌘I"), ("Bold again", "⌘B")]),
            ]),
        );
        assert_eq!(plan.changes.len(), 1);
        let Change::CreateApplication(app) = &plan.changes[0] else {
            panic!("expected a created application");
        };
        let titles: Vec<&str> = app.shortcuts.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Bold", "Italic"]);
        assert!(app.back_references_agree());
        assert_eq!(plan.summary.shortcuts_skipped, 2);
    }

    #[test]
    fn test_same_keys_in_different_apps_are_unrelated() {
        let mut safari = Application::new("Safari");
        let id = safari.id;
        safari.push_shortcut(Shortcut::new(id, "New Tab", "⌘T"));

        let plan = plan_import(&[safari], doc(vec![("Terminal", vec![("New Tab", "⌘T")])]));
        assert_eq!(plan.summary.applications_created, 1);
        assert_eq!(plan.summary.shortcuts_inserted, 1);
    }

    #[test]
    fn test_blank_entries_are_skipped() {
        let plan = plan_import(
            &[],
            doc(vec![
                ("  ", vec![("Orphan", "⌘O")]),
                ("Notes", vec![("", "⌘B"), ("Italic", " "), ("Underline", "⌘U")]),
            ]),
        );
        assert_eq!(plan.summary.applications_created, 1);
        assert_eq!(plan.summary.shortcuts_inserted, 1);
        assert_eq!(plan.summary.shortcuts_skipped, 3);

        let Change::CreateApplication(app) = &plan.changes[0] else {
            panic!("expected a created application");
        };
        assert_eq!(app.name, "Notes");
        let titles: Vec<&str> = app.shortcuts.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Underline"]);
    }
}
