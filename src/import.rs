//! AI import flow
//!
//! Extraction, review, and commit of shortcut candidates into one
//! application.

use chrono::Utc;

use crate::ai::{parse_shortcut_lines, Candidate, ExtractionGateway};
use crate::backup::{plan_import, BackupApp, BackupDocument, BackupShortcut, ImportSummary, FORMAT_VERSION};
use crate::error::{AiError, StoreError};
use crate::library::Library;
use crate::store::ShortcutStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectableCandidate {
    pub candidate: Candidate,
    pub selected: bool,
}

/// What went wrong during extraction, flattened for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    pub message: String,
    /// Provider text, when the reply could not be used
    pub raw: Option<String>,
    pub needs_credential: bool,
    pub retryable: bool,
}

impl From<&AiError> for ImportFailure {
    fn from(err: &AiError) -> Self {
        Self {
            message: err.to_string(),
            raw: err.raw_response().map(str::to_string),
            needs_credential: err.needs_credential(),
            retryable: err.is_retryable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImportState {
    #[default]
    Idle,
    Loading,
    Loaded(Vec<SelectableCandidate>),
    Error(ImportFailure),
}

#[derive(Debug, Default)]
pub struct ImportFlow {
    state: ImportState,
}

impl ImportFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ImportState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = ImportState::Idle;
    }

    /// Run the AI extraction for `text`
    pub async fn extract(&mut self, gateway: &ExtractionGateway, text: &str) -> &ImportState {
        self.state = ImportState::Loading;
        self.state = match gateway.extract_shortcuts(text).await {
            Ok(candidates) => loaded(candidates),
            Err(e) => {
                log::warn!("Extraction failed: {}", e);
                ImportState::Error(ImportFailure::from(&e))
            }
        };
        &self.state
    }

    /// Line-based extraction without a provider
    pub fn extract_offline(&mut self, text: &str) -> &ImportState {
        self.state = loaded(parse_shortcut_lines(text));
        &self.state
    }

    /// Flip the selection of one candidate; false when out of range
    pub fn toggle(&mut self, index: usize) -> bool {
        match &mut self.state {
            ImportState::Loaded(items) => match items.get_mut(index) {
                Some(item) => {
                    item.selected = !item.selected;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    pub fn select_all(&mut self, selected: bool) {
        if let ImportState::Loaded(items) = &mut self.state {
            for item in items {
                item.selected = selected;
            }
        }
    }

    pub fn selected(&self) -> Vec<&Candidate> {
        match &self.state {
            ImportState::Loaded(items) => items
                .iter()
                .filter(|i| i.selected)
                .map(|i| &i.candidate)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Store the selected candidates under `app_name`, creating the
    /// application when needed. Candidates whose keys already exist there
    /// are skipped. The flow returns to `Idle` on success.
    pub fn commit<S: ShortcutStore>(
        &mut self,
        library: &mut Library<S>,
        app_name: &str,
    ) -> Result<ImportSummary, StoreError> {
        let app_name = app_name.trim();
        if app_name.is_empty() {
            return Err(StoreError::Invalid("application name must not be empty".into()));
        }

        let shortcuts: Vec<BackupShortcut> = self
            .selected()
            .into_iter()
            .map(|c| BackupShortcut {
                title: c.title.clone(),
                keys: c.keys.clone(),
                description: c.description.clone(),
                category: c.category.clone(),
            })
            .collect();
        if shortcuts.is_empty() {
            return Ok(ImportSummary::default());
        }

        let doc = BackupDocument {
            version: FORMAT_VERSION.to_string(),
            export_date: Utc::now(),
            apps: vec![BackupApp {
                name: app_name.to_string(),
                icon_path: None,
                shortcuts,
            }],
        };
        let plan = plan_import(&library.applications()?, doc);
        plan.apply(library.store_mut())?;
        if plan.summary.changed_anything() {
            library.notify_changed();
        }

        log::info!(
            "Committed {} shortcut(s) to {} ({} skipped)",
            plan.summary.shortcuts_inserted,
            app_name,
            plan.summary.shortcuts_skipped
        );
        self.state = ImportState::Idle;
        Ok(plan.summary)
    }
}

fn loaded(candidates: Vec<Candidate>) -> ImportState {
    ImportState::Loaded(
        candidates
            .into_iter()
            .map(|candidate| SelectableCandidate {
                candidate,
                selected: true,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AppEvent, EventBus};
    use crate::library::NewShortcut;
    use crate::store::MemoryStore;

    const CHEAT_SHEET: &str = "\
⌘B  Build
⌘R  Run
⇧⌘K  Clean Build Folder
";

    #[test]
    fn test_offline_extract_and_toggle() {
        let mut flow = ImportFlow::new();
        assert_eq!(*flow.state(), ImportState::Idle);

        flow.extract_offline(CHEAT_SHEET);
        assert_eq!(flow.selected().len(), 3);
        assert!(flow.toggle(2));
        assert!(!flow.toggle(7));
        let titles: Vec<&str> = flow.selected().iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Build", "Run"]);

        flow.select_all(false);
        assert!(flow.selected().is_empty());
    }

    #[test]
    fn test_commit_skips_existing_keys() {
        let bus = EventBus::new();
        let mut library = Library::new(MemoryStore::new(), bus.clone());
        let xcode = library.add_application("Xcode", None).unwrap();
        library
            .add_shortcut(
                xcode.id,
                NewShortcut {
                    title: "Build Project".into(),
                    keys: "⌘B".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        bus.poll();

        let mut flow = ImportFlow::new();
        flow.extract_offline(CHEAT_SHEET);
        let summary = flow.commit(&mut library, "Xcode").unwrap();

        assert_eq!(summary.shortcuts_inserted, 2);
        assert_eq!(summary.shortcuts_skipped, 1);
        assert_eq!(summary.applications_created, 0);
        assert_eq!(*flow.state(), ImportState::Idle);
        assert_eq!(bus.poll(), vec![AppEvent::ShortcutsChanged]);

        let app = library.application(xcode.id).unwrap();
        assert_eq!(app.shortcuts.len(), 3);
        assert_eq!(app.shortcut_by_keys("⌘B").unwrap().title, "Build Project");
    }

    #[test]
    fn test_commit_creates_application() {
        let mut library = Library::new(MemoryStore::new(), EventBus::new());
        let mut flow = ImportFlow::new();
        flow.extract_offline(CHEAT_SHEET);

        assert!(flow.commit(&mut library, "  ").is_err());
        let summary = flow.commit(&mut library, "Xcode").unwrap();
        assert_eq!(summary.applications_created, 1);
        assert_eq!(summary.shortcuts_inserted, 3);

        let app = library.application_by_name("Xcode").unwrap().unwrap();
        assert!(app.back_references_agree());
    }

    #[test]
    fn test_failure_from_ai_error() {
        let failure = ImportFailure::from(&AiError::Parse {
            reason: "no array".into(),
            raw: "nope".into(),
        });
        assert_eq!(failure.raw.as_deref(), Some("nope"));
        assert!(!failure.retryable);

        let failure = ImportFailure::from(&AiError::MissingCredential {
            provider: "gemini".into(),
        });
        assert!(failure.needs_credential);
    }
}
