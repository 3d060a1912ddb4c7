//! Shortcut Tracker CLI
//!
//! Terminal front end for the shortcut library: browse and edit shortcuts,
//! sync the JSON backup, and import shortcuts from documentation.

use anyhow::{bail, Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use console::{style, Emoji};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use shortcut_tracker::ai::ExtractionGateway;
use shortcut_tracker::import::{ImportFlow, ImportState};
use shortcut_tracker::library::{NewShortcut, ShortcutEdit, SortOrder};
use shortcut_tracker::{
    AppEvent, ImportOutcome, MemoryStore, Settings, ShortcutStore, ShortcutTracker, SyncStatus,
};

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "+ ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");
static ARROW: Emoji<'_, '_> = Emoji("→ ", "-> ");
static INFO: Emoji<'_, '_> = Emoji("ℹ ", "i ");
static SYNC: Emoji<'_, '_> = Emoji("🔄 ", "~ ");

#[derive(Parser)]
#[command(name = "shortcut-tracker")]
#[command(author = "e421")]
#[command(version)]
#[command(about = "Shortcut Tracker - keep every app's keyboard shortcuts in one place")]
#[command(long_about = r#"
Shortcut Tracker keeps a per-application library of keyboard shortcuts.

Features:
  • Add, edit, search and remove shortcuts per application
  • Mirror the library into a JSON backup file and merge external edits back
  • Extract shortcuts from documentation with Gemini, OpenAI, or offline

Examples:
  shortcut-tracker add Xcode "Build" "Cmd+B"
  shortcut-tracker list --app Xcode
  shortcut-tracker search tab
  shortcut-tracker extract docs.txt --app Xcode
  shortcut-tracker auto-sync on
  shortcut-tracker watch
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (default: <config dir>/shortcut-tracker/settings.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backup file to sync with
    #[arg(long, global = true)]
    pub backup_file: Option<PathBuf>,

    /// SQLite database holding the library
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Keep the library in memory for this run only
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SortArg {
    Name,
    Created,
    Modified,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortOrder::Name,
            SortArg::Created => SortOrder::Created,
            SortArg::Modified => SortOrder::Modified,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List applications and their shortcuts
    List {
        /// Only this application
        #[arg(short, long)]
        app: Option<String>,

        /// Application order
        #[arg(short, long, value_enum, default_value = "name")]
        sort: SortArg,
    },

    /// Add an application
    AddApp {
        name: String,

        /// Icon path
        #[arg(long)]
        icon: Option<String>,
    },

    /// Rename an application
    RenameApp { name: String, new_name: String },

    /// Set or clear (empty string) an application's icon
    SetIcon { name: String, icon: String },

    /// Delete an application and all of its shortcuts
    RemoveApp { name: String },

    /// Add a shortcut, creating the application if needed
    Add {
        app: String,
        title: String,
        keys: String,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        category: Option<String>,
    },

    /// Edit a shortcut by id
    Edit {
        id: Uuid,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        keys: Option<String>,

        /// New description (empty string clears it)
        #[arg(long)]
        description: Option<String>,

        /// New category (empty string clears it)
        #[arg(long)]
        category: Option<String>,
    },

    /// Delete a shortcut by id
    Remove { id: Uuid },

    /// Search titles, keys, descriptions and categories
    Search { query: String },

    /// Write the library to the backup file
    Backup,

    /// Merge the backup file into the library
    Import,

    /// Show sync status and paths
    Status,

    /// Turn auto-sync on or off
    AutoSync {
        #[arg(action = ArgAction::Set, value_parser = BoolishValueParser::new())]
        enabled: bool,
    },

    /// Watch the backup file and sync until interrupted
    Watch {
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },

    /// Extract shortcuts from text (file or stdin)
    Extract {
        /// Input file; reads stdin when omitted
        file: Option<PathBuf>,

        /// Store the extracted shortcuts under this application
        #[arg(short, long)]
        app: Option<String>,

        /// Candidate numbers to leave out when storing (e.g. 2,5)
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<usize>,

        /// Use the line-based extractor instead of an AI provider
        #[arg(long)]
        offline: bool,
    },

    /// Read or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show all settings
    List,
    /// Show one setting
    Get { key: String },
    /// Change one setting (empty value clears optional settings)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(Some(&settings_path))
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    if let Commands::Config { action } = &cli.command {
        return cmd_config(action, &mut settings, &settings_path);
    }

    // Per-run overrides are never written back to the settings file
    let persist = cli.backup_file.is_none() && cli.database.is_none();
    if let Some(path) = &cli.backup_file {
        settings.sync.backup_path = Some(path.clone());
    }
    if let Some(path) = &cli.database {
        settings.store.database_path = Some(path.clone());
    }

    if cli.ephemeral {
        let tracker = ShortcutTracker::with_store(settings, MemoryStore::new());
        run(cli.command, tracker).await
    } else {
        let db = settings.database_path();
        if let Some(parent) = db.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut tracker = ShortcutTracker::open(settings)
            .with_context(|| format!("Failed to open library at {}", db.display()))?;
        if persist {
            tracker = tracker.with_settings_path(settings_path);
        }
        run(cli.command, tracker).await
    }
}

async fn run<S: ShortcutStore>(command: Commands, mut tracker: ShortcutTracker<S>) -> Result<()> {
    tracker.start().await.context("Initial sync failed")?;

    match command {
        Commands::List { app, sort } => cmd_list(&tracker, app.as_deref(), sort.into())?,
        Commands::AddApp { name, icon } => {
            let app = tracker.library_mut().add_application(&name, icon)?;
            println!("{} Added {} {}", CHECK, style(&app.name).cyan(), style(app.id).dim());
        }
        Commands::RenameApp { name, new_name } => {
            let id = app_id(&tracker, &name)?;
            let app = tracker.library_mut().rename_application(id, &new_name)?;
            println!("{} Renamed {} {} {}", CHECK, name, ARROW, style(&app.name).cyan());
        }
        Commands::SetIcon { name, icon } => {
            let id = app_id(&tracker, &name)?;
            tracker.library_mut().set_icon(id, Some(icon))?;
            println!("{} Updated icon for {}", CHECK, style(&name).cyan());
        }
        Commands::RemoveApp { name } => {
            let id = app_id(&tracker, &name)?;
            tracker.library_mut().delete_application(id)?;
            println!("{} Removed {}", CHECK, style(&name).cyan());
        }
        Commands::Add {
            app,
            title,
            keys,
            description,
            category,
        } => {
            let id = match tracker.library().application_by_name(&app)? {
                Some(existing) => existing.id,
                None => tracker.library_mut().add_application(&app, None)?.id,
            };
            let shortcut = tracker.library_mut().add_shortcut(
                id,
                NewShortcut {
                    title,
                    keys,
                    description,
                    category,
                },
            )?;
            println!(
                "{} {} {} in {} {}",
                CHECK,
                style(&shortcut.keys).yellow().bold(),
                shortcut.title,
                style(&app).cyan(),
                style(shortcut.id).dim()
            );
        }
        Commands::Edit {
            id,
            title,
            keys,
            description,
            category,
        } => {
            let shortcut = tracker.library_mut().edit_shortcut(
                id,
                ShortcutEdit {
                    title,
                    keys,
                    description: description.map(Some),
                    category: category.map(Some),
                },
            )?;
            println!("{} {} {}", CHECK, style(&shortcut.keys).yellow().bold(), shortcut.title);
        }
        Commands::Remove { id } => {
            tracker.library_mut().delete_shortcut(id)?;
            println!("{} Removed shortcut {}", CHECK, style(id).dim());
        }
        Commands::Search { query } => cmd_search(&tracker, &query)?,
        Commands::Backup => {
            tracker.save_now().await.context("Backup failed")?;
            println!(
                "{} Saved backup to {}",
                CHECK,
                style(tracker.engine().path().display()).dim()
            );
        }
        Commands::Import => match tracker.import_now().await.context("Import failed")? {
            ImportOutcome::NoBackup => println!("{} No backup found", INFO),
            ImportOutcome::Imported(summary) => println!(
                "{} Imported {} applications, {} shortcuts ({} skipped)",
                CHECK,
                summary.applications_created,
                summary.shortcuts_inserted,
                summary.shortcuts_skipped
            ),
        },
        Commands::Status => cmd_status(&tracker)?,
        Commands::AutoSync { enabled } => {
            tracker.set_auto_sync(enabled).await?;
            println!(
                "{} Auto-sync {}",
                CHECK,
                if enabled { style("on").green() } else { style("off").yellow() }
            );
        }
        Commands::Watch { seconds } => cmd_watch(&mut tracker, seconds).await?,
        Commands::Extract {
            file,
            app,
            exclude,
            offline,
        } => cmd_extract(&mut tracker, file, app, &exclude, offline).await?,
        Commands::Config { .. } => unreachable!("handled before the library is opened"),
    }

    // Flush the auto-sync save for any mutation above
    tracker.pump().await.context("Sync failed")?;
    Ok(())
}

fn app_id<S: ShortcutStore>(tracker: &ShortcutTracker<S>, name: &str) -> Result<Uuid> {
    match tracker.library().application_by_name(name)? {
        Some(app) => Ok(app.id),
        None => bail!("No application named {}", name),
    }
}

fn cmd_list<S: ShortcutStore>(
    tracker: &ShortcutTracker<S>,
    only: Option<&str>,
    sort: SortOrder,
) -> Result<()> {
    let apps = tracker.library().sorted_applications(sort)?;
    let apps: Vec<_> = apps
        .into_iter()
        .filter(|a| only.map_or(true, |name| a.name == name))
        .collect();

    if apps.is_empty() {
        println!("{} No applications", INFO);
        return Ok(());
    }

    for app in apps {
        println!(
            "\n{} {}",
            style(&app.name).bold().underlined(),
            style(format!("({} shortcuts)", app.shortcuts.len())).dim()
        );
        for s in &app.shortcuts {
            let category = s
                .category
                .as_deref()
                .map(|c| format!(" [{}]", c))
                .unwrap_or_default();
            println!(
                "  {:>8}  {}{}  {}",
                style(&s.keys).yellow().bold(),
                s.title,
                style(category).cyan(),
                style(s.id).dim()
            );
            if let Some(d) = &s.description {
                println!("            {}", style(d).dim());
            }
        }
    }
    Ok(())
}

fn cmd_search<S: ShortcutStore>(tracker: &ShortcutTracker<S>, query: &str) -> Result<()> {
    let hits = tracker.library().search(query)?;
    if hits.is_empty() {
        println!("{} No matches for {}", INFO, style(query).cyan());
        return Ok(());
    }
    for hit in hits {
        println!(
            "  {:>8}  {}  {}",
            style(&hit.shortcut.keys).yellow().bold(),
            hit.shortcut.title,
            style(&hit.app_name).cyan()
        );
    }
    Ok(())
}

fn cmd_status<S: ShortcutStore>(tracker: &ShortcutTracker<S>) -> Result<()> {
    let engine = tracker.engine();
    let apps = tracker.library().applications()?;
    let shortcuts: usize = apps.iter().map(|a| a.shortcuts.len()).sum();

    println!("{}", style("Shortcut Tracker").bold().underlined());
    println!("  Library:      {} applications, {} shortcuts", apps.len(), shortcuts);
    println!("  Backup file:  {}", style(engine.path().display()).dim());
    println!(
        "  Auto-sync:    {}",
        if engine.auto_sync_enabled() { style("on").green() } else { style("off").yellow() }
    );
    println!("  Status:       {}", status_label(&engine.status()));
    match engine.last_sync_time() {
        Some(t) => println!("  Last sync:    {}", t.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("  Last sync:    {}", style("never").dim()),
    }
    println!("  Hotkey:       {}", tracker.settings().hotkey.display);
    Ok(())
}

fn status_label(status: &SyncStatus) -> String {
    let label = style(status.label());
    match status {
        SyncStatus::Idle => label.dim().to_string(),
        SyncStatus::Syncing => label.cyan().to_string(),
        SyncStatus::Success => label.green().to_string(),
        SyncStatus::Error(msg) => format!("{} {}", label.red(), msg),
    }
}

async fn cmd_watch<S: ShortcutStore>(tracker: &mut ShortcutTracker<S>, seconds: Option<u64>) -> Result<()> {
    if !tracker.engine().auto_sync_enabled() {
        tracker.set_auto_sync(true).await?;
    }
    println!(
        "{} Watching {} (Ctrl+C to stop)",
        SYNC,
        style(tracker.engine().path().display()).dim()
    );

    let deadline = seconds.map(|s| std::time::Instant::now() + Duration::from_secs(s));
    loop {
        match tracker.pump().await {
            Ok(events) => {
                for event in events {
                    match event {
                        AppEvent::SyncStatusChanged(SyncStatus::Success) => {
                            println!("{} Synced", CHECK)
                        }
                        AppEvent::SyncStatusChanged(SyncStatus::Error(msg)) => {
                            println!("{} {}", CROSS, style(msg).red())
                        }
                        AppEvent::ExternalBackupChanged(change) => {
                            println!("{} {:?}", ARROW, change)
                        }
                        _ => {}
                    }
                }
            }
            Err(e) => println!("{} Sync failed: {}", CROSS, style(e).red()),
        }

        if deadline.is_some_and(|d| std::time::Instant::now() >= d) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    Ok(())
}

async fn cmd_extract<S: ShortcutStore>(
    tracker: &mut ShortcutTracker<S>,
    file: Option<PathBuf>,
    app: Option<String>,
    exclude: &[usize],
    offline: bool,
) -> Result<()> {
    let text = match &file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let mut flow = ImportFlow::new();
    if offline {
        flow.extract_offline(&text);
    } else {
        let gateway = ExtractionGateway::from_settings(&tracker.settings().ai)?;
        println!("{} Asking {}...", ARROW, style(gateway.provider()).cyan());
        flow.extract(&gateway, &text).await;
    }

    match flow.state() {
        ImportState::Error(failure) => {
            println!("{} {}", CROSS, style(&failure.message).red());
            if failure.needs_credential {
                println!(
                    "  Set one with: shortcut-tracker config set ai.{}_api_key <key>",
                    tracker.settings().ai.provider
                );
            }
            if let Some(raw) = &failure.raw {
                println!("  Raw reply:\n{}", style(raw).dim());
            }
            bail!("Extraction failed");
        }
        ImportState::Loaded(items) if items.is_empty() => {
            println!("{} No shortcuts found", INFO);
            return Ok(());
        }
        ImportState::Loaded(items) => {
            for (i, item) in items.iter().enumerate() {
                let c = &item.candidate;
                println!(
                    "  {:>3}. {:>8}  {}{}",
                    i + 1,
                    style(&c.keys).yellow().bold(),
                    c.title,
                    c.category
                        .as_deref()
                        .map(|c| format!(" [{}]", style(c).cyan()))
                        .unwrap_or_default()
                );
            }
        }
        ImportState::Idle | ImportState::Loading => return Ok(()),
    }

    let Some(app) = app else {
        println!("{} Use --app <name> to store them", INFO);
        return Ok(());
    };
    for n in exclude {
        if *n == 0 || !flow.toggle(n - 1) {
            bail!("No candidate number {}", n);
        }
    }
    let summary = flow.commit(tracker.library_mut(), &app)?;
    println!(
        "{} Stored {} shortcuts in {} ({} already present)",
        CHECK,
        summary.shortcuts_inserted,
        style(&app).cyan(),
        summary.shortcuts_skipped
    );
    Ok(())
}

fn cmd_config(action: &ConfigAction, settings: &mut Settings, path: &Path) -> Result<()> {
    match action {
        ConfigAction::List => {
            for key in Settings::KEYS {
                println!("  {:<22} {}", key, settings.get(key)?);
            }
        }
        ConfigAction::Get { key } => println!("{}", settings.get(key)?),
        ConfigAction::Set { key, value } => {
            settings.set(key, value)?;
            settings
                .save(Some(path))
                .with_context(|| format!("Failed to save settings to {}", path.display()))?;
            println!("{} {} = {}", CHECK, key, settings.get(key)?);
        }
    }
    Ok(())
}
