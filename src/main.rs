//! skiff - stage, preview and apply file operations.
//!
//! Usage:
//!   skiff preview ROOT --plan FILE   Show a directory with staged effects
//!   skiff apply ROOT --plan FILE     Execute the staged operations
//!   skiff --help                     Show help
//!
//! A plan file is a JSON array of actions, applied in order to a fresh
//! engine:
//!
//! ```json
//! [
//!   { "action": "create", "path": "archive", "kind": "directory" },
//!   { "action": "cut", "paths": ["notes/a.txt"] },
//!   { "action": "paste", "into": "archive" },
//!   { "action": "rename", "path": "old.txt", "to": "new.txt" },
//!   { "action": "delete", "path": "tmp" },
//!   { "action": "undo" }
//! ]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use skiff_core::{
    BackendResult, BackendStatus, Entry, EntryKind, ListOptions, StorageBackend, StorageUri,
    join_path, normalize_dir, parent_dir, validate_name,
};
use skiff_ops::{
    EntryVisualState, ExecutionEvent, LOCAL_SCHEME, LocalBackend, PendingOperation,
    PendingOperations, start_execution,
};

#[derive(Parser)]
#[command(
    name = "skiff",
    version,
    about = "Stage, preview and apply file operations",
    long_about = "skiff stages deletes, renames, moves, copies and creates, shows how a \
                  directory will look once they are applied, and applies them as one batch.\n\n\
                  Paths in a plan are relative to ROOT and are resolved against the \
                  filesystem as it is before any operation runs."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show a directory listing with the plan's staged effects
    Preview {
        /// Root directory the plan operates in
        root: PathBuf,

        /// JSON plan file
        #[arg(short, long)]
        plan: PathBuf,

        /// Directory to preview, relative to the root
        #[arg(short, long, default_value = "")]
        dir: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Execute the plan's staged operations
    Apply {
        /// Root directory the plan operates in
        root: PathBuf,

        /// JSON plan file
        #[arg(short, long)]
        plan: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// One step of a plan file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum PlanAction {
    Delete {
        path: String,
    },
    Rename {
        path: String,
        to: String,
    },
    Create {
        path: String,
        #[serde(default = "default_create_kind")]
        kind: EntryKind,
    },
    Cut {
        paths: Vec<String>,
    },
    Copy {
        paths: Vec<String>,
    },
    Paste {
        into: String,
    },
    Undo,
    Redo,
}

fn default_create_kind() -> EntryKind {
    EntryKind::Directory
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Preview {
            root,
            plan,
            dir,
            format,
        } => run_preview(&root, &plan, &dir, format).await,
        Command::Apply { root, plan } => run_apply(&root, &plan).await,
    }
}

/// Stage a plan and print the previewed directory.
async fn run_preview(root: &Path, plan: &Path, dir: &str, format: OutputFormat) -> Result<()> {
    let backend = open_backend(root)?;
    let engine = stage_plan(&backend, &load_plan(plan)?).await?;

    let listed = match list_all(&backend, dir).await {
        Ok(entries) => entries,
        // The directory may only exist once the plan is applied.
        Err(e) if e.status == BackendStatus::NotFound => Vec::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to list '{dir}'")),
    };

    let preview = build_preview(&engine, dir, listed);

    match format {
        OutputFormat::Text => print_preview(&preview),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&preview)?),
    }

    Ok(())
}

/// Stage a plan and execute it against the root.
async fn run_apply(root: &Path, plan: &Path) -> Result<()> {
    let backend = open_backend(root)?;
    let mut engine = stage_plan(&backend, &load_plan(plan)?).await?;

    if !engine.has_pending_changes() {
        eprintln!("Nothing to apply.");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, finishing the current operation...");
            on_interrupt.cancel();
        }
    });

    let backend: Arc<dyn StorageBackend> = Arc::new(backend);
    let mut events = start_execution(engine.plan(), backend, cancel);

    while let Some(event) = events.recv().await {
        match event {
            ExecutionEvent::Progress(progress) => {
                eprintln!(
                    "[{}/{}] {:>3.0}% {}",
                    progress.index + 1,
                    progress.total,
                    progress.percentage(),
                    progress.operation
                );
            }
            ExecutionEvent::Complete(report) => {
                engine.apply_report(&report);
                println!("{}", report.summary());

                for failed in &report.failed {
                    eprintln!("  failed: {} ({})", failed.operation, failed.error);
                }
                for skipped in &report.skipped {
                    eprintln!("  skipped: {skipped}");
                }

                if !report.is_success() {
                    bail!("{} operations left pending", engine.pending_count());
                }
                return Ok(());
            }
        }
    }

    Err(eyre!("Execution ended without a report"))
}

fn open_backend(root: &Path) -> Result<LocalBackend> {
    let root = root.canonicalize().context("Invalid root")?;
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    Ok(LocalBackend::new(root))
}

fn load_plan(path: &Path) -> Result<Vec<PlanAction>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    parse_plan(&text).with_context(|| format!("Invalid plan {}", path.display()))
}

fn parse_plan(text: &str) -> Result<Vec<PlanAction>> {
    Ok(serde_json::from_str(text)?)
}

/// Apply each action to a fresh engine.
async fn stage_plan(backend: &LocalBackend, actions: &[PlanAction]) -> Result<PendingOperations> {
    let mut engine = PendingOperations::new();

    for action in actions {
        match action {
            PlanAction::Delete { path } => {
                let (entry, uri) = lookup(backend, path).await?;
                engine.mark_for_deletion(&uri, &entry);
            }
            PlanAction::Rename { path, to } => {
                validate_name(to).map_err(|e| eyre!("Cannot rename '{path}': {e}"))?;
                let (entry, uri) = lookup(backend, path).await?;
                engine.rename(&uri, &entry, to);
            }
            PlanAction::Create { path, kind } => {
                let name = last_segment(path);
                validate_name(name).map_err(|e| eyre!("Cannot create '{path}': {e}"))?;
                let target = join_path(parent_dir(path), name, kind.is_container());
                engine.create(&StorageUri::new(LOCAL_SCHEME, None, &target), name, *kind);
            }
            PlanAction::Cut { paths } => {
                let (entries, uris) = lookup_all(backend, paths).await?;
                engine.cut(&entries, &uris);
            }
            PlanAction::Copy { paths } => {
                let (entries, uris) = lookup_all(backend, paths).await?;
                engine.copy(&entries, &uris);
            }
            PlanAction::Paste { into } => {
                if !engine.has_clipboard_content() {
                    tracing::warn!("paste into '{into}' with an empty clipboard");
                }
                engine.paste(into, LOCAL_SCHEME, None);
            }
            PlanAction::Undo => {
                engine.undo();
            }
            PlanAction::Redo => {
                engine.redo();
            }
        }
    }

    Ok(engine)
}

/// Find the entry at `path` by listing its parent directory.
async fn lookup(backend: &LocalBackend, path: &str) -> Result<(Entry, StorageUri)> {
    let name = last_segment(path);
    let dir = parent_dir(path);
    let entry = list_all(backend, dir)
        .await
        .with_context(|| format!("Failed to list '{dir}'"))?
        .into_iter()
        .find(|e| e.name == name)
        .ok_or_else(|| eyre!("No such entry: '{path}'"))?;

    let uri = entry.uri(LOCAL_SCHEME, None);
    Ok((entry, uri))
}

async fn lookup_all(
    backend: &LocalBackend,
    paths: &[String],
) -> Result<(Vec<Entry>, Vec<StorageUri>)> {
    let mut entries = Vec::with_capacity(paths.len());
    let mut uris = Vec::with_capacity(paths.len());
    for path in paths {
        let (entry, uri) = lookup(backend, path).await?;
        entries.push(entry);
        uris.push(uri);
    }
    Ok((entries, uris))
}

/// Every entry of `dir`, following continuation tokens.
async fn list_all(backend: &LocalBackend, dir: &str) -> BackendResult<Vec<Entry>> {
    let mut options = ListOptions {
        include_hidden: true,
        ..Default::default()
    };
    let mut entries = Vec::new();

    loop {
        let page = backend.list(dir, &options).await?;
        entries.extend(page.entries);
        if !page.has_more {
            return Ok(entries);
        }
        options.continuation_token = page.continuation_token;
    }
}

fn last_segment(path: &str) -> &str {
    normalize_dir(path).rsplit('/').next().unwrap_or_default()
}

/// Directory listing as it will look once the plan is applied.
#[derive(Debug, Serialize)]
struct Preview {
    dir: String,
    entries: Vec<PreviewRow>,
    plan: Vec<PendingOperation>,
}

#[derive(Debug, Serialize)]
struct PreviewRow {
    #[serde(flatten)]
    entry: Entry,
    is_virtual: bool,
    state: EntryVisualState,
}

fn build_preview(engine: &PendingOperations, dir: &str, listed: Vec<Entry>) -> Preview {
    let mut entries: Vec<PreviewRow> = listed
        .into_iter()
        .filter_map(|entry| {
            let state = engine.entry_state(&entry.uri(LOCAL_SCHEME, None));
            (!state.should_filter()).then_some(PreviewRow {
                entry,
                is_virtual: false,
                state,
            })
        })
        .collect();

    entries.extend(
        engine
            .virtual_entries(dir, LOCAL_SCHEME, None)
            .into_iter()
            .map(|entry| PreviewRow {
                state: engine.entry_state(&entry.uri(LOCAL_SCHEME, None)),
                entry,
                is_virtual: true,
            }),
    );

    Preview {
        dir: normalize_dir(dir).to_string(),
        entries,
        plan: engine.plan().operations().to_vec(),
    }
}

fn print_preview(preview: &Preview) {
    println!();
    println!("{}", "─".repeat(70));
    println!(
        " /{} - {} entries, {} pending operations",
        preview.dir,
        preview.entries.len(),
        preview.plan.len()
    );
    println!("{}", "─".repeat(70));
    println!();

    if preview.entries.is_empty() {
        println!(" (empty)");
    }

    for row in &preview.entries {
        let marker = if row.entry.kind.is_container() { "/" } else { "" };
        let size = row.entry.size.map(format_size).unwrap_or_default();
        println!(
            " {} {:<40} {:>10}  {}",
            if row.is_virtual { "+" } else { " " },
            truncate(&format!("{}{}", row.entry.name, marker), 40),
            size,
            describe(&row.state)
        );
    }

    if !preview.plan.is_empty() {
        println!();
        println!(" Execution order:");
        for (i, operation) in preview.plan.iter().enumerate() {
            println!("   {:>3}. {}", i + 1, operation);
        }
    }
    println!();
}

/// Short label for the staged effects on an entry.
fn describe(state: &EntryVisualState) -> String {
    let mut labels = Vec::new();
    if let Some(new_name) = &state.new_name {
        labels.push(format!("renamed -> {new_name}"));
    }
    if state.is_moved_here {
        labels.push("moved here".to_string());
    }
    if state.is_copied_here {
        labels.push("copied here".to_string());
    }
    if state.is_created {
        labels.push("new".to_string());
    }
    labels.join(", ")
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
