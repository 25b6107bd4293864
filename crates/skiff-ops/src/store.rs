//! The pending operations engine.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use compact_str::format_compact;
use parking_lot::Mutex;
use skiff_core::{Entry, EntryKind, StorageBackend, StorageUri, join_path};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::clipboard::{ClipboardMode, ClipboardState};
use crate::config::EngineConfig;
use crate::executor::{ExecutionPlan, run_plan};
use crate::history::History;
use crate::progress::{ExecutionProgress, ExecutionReport};
use crate::subscribe::{Listeners, Subscription};
use crate::visual::{self, EntryVisualState};
use crate::{OperationId, PendingOperation};

/// Immutable view of the engine for renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSnapshot {
    pub operations: Vec<PendingOperation>,
    pub clipboard: Option<ClipboardState>,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// Staged operations, clipboard and undo history for one browsing session.
///
/// Every mutating method is total: invalid or redundant input is a no-op,
/// never an error. A call that changes state records the previous log for
/// undo, clears redo, and notifies subscribers exactly once. No-op calls do
/// neither.
#[derive(Debug)]
pub struct PendingOperations {
    operations: Vec<PendingOperation>,
    clipboard: Option<ClipboardState>,
    history: History,
    listeners: Listeners,
    snapshot: OnceLock<Arc<PendingSnapshot>>,
    next_seq: u64,
}

impl Default for PendingOperations {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingOperations {
    /// Create an empty engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    /// Create an empty engine.
    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            operations: Vec::new(),
            clipboard: None,
            history: History::new(config.history_limit),
            listeners: Listeners::default(),
            snapshot: OnceLock::new(),
            next_seq: 0,
        }
    }

    // Queries

    /// All staged operations in insertion order.
    pub fn operations(&self) -> &[PendingOperation] {
        &self.operations
    }

    /// Operations referencing anything under `path`.
    pub fn operations_for_path(
        &self,
        path: &str,
        scheme: &str,
        bucket: Option<&str>,
    ) -> Vec<&PendingOperation> {
        visual::operations_for_path(&self.operations, path, scheme, bucket)
    }

    pub fn clipboard(&self) -> Option<&ClipboardState> {
        self.clipboard.as_ref()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.operations.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.operations.len()
    }

    pub fn entry_state(&self, uri: &StorageUri) -> EntryVisualState {
        visual::entry_state(&self.operations, uri)
    }

    /// Entries to show in `path` that only exist once operations apply.
    pub fn virtual_entries(&self, path: &str, scheme: &str, bucket: Option<&str>) -> Vec<Entry> {
        visual::virtual_entries(&self.operations, path, scheme, bucket)
    }

    /// Whether a listed entry should be hidden (deleted or moved away).
    pub fn should_filter_entry(&self, uri: &StorageUri) -> bool {
        self.entry_state(uri).should_filter()
    }

    pub fn has_clipboard_content(&self) -> bool {
        self.clipboard.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn is_clipboard_cut(&self) -> bool {
        self.clipboard.as_ref().is_some_and(ClipboardState::is_cut)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Cached snapshot, rebuilt on the first read after a change.
    pub fn snapshot(&self) -> Arc<PendingSnapshot> {
        self.snapshot
            .get_or_init(|| {
                Arc::new(PendingSnapshot {
                    operations: self.operations.clone(),
                    clipboard: self.clipboard.clone(),
                    can_undo: self.history.can_undo(),
                    can_redo: self.history.can_redo(),
                })
            })
            .clone()
    }

    // Staging

    /// Stage deletion of `uri`. No-op if already staged.
    pub fn mark_for_deletion(&mut self, uri: &StorageUri, entry: &Entry) {
        if self.deletion_index(uri).is_some() {
            return;
        }

        self.record();
        let operation = PendingOperation::Delete {
            id: self.next_id(),
            uri: uri.clone(),
            entry: entry.clone(),
            created_at: Utc::now(),
        };
        self.push(operation);
        self.changed();
    }

    /// Drop a staged deletion of `uri`. No-op if none is staged.
    pub fn unmark_for_deletion(&mut self, uri: &StorageUri) {
        let Some(index) = self.deletion_index(uri) else {
            return;
        };

        self.record();
        let removed = self.operations.remove(index);
        debug!(target: "skiff::ops", "Unstaged {}", removed);
        self.changed();
    }

    pub fn toggle_deletion(&mut self, uri: &StorageUri, entry: &Entry) {
        if self.deletion_index(uri).is_some() {
            self.unmark_for_deletion(uri);
        } else {
            self.mark_for_deletion(uri, entry);
        }
    }

    /// Stage a rename, replacing any rename already staged for `uri`.
    pub fn rename(&mut self, uri: &StorageUri, entry: &Entry, new_name: &str) {
        self.record();
        self.operations
            .retain(|op| !matches!(op, PendingOperation::Rename { uri: target, .. } if target == uri));
        let operation = PendingOperation::Rename {
            id: self.next_id(),
            uri: uri.clone(),
            entry: entry.clone(),
            new_name: new_name.into(),
            created_at: Utc::now(),
        };
        self.push(operation);
        self.changed();
    }

    /// Stage creation of a new entry. Duplicates are not checked.
    pub fn create(&mut self, uri: &StorageUri, name: &str, entry_kind: EntryKind) {
        self.record();
        let operation = PendingOperation::Create {
            id: self.next_id(),
            uri: uri.clone(),
            name: name.into(),
            entry_kind,
            created_at: Utc::now(),
        };
        self.push(operation);
        self.changed();
    }

    /// Remove one staged operation. No-op if `id` is unknown.
    pub fn remove_operation(&mut self, id: &OperationId) {
        let Some(index) = self.operations.iter().position(|op| op.id() == id) else {
            return;
        };

        self.record();
        let removed = self.operations.remove(index);
        debug!(target: "skiff::ops", "Removed {}", removed);
        self.changed();
    }

    /// Drop every staged operation, the clipboard and all history.
    pub fn discard(&mut self) {
        debug!(
            target: "skiff::ops",
            count = self.operations.len(),
            "Discarding pending operations"
        );
        self.operations.clear();
        self.clipboard = None;
        self.history.clear();
        self.changed();
    }

    // Clipboard

    /// Put a selection on the clipboard for moving.
    pub fn cut(&mut self, entries: &[Entry], uris: &[StorageUri]) {
        self.set_clipboard(entries, uris, ClipboardMode::Cut);
    }

    /// Put a selection on the clipboard for copying.
    pub fn copy(&mut self, entries: &[Entry], uris: &[StorageUri]) {
        self.set_clipboard(entries, uris, ClipboardMode::Copy);
    }

    pub fn clear_clipboard(&mut self) {
        if self.clipboard.is_none() {
            return;
        }

        self.record();
        self.clipboard = None;
        self.changed();
    }

    /// Stage a move (cut) or copy of every clipboard entry into `dest_path`.
    ///
    /// Each entry keeps its name. A cut clipboard is emptied afterwards; a
    /// copied one stays for further pastes.
    pub fn paste(&mut self, dest_path: &str, scheme: &str, bucket: Option<&str>) {
        let Some(clipboard) = self.clipboard.clone().filter(|c| !c.is_empty()) else {
            return;
        };

        self.record();
        for (entry, source_uri) in clipboard.iter() {
            let path = join_path(dest_path, &entry.name, entry.kind.is_container());
            let dest_uri = StorageUri::new(scheme, bucket, &path);
            let id = self.next_id();
            let operation = match clipboard.mode() {
                ClipboardMode::Cut => PendingOperation::Move {
                    id,
                    source_uri: source_uri.clone(),
                    dest_uri,
                    entry: entry.clone(),
                    created_at: Utc::now(),
                },
                ClipboardMode::Copy => PendingOperation::Copy {
                    id,
                    source_uri: source_uri.clone(),
                    dest_uri,
                    entry: entry.clone(),
                    created_at: Utc::now(),
                },
            };
            self.push(operation);
        }

        if clipboard.is_cut() {
            self.clipboard = None;
        }
        self.changed();
    }

    // History

    /// Restore the log as it was before the last edit.
    pub fn undo(&mut self) -> bool {
        if !self.history.undo(&mut self.operations) {
            return false;
        }
        self.changed();
        true
    }

    /// Re-apply the last undone edit.
    pub fn redo(&mut self) -> bool {
        if !self.history.redo(&mut self.operations) {
            return false;
        }
        self.changed();
        true
    }

    // Execution

    /// The staged operations in execution order.
    pub fn plan(&self) -> ExecutionPlan {
        ExecutionPlan::new(&self.operations)
    }

    /// Apply every staged operation and return the ones that failed.
    ///
    /// Failed operations stay staged so calling this again retries only them.
    pub async fn execute(&mut self, backend: &dyn StorageBackend) -> Vec<PendingOperation> {
        self.execute_with_progress(backend, |_| {}).await
    }

    /// Like [`execute`](Self::execute), calling `on_progress` before each
    /// operation.
    pub async fn execute_with_progress<F>(
        &mut self,
        backend: &dyn StorageBackend,
        on_progress: F,
    ) -> Vec<PendingOperation>
    where
        F: FnMut(&ExecutionProgress),
    {
        self.execute_report(backend, None, on_progress)
            .await
            .failed_operations()
    }

    /// Apply the staged operations, stopping early if `cancel` fires.
    pub async fn execute_report<F>(
        &mut self,
        backend: &dyn StorageBackend,
        cancel: Option<&CancellationToken>,
        on_progress: F,
    ) -> ExecutionReport
    where
        F: FnMut(&ExecutionProgress),
    {
        let plan = self.plan();
        let report = run_plan(&plan, backend, cancel, on_progress).await;
        self.apply_report(&report);
        report
    }

    /// Reconcile the log with a finished batch.
    ///
    /// Succeeded operations are removed; failed and skipped ones stay.
    /// History is cleared: earlier snapshots still hold operations the
    /// backend has already applied.
    pub fn apply_report(&mut self, report: &ExecutionReport) {
        let succeeded = report.succeeded_ids();
        self.operations.retain(|op| !succeeded.contains(op.id()));
        self.history.clear();
        self.changed();
    }

    // Subscriptions

    /// Register a listener called after every change.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    // Internals

    fn next_id(&mut self) -> OperationId {
        self.next_seq += 1;
        OperationId(format_compact!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            self.next_seq
        ))
    }

    fn deletion_index(&self, uri: &StorageUri) -> Option<usize> {
        self.operations
            .iter()
            .position(|op| matches!(op, PendingOperation::Delete { uri: target, .. } if target == uri))
    }

    fn set_clipboard(&mut self, entries: &[Entry], uris: &[StorageUri], mode: ClipboardMode) {
        let clipboard = ClipboardState::new(entries, uris, mode);
        self.record();
        debug!(target: "skiff::ops", %mode, count = clipboard.len(), "Clipboard set");
        self.clipboard = Some(clipboard);
        self.changed();
    }

    fn record(&mut self) {
        self.history.record(self.operations.clone());
    }

    fn push(&mut self, operation: PendingOperation) {
        debug!(target: "skiff::ops", "Staged {}", operation);
        self.operations.push(operation);
    }

    fn changed(&mut self) {
        self.snapshot.take();
        self.listeners.notify();
    }
}

static DEFAULT_ENGINE: OnceLock<Mutex<PendingOperations>> = OnceLock::new();

/// Process-wide engine, created on first use.
///
/// Prefer passing an explicit [`PendingOperations`] through the application.
/// The guard must not be held across an `.await`; to execute, take a
/// [`plan`](PendingOperations::plan), release the lock, run it, then call
/// [`apply_report`](PendingOperations::apply_report).
pub fn default_engine() -> &'static Mutex<PendingOperations> {
    DEFAULT_ENGINE.get_or_init(|| Mutex::new(PendingOperations::new()))
}

/// Replace the process-wide engine with a fresh one.
pub fn reset_default_engine() {
    *default_engine().lock() = PendingOperations::new();
}

