use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use skiff_core::{
    BackendError, BackendResult, BackendStatus, DeleteOptions, Entry, EntryId, EntryKind,
    ListOptions, ListResult, StorageBackend, StorageUri,
};
use skiff_ops::{
    ExecutionEvent, ExecutionOutcome, OperationId, OperationKind, PendingOperation,
    PendingOperations, default_engine, reset_default_engine, start_execution,
};
use tokio_util::sync::CancellationToken;

/// Backend that records every call and fails on selected paths.
#[derive(Default)]
struct RecordingBackend {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingBackend {
    fn failing_on(paths: &[&str]) -> Self {
        let backend = Self::default();
        backend
            .failing
            .lock()
            .unwrap()
            .extend(paths.iter().map(|p| p.to_string()));
        backend
    }

    fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call(&self, name: &str, path: &str) -> BackendResult<()> {
        self.calls.lock().unwrap().push(format!("{name} {path}"));
        if self.failing.lock().unwrap().contains(path) {
            Err(BackendError::new(BackendStatus::Error, "injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorageBackend for RecordingBackend {
    fn scheme(&self) -> &str {
        "s3"
    }

    async fn list(&self, _path: &str, _options: &ListOptions) -> BackendResult<ListResult> {
        Ok(ListResult::default())
    }

    async fn read(&self, _path: &str) -> BackendResult<Vec<u8>> {
        Err(BackendError::unimplemented("read"))
    }

    async fn write(&self, path: &str, _content: &[u8]) -> BackendResult<()> {
        self.call("write", path)
    }

    async fn mkdir(&self, path: &str) -> BackendResult<()> {
        self.call("mkdir", path)
    }

    async fn delete(&self, path: &str, options: DeleteOptions) -> BackendResult<()> {
        let name = if options.recursive { "delete -r" } else { "delete" };
        self.call(name, path)
    }

    async fn move_entry(&self, source: &str, dest: &str) -> BackendResult<()> {
        self.call("move", &format!("{source} {dest}"))
    }

    async fn copy(&self, source: &str, dest: &str) -> BackendResult<()> {
        self.call("copy", &format!("{source} {dest}"))
    }
}

fn file(path: &str) -> (StorageUri, Entry) {
    let uri = StorageUri::new("s3", Some("b"), path);
    let name = uri.name().to_string();
    let entry = Entry::file(EntryId::new(format!("id-{path}")), name, path).with_size(12);
    (uri, entry)
}

fn dir(path: &str) -> (StorageUri, Entry) {
    let uri = StorageUri::new("s3", Some("b"), path);
    let name = uri.name().to_string();
    (uri, Entry::directory(EntryId::new(format!("id-{path}")), name, path))
}

#[test]
fn test_unreferenced_uri_has_default_state() {
    let mut engine = PendingOperations::new();
    let (a, entry_a) = file("dir/a.txt");
    engine.mark_for_deletion(&a, &entry_a);

    let (other, _) = file("dir/other.txt");
    let state = engine.entry_state(&other);
    assert!(state.is_unchanged());
    assert!(!engine.should_filter_entry(&other));
}

#[test]
fn test_mark_for_deletion_is_idempotent() {
    let mut engine = PendingOperations::new();
    let (uri, entry) = file("dir/a.txt");

    engine.mark_for_deletion(&uri, &entry);
    assert_eq!(engine.pending_count(), 1);
    engine.mark_for_deletion(&uri, &entry);
    assert_eq!(engine.pending_count(), 1);

    assert!(engine.entry_state(&uri).is_deleted);
    assert!(engine.should_filter_entry(&uri));
}

#[test]
fn test_toggle_deletion_is_its_own_inverse() {
    let mut engine = PendingOperations::new();
    let (keep, _) = file("dir/keep.txt");
    engine.create(&keep, "keep.txt", EntryKind::File);
    let before = engine.operations().to_vec();

    let (uri, entry) = file("dir/a.txt");
    engine.toggle_deletion(&uri, &entry);
    assert_eq!(engine.pending_count(), 2);
    engine.toggle_deletion(&uri, &entry);

    assert_eq!(engine.operations(), before.as_slice());
    assert!(!engine.entry_state(&keep).is_deleted);
}

#[test]
fn test_unmark_without_deletion_is_noop() {
    let mut engine = PendingOperations::new();
    let (uri, _) = file("dir/a.txt");

    engine.unmark_for_deletion(&uri);
    assert!(!engine.has_pending_changes());
    assert!(!engine.can_undo());
}

#[test]
fn test_undo_round_trip() {
    let mut engine = PendingOperations::new();
    let (seed, seed_entry) = file("seed.txt");
    engine.mark_for_deletion(&seed, &seed_entry);
    let before = engine.snapshot().operations.clone();

    let (a, entry_a) = file("dir/a.txt");
    let (b, entry_b) = file("dir/b.txt");
    let (new_dir, _) = dir("dir/new/");
    engine.mark_for_deletion(&a, &entry_a);
    engine.rename(&b, &entry_b, "c.txt");
    engine.create(&new_dir, "new", EntryKind::Directory);
    engine.copy(&[entry_a.clone()], &[a.clone()]);
    engine.paste("other/", "s3", Some("b"));
    engine.unmark_for_deletion(&a);
    engine.clear_clipboard();

    for _ in 0..7 {
        assert!(engine.undo());
    }

    assert_eq!(engine.snapshot().operations, before);
    assert!(engine.undo());
    assert!(engine.operations().is_empty());
}

#[test]
fn test_clipboard_writes_are_undo_steps() {
    let mut engine = PendingOperations::new();
    let (seed, seed_entry) = file("seed.txt");
    engine.mark_for_deletion(&seed, &seed_entry);
    let before = engine.operations().to_vec();

    let (a, entry_a) = file("dir/a.txt");
    engine.copy(&[entry_a], &[a]);
    assert!(engine.can_undo());
    assert!(!engine.can_redo());
    engine.paste("other/", "s3", Some("b"));

    assert!(engine.undo());
    assert!(engine.undo());
    assert_eq!(engine.operations(), before.as_slice());

    // Clearing an empty clipboard is a no-op and records nothing.
    let mut fresh = PendingOperations::new();
    fresh.clear_clipboard();
    assert!(!fresh.can_undo());
}

#[test]
fn test_redo_restores_and_new_edit_invalidates() {
    let mut engine = PendingOperations::new();
    let (a, entry_a) = file("dir/a.txt");
    let (b, entry_b) = file("dir/b.txt");

    engine.mark_for_deletion(&a, &entry_a);
    let after_mark = engine.operations().to_vec();

    assert!(engine.undo());
    assert!(engine.operations().is_empty());
    assert!(engine.can_redo());

    assert!(engine.redo());
    assert_eq!(engine.operations(), after_mark.as_slice());

    assert!(engine.undo());
    engine.mark_for_deletion(&b, &entry_b);
    assert!(!engine.can_redo());
    assert!(!engine.redo());
}

#[test]
fn test_undo_and_redo_on_empty_stacks() {
    let mut engine = PendingOperations::new();
    assert!(!engine.undo());
    assert!(!engine.redo());
    assert!(!engine.can_undo());
    assert!(!engine.can_redo());
}

#[test]
fn test_paste_cut_clears_clipboard() {
    let mut engine = PendingOperations::new();
    let (a, entry_a) = file("src/a.txt");
    let (b, entry_b) = file("src/b.txt");

    engine.cut(&[entry_a, entry_b], &[a, b]);
    assert!(engine.has_clipboard_content());
    assert!(engine.is_clipboard_cut());

    engine.paste("dst/", "s3", Some("b"));
    assert_eq!(engine.pending_count(), 2);
    assert!(
        engine
            .operations()
            .iter()
            .all(|op| op.kind() == OperationKind::Move)
    );
    assert!(!engine.has_clipboard_content());

    // Nothing left to paste.
    engine.paste("dst/", "s3", Some("b"));
    assert_eq!(engine.pending_count(), 2);
}

#[test]
fn test_paste_copy_keeps_clipboard() {
    let mut engine = PendingOperations::new();
    let (a, entry_a) = file("src/a.txt");
    let (b, entry_b) = file("src/b.txt");

    engine.copy(&[entry_a, entry_b], &[a, b]);
    engine.paste("one/", "s3", Some("b"));
    engine.paste("two/", "s3", Some("b"));

    assert_eq!(engine.pending_count(), 4);
    assert!(
        engine
            .operations()
            .iter()
            .all(|op| op.kind() == OperationKind::Copy)
    );
    assert!(engine.has_clipboard_content());
    assert!(!engine.is_clipboard_cut());

    engine.clear_clipboard();
    assert!(engine.clipboard().is_none());
}

#[test]
fn test_paste_directory_keeps_marker() {
    let mut engine = PendingOperations::new();
    let (uri, entry) = dir("src/photos/");

    engine.cut(&[entry], &[uri.clone()]);
    engine.paste("dst", "s3", Some("b"));

    let state = engine.entry_state(&uri);
    assert!(state.is_moved_away);
    assert_eq!(
        state.move_destination.map(|u| u.to_string()),
        Some("s3://b/dst/photos/".to_string())
    );
}

#[test]
fn test_rename_replaces_previous_rename() {
    let mut engine = PendingOperations::new();
    let (uri, entry) = file("dir/a.txt");

    engine.rename(&uri, &entry, "a");
    engine.rename(&uri, &entry, "b");

    let renames: Vec<&PendingOperation> = engine
        .operations()
        .iter()
        .filter(|op| op.kind() == OperationKind::Rename)
        .collect();
    assert_eq!(renames.len(), 1);
    match renames[0] {
        PendingOperation::Rename { new_name, .. } => assert_eq!(new_name.as_str(), "b"),
        other => panic!("unexpected operation {other:?}"),
    }

    let state = engine.entry_state(&uri);
    assert!(state.is_renamed);
    assert_eq!(state.new_name.as_deref(), Some("b"));
    assert!(!state.should_filter());
}

#[test]
fn test_remove_operation() {
    let mut engine = PendingOperations::new();
    let (uri, entry) = file("dir/a.txt");
    engine.mark_for_deletion(&uri, &entry);
    let depth_before = engine.can_undo();

    engine.remove_operation(&OperationId::new("missing"));
    assert_eq!(engine.pending_count(), 1);
    assert_eq!(engine.can_undo(), depth_before);

    let id = engine.operations()[0].id().clone();
    engine.remove_operation(&id);
    assert!(!engine.has_pending_changes());

    assert!(engine.undo());
    assert_eq!(engine.pending_count(), 1);
}

#[test]
fn test_discard_clears_everything() {
    let mut engine = PendingOperations::new();
    let (uri, entry) = file("dir/a.txt");
    engine.mark_for_deletion(&uri, &entry);
    engine.copy(&[entry], &[uri]);
    engine.undo();

    engine.discard();
    assert!(!engine.has_pending_changes());
    assert!(engine.clipboard().is_none());
    assert!(!engine.can_undo());
    assert!(!engine.can_redo());
}

#[test]
fn test_operation_ids_are_unique() {
    let mut engine = PendingOperations::new();
    for i in 0..50 {
        let (uri, entry) = file(&format!("dir/{i}.txt"));
        engine.mark_for_deletion(&uri, &entry);
    }

    let ids: HashSet<&OperationId> = engine.operations().iter().map(|op| op.id()).collect();
    assert_eq!(ids.len(), 50);
}

#[test]
fn test_cut_paste_scenario() {
    let mut engine = PendingOperations::new();
    let (source, entry) = file("src/file.txt");

    engine.cut(&[entry], &[StorageUri::parse("s3://b/src/file.txt").unwrap()]);
    engine.paste("dst/", "s3", Some("b"));

    assert_eq!(engine.pending_count(), 1);
    match &engine.operations()[0] {
        PendingOperation::Move { dest_uri, .. } => {
            assert_eq!(dest_uri.as_str(), "s3://b/dst/file.txt");
        }
        other => panic!("unexpected operation {other:?}"),
    }

    let virtual_entries = engine.virtual_entries("dst/", "s3", Some("b"));
    assert_eq!(virtual_entries.len(), 1);
    assert_eq!(virtual_entries[0].name.as_str(), "file.txt");
    assert!(virtual_entries[0].id.is_virtual());

    assert!(engine.should_filter_entry(&source));
    let dest = StorageUri::parse("s3://b/dst/file.txt").unwrap();
    assert!(engine.entry_state(&dest).is_moved_here);
}

#[test]
fn test_create_scenario() {
    let mut engine = PendingOperations::new();
    let uri = StorageUri::parse("s3://b/dir/newdir/").unwrap();

    engine.create(&uri, "newdir", EntryKind::Directory);

    let entries = engine.virtual_entries("dir/", "s3", Some("b"));
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, EntryKind::Directory);
    assert_eq!(entries[0].name.as_str(), "newdir");
    assert!(entries[0].size.is_none());

    assert!(engine.virtual_entries("other/", "s3", Some("b")).is_empty());
    assert!(engine.entry_state(&uri).is_created);
}

#[test]
fn test_operations_for_path() {
    let mut engine = PendingOperations::new();
    let (a, entry_a) = file("photos/a.jpg");
    let (b, entry_b) = file("docs/b.txt");
    engine.mark_for_deletion(&a, &entry_a);
    engine.cut(&[entry_b], &[b]);
    engine.paste("photos/", "s3", Some("b"));

    assert_eq!(engine.operations_for_path("photos", "s3", Some("b")).len(), 2);
    assert_eq!(engine.operations_for_path("docs/", "s3", Some("b")).len(), 1);
    assert!(engine.operations_for_path("music/", "s3", Some("b")).is_empty());
}

#[test]
fn test_subscribers_notified_once_per_change() {
    let mut engine = PendingOperations::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let subscription = engine.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let (uri, entry) = file("dir/a.txt");
    engine.mark_for_deletion(&uri, &entry);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // No-op: already staged.
    engine.mark_for_deletion(&uri, &entry);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    engine.cut(&[entry], &[uri]);
    engine.paste("dst/", "s3", Some("b"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    engine.discard();
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    drop(subscription);
    engine.undo();
    engine.discard();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_snapshot_is_cached_until_change() {
    let mut engine = PendingOperations::new();
    let first = engine.snapshot();
    let second = engine.snapshot();
    assert!(Arc::ptr_eq(&first, &second));

    let (uri, entry) = file("dir/a.txt");
    engine.mark_for_deletion(&uri, &entry);
    let third = engine.snapshot();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.operations.len(), 1);
    assert!(third.can_undo);
    assert!(!third.can_redo);
    assert!(first.operations.is_empty());
}

#[tokio::test]
async fn test_partial_failure_keeps_only_failed() {
    let mut engine = PendingOperations::new();
    for name in ["a.txt", "b.txt", "c.txt"] {
        let (uri, entry) = file(&format!("dir/{name}"));
        engine.mark_for_deletion(&uri, &entry);
    }

    let backend = RecordingBackend::failing_on(&["dir/b.txt"]);
    let failed = engine.execute(&backend).await;

    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].uri().as_str(), "s3://b/dir/b.txt");
    assert_eq!(engine.pending_count(), 1);
    assert_eq!(backend.calls().len(), 3);

    backend.heal();
    let failed = engine.execute(&backend).await;
    assert!(failed.is_empty());
    assert!(!engine.has_pending_changes());
    assert!(!engine.can_undo());
    assert_eq!(backend.calls().last().map(String::as_str), Some("delete dir/b.txt"));
}

#[tokio::test]
async fn test_undo_after_partial_failure_cannot_resurrect_applied() {
    let mut engine = PendingOperations::new();
    for name in ["a", "b", "c"] {
        let (uri, entry) = file(&format!("dir/{name}"));
        engine.mark_for_deletion(&uri, &entry);
    }

    let backend = RecordingBackend::failing_on(&["dir/c"]);
    let failed = engine.execute(&backend).await;
    assert_eq!(failed.len(), 1);
    assert_eq!(engine.pending_count(), 1);
    assert!(!engine.can_undo());
    assert!(!engine.can_redo());

    // Nothing to go back to; the failed delete stays staged.
    assert!(!engine.undo());
    assert_eq!(engine.operations()[0].uri().as_str(), "s3://b/dir/c");

    backend.heal();
    let before_retry = backend.calls().len();
    assert!(engine.execute(&backend).await.is_empty());
    assert_eq!(backend.calls()[before_retry..], ["delete dir/c".to_string()]);
}

#[tokio::test]
async fn test_execution_order() {
    let mut engine = PendingOperations::new();
    let (gone, gone_entry) = file("dir/gone.txt");
    let (old, old_entry) = file("dir/old.txt");
    let (moved, moved_entry) = file("dir/moved.txt");
    let (copied, copied_entry) = file("dir/copied.txt");
    let (new_dir, _) = dir("dir/new/");

    engine.mark_for_deletion(&gone, &gone_entry);
    engine.rename(&old, &old_entry, "renamed.txt");
    engine.cut(&[moved_entry], &[moved]);
    engine.paste("target/", "s3", Some("b"));
    engine.copy(&[copied_entry], &[copied]);
    engine.paste("target/", "s3", Some("b"));
    engine.create(&new_dir, "new", EntryKind::Directory);

    let backend = RecordingBackend::default();
    let mut seen = Vec::new();
    let failed = engine
        .execute_with_progress(&backend, |progress| {
            seen.push((progress.operation.kind(), progress.index, progress.total));
        })
        .await;

    assert!(failed.is_empty());
    assert_eq!(
        backend.calls(),
        vec![
            "mkdir dir/new/",
            "copy dir/copied.txt target/copied.txt",
            "move dir/moved.txt target/moved.txt",
            "move dir/old.txt dir/renamed.txt",
            "delete dir/gone.txt",
        ]
    );
    assert_eq!(
        seen,
        vec![
            (OperationKind::Create, 0, 5),
            (OperationKind::Copy, 1, 5),
            (OperationKind::Move, 2, 5),
            (OperationKind::Rename, 3, 5),
            (OperationKind::Delete, 4, 5),
        ]
    );
}

#[tokio::test]
async fn test_directory_delete_is_recursive_and_every_create_is_mkdir() {
    let mut engine = PendingOperations::new();
    let (photos, photos_entry) = dir("photos/");
    let (note, _) = file("note.txt");
    engine.mark_for_deletion(&photos, &photos_entry);
    engine.create(&note, "note.txt", EntryKind::File);

    let backend = RecordingBackend::default();
    engine.execute(&backend).await;

    assert_eq!(
        backend.calls(),
        vec!["mkdir note.txt", "delete -r photos/"]
    );
}

#[tokio::test]
async fn test_execute_notifies_once() {
    let mut engine = PendingOperations::new();
    for name in ["a.txt", "b.txt"] {
        let (uri, entry) = file(name);
        engine.mark_for_deletion(&uri, &entry);
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let _subscription = engine.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    engine.execute(&RecordingBackend::default()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_execution_keeps_unattempted() {
    let mut engine = PendingOperations::new();
    let (uri, entry) = file("dir/a.txt");
    engine.mark_for_deletion(&uri, &entry);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let backend = RecordingBackend::default();
    let report = engine.execute_report(&backend, Some(&cancel), |_| {}).await;

    assert_eq!(report.outcome(), ExecutionOutcome::Cancelled);
    assert_eq!(report.skipped.len(), 1);
    assert!(backend.calls().is_empty());
    assert_eq!(engine.pending_count(), 1);
}

#[tokio::test]
async fn test_spawned_execution_streams_events() {
    let mut engine = PendingOperations::new();
    let (a, entry_a) = file("dir/a.txt");
    let (b, entry_b) = file("dir/b.txt");
    engine.mark_for_deletion(&a, &entry_a);
    engine.mark_for_deletion(&b, &entry_b);

    let backend = Arc::new(RecordingBackend::failing_on(&["dir/a.txt"]));
    let mut rx = start_execution(engine.plan(), backend.clone(), CancellationToken::new());

    let mut progress_events = 0;
    let mut report = None;
    while let Some(event) = rx.recv().await {
        match event {
            ExecutionEvent::Progress(_) => progress_events += 1,
            ExecutionEvent::Complete(r) => report = Some(r),
        }
    }

    let report = report.expect("batch should complete");
    assert_eq!(progress_events, 2);
    assert_eq!(report.outcome(), ExecutionOutcome::PartiallyFailed);
    assert_eq!(report.summary(), "1 operations failed, 1 succeeded");

    engine.apply_report(&report);
    assert_eq!(engine.pending_count(), 1);
    assert!(engine.entry_state(&a).is_deleted);
    assert!(!engine.can_undo());
}

#[test]
fn test_default_engine_reset() {
    let (uri, entry) = file("dir/a.txt");
    default_engine().lock().mark_for_deletion(&uri, &entry);
    assert!(default_engine().lock().has_pending_changes());

    reset_default_engine();
    assert!(!default_engine().lock().has_pending_changes());
}
