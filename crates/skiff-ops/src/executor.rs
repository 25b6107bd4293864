//! Batch executor applying staged operations to a storage backend.
//!
//! Operations run one at a time in a fixed kind order: creates, copies,
//! moves, renames, deletes. Insertion order is kept within a kind. A failed
//! call never stops the batch; it is recorded and the next operation runs.
//!
//! The order is a flat priority, not a dependency graph: a move into a
//! directory whose own parent is created by a later-staged operation is not
//! reordered.

use std::sync::Arc;

use skiff_core::{BackendResult, DeleteOptions, StorageBackend};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::progress::{ExecutionProgress, ExecutionReport, FailedOperation};
use crate::{EXECUTION_CHANNEL_SIZE, PendingOperation};

/// Operations sorted into execution order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    operations: Vec<PendingOperation>,
}

impl ExecutionPlan {
    /// Stable-sort a copy of `operations` by kind priority.
    pub fn new(operations: &[PendingOperation]) -> Self {
        let mut operations = operations.to_vec();
        operations.sort_by_key(PendingOperation::priority);
        Self { operations }
    }

    pub fn operations(&self) -> &[PendingOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingOperation> {
        self.operations.iter()
    }
}

/// Events sent while a spawned batch runs.
#[derive(Debug)]
pub enum ExecutionEvent {
    /// An operation is about to be dispatched.
    Progress(ExecutionProgress),
    /// The batch finished.
    Complete(ExecutionReport),
}

/// Run every operation of `plan` against `backend`.
///
/// `on_progress` is called before each dispatch. When `cancel` fires, the
/// remaining operations are reported as skipped; calls already issued are
/// not rolled back.
pub async fn run_plan<F>(
    plan: &ExecutionPlan,
    backend: &dyn StorageBackend,
    cancel: Option<&CancellationToken>,
    mut on_progress: F,
) -> ExecutionReport
where
    F: FnMut(&ExecutionProgress),
{
    let total = plan.len();
    let mut report = ExecutionReport::default();

    info!(
        target: "skiff::ops",
        scheme = backend.scheme(),
        total,
        "Executing pending operations"
    );

    for (index, operation) in plan.iter().enumerate() {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            report.skipped.extend_from_slice(&plan.operations()[index..]);
            info!(target: "skiff::ops", skipped = total - index, "Execution cancelled");
            break;
        }

        on_progress(&ExecutionProgress::new(operation.clone(), index, total));
        debug!(target: "skiff::ops", "[{}/{}] {}", index + 1, total, operation);

        match dispatch(backend, operation).await {
            Ok(()) => report.succeeded.push(operation.clone()),
            Err(error) => {
                warn!(target: "skiff::ops", "{} failed: {}", operation, error);
                report.failed.push(FailedOperation {
                    operation: operation.clone(),
                    error,
                });
            }
        }
    }

    info!(target: "skiff::ops", "{}", report.summary());
    report
}

/// Start running `plan` on a background task.
///
/// Returns a receiver for progress updates and the final report. Progress
/// updates are dropped while the receiver lags; the final report is always
/// delivered unless the receiver is gone.
pub fn start_execution(
    plan: ExecutionPlan,
    backend: Arc<dyn StorageBackend>,
    cancel: CancellationToken,
) -> mpsc::Receiver<ExecutionEvent> {
    let (tx, rx) = mpsc::channel(EXECUTION_CHANNEL_SIZE);

    tokio::spawn(async move {
        let report = run_plan(&plan, backend.as_ref(), Some(&cancel), |progress| {
            let _ = tx.try_send(ExecutionEvent::Progress(progress.clone()));
        })
        .await;

        let _ = tx.send(ExecutionEvent::Complete(report)).await;
    });

    rx
}

/// Translate one operation into its backend call.
async fn dispatch(backend: &dyn StorageBackend, operation: &PendingOperation) -> BackendResult<()> {
    match operation {
        PendingOperation::Create { uri, .. } => backend.mkdir(uri.path()).await,
        PendingOperation::Copy {
            source_uri,
            dest_uri,
            ..
        } => backend.copy(source_uri.path(), dest_uri.path()).await,
        PendingOperation::Move {
            source_uri,
            dest_uri,
            ..
        } => backend.move_entry(source_uri.path(), dest_uri.path()).await,
        PendingOperation::Rename { uri, new_name, .. } => {
            let renamed = uri.with_name(new_name);
            backend.move_entry(uri.path(), renamed.path()).await
        }
        PendingOperation::Delete { uri, entry, .. } => {
            let options = DeleteOptions::recursive(entry.kind.is_container());
            backend.delete(uri.path(), options).await
        }
    }
}
