//! Pending operations engine for skiff.
//!
//! Deletes, renames, moves, copies and creates are staged in a
//! [`PendingOperations`] log while the user navigates, projected onto
//! directory listings for preview, undone and redone, and finally applied as
//! one batch against any [`StorageBackend`](skiff_core::StorageBackend).
//! Failed operations stay staged so a retry only re-attempts what failed.

mod clipboard;
mod config;
mod executor;
mod history;
mod local;
mod operation;
mod progress;
mod store;
mod subscribe;
mod visual;

pub use clipboard::{ClipboardMode, ClipboardState};
pub use config::{EngineConfig, EngineConfigBuilder, EngineConfigBuilderError};
pub use executor::{ExecutionEvent, ExecutionPlan, run_plan, start_execution};
pub use local::{LOCAL_SCHEME, LocalBackend};
pub use operation::{OperationId, OperationKind, PendingOperation};
pub use progress::{ExecutionOutcome, ExecutionProgress, ExecutionReport, FailedOperation};
pub use store::{PendingOperations, PendingSnapshot, default_engine, reset_default_engine};
pub use subscribe::Subscription;
pub use visual::EntryVisualState;

/// Default channel buffer size for execution progress updates.
pub const EXECUTION_CHANNEL_SIZE: usize = 100;
