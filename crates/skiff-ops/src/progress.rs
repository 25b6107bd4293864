//! Progress and result reporting for batch execution.

use std::collections::HashSet;

use skiff_core::BackendError;

use crate::{OperationId, PendingOperation};

/// Sent before each operation of a batch is dispatched.
#[derive(Debug, Clone)]
pub struct ExecutionProgress {
    /// The operation about to run.
    pub operation: PendingOperation,
    /// Zero-based position in the execution order.
    pub index: usize,
    /// Number of operations in the batch.
    pub total: usize,
}

impl ExecutionProgress {
    pub fn new(operation: PendingOperation, index: usize, total: usize) -> Self {
        Self {
            operation,
            index,
            total,
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total > 0 {
            (self.index as f64 / self.total as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// An operation the backend rejected.
#[derive(Debug, Clone)]
pub struct FailedOperation {
    pub operation: PendingOperation,
    pub error: BackendError,
}

/// How a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Every operation succeeded.
    Completed,
    /// At least one operation failed; the rest ran.
    PartiallyFailed,
    /// The batch stopped before running every operation.
    Cancelled,
}

/// Result of running a batch.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// Operations the backend applied.
    pub succeeded: Vec<PendingOperation>,
    /// Operations the backend rejected, with the reason.
    pub failed: Vec<FailedOperation>,
    /// Operations never attempted because the batch was cancelled.
    pub skipped: Vec<PendingOperation>,
}

impl ExecutionReport {
    pub fn outcome(&self) -> ExecutionOutcome {
        if !self.skipped.is_empty() {
            ExecutionOutcome::Cancelled
        } else if !self.failed.is_empty() {
            ExecutionOutcome::PartiallyFailed
        } else {
            ExecutionOutcome::Completed
        }
    }

    /// Check if the batch was fully applied.
    pub fn is_success(&self) -> bool {
        self.outcome() == ExecutionOutcome::Completed
    }

    /// The operations that failed, in execution order.
    pub fn failed_operations(&self) -> Vec<PendingOperation> {
        self.failed.iter().map(|f| f.operation.clone()).collect()
    }

    pub(crate) fn succeeded_ids(&self) -> HashSet<&OperationId> {
        self.succeeded.iter().map(PendingOperation::id).collect()
    }

    /// Get a human-readable summary of the batch.
    pub fn summary(&self) -> String {
        let succeeded = self.succeeded.len();
        match self.outcome() {
            ExecutionOutcome::Completed => format!("Applied {} operations", succeeded),
            ExecutionOutcome::PartiallyFailed => format!(
                "{} operations failed, {} succeeded",
                self.failed.len(),
                succeeded
            ),
            ExecutionOutcome::Cancelled => format!(
                "Cancelled: {} succeeded, {} failed, {} not attempted",
                succeeded,
                self.failed.len(),
                self.skipped.len()
            ),
        }
    }
}
