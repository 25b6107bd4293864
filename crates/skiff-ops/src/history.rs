//! Linear undo/redo history of operation-log snapshots.

use std::collections::VecDeque;

use crate::PendingOperation;

/// Undo and redo stacks holding whole-log snapshots.
///
/// The undo stack keeps at most `limit` snapshots; the oldest is dropped
/// when a new one is recorded at capacity.
#[derive(Debug)]
pub(crate) struct History {
    undo: VecDeque<Vec<PendingOperation>>,
    redo: Vec<Vec<PendingOperation>>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

impl History {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(limit.min(1000)),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record the log as it was before a new edit. Invalidates redo.
    pub(crate) fn record(&mut self, snapshot: Vec<PendingOperation>) {
        self.push_undo(snapshot);
        self.redo.clear();
    }

    /// Swap `current` with the newest undo snapshot.
    pub(crate) fn undo(&mut self, current: &mut Vec<PendingOperation>) -> bool {
        let Some(previous) = self.undo.pop_back() else {
            return false;
        };
        self.redo.push(std::mem::replace(current, previous));
        true
    }

    /// Swap `current` with the newest redo snapshot.
    pub(crate) fn redo(&mut self, current: &mut Vec<PendingOperation>) -> bool {
        let Some(next) = self.redo.pop() else {
            return false;
        };
        let undone = std::mem::replace(current, next);
        self.push_undo(undone);
        true
    }

    pub(crate) fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub(crate) fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub(crate) fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn push_undo(&mut self, snapshot: Vec<PendingOperation>) {
        if self.undo.len() >= self.limit {
            self.undo.pop_front();
        }
        self.undo.push_back(snapshot);
    }
}
