//! Transaction coordination: nested batches and replay mode
//!
//! The coordinator counts `begin`/`end` nesting and collects everything the
//! outermost batch needs at close: the recorded changes, the renames whose
//! dependents must be fixed up, and which objects and tables need their
//! error state refreshed. It never touches the model itself; the session
//! drives it.

use crate::error::{CoreError, CoreResult};
use crate::fixup::PendingRename;
use crate::object::ObjectId;
use crate::undo::{Change, UndoAction};
use std::collections::{BTreeMap, BTreeSet};

/// What the coordinator is doing with incoming mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorMode {
    /// Normal editing: changes are recorded and close-time passes run
    Recording,
    /// Undo/redo: recorded changes are re-applied verbatim, nothing is recorded
    /// and no fixup or error pass runs
    Replaying,
}

/// Everything an outermost batch accumulated, handed back at close
#[derive(Debug, Default)]
pub struct ClosedBatch {
    pub label: String,
    pub implicit: bool,
    pub changes: Vec<Change>,
}

impl ClosedBatch {
    /// The undo entry for this batch, or `None` if nothing changed
    pub fn into_action(self) -> Option<UndoAction> {
        match self.changes.len() {
            0 => None,
            1 if self.implicit => self.changes.into_iter().next().map(UndoAction::Single),
            _ => Some(UndoAction::Composite {
                label: self.label,
                changes: self.changes,
            }),
        }
    }
}

/// Nesting counter and per-batch bookkeeping
#[derive(Debug)]
pub struct TransactionCoordinator {
    depth: usize,
    label: String,
    implicit: bool,
    mode: CoordinatorMode,
    changes: Vec<Change>,
    renames: Vec<PendingRename>,
    /// Objects whose own error state must be re-analyzed at close
    stale_objects: BTreeSet<ObjectId>,
    /// Tables whose roll-ups must be recomputed at close
    dirty_tables: BTreeSet<ObjectId>,
    /// A rename, add or delete happened: every formula must be re-resolved
    names_changed: bool,
    /// Fixups that could not be applied, by dependent
    fixup_failures: BTreeMap<ObjectId, String>,
}

impl Default for TransactionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionCoordinator {
    pub fn new() -> Self {
        Self {
            depth: 0,
            label: String::new(),
            implicit: false,
            mode: CoordinatorMode::Recording,
            changes: Vec::new(),
            renames: Vec::new(),
            stale_objects: BTreeSet::new(),
            dirty_tables: BTreeSet::new(),
            names_changed: false,
            fixup_failures: BTreeMap::new(),
        }
    }

    /// Open or join a batch. Returns `true` for the outermost `begin`.
    pub fn begin(&mut self, label: &str, implicit: bool) -> bool {
        self.depth += 1;
        if self.depth == 1 {
            self.label = label.to_string();
            self.implicit = implicit;
            log::debug!("Batch '{}' opened", label);
            true
        } else {
            false
        }
    }

    /// Leave one nesting level. Returns `true` if the outermost level is now closing;
    /// the depth stays at one until [`finish`](Self::finish) so that mutations made
    /// by close-time passes join the same batch.
    pub fn end(&mut self) -> CoreResult<bool> {
        match self.depth {
            0 => Err(CoreError::NoOpenBatch),
            1 => Ok(true),
            _ => {
                self.depth -= 1;
                Ok(false)
            }
        }
    }

    /// Seal the outermost batch and reset all per-batch state
    pub fn finish(&mut self) -> ClosedBatch {
        let batch = ClosedBatch {
            label: std::mem::take(&mut self.label),
            implicit: self.implicit,
            changes: std::mem::take(&mut self.changes),
        };
        self.depth = 0;
        self.implicit = false;
        self.renames.clear();
        self.stale_objects.clear();
        self.dirty_tables.clear();
        self.names_changed = false;
        self.fixup_failures.clear();
        log::debug!(
            "Batch '{}' sealed with {} change(s)",
            batch.label,
            batch.changes.len()
        );
        batch
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_open(&self) -> bool {
        self.depth > 0
    }

    /// Label of the outermost open batch
    pub fn label(&self) -> Option<&str> {
        if self.is_open() {
            Some(&self.label)
        } else {
            None
        }
    }

    pub fn mode(&self) -> CoordinatorMode {
        self.mode
    }

    pub fn is_replaying(&self) -> bool {
        self.mode == CoordinatorMode::Replaying
    }

    pub(crate) fn enter_replay(&mut self) {
        self.mode = CoordinatorMode::Replaying;
    }

    pub(crate) fn exit_replay(&mut self) {
        self.mode = CoordinatorMode::Recording;
    }

    pub(crate) fn record(&mut self, change: Change) {
        debug_assert!(self.is_open(), "change recorded outside a batch");
        self.changes.push(change);
    }

    pub(crate) fn queue_rename(&mut self, rename: PendingRename) {
        self.renames.push(rename);
    }

    /// Take the renames queued so far, in the order they happened
    pub(crate) fn take_renames(&mut self) -> Vec<PendingRename> {
        std::mem::take(&mut self.renames)
    }

    pub(crate) fn mark_stale(&mut self, id: ObjectId) {
        self.stale_objects.insert(id);
    }

    pub(crate) fn mark_dirty(&mut self, table: ObjectId) {
        self.dirty_tables.insert(table);
    }

    pub(crate) fn mark_names_changed(&mut self) {
        self.names_changed = true;
    }

    pub(crate) fn names_changed(&self) -> bool {
        self.names_changed
    }

    pub(crate) fn record_fixup_failure(&mut self, id: ObjectId, message: String) {
        self.fixup_failures.insert(id, message);
        self.stale_objects.insert(id);
    }

    pub(crate) fn fixup_failure(&self, id: ObjectId) -> Option<&str> {
        self.fixup_failures.get(&id).map(String::as_str)
    }

    pub(crate) fn stale_objects(&self) -> &BTreeSet<ObjectId> {
        &self.stale_objects
    }

    pub(crate) fn dirty_tables(&self) -> &BTreeSet<ObjectId> {
        &self.dirty_tables
    }
}

#[cfg(test)]
#[path = "transaction_test.rs"]
mod tests;
