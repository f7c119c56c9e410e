//! Reversible change records and the linear undo history

use crate::folder::Container;
use crate::model::Model;
use crate::object::{ErrorSlot, ExpressionSlot, ModelObject, ObjectId};
use crate::object_name::ObjectName;
use std::fmt;

/// One reversible mutation of the model: target, old value, new value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Name {
        id: ObjectId,
        old: ObjectName,
        new: ObjectName,
    },
    Expression {
        id: ObjectId,
        slot: ExpressionSlot,
        old: Option<String>,
        new: Option<String>,
    },
    DisplayFolder {
        id: ObjectId,
        old: String,
        new: String,
    },
    Error {
        id: ObjectId,
        slot: ErrorSlot,
        old: Option<String>,
        new: Option<String>,
    },
    Rollup {
        container: Container,
        old: Option<String>,
        new: Option<String>,
    },
    Created {
        object: Box<ModelObject>,
    },
    Deleted {
        object: Box<ModelObject>,
    },
}

impl Change {
    /// The change that undoes this one
    pub fn inverse(&self) -> Change {
        match self {
            Change::Name { id, old, new } => Change::Name {
                id: *id,
                old: new.clone(),
                new: old.clone(),
            },
            Change::Expression { id, slot, old, new } => Change::Expression {
                id: *id,
                slot: *slot,
                old: new.clone(),
                new: old.clone(),
            },
            Change::DisplayFolder { id, old, new } => Change::DisplayFolder {
                id: *id,
                old: new.clone(),
                new: old.clone(),
            },
            Change::Error { id, slot, old, new } => Change::Error {
                id: *id,
                slot: *slot,
                old: new.clone(),
                new: old.clone(),
            },
            Change::Rollup { container, old, new } => Change::Rollup {
                container: container.clone(),
                old: new.clone(),
                new: old.clone(),
            },
            Change::Created { object } => Change::Deleted {
                object: object.clone(),
            },
            Change::Deleted { object } => Change::Created {
                object: object.clone(),
            },
        }
    }

    /// Object the change applies to; for roll-ups, the owning table
    pub fn target(&self) -> ObjectId {
        match self {
            Change::Name { id, .. }
            | Change::Expression { id, .. }
            | Change::DisplayFolder { id, .. }
            | Change::Error { id, .. } => *id,
            Change::Rollup { container, .. } => container.table(),
            Change::Created { object } | Change::Deleted { object } => object.id,
        }
    }

    /// Whether the change alters which names resolve to which objects
    pub fn affects_name_resolution(&self) -> bool {
        matches!(
            self,
            Change::Name { .. } | Change::Created { .. } | Change::Deleted { .. }
        )
    }

    /// Apply the change to `model`, checking that the model holds the `old` state first.
    ///
    /// On a mismatch nothing is modified and a description of the mismatch is returned.
    pub(crate) fn apply(&self, model: &mut Model) -> Result<(), String> {
        match self {
            Change::Name { id, old, new } => {
                let object = model.get_mut(*id).map_err(|e| e.to_string())?;
                if object.name != *old {
                    return Err(format!(
                        "expected {} to be named '{}', found '{}'",
                        id, old, object.name
                    ));
                }
                object.name = new.clone();
            }
            Change::Expression { id, slot, old, new } => {
                let object = model.get_mut(*id).map_err(|e| e.to_string())?;
                if object.expression(*slot) != old.as_deref() {
                    return Err(format!("{} of {} does not match the history", slot, id));
                }
                object.set_expression(*slot, new.clone());
            }
            Change::DisplayFolder { id, old, new } => {
                let object = model.get_mut(*id).map_err(|e| e.to_string())?;
                if object.display_folder() != Some(old.as_str()) {
                    return Err(format!("display folder of {} does not match the history", id));
                }
                object.set_display_folder(new.clone());
            }
            Change::Error { id, slot, old, new } => {
                let object = model.get_mut(*id).map_err(|e| e.to_string())?;
                if object.errors.get(*slot) != old.as_deref() {
                    return Err(format!("error state of {} does not match the history", id));
                }
                object.errors.set(*slot, new.clone());
            }
            Change::Rollup { container, old, new } => {
                if model.rollup(container) != old.as_deref() {
                    return Err(format!(
                        "error roll-up of table {} does not match the history",
                        container.table()
                    ));
                }
                model.set_rollup(container.clone(), new.clone());
            }
            Change::Created { object } => {
                if model.contains(object.id) {
                    return Err(format!("{} already exists", object.id));
                }
                model.insert(object.as_ref().clone());
            }
            Change::Deleted { object } => {
                match model.try_get(object.id) {
                    Some(current) if current == object.as_ref() => {}
                    Some(_) => return Err(format!("{} does not match the history", object.id)),
                    None => return Err(format!("{} no longer exists", object.id)),
                }
                model.remove(object.id);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Name { old, new, .. } => write!(f, "Rename '{}' to '{}'", old, new),
            Change::Expression { id, slot, .. } => write!(f, "Set {} of {}", slot, id),
            Change::DisplayFolder { id, .. } => write!(f, "Set display folder of {}", id),
            Change::Error { id, .. } => write!(f, "Set error state of {}", id),
            Change::Rollup { container, .. } => {
                write!(f, "Update error roll-up of table {}", container.table())
            }
            Change::Created { object } => write!(f, "Add {}", object.describe()),
            Change::Deleted { object } => write!(f, "Delete {}", object.describe()),
        }
    }
}

/// An entry of the undo history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoAction {
    /// A batch that recorded exactly one change
    Single(Change),
    /// A labelled batch of changes, in the order they were applied
    Composite { label: String, changes: Vec<Change> },
}

impl UndoAction {
    pub fn label(&self) -> String {
        match self {
            UndoAction::Single(change) => change.to_string(),
            UndoAction::Composite { label, .. } => label.clone(),
        }
    }

    /// Member records in original order
    pub fn changes(&self) -> &[Change] {
        match self {
            UndoAction::Single(change) => std::slice::from_ref(change),
            UndoAction::Composite { changes, .. } => changes,
        }
    }

    /// Records that undo this action, in the order they must be applied
    pub fn inverse_changes(&self) -> Vec<Change> {
        self.changes().iter().rev().map(Change::inverse).collect()
    }
}

/// Linear undo history with a cursor.
///
/// Entries before the cursor can be undone, entries at or after it redone.
#[derive(Debug, Default)]
pub struct UndoLog {
    actions: Vec<UndoAction>,
    cursor: usize,
    limit: Option<usize>,
}

impl UndoLog {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            actions: Vec::new(),
            cursor: 0,
            limit,
        }
    }

    /// Append an action, discarding everything ahead of the cursor
    pub fn push(&mut self, action: UndoAction) {
        self.actions.truncate(self.cursor);
        self.actions.push(action);

        if let Some(limit) = self.limit {
            if self.actions.len() > limit {
                let excess = self.actions.len() - limit;
                self.actions.drain(..excess);
            }
        }
        self.cursor = self.actions.len();
    }

    /// Action the next undo would revert
    pub fn peek_undo(&self) -> Option<&UndoAction> {
        self.cursor.checked_sub(1).and_then(|i| self.actions.get(i))
    }

    /// Action the next redo would re-apply
    pub fn peek_redo(&self) -> Option<&UndoAction> {
        self.actions.get(self.cursor)
    }

    pub(crate) fn step_back(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    pub(crate) fn step_forward(&mut self) {
        if self.cursor < self.actions.len() {
            self.cursor += 1;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.actions.len()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Labels of every recorded action, oldest first
    pub fn labels(&self) -> Vec<String> {
        self.actions.iter().map(UndoAction::label).collect()
    }
}

#[cfg(test)]
#[path = "undo_test.rs"]
mod tests;
