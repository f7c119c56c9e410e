//! Model objects: identity, kinds and per-object state

use crate::object_name::ObjectName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable object identity.
///
/// Issued by the model from a monotonic counter and never reused, so an id
/// survives renames and keeps pointing at the same object through undo/redo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The closed set of object kinds in a semantic model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Table,
    Column,
    Measure,
    Hierarchy,
    Partition,
    Relationship,
    Role,
    TablePermission,
}

impl ObjectKind {
    /// Expression slots an object of this kind may own
    pub fn expression_slots(self) -> &'static [ExpressionSlot] {
        match self {
            ObjectKind::Table | ObjectKind::Measure => {
                &[ExpressionSlot::Expression, ExpressionSlot::DetailRows]
            }
            ObjectKind::Column | ObjectKind::Partition | ObjectKind::TablePermission => {
                &[ExpressionSlot::Expression]
            }
            ObjectKind::Hierarchy | ObjectKind::Relationship | ObjectKind::Role => &[],
        }
    }

    /// Whether objects of this kind can carry a formula
    pub fn has_expression(self) -> bool {
        !self.expression_slots().is_empty()
    }

    /// Whether objects of this kind are placed in display folders
    pub fn has_display_folder(self) -> bool {
        match self {
            ObjectKind::Column | ObjectKind::Measure | ObjectKind::Hierarchy => true,
            ObjectKind::Table
            | ObjectKind::Partition
            | ObjectKind::Relationship
            | ObjectKind::Role
            | ObjectKind::TablePermission => false,
        }
    }

    /// Whether objects of this kind report an error state
    pub fn has_error_state(self) -> bool {
        match self {
            ObjectKind::Table
            | ObjectKind::Column
            | ObjectKind::Measure
            | ObjectKind::Hierarchy
            | ObjectKind::Partition
            | ObjectKind::TablePermission => true,
            ObjectKind::Relationship | ObjectKind::Role => false,
        }
    }

    /// Whether objects of this kind are children of a table
    pub fn is_table_member(self) -> bool {
        match self {
            ObjectKind::Column | ObjectKind::Measure | ObjectKind::Hierarchy | ObjectKind::Partition => {
                true
            }
            ObjectKind::Table
            | ObjectKind::Relationship
            | ObjectKind::Role
            | ObjectKind::TablePermission => false,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ObjectKind::Table => "Table",
            ObjectKind::Column => "Column",
            ObjectKind::Measure => "Measure",
            ObjectKind::Hierarchy => "Hierarchy",
            ObjectKind::Partition => "Partition",
            ObjectKind::Relationship => "Relationship",
            ObjectKind::Role => "Role",
            ObjectKind::TablePermission => "Table Permission",
        };
        f.write_str(label)
    }
}

/// Which formula of an object an expression belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionSlot {
    /// Main formula: measure, calculated column, calculated table, partition query, RLS filter
    Expression,
    /// Detail-rows expression of a table or measure
    DetailRows,
}

impl fmt::Display for ExpressionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionSlot::Expression => f.write_str("expression"),
            ExpressionSlot::DetailRows => f.write_str("detail rows expression"),
        }
    }
}

/// Which source an error message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSlot {
    /// Analysis of the main expression, or a failed fixup. Cleared by `clear_errors`.
    Expression,
    /// Analysis of the detail-rows expression. Survives `clear_errors`.
    DetailRows,
    /// Reported by the host application. Survives `clear_errors`.
    External,
}

impl ErrorSlot {
    pub const ALL: [ErrorSlot; 3] = [ErrorSlot::Expression, ErrorSlot::DetailRows, ErrorSlot::External];

    /// Error slot fed by analysis of the given expression slot
    pub fn for_expression(slot: ExpressionSlot) -> Self {
        match slot {
            ExpressionSlot::Expression => ErrorSlot::Expression,
            ExpressionSlot::DetailRows => ErrorSlot::DetailRows,
        }
    }
}

/// Own error messages of an object, one per [`ErrorSlot`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_rows: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<String>,
}

impl ErrorSlots {
    pub fn get(&self, slot: ErrorSlot) -> Option<&str> {
        match slot {
            ErrorSlot::Expression => self.expression.as_deref(),
            ErrorSlot::DetailRows => self.detail_rows.as_deref(),
            ErrorSlot::External => self.external.as_deref(),
        }
    }

    pub(crate) fn set(&mut self, slot: ErrorSlot, message: Option<String>) {
        let message = message.filter(|m| !m.trim().is_empty());
        match slot {
            ErrorSlot::Expression => self.expression = message,
            ErrorSlot::DetailRows => self.detail_rows = message,
            ErrorSlot::External => self.external = message,
        }
    }

    /// All non-empty messages joined by newlines
    pub fn combined(&self) -> Option<String> {
        let parts: Vec<&str> = ErrorSlot::ALL.iter().filter_map(|s| self.get(*s)).collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    pub fn is_empty(&self) -> bool {
        ErrorSlot::ALL.iter().all(|s| self.get(*s).is_none())
    }
}

/// Kind-specific data of a model object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectData {
    Table,
    Column {
        table: ObjectId,
        calculated: bool,
        #[serde(default)]
        display_folder: String,
    },
    Measure {
        table: ObjectId,
        #[serde(default)]
        display_folder: String,
    },
    Hierarchy {
        table: ObjectId,
        #[serde(default)]
        display_folder: String,
        levels: Vec<ObjectId>,
    },
    Partition {
        table: ObjectId,
    },
    Relationship {
        from_column: ObjectId,
        to_column: ObjectId,
    },
    Role,
    TablePermission {
        role: ObjectId,
        table: ObjectId,
    },
}

impl ObjectData {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectData::Table => ObjectKind::Table,
            ObjectData::Column { .. } => ObjectKind::Column,
            ObjectData::Measure { .. } => ObjectKind::Measure,
            ObjectData::Hierarchy { .. } => ObjectKind::Hierarchy,
            ObjectData::Partition { .. } => ObjectKind::Partition,
            ObjectData::Relationship { .. } => ObjectKind::Relationship,
            ObjectData::Role => ObjectKind::Role,
            ObjectData::TablePermission { .. } => ObjectKind::TablePermission,
        }
    }
}

/// A named, typed entity in the semantic model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelObject {
    pub id: ObjectId,
    pub name: ObjectName,
    pub data: ObjectData,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expressions: BTreeMap<ExpressionSlot, String>,
    #[serde(default)]
    pub errors: ErrorSlots,
}

impl ModelObject {
    pub(crate) fn new(id: ObjectId, name: ObjectName, data: ObjectData) -> Self {
        Self {
            id,
            name,
            data,
            expressions: BTreeMap::new(),
            errors: ErrorSlots::default(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.data.kind()
    }

    /// Table this object is a member of (columns, measures, hierarchies, partitions)
    pub fn parent_table(&self) -> Option<ObjectId> {
        match &self.data {
            ObjectData::Column { table, .. }
            | ObjectData::Measure { table, .. }
            | ObjectData::Hierarchy { table, .. }
            | ObjectData::Partition { table } => Some(*table),
            ObjectData::Table
            | ObjectData::Relationship { .. }
            | ObjectData::Role
            | ObjectData::TablePermission { .. } => None,
        }
    }

    /// Table against which unqualified column references in this object's
    /// formulas resolve
    pub fn home_table(&self) -> Option<ObjectId> {
        match &self.data {
            ObjectData::Table => Some(self.id),
            ObjectData::TablePermission { table, .. } => Some(*table),
            _ => self.parent_table(),
        }
    }

    /// Whether this particular object accepts a formula in `slot`.
    ///
    /// Data columns are columns but cannot hold an expression.
    pub fn supports_slot(&self, slot: ExpressionSlot) -> bool {
        match &self.data {
            ObjectData::Column { calculated, .. } => *calculated && slot == ExpressionSlot::Expression,
            _ => self.kind().expression_slots().contains(&slot),
        }
    }

    pub fn expression(&self, slot: ExpressionSlot) -> Option<&str> {
        self.expressions.get(&slot).map(String::as_str)
    }

    pub(crate) fn set_expression(&mut self, slot: ExpressionSlot, text: Option<String>) {
        match text {
            Some(text) => {
                self.expressions.insert(slot, text);
            }
            None => {
                self.expressions.remove(&slot);
            }
        }
    }

    /// Raw display-folder string, possibly listing several `;`-separated paths
    pub fn display_folder(&self) -> Option<&str> {
        match &self.data {
            ObjectData::Column { display_folder, .. }
            | ObjectData::Measure { display_folder, .. }
            | ObjectData::Hierarchy { display_folder, .. } => Some(display_folder.as_str()),
            _ => None,
        }
    }

    pub(crate) fn set_display_folder(&mut self, folder: String) -> bool {
        match &mut self.data {
            ObjectData::Column { display_folder, .. }
            | ObjectData::Measure { display_folder, .. }
            | ObjectData::Hierarchy { display_folder, .. } => {
                *display_folder = folder;
                true
            }
            _ => false,
        }
    }

    /// Own error state: every non-empty error slot, newline separated
    pub fn error_state(&self) -> Option<String> {
        self.errors.combined()
    }

    /// `Kind 'Name'`, as used in user-facing messages
    pub fn describe(&self) -> String {
        format!("{} '{}'", self.kind(), self.name)
    }
}

#[cfg(test)]
#[path = "object_test.rs"]
mod tests;
