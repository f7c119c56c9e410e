//! Editing session: the single owner of a model and everything derived from it
//!
//! Every mutation goes through [`ModelSession`]. A mutation made outside an
//! explicit batch runs in an implicit batch of its own. When the outermost
//! batch closes, three passes run in order: rename fixups, re-analysis of
//! affected formulas (edges and own error states), and error roll-ups of the
//! tables that changed. Everything those passes write is recorded in the
//! same undo entry as the edit that caused it.

use crate::analyzer::{ExpressionAnalyzer, ExpressionScope};
use crate::config::SessionConfig;
use crate::dependency::DependencyIndex;
use crate::error::{CoreError, CoreResult};
use crate::fixup::{FixupOutcome, RenameFixupEngine};
use crate::folder::{Container, FolderCache, FolderPath, TableFolders};
use crate::model::Model;
use crate::object::{
    ErrorSlot, ExpressionSlot, ModelObject, ObjectData, ObjectId, ObjectKind,
};
use crate::object_name::ObjectName;
use crate::propagation::FolderErrorPropagator;
use crate::transaction::TransactionCoordinator;
use crate::undo::{Change, UndoLog};
use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};

/// Result of analyzing every formula of one object
struct ObjectAnalysis {
    references: BTreeSet<ObjectId>,
    /// Error per analyzed expression slot; `None` when the formula is clean or absent
    errors: Vec<(ErrorSlot, Option<String>)>,
}

/// A semantic model being edited
pub struct ModelSession {
    model: Model,
    index: DependencyIndex,
    folders: FolderCache,
    undo: UndoLog,
    tx: TransactionCoordinator,
    analyzer: Box<dyn ExpressionAnalyzer>,
    fixup: RenameFixupEngine,
    propagator: FolderErrorPropagator,
    config: SessionConfig,
}

impl std::fmt::Debug for ModelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSession")
            .field("objects", &self.model.len())
            .field("edges", &self.index.edge_count())
            .field("history", &self.undo.len())
            .field("batch_depth", &self.tx.depth())
            .finish()
    }
}

impl ModelSession {
    /// Empty session with default configuration
    pub fn new(analyzer: impl ExpressionAnalyzer + 'static) -> Self {
        Self::with_config(analyzer, SessionConfig::default())
    }

    pub fn with_config(analyzer: impl ExpressionAnalyzer + 'static, config: SessionConfig) -> Self {
        Self {
            model: Model::new(),
            index: DependencyIndex::new(),
            folders: FolderCache::new(config.folder_separators.clone()),
            undo: UndoLog::new(config.undo_limit),
            tx: TransactionCoordinator::new(),
            analyzer: Box::new(analyzer),
            fixup: RenameFixupEngine,
            propagator: FolderErrorPropagator::new(config.max_error_lines),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn dependencies(&self) -> &DependencyIndex {
        &self.index
    }

    // ----- Queries -----

    pub fn object(&self, id: ObjectId) -> CoreResult<&ModelObject> {
        self.model.get(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &ModelObject> + '_ {
        self.model.objects()
    }

    pub fn find_table(&self, name: &str) -> Option<&ModelObject> {
        self.model.find_table(name)
    }

    pub fn find_member(&self, table: ObjectId, name: &str) -> Option<&ModelObject> {
        self.model.find_member(table, name)
    }

    pub fn members_of(&self, table: ObjectId) -> impl Iterator<Item = &ModelObject> + '_ {
        self.model.members_of(table)
    }

    /// Objects `id` references. The iterator borrows the session, so it
    /// cannot be held across a mutation.
    pub fn depends_on(&self, id: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
        self.index.depends_on(id)
    }

    /// Objects that reference `id`
    pub fn referenced_by(&self, id: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
        self.index.referenced_by(id)
    }

    pub fn depends_on_set(&self, id: ObjectId) -> BTreeSet<ObjectId> {
        self.index.depends_on_set(id)
    }

    pub fn referenced_by_set(&self, id: ObjectId) -> BTreeSet<ObjectId> {
        self.index.referenced_by_set(id)
    }

    pub fn all_dependencies(&self, id: ObjectId, max_depth: usize) -> Vec<ObjectId> {
        self.index.all_dependencies(id, max_depth)
    }

    pub fn all_referencers(&self, id: ObjectId, max_depth: usize) -> Vec<ObjectId> {
        self.index.all_referencers(id, max_depth)
    }

    pub fn circular_path(&self, id: ObjectId) -> Option<Vec<ObjectId>> {
        self.index.circular_path(id)
    }

    /// Own error state of an object; for a table, followed by the roll-up of its members
    pub fn error_state(&self, id: ObjectId) -> CoreResult<Option<String>> {
        let object = self.model.get(id)?;
        let mut parts: Vec<String> = object.error_state().into_iter().collect();
        if object.kind() == ObjectKind::Table {
            if let Some(rollup) = self.model.rollup(&Container::Table { table: id }) {
                parts.push(rollup.to_string());
            }
        }
        Ok((!parts.is_empty()).then(|| parts.join("\n")))
    }

    /// Roll-up of a display folder of `table`; the table's own roll-up for an empty path
    pub fn folder_error_state(&self, table: ObjectId, path: &str) -> CoreResult<Option<String>> {
        self.require_kind(table, ObjectKind::Table, "display folders")?;
        let container = match FolderPath::parse(path, &self.config.folder_separators) {
            Some(path) => Container::Folder { table, path },
            None => Container::Table { table },
        };
        Ok(self.model.rollup(&container).map(str::to_string))
    }

    /// Folder tree of `table`, built on demand
    pub fn folders(&mut self, table: ObjectId) -> CoreResult<&TableFolders> {
        self.require_kind(table, ObjectKind::Table, "display folders")?;
        Ok(self.folders.get(&self.model, table))
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    pub fn undo_label(&self) -> Option<String> {
        self.undo.peek_undo().map(|a| a.label())
    }

    pub fn redo_label(&self) -> Option<String> {
        self.undo.peek_redo().map(|a| a.label())
    }

    pub fn history(&self) -> &UndoLog {
        &self.undo
    }

    pub fn clear_history(&mut self) {
        self.undo.clear();
    }

    pub fn batch_depth(&self) -> usize {
        self.tx.depth()
    }

    // ----- Object creation -----

    pub fn add_table(&mut self, name: &str) -> CoreResult<ObjectId> {
        self.create(ObjectKind::Table, None, name, ObjectData::Table, None)
    }

    /// Data column: a column without a formula
    pub fn add_column(&mut self, table: ObjectId, name: &str) -> CoreResult<ObjectId> {
        self.require_kind(table, ObjectKind::Table, "columns")?;
        let data = ObjectData::Column {
            table,
            calculated: false,
            display_folder: String::new(),
        };
        self.create(ObjectKind::Column, Some(table), name, data, None)
    }

    pub fn add_calculated_column(
        &mut self,
        table: ObjectId,
        name: &str,
        expression: &str,
    ) -> CoreResult<ObjectId> {
        self.require_kind(table, ObjectKind::Table, "columns")?;
        let data = ObjectData::Column {
            table,
            calculated: true,
            display_folder: String::new(),
        };
        self.create(ObjectKind::Column, Some(table), name, data, Some(expression))
    }

    pub fn add_measure(&mut self, table: ObjectId, name: &str, expression: &str) -> CoreResult<ObjectId> {
        self.require_kind(table, ObjectKind::Table, "measures")?;
        let data = ObjectData::Measure {
            table,
            display_folder: String::new(),
        };
        self.create(ObjectKind::Measure, Some(table), name, data, Some(expression))
    }

    /// Hierarchy over columns of the same table, top level first
    pub fn add_hierarchy(&mut self, table: ObjectId, name: &str, levels: &[ObjectId]) -> CoreResult<ObjectId> {
        self.require_kind(table, ObjectKind::Table, "hierarchies")?;
        for level in levels {
            let column = self.model.get(*level)?;
            if column.kind() != ObjectKind::Column || column.parent_table() != Some(table) {
                return Err(CoreError::InvalidReference {
                    message: format!(
                        "hierarchy level {} is not a column of the hierarchy's table",
                        column.describe()
                    ),
                });
            }
        }
        let data = ObjectData::Hierarchy {
            table,
            display_folder: String::new(),
            levels: levels.to_vec(),
        };
        self.create(ObjectKind::Hierarchy, Some(table), name, data, None)
    }

    pub fn add_partition(&mut self, table: ObjectId, name: &str, expression: &str) -> CoreResult<ObjectId> {
        self.require_kind(table, ObjectKind::Table, "partitions")?;
        let data = ObjectData::Partition { table };
        self.create(ObjectKind::Partition, Some(table), name, data, Some(expression))
    }

    /// Relationship between two columns. Its name is derived from its ends.
    pub fn add_relationship(&mut self, from_column: ObjectId, to_column: ObjectId) -> CoreResult<ObjectId> {
        for column in [from_column, to_column] {
            self.require_kind(column, ObjectKind::Column, "relationships")?;
        }
        if from_column == to_column {
            return Err(CoreError::InvalidReference {
                message: "a relationship needs two different columns".to_string(),
            });
        }
        let data = ObjectData::Relationship {
            from_column,
            to_column,
        };
        let name = self.relationship_name(from_column, to_column)?;
        self.create(ObjectKind::Relationship, None, name.as_str(), data, None)
    }

    pub fn add_role(&mut self, name: &str) -> CoreResult<ObjectId> {
        self.create(ObjectKind::Role, None, name, ObjectData::Role, None)
    }

    /// Row filter of `role` on `table`. Named after the table it filters.
    pub fn add_table_permission(&mut self, role: ObjectId, table: ObjectId, filter: &str) -> CoreResult<ObjectId> {
        self.require_kind(role, ObjectKind::Role, "table permissions")?;
        let name = self.require_kind(table, ObjectKind::Table, "table permissions")?.name.clone();
        if self.model.permissions_on(role).any(|p| {
            matches!(p.data, ObjectData::TablePermission { table: t, .. } if t == table)
        }) {
            return Err(CoreError::DuplicateName {
                name: name.to_string(),
                scope: format!("table permissions of role '{}'", self.model.get(role)?.name),
            });
        }
        let data = ObjectData::TablePermission { role, table };
        self.create(ObjectKind::TablePermission, None, name.as_str(), data, Some(filter))
    }

    fn create(
        &mut self,
        kind: ObjectKind,
        table: Option<ObjectId>,
        name: &str,
        data: ObjectData,
        expression: Option<&str>,
    ) -> CoreResult<ObjectId> {
        let name = ObjectName::try_new(name).ok_or_else(|| CoreError::EmptyName {
            context: format!("new {}", kind),
        })?;
        self.model.check_name_available(kind, table, &name, None)?;

        let label = format!("Add {} '{}'", kind, name);
        self.run(&label, true, |s| {
            let id = s.model.allocate_id();
            let mut object = ModelObject::new(id, name, data);
            if let Some(text) = expression.filter(|t| !t.trim().is_empty()) {
                object.set_expression(ExpressionSlot::Expression, Some(text.to_string()));
            }
            s.write(Change::Created {
                object: Box::new(object),
            })?;
            Ok(id)
        })
    }

    // ----- Edits -----

    pub fn set_expression(&mut self, id: ObjectId, text: &str) -> CoreResult<()> {
        self.set_expression_slot(id, ExpressionSlot::Expression, Some(text))
    }

    pub fn set_detail_rows_expression(&mut self, id: ObjectId, text: &str) -> CoreResult<()> {
        self.set_expression_slot(id, ExpressionSlot::DetailRows, Some(text))
    }

    pub fn clear_expression(&mut self, id: ObjectId, slot: ExpressionSlot) -> CoreResult<()> {
        self.set_expression_slot(id, slot, None)
    }

    fn set_expression_slot(&mut self, id: ObjectId, slot: ExpressionSlot, text: Option<&str>) -> CoreResult<()> {
        let object = self.model.get(id)?;
        if !object.supports_slot(slot) {
            return Err(unsupported(object, &format!("a {}", slot)));
        }

        let new = text.filter(|t| !t.trim().is_empty()).map(str::to_string);
        let old = object.expression(slot).map(str::to_string);
        if old == new {
            return Ok(());
        }

        let label = format!("Set {} of {}", slot, object.describe());
        self.run(&label, true, |s| {
            s.write(Change::Expression { id, slot, old, new })
        })
    }

    /// Rename an object. Dependent formulas are rewritten when the batch closes.
    pub fn rename(&mut self, id: ObjectId, new_name: &str) -> CoreResult<()> {
        let object = self.model.get(id)?;
        let kind = object.kind();
        if matches!(kind, ObjectKind::Relationship | ObjectKind::TablePermission) {
            return Err(unsupported(object, "renaming (its name is derived)"));
        }

        let new = ObjectName::try_new(new_name).ok_or_else(|| CoreError::EmptyName {
            context: format!("rename of {}", object.describe()),
        })?;
        if new == object.name {
            return Ok(());
        }
        self.model
            .check_name_available(kind, object.parent_table(), &new, Some(id))?;

        let old = object.name.clone();
        let label = format!("Rename {} to '{}'", object.describe(), new);
        self.run(&label, true, |s| {
            let pending = s
                .fixup
                .on_renamed(&s.model, &s.index, id, kind, &old, &new);
            s.write(Change::Name { id, old, new })?;
            s.tx.queue_rename(pending);
            s.update_derived_names(id, kind)
        })
    }

    /// Keep relationship and table permission names in line with the objects they are named after
    fn update_derived_names(&mut self, id: ObjectId, kind: ObjectKind) -> CoreResult<()> {
        let columns: Vec<ObjectId> = match kind {
            ObjectKind::Table => self
                .model
                .members_of(id)
                .filter(|m| m.kind() == ObjectKind::Column)
                .map(|m| m.id)
                .collect(),
            ObjectKind::Column => vec![id],
            _ => Vec::new(),
        };

        let relationships: BTreeSet<ObjectId> = columns
            .iter()
            .flat_map(|c| self.model.relationships_using(*c))
            .map(|r| r.id)
            .collect();
        if !relationships.is_empty() {
            self.run("Update relationship name", true, |s| {
                for rel in relationships {
                    let (from, to) = match s.model.get(rel)?.data {
                        ObjectData::Relationship {
                            from_column,
                            to_column,
                        } => (from_column, to_column),
                        _ => continue,
                    };
                    let new = s.relationship_name(from, to)?;
                    s.write_name(rel, new)?;
                }
                Ok(())
            })?;
        }

        if kind == ObjectKind::Table {
            let permissions: Vec<ObjectId> = self
                .model
                .objects_of_kind(ObjectKind::TablePermission)
                .filter(|p| matches!(p.data, ObjectData::TablePermission { table, .. } if table == id))
                .map(|p| p.id)
                .collect();
            if !permissions.is_empty() {
                let new = self.model.get(id)?.name.clone();
                self.run("Update table permission name", true, |s| {
                    for permission in permissions {
                        s.write_name(permission, new.clone())?;
                    }
                    Ok(())
                })?;
            }
        }
        Ok(())
    }

    fn write_name(&mut self, id: ObjectId, new: ObjectName) -> CoreResult<()> {
        let old = self.model.get(id)?.name.clone();
        if old == new {
            return Ok(());
        }
        self.write(Change::Name { id, old, new })
    }

    fn relationship_name(&self, from_column: ObjectId, to_column: ObjectId) -> CoreResult<ObjectName> {
        let end = |column: ObjectId| -> CoreResult<String> {
            let column = self.model.get(column)?;
            let table = column
                .parent_table()
                .map(|t| self.model.get(t))
                .transpose()?
                .map(|t| t.name.to_string())
                .unwrap_or_default();
            Ok(format!("'{}'[{}]", table, column.name))
        };
        Ok(ObjectName::new(format!("{} -> {}", end(from_column)?, end(to_column)?)))
    }

    /// Move a column, measure or hierarchy to another display folder (`;` separates several)
    pub fn set_display_folder(&mut self, id: ObjectId, folder: &str) -> CoreResult<()> {
        let object = self.model.get(id)?;
        let Some(old) = object.display_folder() else {
            return Err(unsupported(object, "display folders"));
        };
        if old == folder {
            return Ok(());
        }

        let (old, new) = (old.to_string(), folder.to_string());
        let label = format!("Set display folder of {}", object.describe());
        self.run(&label, true, |s| s.write(Change::DisplayFolder { id, old, new }))
    }

    /// Attach (or with `None`, clear) an error reported by the host application
    pub fn set_external_error(&mut self, id: ObjectId, message: Option<&str>) -> CoreResult<()> {
        let object = self.model.get(id)?;
        if !object.kind().has_error_state() {
            return Err(unsupported(object, "error states"));
        }

        let new = message.filter(|m| !m.trim().is_empty()).map(str::to_string);
        let old = object.errors.external.clone();
        if old == new {
            return Ok(());
        }

        let label = format!("Set error state of {}", object.describe());
        self.run(&label, true, |s| {
            s.write(Change::Error {
                id,
                slot: ErrorSlot::External,
                old,
                new,
            })?;
            if let Some(table) = s.model.owning_table(id) {
                s.tx.mark_dirty(table);
            }
            Ok(())
        })
    }

    /// Reset the expression errors of a table and its members and drop its roll-ups
    pub fn clear_errors(&mut self, table: ObjectId) -> CoreResult<()> {
        let label = format!(
            "Clear errors of {}",
            self.require_kind(table, ObjectKind::Table, "error roll-ups")?.describe()
        );
        self.run(&label, true, |s| {
            for change in s.propagator.clear_errors(&s.model, table) {
                s.write(change)?;
            }
            Ok(())
        })
    }

    /// Recompute the folder and table roll-ups of `table`
    pub fn propagate(&mut self, table: ObjectId) -> CoreResult<()> {
        let label = format!(
            "Propagate errors of {}",
            self.require_kind(table, ObjectKind::Table, "error roll-ups")?.describe()
        );
        self.run(&label, true, |s| s.refresh_rollups(table))
    }

    /// Delete an object and everything that cannot exist without it.
    ///
    /// Fails without touching the model while any formula outside the
    /// deleted set references it, or a hierarchy outside the set uses one of
    /// its columns.
    pub fn delete(&mut self, id: ObjectId) -> CoreResult<()> {
        let object = self.model.get(id)?;
        let doomed = self.doomed_set(object);

        for column in &doomed {
            if let Some(hierarchy) = self
                .model
                .hierarchies_using(*column)
                .find(|h| !doomed.contains(&h.id))
            {
                return Err(CoreError::ObjectInUse {
                    kind: object.kind().to_string(),
                    name: object.name.to_string(),
                    used_by: hierarchy.describe(),
                });
            }
        }

        let referrers: BTreeSet<ObjectId> = doomed
            .iter()
            .flat_map(|d| self.index.referenced_by(*d))
            .filter(|r| !doomed.contains(r))
            .collect();
        if !referrers.is_empty() {
            let referenced_by = referrers
                .iter()
                .filter_map(|r| self.model.try_get(*r))
                .map(ModelObject::describe)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CoreError::ObjectReferenced {
                kind: object.kind().to_string(),
                name: object.name.to_string(),
                referenced_by,
            });
        }

        let label = format!("Delete {}", object.describe());
        let is_table = object.kind() == ObjectKind::Table;
        self.run(&label, true, |s| {
            if is_table {
                let rollups: Vec<Change> = s
                    .model
                    .rollups_of(id)
                    .map(|(container, message)| Change::Rollup {
                        container: container.clone(),
                        old: Some(message.to_string()),
                        new: None,
                    })
                    .collect();
                for change in rollups {
                    s.write(change)?;
                }
            }

            for doomed_id in doomed.iter().filter(|d| **d != id).chain([&id]) {
                let object = s.model.get(*doomed_id)?.clone();
                s.write(Change::Deleted {
                    object: Box::new(object),
                })?;
            }
            Ok(())
        })
    }

    /// The object plus whatever is deleted with it
    fn doomed_set(&self, object: &ModelObject) -> BTreeSet<ObjectId> {
        let mut doomed = BTreeSet::from([object.id]);
        match object.kind() {
            ObjectKind::Table => {
                doomed.extend(self.model.members_of(object.id).map(|m| m.id));
                let columns: Vec<ObjectId> = self
                    .model
                    .members_of(object.id)
                    .filter(|m| m.kind() == ObjectKind::Column)
                    .map(|m| m.id)
                    .collect();
                for column in columns {
                    doomed.extend(self.model.relationships_using(column).map(|r| r.id));
                }
                doomed.extend(self.model.permissions_on(object.id).map(|p| p.id));
            }
            ObjectKind::Column => {
                doomed.extend(self.model.relationships_using(object.id).map(|r| r.id));
            }
            ObjectKind::Role => {
                doomed.extend(self.model.permissions_on(object.id).map(|p| p.id));
            }
            ObjectKind::Measure
            | ObjectKind::Hierarchy
            | ObjectKind::Partition
            | ObjectKind::Relationship
            | ObjectKind::TablePermission => {}
        }
        doomed
    }

    // ----- Batches -----

    /// Open a batch, or join the one already open
    pub fn begin_batch(&mut self, label: &str) {
        self.tx.begin(label, false);
    }

    /// Leave a batch. Closing the outermost one runs fixups and the error
    /// pass, then seals everything it recorded as one undo entry.
    pub fn end_batch(&mut self) -> CoreResult<()> {
        if !self.tx.end()? {
            return Ok(());
        }

        self.close_batch();
        let batch = self.tx.finish();
        if let Some(action) = batch.into_action() {
            log::debug!("Recorded undo entry '{}'", action.label());
            self.undo.push(action);
        }
        Ok(())
    }

    /// Open a batch that ends when the returned guard is dropped
    pub fn batch(&mut self, label: &str) -> BatchScope<'_> {
        self.begin_batch(label);
        BatchScope {
            session: self,
            ended: false,
        }
    }

    /// Run `f` inside a batch. The batch is ended even when `f` fails;
    /// whatever `f` applied before failing stays applied.
    pub fn with_batch<T>(&mut self, label: &str, f: impl FnOnce(&mut Self) -> CoreResult<T>) -> CoreResult<T> {
        self.run(label, false, f)
    }

    fn run<T>(&mut self, label: &str, implicit: bool, f: impl FnOnce(&mut Self) -> CoreResult<T>) -> CoreResult<T> {
        self.tx.begin(label, implicit);
        let result = f(self);
        let ended = self.end_batch();
        let value = result?;
        ended?;
        Ok(value)
    }

    // ----- Undo / redo -----

    /// Revert the most recent undo entry. Returns `false` if there is nothing to undo.
    pub fn undo(&mut self) -> CoreResult<bool> {
        self.ensure_no_batch("undo")?;
        let Some(action) = self.undo.peek_undo() else {
            return Ok(false);
        };
        let (label, changes) = (action.label(), action.inverse_changes());

        self.replay(&changes, "undo", &label)?;
        self.undo.step_back();
        Ok(true)
    }

    /// Re-apply the most recently undone entry. Returns `false` if there is nothing to redo.
    pub fn redo(&mut self) -> CoreResult<bool> {
        self.ensure_no_batch("redo")?;
        let Some(action) = self.undo.peek_redo() else {
            return Ok(false);
        };
        let (label, changes) = (action.label(), action.changes().to_vec());

        self.replay(&changes, "redo", &label)?;
        self.undo.step_forward();
        Ok(true)
    }

    fn ensure_no_batch(&self, operation: &str) -> CoreResult<()> {
        match self.tx.label() {
            Some(label) => Err(CoreError::BatchOpen {
                operation: operation.to_string(),
                label: label.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Apply recorded changes verbatim. Every record is checked against a
    /// staged copy first; the live model only changes if all of them apply.
    fn replay(&mut self, changes: &[Change], operation: &str, label: &str) -> CoreResult<()> {
        let mut staged = self.model.clone();
        for change in changes {
            if let Err(message) = change.apply(&mut staged) {
                log::warn!(
                    "Cannot {} '{}': {}; discarding undo history",
                    operation,
                    label,
                    message
                );
                self.undo.clear();
                return Err(CoreError::UndoLogCorrupted { message });
            }
        }

        log::debug!("Replaying '{}' ({} change(s)) for {}", label, changes.len(), operation);
        self.tx.enter_replay();
        self.model = staged;
        if changes.iter().any(Change::affects_name_resolution) {
            self.rebuild_index();
        } else {
            let touched: BTreeSet<ObjectId> = changes
                .iter()
                .filter_map(|c| match c {
                    Change::Expression { id, .. } => Some(*id),
                    _ => None,
                })
                .collect();
            for id in touched {
                self.rederive(id);
            }
        }
        self.folders.invalidate_all();
        self.tx.exit_replay();
        Ok(())
    }

    // ----- Tracked writes -----

    /// Apply a change to the model, update derived state and record it in the open batch
    fn write(&mut self, change: Change) -> CoreResult<()> {
        debug_assert!(!self.tx.is_replaying(), "tracked write during replay");
        change
            .apply(&mut self.model)
            .map_err(|message| CoreError::InconsistentState { message })?;
        self.after_apply(&change);
        self.tx.record(change);
        Ok(())
    }

    fn after_apply(&mut self, change: &Change) {
        match change {
            Change::Name { id, .. } => {
                self.tx.mark_names_changed();
                if let Some(table) = self.model.owning_table(*id) {
                    self.tx.mark_dirty(table);
                }
            }
            Change::Expression { id, .. } => {
                self.rederive(*id);
                self.tx.mark_stale(*id);
                if let Some(table) = self.model.owning_table(*id) {
                    self.tx.mark_dirty(table);
                }
            }
            Change::DisplayFolder { id, .. } => {
                if let Some(table) = self.model.owning_table(*id) {
                    self.folders.invalidate(table);
                    self.tx.mark_dirty(table);
                }
            }
            Change::Created { object } => {
                self.rederive(object.id);
                self.tx.mark_names_changed();
                self.tx.mark_stale(object.id);
                if let Some(table) = object.parent_table() {
                    self.folders.invalidate(table);
                    self.tx.mark_dirty(table);
                }
            }
            Change::Deleted { object } => {
                self.index.remove(object.id);
                self.tx.mark_names_changed();
                self.folders.invalidate(object.id);
                if let Some(table) = object.parent_table() {
                    self.folders.invalidate(table);
                    self.tx.mark_dirty(table);
                }
            }
            Change::Error { .. } | Change::Rollup { .. } => {}
        }
    }

    // ----- Derived state -----

    fn analyze_object(&self, object: &ModelObject) -> ObjectAnalysis {
        let mut analysis = ObjectAnalysis {
            references: BTreeSet::new(),
            errors: Vec::new(),
        };

        for slot in object.kind().expression_slots() {
            let message = object.expression(*slot).and_then(|text| {
                let scope = ExpressionScope {
                    model: &self.model,
                    owner: object.id,
                    home_table: object.home_table(),
                    slot: *slot,
                };
                match self.analyzer.analyze(text, &scope) {
                    Ok(result) => {
                        analysis.references.extend(result.references.iter().copied());
                        result.error_message()
                    }
                    Err(e) => Some(e.to_string()),
                }
            });
            analysis.errors.push((ErrorSlot::for_expression(*slot), message));
        }
        analysis
    }

    /// Re-derive the outgoing edges of one object from its current formulas
    fn rederive(&mut self, id: ObjectId) {
        let Some(object) = self.model.try_get(id) else {
            return;
        };
        let analysis = self.analyze_object(object);
        self.index.recompute(id, &analysis.references);
    }

    fn rebuild_index(&mut self) {
        self.index = DependencyIndex::new();
        let ids: Vec<ObjectId> = self
            .model
            .objects()
            .filter(|o| !o.expressions.is_empty())
            .map(|o| o.id)
            .collect();
        for id in ids {
            self.rederive(id);
        }
    }

    /// Close-time passes of the outermost batch
    fn close_batch(&mut self) {
        let renames = self.tx.take_renames();
        if self.config.formula_fixup {
            for rename in &renames {
                self.apply_fixups(rename);
            }
        } else if !renames.is_empty() {
            log::debug!("Formula fixup disabled; {} rename(s) not propagated", renames.len());
        }

        let targets: Vec<ObjectId> = if self.tx.names_changed() {
            self.model
                .objects()
                .filter(|o| o.kind().has_expression())
                .map(|o| o.id)
                .collect()
        } else {
            self.tx.stale_objects().iter().copied().collect()
        };
        for id in targets {
            self.refresh_object(id);
        }

        let dirty: Vec<ObjectId> = self.tx.dirty_tables().iter().copied().collect();
        for table in dirty {
            if self.model.try_get(table).is_some_and(|t| t.kind() == ObjectKind::Table) {
                if let Err(e) = self.refresh_rollups(table) {
                    log::warn!("Error roll-up of table {} not updated: {}", table, e);
                }
            }
        }
    }

    fn apply_fixups(&mut self, rename: &crate::fixup::PendingRename) {
        let fixups = self.fixup.plan(&self.model, self.analyzer.as_ref(), rename);
        for fixup in fixups {
            match fixup.outcome {
                FixupOutcome::Rewritten(text) => {
                    let Some(object) = self.model.try_get(fixup.target) else {
                        continue;
                    };
                    log::info!(
                        "Updated {} of {} after renaming '{}' to '{}'",
                        fixup.slot,
                        object.describe(),
                        rename.old_name,
                        rename.new_name
                    );
                    let change = Change::Expression {
                        id: fixup.target,
                        slot: fixup.slot,
                        old: object.expression(fixup.slot).map(str::to_string),
                        new: Some(text),
                    };
                    if let Err(e) = self.write(change) {
                        log::warn!("Formula fixup of {} not applied: {}", fixup.target, e);
                    }
                }
                FixupOutcome::Failed(message) => {
                    log::warn!("{} ({})", message, fixup.target);
                    self.tx.record_fixup_failure(fixup.target, message);
                }
            }
        }
    }

    /// Re-analyze one object: refresh its edges and write any change in its own error state
    fn refresh_object(&mut self, id: ObjectId) {
        let Some(object) = self.model.try_get(id) else {
            return;
        };
        let analysis = self.analyze_object(object);
        let current = object.errors.clone();
        self.index.recompute(id, &analysis.references);

        let mut changed = false;
        for (slot, mut message) in analysis.errors {
            if slot == ErrorSlot::Expression {
                if let Some(failure) = self.tx.fixup_failure(id) {
                    message = Some(failure.to_string());
                }
            }
            let old = current.get(slot).map(str::to_string);
            if old == message {
                continue;
            }
            let change = Change::Error {
                id,
                slot,
                old,
                new: message,
            };
            match self.write(change) {
                Ok(()) => changed = true,
                Err(e) => log::warn!("Error state of {} not updated: {}", id, e),
            }
        }

        if changed {
            if let Some(table) = self.model.owning_table(id) {
                self.tx.mark_dirty(table);
            }
        }
    }

    fn refresh_rollups(&mut self, table: ObjectId) -> CoreResult<()> {
        let folders = self.folders.get(&self.model, table);
        let changes = self.propagator.propagate(&self.model, folders, table);
        for change in changes {
            self.write(change)?;
        }
        Ok(())
    }

    fn require_kind(&self, id: ObjectId, kind: ObjectKind, operation: &str) -> CoreResult<&ModelObject> {
        let object = self.model.get(id)?;
        if object.kind() != kind {
            return Err(unsupported(object, operation));
        }
        Ok(object)
    }
}

fn unsupported(object: &ModelObject, operation: &str) -> CoreError {
    CoreError::UnsupportedOperation {
        kind: object.kind().to_string(),
        name: object.name.to_string(),
        operation: operation.to_string(),
    }
}

/// Guard for a batch opened with [`ModelSession::batch`].
///
/// Dereferences to the session. Dropping the guard ends the batch; use
/// [`commit`](Self::commit) to observe errors from the close.
pub struct BatchScope<'s> {
    session: &'s mut ModelSession,
    ended: bool,
}

impl BatchScope<'_> {
    /// End the batch now
    pub fn commit(mut self) -> CoreResult<()> {
        self.ended = true;
        self.session.end_batch()
    }
}

impl Deref for BatchScope<'_> {
    type Target = ModelSession;

    fn deref(&self) -> &ModelSession {
        self.session
    }
}

impl DerefMut for BatchScope<'_> {
    fn deref_mut(&mut self) -> &mut ModelSession {
        self.session
    }
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        if !self.ended {
            if let Err(e) = self.session.end_batch() {
                log::warn!("Failed to close batch: {}", e);
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
