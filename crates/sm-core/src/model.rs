//! Object store for a semantic model
//!
//! [`Model`] owns every object and the error roll-ups of tables and folders.
//! It performs no bookkeeping of its own: dependency edges, folder caches
//! and undo history are maintained by the session that owns it.

use crate::error::{CoreError, CoreResult};
use crate::folder::Container;
use crate::object::{ModelObject, ObjectData, ObjectId, ObjectKind};
use crate::object_name::names_match;
use std::collections::BTreeMap;

/// All objects of a semantic model, keyed by stable id
#[derive(Debug, Clone, Default)]
pub struct Model {
    objects: BTreeMap<ObjectId, ModelObject>,
    rollups: BTreeMap<Container, String>,
    next_id: u64,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn allocate_id(&mut self) -> ObjectId {
        self.next_id += 1;
        ObjectId::from_raw(self.next_id)
    }

    /// Look up an object, failing with a structural error if it does not exist
    pub fn get(&self, id: ObjectId) -> CoreResult<&ModelObject> {
        self.objects
            .get(&id)
            .ok_or(CoreError::ObjectNotFound { id: id.get() })
    }

    pub(crate) fn get_mut(&mut self, id: ObjectId) -> CoreResult<&mut ModelObject> {
        self.objects
            .get_mut(&id)
            .ok_or(CoreError::ObjectNotFound { id: id.get() })
    }

    pub fn try_get(&self, id: ObjectId) -> Option<&ModelObject> {
        self.objects.get(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// All objects in id (creation) order
    pub fn objects(&self) -> impl Iterator<Item = &ModelObject> + '_ {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = &ModelObject> + '_ {
        self.objects_of_kind(ObjectKind::Table)
    }

    pub fn objects_of_kind(&self, kind: ObjectKind) -> impl Iterator<Item = &ModelObject> + '_ {
        self.objects.values().filter(move |o| o.kind() == kind)
    }

    /// Columns, measures, hierarchies and partitions of `table`, in id order
    pub fn members_of(&self, table: ObjectId) -> impl Iterator<Item = &ModelObject> + '_ {
        self.objects
            .values()
            .filter(move |o| o.parent_table() == Some(table))
    }

    /// Table an object belongs to for error roll-ups: a member's table, or the table itself
    pub fn owning_table(&self, id: ObjectId) -> Option<ObjectId> {
        let object = self.objects.get(&id)?;
        match object.kind() {
            ObjectKind::Table => Some(id),
            _ => object.parent_table(),
        }
    }

    pub fn find_table(&self, name: &str) -> Option<&ModelObject> {
        self.tables().find(|t| t.name.matches(name))
    }

    pub fn find_column(&self, table: ObjectId, name: &str) -> Option<&ModelObject> {
        self.members_of(table)
            .find(|o| o.kind() == ObjectKind::Column && o.name.matches(name))
    }

    /// Measures are unique across the whole model
    pub fn find_measure(&self, name: &str) -> Option<&ModelObject> {
        self.objects_of_kind(ObjectKind::Measure)
            .find(|m| m.name.matches(name))
    }

    /// Any member of `table` by name
    pub fn find_member(&self, table: ObjectId, name: &str) -> Option<&ModelObject> {
        self.members_of(table).find(|o| o.name.matches(name))
    }

    pub fn find_role(&self, name: &str) -> Option<&ModelObject> {
        self.objects_of_kind(ObjectKind::Role)
            .find(|r| r.name.matches(name))
    }

    /// Relationships that use `column` on either end
    pub fn relationships_using(&self, column: ObjectId) -> impl Iterator<Item = &ModelObject> + '_ {
        self.objects.values().filter(move |o| match &o.data {
            ObjectData::Relationship {
                from_column,
                to_column,
            } => *from_column == column || *to_column == column,
            _ => false,
        })
    }

    /// Hierarchies that use `column` as a level
    pub fn hierarchies_using(&self, column: ObjectId) -> impl Iterator<Item = &ModelObject> + '_ {
        self.objects.values().filter(move |o| match &o.data {
            ObjectData::Hierarchy { levels, .. } => levels.contains(&column),
            _ => false,
        })
    }

    /// Table permissions that filter `table` or belong to `role`
    pub fn permissions_on(&self, id: ObjectId) -> impl Iterator<Item = &ModelObject> + '_ {
        self.objects.values().filter(move |o| match &o.data {
            ObjectData::TablePermission { role, table } => *role == id || *table == id,
            _ => false,
        })
    }

    /// Ensure `name` is free in the scope an object of `kind` lives in.
    ///
    /// `except` is the object being renamed, which may keep its own name.
    pub fn check_name_available(
        &self,
        kind: ObjectKind,
        table: Option<ObjectId>,
        name: &str,
        except: Option<ObjectId>,
    ) -> CoreResult<()> {
        let clash = |o: &&ModelObject| Some(o.id) != except && names_match(&o.name, name);

        let (conflict, scope) = match kind {
            ObjectKind::Table => (self.tables().find(clash), "model tables".to_string()),
            ObjectKind::Role => (
                self.objects_of_kind(ObjectKind::Role).find(clash),
                "model roles".to_string(),
            ),
            ObjectKind::Measure => {
                let measure = self.objects_of_kind(ObjectKind::Measure).find(clash);
                let column = table.and_then(|t| {
                    self.members_of(t)
                        .filter(|o| o.kind() == ObjectKind::Column)
                        .find(clash)
                });
                (measure.or(column), self.scope_label(table, "measures"))
            }
            ObjectKind::Column => {
                let found = table.and_then(|t| {
                    self.members_of(t)
                        .filter(|o| matches!(o.kind(), ObjectKind::Column | ObjectKind::Measure))
                        .find(clash)
                });
                (found, self.scope_label(table, "columns"))
            }
            ObjectKind::Hierarchy | ObjectKind::Partition => {
                let found = table
                    .and_then(|t| self.members_of(t).filter(|o| o.kind() == kind).find(clash));
                (found, self.scope_label(table, "members"))
            }
            ObjectKind::Relationship | ObjectKind::TablePermission => (None, String::new()),
        };

        match conflict {
            Some(existing) => Err(CoreError::DuplicateName {
                name: existing.name.to_string(),
                scope,
            }),
            None => Ok(()),
        }
    }

    fn scope_label(&self, table: Option<ObjectId>, what: &str) -> String {
        match table.and_then(|t| self.objects.get(&t)) {
            Some(t) => format!("{} of table '{}'", what, t.name),
            None => what.to_string(),
        }
    }

    pub fn rollup(&self, container: &Container) -> Option<&str> {
        self.rollups.get(container).map(String::as_str)
    }

    /// All roll-ups that belong to `table` (its own and its folders')
    pub fn rollups_of(&self, table: ObjectId) -> impl Iterator<Item = (&Container, &str)> + '_ {
        self.rollups
            .iter()
            .filter(move |(c, _)| c.table() == table)
            .map(|(c, m)| (c, m.as_str()))
    }

    pub(crate) fn set_rollup(&mut self, container: Container, message: Option<String>) {
        match message.filter(|m| !m.is_empty()) {
            Some(message) => {
                self.rollups.insert(container, message);
            }
            None => {
                self.rollups.remove(&container);
            }
        }
    }

    pub(crate) fn insert(&mut self, object: ModelObject) {
        // Re-inserted objects (undo of a delete) keep their id; never hand it out again.
        self.next_id = self.next_id.max(object.id.get());
        self.objects.insert(object.id, object);
    }

    pub(crate) fn remove(&mut self, id: ObjectId) -> Option<ModelObject> {
        self.objects.remove(&id)
    }
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
