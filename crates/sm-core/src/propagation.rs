//! Error roll-ups: surfacing member errors on folders and tables
//!
//! A member with an error state makes every folder it is placed in (and each
//! ancestor of those folders) carry a roll-up listing it, and its table carry
//! a roll-up listing every failing member. Roll-ups are a pure function of
//! the members' own error states and the folder tree, so the propagator only
//! computes the target state and the changes that get the model there.

use crate::folder::{Container, TableFolders};
use crate::model::Model;
use crate::object::{ErrorSlot, ModelObject, ObjectId};
use crate::undo::Change;
use std::collections::{BTreeMap, BTreeSet};

/// Computes folder and table error roll-ups for one table at a time
#[derive(Debug, Clone, Copy)]
pub struct FolderErrorPropagator {
    max_lines: usize,
}

impl FolderErrorPropagator {
    /// `max_lines` bounds the member lines listed in a single roll-up
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines: max_lines.max(1),
        }
    }

    /// Changes that reset the expression errors of `table` and its members
    /// and drop every roll-up of the table.
    ///
    /// Detail-rows and host-reported errors are kept.
    pub fn clear_errors(&self, model: &Model, table: ObjectId) -> Vec<Change> {
        let mut changes: Vec<Change> = model
            .try_get(table)
            .into_iter()
            .chain(model.members_of(table))
            .filter_map(|object| {
                object.errors.expression.as_ref().map(|message| Change::Error {
                    id: object.id,
                    slot: ErrorSlot::Expression,
                    old: Some(message.clone()),
                    new: None,
                })
            })
            .collect();

        changes.extend(model.rollups_of(table).map(|(container, message)| Change::Rollup {
            container: container.clone(),
            old: Some(message.to_string()),
            new: None,
        }));
        changes
    }

    /// Roll-up messages `table` should carry, keyed by container
    pub fn compute(
        &self,
        model: &Model,
        folders: &TableFolders,
        table: ObjectId,
    ) -> BTreeMap<Container, String> {
        let mut table_lines: Vec<String> = Vec::new();
        let mut folder_lines: BTreeMap<_, Vec<String>> = BTreeMap::new();

        for member in model.members_of(table) {
            let Some(first) = first_error_line(member) else {
                continue;
            };

            let placements = folders.placements(member.id);
            if placements.is_empty() {
                push_unique(
                    &mut table_lines,
                    format!("{} '{}': {}", member.kind(), member.name, first),
                );
                continue;
            }

            for path in placements {
                push_unique(
                    &mut table_lines,
                    format!(
                        "{} '{}' (folder '{}'): {}",
                        member.kind(),
                        member.name,
                        path,
                        first
                    ),
                );
                for level in path.ancestors_and_self() {
                    push_unique(
                        folder_lines.entry(level).or_default(),
                        format!("{} '{}': {}", member.kind(), member.name, first),
                    );
                }
            }
        }

        let mut rollups = BTreeMap::new();
        if !table_lines.is_empty() {
            let name = model
                .try_get(table)
                .map(|t| t.name.to_string())
                .unwrap_or_default();
            let header = format!("Table '{}' contains objects with errors:", name);
            rollups.insert(Container::Table { table }, self.render(&header, &table_lines));
        }
        for (path, lines) in folder_lines {
            let header = format!("Folder '{}' contains objects with errors:", path);
            let message = self.render(&header, &lines);
            rollups.insert(Container::Folder { table, path }, message);
        }
        rollups
    }

    /// Changes that bring the stored roll-ups of `table` in line with
    /// [`compute`](Self::compute). Empty when they already agree.
    pub fn propagate(&self, model: &Model, folders: &TableFolders, table: ObjectId) -> Vec<Change> {
        let target = self.compute(model, folders, table);
        let current: BTreeMap<Container, String> = model
            .rollups_of(table)
            .map(|(c, m)| (c.clone(), m.to_string()))
            .collect();

        let containers: BTreeSet<&Container> = target.keys().chain(current.keys()).collect();
        containers
            .into_iter()
            .filter_map(|container| {
                let old = current.get(container);
                let new = target.get(container);
                (old != new).then(|| Change::Rollup {
                    container: container.clone(),
                    old: old.cloned(),
                    new: new.cloned(),
                })
            })
            .collect()
    }

    fn render(&self, header: &str, lines: &[String]) -> String {
        let mut out = String::from(header);
        for line in lines.iter().take(self.max_lines) {
            out.push('\n');
            out.push_str(line);
        }
        if lines.len() > self.max_lines {
            out.push_str(&format!("\n... and {} more", lines.len() - self.max_lines));
        }
        out
    }
}

fn first_error_line(object: &ModelObject) -> Option<String> {
    let state = object.error_state()?;
    state.lines().next().map(str::to_string)
}

fn push_unique(lines: &mut Vec<String>, line: String) {
    if !lines.contains(&line) {
        lines.push(line);
    }
}

#[cfg(test)]
#[path = "propagation_test.rs"]
mod tests;
