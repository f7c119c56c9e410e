//! Rename fixup: keep dependent formulas spelling renamed objects correctly
//!
//! The dependents of a renamed object are captured when the rename is
//! accepted. When the batch closes, each dependent formula is rewritten by
//! the analyzer; the session writes successful rewrites back through the
//! ordinary tracked path, so they land in the same undo entry as the rename.

use crate::analyzer::{ExpressionAnalyzer, ExpressionScope, RenamedObject};
use crate::dependency::DependencyIndex;
use crate::model::Model;
use crate::object::{ExpressionSlot, ObjectId, ObjectKind};
use std::collections::BTreeSet;

/// A rename accepted in the current batch, waiting for fixup at close
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRename {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub old_name: String,
    pub new_name: String,
    /// Name of the owning table when the rename was accepted; a later rename
    /// of that table in the same batch is fixed up after this one
    pub table_name: Option<String>,
    /// Objects that referenced the renamed object when it was renamed, in id order
    pub dependents: Vec<ObjectId>,
}

/// What to do with one dependent formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixupOutcome {
    /// Replace the formula with this text
    Rewritten(String),
    /// Leave the formula alone and flag the dependent with this message
    Failed(String),
}

/// A planned fixup of one expression slot of one dependent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixup {
    pub target: ObjectId,
    pub slot: ExpressionSlot,
    pub outcome: FixupOutcome,
}

/// Plans formula rewrites after renames
#[derive(Debug, Default, Clone, Copy)]
pub struct RenameFixupEngine;

impl RenameFixupEngine {
    /// Capture the dependents of `id` at the moment of its rename.
    ///
    /// A table's name is spelled by qualified references to its columns and
    /// measures, so their dependents are captured with the table's own.
    pub fn on_renamed(
        &self,
        model: &Model,
        index: &DependencyIndex,
        id: ObjectId,
        kind: ObjectKind,
        old_name: &str,
        new_name: &str,
    ) -> PendingRename {
        let mut dependents: BTreeSet<ObjectId> = index.referenced_by_set(id);
        if kind == ObjectKind::Table {
            for member in model.members_of(id) {
                dependents.extend(index.referenced_by(member.id));
            }
        }

        let table_name = model
            .try_get(id)
            .and_then(|o| o.parent_table())
            .and_then(|t| model.try_get(t))
            .map(|t| t.name.to_string());

        PendingRename {
            id,
            kind,
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            table_name,
            dependents: dependents.into_iter().collect(),
        }
    }

    /// Ask the analyzer to rewrite every dependent formula of one rename.
    ///
    /// Only formulas whose text actually changes produce a fixup. A rewrite
    /// the analyzer cannot parse back is reported as a failure instead.
    pub fn plan(
        &self,
        model: &Model,
        analyzer: &dyn ExpressionAnalyzer,
        rename: &PendingRename,
    ) -> Vec<Fixup> {
        let renamed = RenamedObject {
            id: rename.id,
            kind: rename.kind,
            old_name: &rename.old_name,
            new_name: &rename.new_name,
            table_name: rename.table_name.as_deref(),
        };

        let mut fixups = Vec::new();
        for dependent in &rename.dependents {
            let Some(object) = model.try_get(*dependent) else {
                continue;
            };

            for (slot, text) in &object.expressions {
                let scope = ExpressionScope {
                    model,
                    owner: object.id,
                    home_table: object.home_table(),
                    slot: *slot,
                };

                let outcome = match analyzer.rewrite(text, &scope, &renamed) {
                    Ok(rewritten) if rewritten == *text => continue,
                    Ok(rewritten) => match analyzer.analyze(&rewritten, &scope) {
                        Ok(_) => FixupOutcome::Rewritten(rewritten),
                        Err(e) => FixupOutcome::Failed(Self::failure_message(rename, *slot, &e)),
                    },
                    Err(e) => FixupOutcome::Failed(Self::failure_message(rename, *slot, &e)),
                };

                fixups.push(Fixup {
                    target: object.id,
                    slot: *slot,
                    outcome,
                });
            }
        }
        fixups
    }

    fn failure_message(
        rename: &PendingRename,
        slot: ExpressionSlot,
        error: &dyn std::fmt::Display,
    ) -> String {
        format!(
            "Formula fix-up after renaming '{}' to '{}' failed ({}); the {} was left unchanged",
            rename.old_name, rename.new_name, error, slot
        )
    }
}

#[cfg(test)]
#[path = "fixup_test.rs"]
mod tests;
