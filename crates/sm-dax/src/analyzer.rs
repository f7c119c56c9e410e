//! [`ExpressionAnalyzer`] for DAX formulas

use crate::extractor::{extract_references, Reference, TableName};
use crate::lexer::{is_ident_part, is_ident_start, tokenize};
use sm_core::object_name::names_match;
use sm_core::{
    Analysis, AnalyzerError, ExpressionAnalyzer, ExpressionScope, Model, ModelObject, ObjectId,
    ObjectKind, RenamedObject,
};
use std::ops::Range;

/// Words a bare table name may not collide with
const RESERVED: &[&str] = &["VAR", "RETURN", "IN", "TRUE", "FALSE", "NOT", "AND", "OR", "ASC", "DESC"];

/// Resolves DAX references against a model and rewrites them after renames.
///
/// Name lookups are case-insensitive. `[Name]` prefers a measure over a
/// column of the formula's home table; `Table[Name]` prefers a column of
/// that table over a measure.
#[derive(Debug, Default, Clone, Copy)]
pub struct DaxAnalyzer;

impl DaxAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

fn resolve_qualified<'m>(model: &'m Model, table: &ModelObject, member: &str) -> Option<&'m ModelObject> {
    model
        .find_column(table.id, member)
        .or_else(|| model.find_measure(member))
}

fn resolve_unqualified<'m>(model: &'m Model, home_table: Option<ObjectId>, name: &str) -> Option<&'m ModelObject> {
    model
        .find_measure(name)
        .or_else(|| home_table.and_then(|t| model.find_column(t, name)))
}

impl ExpressionAnalyzer for DaxAnalyzer {
    fn analyze(&self, expression: &str, scope: &ExpressionScope<'_>) -> Result<Analysis, AnalyzerError> {
        let tokens = tokenize(expression)?;
        let model = scope.model;
        let mut analysis = Analysis::default();

        for reference in extract_references(&tokens) {
            match reference {
                Reference::Table(table) => match model.find_table(&table.name) {
                    Some(t) => {
                        analysis.references.insert(t.id);
                    }
                    None => analysis
                        .diagnostics
                        .push(format!("Cannot find table '{}'", table.name)),
                },
                Reference::Qualified { table, member, .. } => {
                    let Some(t) = model.find_table(&table.name) else {
                        analysis
                            .diagnostics
                            .push(format!("Cannot find table '{}'", table.name));
                        continue;
                    };
                    match resolve_qualified(model, t, &member) {
                        Some(m) => {
                            analysis.references.insert(m.id);
                        }
                        None => analysis
                            .diagnostics
                            .push(format!("Cannot find column '{}'[{}]", t.name, member)),
                    }
                }
                Reference::Member { name, .. } => match resolve_unqualified(model, scope.home_table, &name) {
                    Some(m) => {
                        analysis.references.insert(m.id);
                    }
                    None => analysis
                        .diagnostics
                        .push(format!("Cannot find column or measure '[{}]'", name)),
                },
            }
        }

        log::trace!(
            "Analyzed {} of {}: {} reference(s), {} diagnostic(s)",
            scope.slot,
            scope.owner,
            analysis.references.len(),
            analysis.diagnostics.len()
        );
        Ok(analysis)
    }

    fn rewrite(
        &self,
        expression: &str,
        scope: &ExpressionScope<'_>,
        renamed: &RenamedObject<'_>,
    ) -> Result<String, AnalyzerError> {
        let tokens = tokenize(expression)?;
        let model = scope.model;
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();

        let renames_table = |table: &TableName| {
            renamed.kind == ObjectKind::Table && names_match(&table.name, renamed.old_name)
        };

        for reference in extract_references(&tokens) {
            match reference {
                Reference::Table(table) => {
                    if renames_table(&table) {
                        edits.push((table.span.clone(), quote_table(renamed.new_name, table.quoted)));
                    }
                }
                Reference::Qualified {
                    table,
                    member,
                    member_span,
                } => {
                    if renames_table(&table) {
                        edits.push((table.span.clone(), quote_table(renamed.new_name, table.quoted)));
                    } else if renamed.kind != ObjectKind::Table
                        && names_match(&member, renamed.old_name)
                        && qualified_meant(model, &table, renamed)
                    {
                        edits.push((member_span, bracket(renamed.new_name)));
                    }
                }
                Reference::Member { name, span } => {
                    if renamed.kind != ObjectKind::Table
                        && names_match(&name, renamed.old_name)
                        && unqualified_meant(model, scope.home_table, renamed)
                    {
                        edits.push((span, bracket(renamed.new_name)));
                    }
                }
            }
        }

        let mut out = String::with_capacity(expression.len());
        let mut last = 0;
        for (span, replacement) in edits {
            out.push_str(&expression[last..span.start]);
            out.push_str(&replacement);
            last = span.end;
        }
        out.push_str(&expression[last..]);
        Ok(out)
    }
}

/// Whether `Table[old name]` pointed at the renamed object
fn qualified_meant(model: &Model, table: &TableName, renamed: &RenamedObject<'_>) -> bool {
    let owns_member = renamed
        .table_name
        .is_some_and(|owner| names_match(&table.name, owner));
    if owns_member || renamed.kind != ObjectKind::Measure {
        return owns_member;
    }
    // Measures resolve through any table that has no column of that name
    model
        .find_table(&table.name)
        .is_some_and(|t| model.find_column(t.id, renamed.old_name).is_none())
}

/// Whether `[old name]` in a formula homed on `home_table` pointed at the renamed object
fn unqualified_meant(model: &Model, home_table: Option<ObjectId>, renamed: &RenamedObject<'_>) -> bool {
    match renamed.kind {
        ObjectKind::Measure => true,
        ObjectKind::Column => {
            // A measure with the old name would have won the lookup
            model.find_measure(renamed.old_name).is_none()
                && home_table.is_some()
                && model.try_get(renamed.id).and_then(ModelObject::parent_table) == home_table
        }
        _ => false,
    }
}

/// `Name`, or `'Name'` when it was quoted or cannot stand bare
fn quote_table(name: &str, was_quoted: bool) -> String {
    let mut chars = name.chars();
    let bare = chars.next().is_some_and(is_ident_start)
        && chars.all(|c| is_ident_part(c) && c != '.')
        && !RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name));
    if bare && !was_quoted {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

fn bracket(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

#[cfg(test)]
#[path = "analyzer_test.rs"]
mod tests;
