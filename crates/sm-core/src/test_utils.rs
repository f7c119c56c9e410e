//! Shared test fixtures for sm-core and downstream crates

use crate::analyzer::{Analysis, AnalyzerError, ExpressionAnalyzer, ExpressionScope, RenamedObject};
use crate::object::{ObjectId, ObjectKind};
use crate::object_name::names_match;

/// Minimal analyzer for tests.
///
/// References are written in braces: `{Name}` resolves to a measure, then a
/// member of the home table, then a table; `{Table.Name}` resolves to a
/// member of that table. Unbalanced braces are a syntax error.
#[derive(Debug, Default, Clone, Copy)]
pub struct BraceAnalyzer;

/// A `{...}` token: byte range of its inner text and the optional qualifier
struct Token<'a> {
    start: usize,
    end: usize,
    table: Option<&'a str>,
    name: &'a str,
}

fn tokenize(expression: &str) -> Result<Vec<Token<'_>>, AnalyzerError> {
    let mut tokens = Vec::new();
    let mut open: Option<usize> = None;

    for (i, c) in expression.char_indices() {
        match (c, open) {
            ('{', None) => open = Some(i + 1),
            ('{', Some(_)) => {
                return Err(AnalyzerError::Syntax {
                    message: "nested '{'".to_string(),
                    offset: i,
                })
            }
            ('}', Some(start)) => {
                let inner = &expression[start..i];
                if inner.trim().is_empty() {
                    return Err(AnalyzerError::Syntax {
                        message: "empty reference".to_string(),
                        offset: start,
                    });
                }
                let (table, name) = match inner.split_once('.') {
                    Some((t, n)) => (Some(t), n),
                    None => (None, inner),
                };
                tokens.push(Token {
                    start,
                    end: i,
                    table,
                    name,
                });
                open = None;
            }
            ('}', None) => {
                return Err(AnalyzerError::Syntax {
                    message: "unexpected '}'".to_string(),
                    offset: i,
                })
            }
            _ => {}
        }
    }

    match open {
        Some(start) => Err(AnalyzerError::Syntax {
            message: "unterminated reference".to_string(),
            offset: start - 1,
        }),
        None => Ok(tokens),
    }
}

fn resolve(token: &Token<'_>, scope: &ExpressionScope<'_>) -> Option<ObjectId> {
    let model = scope.model;
    match token.table {
        Some(table) => {
            let table = model.find_table(table)?;
            model.find_member(table.id, token.name).map(|m| m.id)
        }
        None => model
            .find_measure(token.name)
            .or_else(|| scope.home_table.and_then(|t| model.find_member(t, token.name)))
            .or_else(|| model.find_table(token.name))
            .map(|o| o.id),
    }
}

impl ExpressionAnalyzer for BraceAnalyzer {
    fn analyze(&self, expression: &str, scope: &ExpressionScope<'_>) -> Result<Analysis, AnalyzerError> {
        let mut analysis = Analysis::default();
        for token in tokenize(expression)? {
            match resolve(&token, scope) {
                Some(id) => {
                    analysis.references.insert(id);
                }
                None => analysis
                    .diagnostics
                    .push(format!("Unknown object '{}'", &expression[token.start..token.end])),
            }
        }
        Ok(analysis)
    }

    fn rewrite(
        &self,
        expression: &str,
        _scope: &ExpressionScope<'_>,
        renamed: &RenamedObject<'_>,
    ) -> Result<String, AnalyzerError> {
        let mut out = String::with_capacity(expression.len());
        let mut last = 0;

        for token in tokenize(expression)? {
            let replacement = match (renamed.kind, token.table) {
                (ObjectKind::Table, Some(table)) if names_match(table, renamed.old_name) => {
                    Some(format!("{}.{}", renamed.new_name, token.name))
                }
                (ObjectKind::Table, None) if names_match(token.name, renamed.old_name) => {
                    Some(renamed.new_name.to_string())
                }
                (_, Some(table))
                    if renamed.table_name.is_some_and(|t| names_match(t, table))
                        && names_match(token.name, renamed.old_name) =>
                {
                    Some(format!("{}.{}", table, renamed.new_name))
                }
                (_, None) if names_match(token.name, renamed.old_name) => {
                    Some(renamed.new_name.to_string())
                }
                _ => None,
            };

            if let Some(replacement) = replacement {
                out.push_str(&expression[last..token.start]);
                out.push_str(&replacement);
                last = token.end;
            }
        }
        out.push_str(&expression[last..]);
        Ok(out)
    }
}
