//! Object references in a tokenized DAX formula

use crate::lexer::{Token, TokenKind};
use std::collections::HashSet;
use std::ops::Range;

/// Bare words that are neither tables nor variables
const KEYWORDS: &[&str] = &["TRUE", "FALSE", "NOT", "AND", "OR", "ASC", "DESC"];

/// A table name as spelled in the formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub name: String,
    pub span: Range<usize>,
    /// Written as `'Name'` rather than bare
    pub quoted: bool,
}

/// A reference to a model object, with the spans a rename would replace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `Sales` or `'Sales'` on its own
    Table(TableName),
    /// `Sales[Amount]`
    Qualified {
        table: TableName,
        member: String,
        member_span: Range<usize>,
    },
    /// `[Amount]`
    Member { name: String, span: Range<usize> },
}

/// Extract every object reference, in formula order.
///
/// Identifiers followed by `(` are functions; identifiers declared with
/// `VAR` anywhere in the formula are variables. Neither is reported.
pub fn extract_references(tokens: &[Token]) -> Vec<Reference> {
    let variables: HashSet<String> = tokens
        .windows(2)
        .filter_map(|pair| match (&pair[0].kind, &pair[1].kind) {
            (TokenKind::Var, TokenKind::Identifier(name)) => Some(name.to_uppercase()),
            _ => None,
        })
        .collect();

    let mut references = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        let next = tokens.get(i + 1).map(|t| &t.kind);

        let table = match &token.kind {
            TokenKind::Identifier(name) => {
                let declared = i > 0 && tokens[i - 1].kind == TokenKind::Var;
                if next == Some(&TokenKind::LParen)
                    || declared
                    || variables.contains(&name.to_uppercase())
                    || KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(name))
                {
                    None
                } else {
                    Some(TableName {
                        name: name.clone(),
                        span: token.span.clone(),
                        quoted: false,
                    })
                }
            }
            TokenKind::QuotedIdentifier(name) => Some(TableName {
                name: name.clone(),
                span: token.span.clone(),
                quoted: true,
            }),
            TokenKind::BracketIdentifier(name) => {
                references.push(Reference::Member {
                    name: name.clone(),
                    span: token.span.clone(),
                });
                None
            }
            _ => None,
        };

        if let Some(table) = table {
            match tokens.get(i + 1) {
                Some(Token {
                    kind: TokenKind::BracketIdentifier(member),
                    span,
                }) => {
                    references.push(Reference::Qualified {
                        table,
                        member: member.clone(),
                        member_span: span.clone(),
                    });
                    i += 1;
                }
                _ => references.push(Reference::Table(table)),
            }
        }
        i += 1;
    }
    references
}

#[cfg(test)]
#[path = "extractor_test.rs"]
mod tests;
