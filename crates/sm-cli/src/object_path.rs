//! Command-line object paths: `Table`, `'Quoted Table'`, `Table[Member]`
//!
//! A bare path names a table, or a role when no table has that name.

use anyhow::{bail, Context, Result};
use sm_core::{Model, ModelSession, ObjectId, ObjectKind};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ObjectPath {
    pub table: String,
    pub member: Option<String>,
}

impl ObjectPath {
    pub(crate) fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (table, rest) = match raw.strip_prefix('\'') {
            Some(quoted) => {
                let (name, end) = unquote(quoted)
                    .with_context(|| format!("Invalid object path '{}': unterminated quote", raw))?;
                (name, &quoted[end..])
            }
            None => match raw.find('[') {
                Some(open) => (raw[..open].trim_end().to_string(), &raw[open..]),
                None => (raw.to_string(), ""),
            },
        };

        let member = if rest.is_empty() {
            None
        } else {
            let inner = rest
                .strip_prefix('[')
                .and_then(|r| r.strip_suffix(']'))
                .with_context(|| format!("Invalid object path '{}': expected Table[Member]", raw))?;
            Some(inner.replace("]]", "]"))
        };

        if table.trim().is_empty() || member.as_deref().is_some_and(|m| m.trim().is_empty()) {
            bail!("Invalid object path '{}': empty name", raw);
        }
        Ok(Self { table, member })
    }

    pub(crate) fn resolve(&self, session: &ModelSession) -> Result<ObjectId> {
        match &self.member {
            None => session
                .find_table(&self.table)
                .or_else(|| session.model().find_role(&self.table))
                .map(|o| o.id)
                .with_context(|| format!("No table or role named '{}'", self.table)),
            Some(member) => {
                let table = session
                    .find_table(&self.table)
                    .with_context(|| format!("No table named '{}'", self.table))?;
                session
                    .find_member(table.id, member)
                    .map(|o| o.id)
                    .with_context(|| format!("Table '{}' has no member named '{}'", table.name, member))
            }
        }
    }

    /// Path of a table, role or table member; `None` for anything else
    pub(crate) fn of(model: &Model, id: ObjectId) -> Option<Self> {
        let object = model.try_get(id)?;
        match object.kind() {
            ObjectKind::Table | ObjectKind::Role => Some(Self {
                table: object.name.to_string(),
                member: None,
            }),
            _ => {
                let table = model.try_get(object.parent_table()?)?;
                Some(Self {
                    table: table.name.to_string(),
                    member: Some(object.name.to_string()),
                })
            }
        }
    }
}

/// Name up to the closing quote (`''` escapes a quote) and the byte offset just past it
fn unquote(quoted: &str) -> Option<(String, usize)> {
    let mut name = String::new();
    let mut chars = quoted.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '\'' {
            name.push(c);
        } else if chars.next_if(|(_, next)| *next == '\'').is_some() {
            name.push('\'');
        } else {
            return Some((name, i + 1));
        }
    }
    None
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.table.contains(['[', '\'']) || self.table.trim() != self.table {
            write!(f, "'{}'", self.table.replace('\'', "''"))?;
        } else {
            f.write_str(&self.table)?;
        }
        if let Some(member) = &self.member {
            write!(f, "[{}]", member.replace(']', "]]"))?;
        }
        Ok(())
    }
}

/// Display label of any object: its path when it has one, `Kind 'Name'` otherwise
pub(crate) fn label(model: &Model, id: ObjectId) -> String {
    match (ObjectPath::of(model, id), model.try_get(id)) {
        (Some(path), _) => path.to_string(),
        (None, Some(object)) => object.describe(),
        (None, None) => id.to_string(),
    }
}

#[cfg(test)]
#[path = "object_path_test.rs"]
mod tests;
