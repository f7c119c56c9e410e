//! Model files: the YAML description of a semantic model the CLI reads and writes
//!
//! ```yaml
//! tables:
//!   - name: Sales
//!     columns:
//!       - name: Amount
//!       - name: Margin
//!         expression: Sales[Amount] * 0.2
//!     measures:
//!       - name: Total
//!         expression: SUM(Sales[Amount])
//!         display_folder: Finance/Totals
//! relationships:
//!   - from: Sales[CustomerId]
//!     to: Customer[Id]
//! roles:
//!   - name: Readers
//!     permissions:
//!       - table: Customer
//!         filter: Customer[Region] = "West"
//! ```

use crate::object_path::ObjectPath;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sm_core::{ExpressionSlot, Model, ModelObject, ModelSession, ObjectData, ObjectId, ObjectKind};
use std::path::Path;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModelFile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RelationshipDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleDef>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TableDef {
    pub name: String,

    /// Calculated table expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_rows: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<MeasureDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hierarchies: Vec<HierarchyDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<PartitionDef>,
}

/// A data column, or a calculated column when it has an expression
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ColumnDef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_folder: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MeasureDef {
    pub name: String,

    pub expression: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_rows: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_folder: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct HierarchyDef {
    pub name: String,

    /// Column names of the table, top level first
    pub levels: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_folder: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PartitionDef {
    pub name: String,
    pub expression: String,
}

/// Relationship between two columns given as `Table[Column]` paths
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RelationshipDef {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RoleDef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<PermissionDef>,
}

/// Row filter of a role on one table
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PermissionDef {
    pub table: String,
    pub filter: String,
}

impl ModelFile {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file: {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse model file: {}", path.display()))
    }

    pub(crate) fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub(crate) fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub(crate) fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)
            .with_context(|| format!("Failed to write model file: {}", path.display()))
    }

    /// Create every object of the file in `session`, as one batch.
    ///
    /// Formulas are analyzed when the batch closes, so they may reference
    /// objects declared further down the file.
    pub(crate) fn build(&self, session: &mut ModelSession) -> Result<()> {
        let mut scope = session.batch("Load model");

        let mut tables = Vec::with_capacity(self.tables.len());
        for def in &self.tables {
            tables.push(scope.add_table(&def.name)?);
        }
        for (def, table) in self.tables.iter().zip(tables) {
            def.build(&mut scope, table)
                .with_context(|| format!("Failed to load table '{}'", def.name))?;
        }

        for def in &self.relationships {
            let from = ObjectPath::parse(&def.from)?.resolve(&scope)?;
            let to = ObjectPath::parse(&def.to)?.resolve(&scope)?;
            scope
                .add_relationship(from, to)
                .with_context(|| format!("Failed to add relationship {} -> {}", def.from, def.to))?;
        }

        for def in &self.roles {
            let role = scope.add_role(&def.name)?;
            for permission in &def.permissions {
                let table = scope
                    .find_table(&permission.table)
                    .map(|t| t.id)
                    .with_context(|| {
                        format!("Role '{}' filters unknown table '{}'", def.name, permission.table)
                    })?;
                scope.add_table_permission(role, table, &permission.filter)?;
            }
        }

        scope.commit()?;
        Ok(())
    }

    /// Describe the current state of `session`
    pub(crate) fn from_session(session: &ModelSession) -> Self {
        let model = session.model();
        let tables = model.tables().map(|t| TableDef::from_model(model, t)).collect();

        let relationships = model
            .objects_of_kind(ObjectKind::Relationship)
            .filter_map(|r| match r.data {
                ObjectData::Relationship {
                    from_column,
                    to_column,
                } => match (ObjectPath::of(model, from_column), ObjectPath::of(model, to_column)) {
                    (Some(from), Some(to)) => Some(RelationshipDef {
                        from: from.to_string(),
                        to: to.to_string(),
                    }),
                    _ => {
                        log::warn!("Skipping relationship {}: an end column is missing", r.name);
                        None
                    }
                },
                _ => None,
            })
            .collect();

        let roles = model
            .objects_of_kind(ObjectKind::Role)
            .map(|role| RoleDef {
                name: role.name.to_string(),
                permissions: model
                    .permissions_on(role.id)
                    .filter_map(|p| match p.data {
                        ObjectData::TablePermission { table, .. } => Some(PermissionDef {
                            table: model.try_get(table)?.name.to_string(),
                            filter: p.expression(ExpressionSlot::Expression)?.to_string(),
                        }),
                        _ => None,
                    })
                    .collect(),
            })
            .collect();

        Self {
            tables,
            relationships,
            roles,
        }
    }
}

impl TableDef {
    fn build(&self, session: &mut ModelSession, table: ObjectId) -> Result<()> {
        if let Some(expression) = &self.expression {
            session.set_expression(table, expression)?;
        }
        if let Some(detail_rows) = &self.detail_rows {
            session.set_detail_rows_expression(table, detail_rows)?;
        }

        for def in &self.columns {
            let id = match &def.expression {
                Some(expression) => session.add_calculated_column(table, &def.name, expression)?,
                None => session.add_column(table, &def.name)?,
            };
            set_folder(session, id, def.display_folder.as_deref())?;
        }

        for def in &self.measures {
            let id = session.add_measure(table, &def.name, &def.expression)?;
            if let Some(detail_rows) = &def.detail_rows {
                session.set_detail_rows_expression(id, detail_rows)?;
            }
            set_folder(session, id, def.display_folder.as_deref())?;
        }

        for def in &self.hierarchies {
            let levels = def
                .levels
                .iter()
                .map(|level| {
                    session
                        .model()
                        .find_column(table, level)
                        .map(|c| c.id)
                        .with_context(|| format!("Hierarchy '{}' uses unknown column '{}'", def.name, level))
                })
                .collect::<Result<Vec<_>>>()?;
            let id = session.add_hierarchy(table, &def.name, &levels)?;
            set_folder(session, id, def.display_folder.as_deref())?;
        }

        for def in &self.partitions {
            session.add_partition(table, &def.name, &def.expression)?;
        }
        Ok(())
    }

    fn from_model(model: &Model, table: &ModelObject) -> Self {
        let mut def = TableDef {
            name: table.name.to_string(),
            expression: table.expression(ExpressionSlot::Expression).map(str::to_string),
            detail_rows: table.expression(ExpressionSlot::DetailRows).map(str::to_string),
            ..TableDef::default()
        };

        for member in model.members_of(table.id) {
            let name = member.name.to_string();
            let expression = member.expression(ExpressionSlot::Expression).map(str::to_string);
            let display_folder = member
                .display_folder()
                .filter(|f| !f.is_empty())
                .map(str::to_string);
            match &member.data {
                ObjectData::Column { .. } => def.columns.push(ColumnDef {
                    name,
                    expression,
                    display_folder,
                }),
                ObjectData::Measure { .. } => def.measures.push(MeasureDef {
                    name,
                    expression: expression.unwrap_or_default(),
                    detail_rows: member.expression(ExpressionSlot::DetailRows).map(str::to_string),
                    display_folder,
                }),
                ObjectData::Hierarchy { levels, .. } => def.hierarchies.push(HierarchyDef {
                    name,
                    levels: levels
                        .iter()
                        .filter_map(|l| model.try_get(*l))
                        .map(|c| c.name.to_string())
                        .collect(),
                    display_folder,
                }),
                ObjectData::Partition { .. } => def.partitions.push(PartitionDef {
                    name,
                    expression: expression.unwrap_or_default(),
                }),
                _ => {}
            }
        }
        def
    }
}

fn set_folder(session: &mut ModelSession, id: ObjectId, folder: Option<&str>) -> Result<()> {
    if let Some(folder) = folder {
        session.set_display_folder(id, folder)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "model_file_test.rs"]
mod tests;
