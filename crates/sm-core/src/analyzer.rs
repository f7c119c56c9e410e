//! Formula analyzer interface
//!
//! The core never parses formulas itself. It asks an [`ExpressionAnalyzer`]
//! which objects a formula references, and how a formula reads after an
//! object it references has been renamed.

use crate::model::Model;
use crate::object::{ExpressionSlot, ObjectId, ObjectKind};
use std::collections::BTreeSet;
use thiserror::Error;

/// Failure to analyze or rewrite a formula
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    /// The formula text could not be tokenized or parsed
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { message: String, offset: usize },

    /// The analyzer cannot handle this request
    #[error("{0}")]
    Unsupported(String),
}

/// Where a formula lives: the model it resolves against and its owner
#[derive(Debug, Clone, Copy)]
pub struct ExpressionScope<'a> {
    pub model: &'a Model,
    /// Object owning the formula
    pub owner: ObjectId,
    /// Table that unqualified column references resolve against
    pub home_table: Option<ObjectId>,
    pub slot: ExpressionSlot,
}

/// Result of analyzing one formula
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    /// Objects the formula references, resolved by current name
    pub references: BTreeSet<ObjectId>,
    /// Problems found while resolving (unknown names and the like)
    pub diagnostics: Vec<String>,
}

impl Analysis {
    /// The diagnostics as a single error message, or `None` if the formula is clean
    pub fn error_message(&self) -> Option<String> {
        if self.diagnostics.is_empty() {
            None
        } else {
            Some(self.diagnostics.join("; "))
        }
    }
}

/// A rename that dependent formulas must follow
#[derive(Debug, Clone, Copy)]
pub struct RenamedObject<'a> {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub old_name: &'a str,
    pub new_name: &'a str,
    /// Name the owning table had when the rename was accepted, for members
    pub table_name: Option<&'a str>,
}

/// Parses formulas for the dependency graph and rewrites them after renames
pub trait ExpressionAnalyzer {
    /// Resolve the objects referenced by `expression`
    fn analyze(&self, expression: &str, scope: &ExpressionScope<'_>) -> Result<Analysis, AnalyzerError>;

    /// Return `expression` with references to `renamed` spelled with its new name.
    ///
    /// Called after the rename has been applied to the model, so lookups by
    /// the new name succeed and lookups by the old name do not.
    fn rewrite(
        &self,
        expression: &str,
        scope: &ExpressionScope<'_>,
        renamed: &RenamedObject<'_>,
    ) -> Result<String, AnalyzerError>;
}
