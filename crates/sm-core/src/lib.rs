//! sm-core - Core library for semantic model editing
//!
//! This crate provides the object model of a tabular semantic model, the
//! derived dependency index between formulas and the objects they reference,
//! rename fixup, display-folder error roll-ups, and nested undoable batches,
//! all owned by a single [`ModelSession`].

pub mod analyzer;
pub mod config;
pub mod dependency;
pub mod error;
pub mod fixup;
pub mod folder;
pub mod model;
pub mod object;
pub mod object_name;
pub mod propagation;
pub mod session;
pub mod transaction;
pub mod undo;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use analyzer::{Analysis, AnalyzerError, ExpressionAnalyzer, ExpressionScope, RenamedObject};
pub use config::SessionConfig;
pub use dependency::DependencyIndex;
pub use error::{CoreError, CoreResult};
pub use fixup::{Fixup, FixupOutcome, PendingRename, RenameFixupEngine};
pub use folder::{Container, Folder, FolderCache, FolderPath, TableFolders};
pub use model::Model;
pub use object::{
    ErrorSlot, ErrorSlots, ExpressionSlot, ModelObject, ObjectData, ObjectId, ObjectKind,
};
pub use object_name::ObjectName;
pub use propagation::FolderErrorPropagator;
pub use session::{BatchScope, ModelSession};
pub use transaction::{ClosedBatch, CoordinatorMode, TransactionCoordinator};
pub use undo::{Change, UndoAction, UndoLog};
