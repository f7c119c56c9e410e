//! Error types for sm-core

use thiserror::Error;

/// Core error type for semantic model editing
///
/// These are *structural* errors: they are returned synchronously to the
/// caller of a mutating operation and leave the model untouched. Expression
/// and fixup problems never surface here; they are recorded on the affected
/// object's error state instead.
#[derive(Error, Debug)]
pub enum CoreError {
    /// SM001: Configuration file not found
    #[error("[SM001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// SM002: Failed to parse configuration
    #[error("[SM002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// SM003: Invalid configuration value
    #[error("[SM003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// SM004: Object handle does not exist in the model
    #[error("[SM004] Object not found: #{id}")]
    ObjectNotFound { id: u64 },

    /// SM005: Name is empty or whitespace
    #[error("[SM005] Empty name for {context}")]
    EmptyName { context: String },

    /// SM006: Name collides with an existing object in the same scope
    #[error("[SM006] Duplicate name '{name}' in {scope}")]
    DuplicateName { name: String, scope: String },

    /// SM007: Operation is not supported by the object's kind
    #[error("[SM007] {kind} '{name}' does not support {operation}")]
    UnsupportedOperation {
        kind: String,
        name: String,
        operation: String,
    },

    /// SM008: Deletion refused because other objects still reference the target
    #[error("[SM008] Cannot delete {kind} '{name}': it is referenced by {referenced_by}")]
    ObjectReferenced {
        kind: String,
        name: String,
        referenced_by: String,
    },

    /// SM009: Deletion refused because a structural owner still uses the target
    #[error("[SM009] Cannot delete {kind} '{name}': it is used by {used_by}")]
    ObjectInUse {
        kind: String,
        name: String,
        used_by: String,
    },

    /// SM010: `end_batch` without a matching `begin_batch`
    #[error("[SM010] No batch is open")]
    NoOpenBatch,

    /// SM011: Undo or redo requested while a batch is still open
    #[error("[SM011] Cannot {operation} while batch '{label}' is open")]
    BatchOpen { operation: String, label: String },

    /// SM012: An undo record no longer matches the live model
    #[error("[SM012] Undo history is corrupted and has been discarded: {message}")]
    UndoLogCorrupted { message: String },

    /// SM013: Objects must live in the same table
    #[error("[SM013] Invalid reference: {message}")]
    InvalidReference { message: String },

    /// SM014: IO error with file path context
    #[error("[SM014] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// SM015: YAML parse error
    #[error("[SM015] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// SM016: A tracked write did not find the state it was built from
    #[error("[SM016] Inconsistent model state: {message}")]
    InconsistentState { message: String },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
