//! CLI command implementations

pub(crate) mod common;
pub(crate) mod delete;
pub(crate) mod deps;
pub(crate) mod errors;
pub(crate) mod export;
pub(crate) mod refs;
pub(crate) mod rename;
