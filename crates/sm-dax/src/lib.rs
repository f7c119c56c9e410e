//! sm-dax - DAX formula analysis for semantic models
//!
//! This crate provides a spanned DAX tokenizer, reference extraction, and
//! [`DaxAnalyzer`], the [`sm_core::ExpressionAnalyzer`] that resolves those
//! references against a model and rewrites formulas after renames.

pub mod analyzer;
pub mod error;
pub mod extractor;
pub mod lexer;

pub use analyzer::DaxAnalyzer;
pub use error::{DaxError, DaxResult};
pub use extractor::{extract_references, Reference, TableName};
pub use lexer::{tokenize, Token, TokenKind};
