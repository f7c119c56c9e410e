//! Error types for sm-dax

use sm_core::AnalyzerError;
use thiserror::Error;

/// DAX tokenizing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DaxError {
    /// String, quoted name, bracket name or block comment never closed (D001)
    #[error("[D001] Unterminated {what} starting at offset {offset}")]
    Unterminated { what: &'static str, offset: usize },

    /// Character that cannot start a token (D002)
    #[error("[D002] Unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    /// Malformed numeric literal (D003)
    #[error("[D003] Invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    /// Closing parenthesis or brace without a matching opener, or an opener never closed (D004)
    #[error("[D004] Unbalanced '{delimiter}' at offset {offset}")]
    Unbalanced { delimiter: char, offset: usize },
}

impl DaxError {
    /// Byte offset into the formula where the problem was found
    pub fn offset(&self) -> usize {
        match self {
            DaxError::Unterminated { offset, .. }
            | DaxError::UnexpectedChar { offset, .. }
            | DaxError::InvalidNumber { offset, .. }
            | DaxError::Unbalanced { offset, .. } => *offset,
        }
    }
}

impl From<DaxError> for AnalyzerError {
    fn from(err: DaxError) -> Self {
        AnalyzerError::Syntax {
            offset: err.offset(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for DaxError
pub type DaxResult<T> = Result<T, DaxError>;
