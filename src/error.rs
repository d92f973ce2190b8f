//! Error types for highlighting operations.

use thiserror::Error;

/// Errors that can occur while building a configuration or highlighting.
#[derive(Debug, Error)]
pub enum HighlightError {
    /// A highlight, injection or locals query failed to compile.
    #[error("query error: {0}")]
    Query(#[from] tree_sitter::QueryError),

    /// The parser rejected the grammar.
    #[error("failed to set language: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    /// The caller's cancellation flag was raised mid-stream.
    #[error("highlighting cancelled")]
    Cancelled,
}

/// Result type for highlighting operations.
pub type Result<T> = std::result::Result<T, HighlightError>;
