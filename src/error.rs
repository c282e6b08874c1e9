//! Error types for duplicate marking
//!
//! Every variant here is fatal: grouping depends on every line parsing
//! correctly, so there is no per-record recovery.

use thiserror::Error;

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, MarkdupError>;

/// Error type for duplicate marking
#[derive(Error, Debug)]
pub enum MarkdupError {
    /// A line did not split into the expected fields, or a numeric field failed to parse
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based input line number
        line: u64,
        /// What was wrong with the line
        reason: String,
    },

    /// A read name did not carry lane/tile/x/y tokens
    #[error("malformed read name '{name}' at line {line}: {reason}")]
    MalformedIdentifier {
        /// 1-based input line number
        line: u64,
        /// The offending read name
        name: String,
        /// What was wrong with the name
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
