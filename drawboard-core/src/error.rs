//! Error types for history operations.

use thiserror::Error;

use crate::OperationKind;

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors that can occur while submitting operations to the history.
///
/// None of these leave the log in a modified state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// A required field was missing or empty.
    #[error("Malformed operation: missing {field}")]
    MalformedOperation {
        /// Name of the missing field (`id`, `user_id` or `type`).
        field: &'static str,
    },

    /// The operation kind cannot be appended to the log.
    ///
    /// Only `draw` operations are appended; undo, redo and clear move or
    /// reset the cursor through their own entry points.
    #[error("Operation of type {0} cannot be appended to the history")]
    NotAppendable(OperationKind),
}

impl HistoryError {
    /// Short machine-readable code for wire protocols and metrics.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedOperation { .. } => "malformed_operation",
            Self::NotAppendable(_) => "not_appendable",
        }
    }
}
