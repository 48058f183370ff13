//! # Conflict Classification
//!
//! Flags operations that land within a short contention window of another
//! participant's recent operation.
//!
//! Classification is diagnostic: the decision is logged, counted and echoed in
//! acknowledgements, but the operation is always applied unchanged. The
//! [`ConflictPolicy`] trait is the seam where a stricter policy (reject,
//! merge) would plug in without touching the log's append/truncate logic.

use serde::{Deserialize, Serialize};

use crate::{Operation, OperationId, OperationLog};

/// Default contention window in milliseconds.
pub const DEFAULT_CONTENTION_WINDOW_MS: u64 = 100;

/// Which of two contending operations is logically first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precedence {
    /// The incoming operation carries the strictly earlier timestamp.
    Incoming,
    /// The already-recorded operation is earlier, or both share a timestamp
    /// and arrival order decides.
    Existing,
}

/// Details of a detected contention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contention {
    /// ID of the recorded operation the incoming one contends with.
    pub operation_id: OperationId,
    /// Author of the recorded operation.
    pub user_id: String,
    /// Absolute timestamp distance in milliseconds.
    pub delta_ms: u64,
    /// Which operation is logically first.
    pub precedence: Precedence,
}

/// Outcome of classifying an incoming operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictDecision {
    /// No other participant acted within the window.
    Clear,
    /// Another participant's operation falls within the window.
    Contended(Contention),
}

impl ConflictDecision {
    /// Whether a contention was detected.
    #[must_use]
    pub const fn is_contended(&self) -> bool {
        matches!(self, Self::Contended(_))
    }

    /// The contention details, if any.
    #[must_use]
    pub const fn contention(&self) -> Option<&Contention> {
        match self {
            Self::Clear => None,
            Self::Contended(c) => Some(c),
        }
    }
}

/// Strategy for classifying an incoming operation against the history.
pub trait ConflictPolicy {
    /// Classify `incoming` against every retained entry of `history`.
    fn classify(&self, incoming: &Operation, history: &OperationLog) -> ConflictDecision;
}

/// Timestamp-window classifier.
///
/// Scans the retained history newest first and reports the most recently
/// appended operation from a different user whose timestamp differs from the
/// incoming one by less than the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowClassifier {
    window_ms: u64,
}

impl WindowClassifier {
    /// Create a classifier with the given window in milliseconds.
    #[must_use]
    pub const fn new(window_ms: u64) -> Self {
        Self { window_ms }
    }

    /// The contention window in milliseconds.
    #[must_use]
    pub const fn window_ms(&self) -> u64 {
        self.window_ms
    }
}

impl Default for WindowClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENTION_WINDOW_MS)
    }
}

impl ConflictPolicy for WindowClassifier {
    fn classify(&self, incoming: &Operation, history: &OperationLog) -> ConflictDecision {
        let conflicting = history.iter().rev().find(|recorded| {
            recorded.user_id != incoming.user_id
                && recorded.timestamp.abs_diff(incoming.timestamp) < self.window_ms
        });

        match conflicting {
            None => ConflictDecision::Clear,
            Some(recorded) => ConflictDecision::Contended(Contention {
                operation_id: recorded.id.clone(),
                user_id: recorded.user_id.clone(),
                delta_ms: recorded.timestamp.abs_diff(incoming.timestamp),
                precedence: if incoming.timestamp < recorded.timestamp {
                    Precedence::Incoming
                } else {
                    Precedence::Existing
                },
            }),
        }
    }
}
