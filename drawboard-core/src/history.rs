//! # History Controller
//!
//! The state machine over one [`OperationLog`]: validates and applies draws,
//! executes global undo/redo by moving the cursor, hard-resets on clear and
//! exports snapshots and statistics.
//!
//! There is exactly one timeline. Any participant's undo steps back over the
//! latest active operation whoever drew it, so user A can undo user B's last
//! stroke. That is the intended behaviour of a shared canvas, not a bug.
//!
//! The controller is synchronous and holds no locks. Callers serialize access
//! (the server runs one controller per room inside a single worker task).

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::conflict::{ConflictDecision, ConflictPolicy, WindowClassifier};
use crate::error::{HistoryError, HistoryResult};
use crate::log::{OperationLog, DEFAULT_MAX_RETAINED};
use crate::operation::{now_ms, Operation, OperationDraft, OperationId, OperationKind};
use crate::DEFAULT_CONTENTION_WINDOW_MS;

/// Tunables for a history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of operations retained before the oldest is evicted.
    pub max_retained: usize,
    /// Contention window used by the default classifier.
    pub contention_window_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_retained: DEFAULT_MAX_RETAINED,
            contention_window_ms: DEFAULT_CONTENTION_WINDOW_MS,
        }
    }
}

/// A draw accepted into the log.
///
/// Rejection is the `Err` side of [`HistoryController::apply`]; an `Applied`
/// value always means the operation was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The operation as stored (timestamp filled in).
    pub operation: Operation,
    /// Diagnostic conflict classification.
    pub conflict: ConflictDecision,
    /// Undone entries discarded by this append.
    pub truncated: usize,
    /// Entry evicted by the retention bound.
    pub evicted: Option<Operation>,
    /// Cursor after the append.
    pub cursor: isize,
}

/// Result of a global undo or redo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStep {
    /// Whether the cursor moved.
    pub success: bool,
    /// Operation undone (for undo) or re-activated (for redo).
    pub operation: Option<Operation>,
    /// Active prefix after the step.
    pub active_operations: Vec<Operation>,
    /// Cursor after the step.
    pub cursor: isize,
}

/// Result of [`HistoryController::global_undo`].
pub type UndoResult = HistoryStep;

/// Result of [`HistoryController::global_redo`].
pub type RedoResult = HistoryStep;

/// Outcome of [`HistoryController::submit`], one variant per operation kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// A draw was appended.
    Applied(Applied),
    /// A global undo was attempted.
    Undo {
        /// The validated undo request.
        request: Operation,
        /// What the undo did.
        step: UndoResult,
    },
    /// A global redo was attempted.
    Redo {
        /// The validated redo request.
        request: Operation,
        /// What the redo did.
        step: RedoResult,
    },
    /// The history was wiped.
    Cleared {
        /// The validated clear request.
        request: Operation,
        /// The synthetic operation now heading the log.
        operation: Operation,
    },
}

impl Submission {
    /// Kind of the submitted operation.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Applied(_) => OperationKind::Draw,
            Self::Undo { .. } => OperationKind::Undo,
            Self::Redo { .. } => OperationKind::Redo,
            Self::Cleared { .. } => OperationKind::Clear,
        }
    }

    /// Whether the submission changed the log.
    #[must_use]
    pub fn changed_history(&self) -> bool {
        match self {
            Self::Applied(_) | Self::Cleared { .. } => true,
            Self::Undo { step, .. } | Self::Redo { step, .. } => step.success,
        }
    }
}

/// Full visible state, sent to joining or resynchronizing participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Active prefix of the log.
    pub active_operations: Vec<Operation>,
    /// Cursor in `-1..len`.
    pub cursor: isize,
    /// Time the snapshot was taken (ms since epoch).
    pub timestamp: u64,
}

/// Read-only statistics for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Retained operations, active and undone.
    pub total_operations: usize,
    /// Cursor in `-1..len`.
    pub cursor: isize,
    /// Distinct users who have ever submitted an operation.
    pub active_users: usize,
    /// Whether a global undo would change anything.
    pub can_undo: bool,
    /// Whether a global redo would change anything.
    pub can_redo: bool,
    /// Contentions flagged by the classifier since creation.
    pub conflicts_detected: u64,
}

/// Single-timeline history with global undo/redo.
#[derive(Debug, Clone)]
pub struct HistoryController<P = WindowClassifier> {
    log: OperationLog,
    policy: P,
    /// Per-user submitted operation IDs. Statistics only.
    users: HashMap<String, VecDeque<OperationId>>,
    conflicts_detected: u64,
    clock: fn() -> u64,
}

impl HistoryController<WindowClassifier> {
    /// Create a controller with the default retention bound and window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HistoryConfig::default())
    }

    /// Create a controller from a configuration.
    #[must_use]
    pub fn with_config(config: HistoryConfig) -> Self {
        Self::with_policy(
            WindowClassifier::new(config.contention_window_ms),
            config.max_retained,
        )
    }
}

impl Default for HistoryController<WindowClassifier> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ConflictPolicy> HistoryController<P> {
    /// Create a controller with a custom conflict policy.
    #[must_use]
    pub fn with_policy(policy: P, max_retained: usize) -> Self {
        Self {
            log: OperationLog::with_max_retained(max_retained),
            policy,
            users: HashMap::new(),
            conflicts_detected: 0,
            clock: now_ms,
        }
    }

    /// Replace the clock used for missing timestamps and snapshots.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Validate and append a draw.
    ///
    /// The conflict classifier runs for diagnostics only; a valid draw is
    /// always recorded.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::MalformedOperation`] if a required field is
    /// missing and [`HistoryError::NotAppendable`] for non-draw kinds. The log
    /// is untouched in both cases.
    pub fn apply(&mut self, draft: OperationDraft) -> HistoryResult<Applied> {
        let operation = draft.validate((self.clock)())?;
        if operation.kind != OperationKind::Draw {
            return Err(HistoryError::NotAppendable(operation.kind));
        }
        Ok(self.append(operation))
    }

    fn append(&mut self, operation: Operation) -> Applied {
        self.index_user(&operation);

        let conflict = self.policy.classify(&operation, &self.log);
        if let ConflictDecision::Contended(contention) = &conflict {
            self.conflicts_detected += 1;
            tracing::debug!(
                operation_id = %operation.id,
                user_id = %operation.user_id,
                conflicting_id = %contention.operation_id,
                conflicting_user = %contention.user_id,
                delta_ms = contention.delta_ms,
                precedence = ?contention.precedence,
                "Concurrent operation inside contention window"
            );
        }

        let outcome = self.log.append(operation.clone());
        if outcome.truncated > 0 {
            tracing::debug!(
                truncated = outcome.truncated,
                operation_id = %operation.id,
                "Discarded redo branch"
            );
        }
        if let Some(evicted) = &outcome.evicted {
            tracing::trace!(evicted_id = %evicted.id, "Evicted oldest operation");
        }

        Applied {
            operation,
            conflict,
            truncated: outcome.truncated,
            evicted: outcome.evicted,
            cursor: self.log.cursor(),
        }
    }

    /// Step the shared timeline back by one, whoever authored the operation.
    pub fn global_undo(&mut self) -> UndoResult {
        let undone = self.log.move_cursor_back().cloned();
        self.step(undone)
    }

    /// Step the shared timeline forward by one.
    pub fn global_redo(&mut self) -> RedoResult {
        let redone = self.log.move_cursor_forward().cloned();
        self.step(redone)
    }

    /// Discard all history and install a synthetic `clear` operation.
    ///
    /// Unconditional: there is no per-user permission check.
    pub fn clear(&mut self) -> Operation {
        let operation = Operation::system_clear((self.clock)());
        self.log.reset(operation.clone());
        operation
    }

    /// Validate a draft and dispatch it by kind.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::MalformedOperation`] if a required field is
    /// missing. Nothing is recorded in that case.
    pub fn submit(&mut self, draft: OperationDraft) -> HistoryResult<Submission> {
        let request = draft.validate((self.clock)())?;
        if request.kind != OperationKind::Draw {
            self.index_user(&request);
        }

        Ok(match request.kind {
            OperationKind::Draw => Submission::Applied(self.append(request)),
            OperationKind::Undo => Submission::Undo {
                step: self.global_undo(),
                request,
            },
            OperationKind::Redo => Submission::Redo {
                step: self.global_redo(),
                request,
            },
            OperationKind::Clear => Submission::Cleared {
                operation: self.clear(),
                request,
            },
        })
    }

    /// Export the full visible state. Side-effect free.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            active_operations: self.log.active_operations(),
            cursor: self.log.cursor(),
            timestamp: (self.clock)(),
        }
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            total_operations: self.log.len(),
            cursor: self.log.cursor(),
            active_users: self.users.len(),
            can_undo: self.log.can_undo(),
            can_redo: self.log.can_redo(),
            conflicts_detected: self.conflicts_detected,
        }
    }

    /// Active prefix of the log.
    #[must_use]
    pub fn active_operations(&self) -> Vec<Operation> {
        self.log.active_operations()
    }

    /// Read-only view of the underlying log.
    #[must_use]
    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    /// Operation IDs submitted by `user_id`, oldest first.
    pub fn user_operations(&self, user_id: &str) -> impl Iterator<Item = &OperationId> + '_ {
        self.users.get(user_id).into_iter().flatten()
    }

    fn step(&self, operation: Option<Operation>) -> HistoryStep {
        HistoryStep {
            success: operation.is_some(),
            operation,
            active_operations: self.log.active_operations(),
            cursor: self.log.cursor(),
        }
    }

    fn index_user(&mut self, operation: &Operation) {
        let cap = self.log.max_retained();
        let ids = self.users.entry(operation.user_id.clone()).or_default();
        if ids.len() >= cap {
            ids.pop_front();
        }
        ids.push_back(operation.id.clone());
    }
}
