//! # Operation Log
//!
//! A bounded, append/truncate sequence of operations with a movable cursor.
//!
//! ```text
//!  index:   0     1     2     3     4
//!         [ D1 ][ D2 ][ D3 ][ D4 ][ D5 ]
//!                       ^cursor
//!         |---- active ----|-- undone --|
//! ```
//!
//! Entries at or before the cursor are active (visible on every canvas).
//! Entries after it are undone but still redo-able until the next append,
//! which discards them for good.
//!
//! The cursor is reported as a signed index in `-1..len`, where `-1` means
//! nothing is active. Internally the log tracks the number of active entries,
//! which makes the invariant `active <= len` impossible to break by
//! arithmetic underflow.

use std::collections::VecDeque;

use crate::Operation;

/// Default maximum number of operations kept in a log.
pub const DEFAULT_MAX_RETAINED: usize = 500;

/// What happened to the log during an [`OperationLog::append`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppendOutcome {
    /// Number of undone entries discarded because a redo branch existed.
    pub truncated: usize,
    /// Oldest entry evicted to honour the retention bound, if any.
    pub evicted: Option<Operation>,
}

/// Ordered operation history with a cursor.
#[derive(Debug, Clone)]
pub struct OperationLog {
    entries: VecDeque<Operation>,
    /// Number of active entries. The cursor is `active - 1`.
    active: usize,
    max_retained: usize,
}

impl OperationLog {
    /// Create an empty log with the default retention bound.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_retained(DEFAULT_MAX_RETAINED)
    }

    /// Create an empty log that keeps at most `max_retained` entries.
    ///
    /// A bound of zero is raised to one so a clear can always be recorded.
    #[must_use]
    pub fn with_max_retained(max_retained: usize) -> Self {
        let max_retained = max_retained.max(1);
        Self {
            entries: VecDeque::with_capacity(max_retained.min(DEFAULT_MAX_RETAINED) + 1),
            active: 0,
            max_retained,
        }
    }

    /// Append an operation, discarding any redo branch first.
    ///
    /// After the push the cursor points at the new entry. If the retention
    /// bound is exceeded the oldest entry is evicted and the cursor shifts down
    /// by one so it keeps pointing at the same operation.
    pub fn append(&mut self, op: Operation) -> AppendOutcome {
        let truncated = self.entries.len() - self.active;
        self.entries.truncate(self.active);
        self.entries.push_back(op);
        self.active = self.entries.len();

        let evicted = if self.entries.len() > self.max_retained {
            self.active -= 1;
            self.entries.pop_front()
        } else {
            None
        };

        AppendOutcome { truncated, evicted }
    }

    /// Move the cursor back by one.
    ///
    /// Returns the operation that just became inactive, or `None` (and leaves
    /// the log untouched) if nothing is active.
    pub fn move_cursor_back(&mut self) -> Option<&Operation> {
        if self.active == 0 {
            return None;
        }
        self.active -= 1;
        self.entries.get(self.active)
    }

    /// Move the cursor forward by one.
    ///
    /// Returns the operation that just became active, or `None` (and leaves
    /// the log untouched) if there is nothing to redo.
    pub fn move_cursor_forward(&mut self) -> Option<&Operation> {
        if self.active >= self.entries.len() {
            return None;
        }
        self.active += 1;
        self.entries.get(self.active - 1)
    }

    /// Replace the whole sequence with a single operation and make it active.
    pub fn reset(&mut self, op: Operation) {
        self.entries.clear();
        self.entries.push_back(op);
        self.active = 1;
    }

    /// Clone the active prefix: what every canvas should currently show.
    #[must_use]
    pub fn active_operations(&self) -> Vec<Operation> {
        self.iter_active().cloned().collect()
    }

    /// Iterate over the active prefix without cloning.
    pub fn iter_active(&self) -> impl DoubleEndedIterator<Item = &Operation> + '_ {
        self.entries.iter().take(self.active)
    }

    /// Iterate over every retained entry, active or undone, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Operation> + '_ {
        self.entries.iter()
    }

    /// The operation at the cursor, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Operation> {
        self.active.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Entry at `index`, active or not.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Operation> {
        self.entries.get(index)
    }

    /// Cursor index in `-1..len`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)] // bounded by max_retained
    pub fn cursor(&self) -> isize {
        self.active as isize - 1
    }

    /// Number of active entries (`cursor + 1`).
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a global undo would change anything.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.active > 0
    }

    /// Whether a global redo would change anything.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.active < self.entries.len()
    }

    /// Retention bound.
    #[must_use]
    pub const fn max_retained(&self) -> usize {
        self.max_retained
    }
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::new()
    }
}
