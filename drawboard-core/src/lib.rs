//! # Drawboard Core
//!
//! Server-side history for a shared drawing canvas: one global timeline that
//! every participant converges on, including after undo/redo by anyone.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              HistoryController              │
//! │  validate → classify → append / undo / redo │
//! ├──────────────────────┬──────────────────────┤
//! │  ConflictPolicy      │  OperationLog        │
//! │  - contention window │  - bounded sequence  │
//! │  - diagnostic only   │  - movable cursor    │
//! └──────────────────────┴──────────────────────┘
//! ```
//!
//! The crate does no I/O and never blocks. Transport, fan-out and
//! serialization of access are the server's job.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod conflict;
pub mod error;
pub mod history;
pub mod log;
pub mod operation;

pub use conflict::{
    ConflictDecision, ConflictPolicy, Contention, Precedence, WindowClassifier,
    DEFAULT_CONTENTION_WINDOW_MS,
};
pub use error::{HistoryError, HistoryResult};
pub use history::{
    Applied, HistoryConfig, HistoryController, HistoryStats, HistoryStep, RedoResult, Snapshot,
    Submission, UndoResult,
};
pub use log::{AppendOutcome, OperationLog, DEFAULT_MAX_RETAINED};
pub use operation::{
    now_ms, Operation, OperationDraft, OperationId, OperationKind, PathPoint, SYSTEM_USER,
};

/// Drawboard core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
