//! Operations: the unit of shared history.
//!
//! An [`Operation`] is an atomic, timestamped, user-attributed action. Clients
//! submit [`OperationDraft`]s, which carry every field optionally; validation
//! turns a draft into an operation or rejects it without touching the log.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, HistoryResult};

/// User ID stamped on operations the server synthesizes itself.
pub const SYSTEM_USER: &str = "system";

/// Caller-assigned operation identifier.
///
/// Unique per originating client session only. Two users may submit the same
/// ID, so anything keyed on IDs must pair them with the user ID.
///
/// Accepted on the wire as a string or a number; always stored as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawOperationId")]
pub struct OperationId(String);

impl OperationId {
    /// Create an ID from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random ID for server-synthesized operations.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the ID is empty (treated as missing during validation).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for OperationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for OperationId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOperationId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawOperationId> for OperationId {
    fn from(raw: RawOperationId) -> Self {
        match raw {
            RawOperationId::Text(s) => Self(s),
            RawOperationId::Number(n) => Self(n.to_string()),
        }
    }
}

/// Kind of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// A stroke drawn on the canvas.
    Draw,
    /// Global undo request.
    Undo,
    /// Global redo request.
    Redo,
    /// Wipe the canvas and the history.
    Clear,
}

impl OperationKind {
    /// Lowercase wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draw => "draw",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Clear => "clear",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single point of a stroke path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    /// X position in canvas pixels.
    pub x: f64,
    /// Y position in canvas pixels.
    pub y: f64,
    /// CSS colour string.
    #[serde(default = "default_color")]
    pub color: String,
    /// Brush diameter in pixels.
    #[serde(default = "default_size")]
    pub size: f64,
    /// Tool name (`brush`, `eraser`, ...). Opaque to the history.
    #[serde(default = "default_tool")]
    pub tool: String,
}

impl PathPoint {
    /// Create a brush point with the default colour and size.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            color: default_color(),
            size: default_size(),
            tool: default_tool(),
        }
    }
}

fn default_color() -> String {
    "#000000".to_string()
}

fn default_size() -> f64 {
    2.0
}

fn default_tool() -> String {
    "brush".to_string()
}

/// A validated operation as stored in the log and sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Caller-assigned ID, unique per originating session.
    pub id: OperationId,
    /// Kind of operation.
    #[serde(rename = "type")]
    pub kind: OperationKind,
    /// Originating participant.
    pub user_id: String,
    /// Stroke points for `draw`; empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<PathPoint>,
    /// Milliseconds since epoch. Drives contention grouping, not ordering.
    pub timestamp: u64,
}

impl Operation {
    /// Create a draw operation.
    #[must_use]
    pub fn draw(
        id: impl Into<OperationId>,
        user_id: impl Into<String>,
        payload: Vec<PathPoint>,
        timestamp: u64,
    ) -> Self {
        Self {
            id: id.into(),
            kind: OperationKind::Draw,
            user_id: user_id.into(),
            payload,
            timestamp,
        }
    }

    /// Create the synthetic clear operation installed by a hard reset.
    #[must_use]
    pub fn system_clear(timestamp: u64) -> Self {
        Self {
            id: OperationId::generate(),
            kind: OperationKind::Clear,
            user_id: SYSTEM_USER.to_string(),
            payload: Vec::new(),
            timestamp,
        }
    }
}

/// An unvalidated operation as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationDraft {
    /// Caller-assigned ID.
    #[serde(default)]
    pub id: Option<OperationId>,
    /// Kind of operation.
    #[serde(default, rename = "type")]
    pub kind: Option<OperationKind>,
    /// Originating participant.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Stroke points.
    #[serde(default)]
    pub payload: Vec<PathPoint>,
    /// Client timestamp, if any.
    #[serde(default)]
    pub timestamp: Option<u64>,
}

impl OperationDraft {
    /// Start a draft of the given kind for a user.
    #[must_use]
    pub fn new(
        kind: OperationKind,
        id: impl Into<OperationId>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            kind: Some(kind),
            user_id: Some(user_id.into()),
            payload: Vec::new(),
            timestamp: None,
        }
    }

    /// Attach stroke points.
    #[must_use]
    pub fn with_payload(mut self, payload: Vec<PathPoint>) -> Self {
        self.payload = payload;
        self
    }

    /// Attach a client timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Validate the draft into an operation.
    ///
    /// `now` is used when the client did not supply a timestamp. Non-draw
    /// payloads are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::MalformedOperation`] if `id`, `user_id` or
    /// `type` is missing or empty.
    pub fn validate(self, now: u64) -> HistoryResult<Operation> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or(HistoryError::MalformedOperation { field: "id" })?;
        let user_id = self
            .user_id
            .filter(|u| !u.is_empty())
            .ok_or(HistoryError::MalformedOperation { field: "user_id" })?;
        let kind = self
            .kind
            .ok_or(HistoryError::MalformedOperation { field: "type" })?;

        let payload = if kind == OperationKind::Draw {
            self.payload
        } else {
            Vec::new()
        };

        Ok(Operation {
            id,
            kind,
            user_id,
            payload,
            timestamp: self.timestamp.unwrap_or(now),
        })
    }
}

/// Current Unix timestamp in milliseconds.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Timestamps won't exceed u64 for billions of years
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
