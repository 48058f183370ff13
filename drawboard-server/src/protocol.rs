//! # WebSocket Message Protocol
//!
//! JSON text frames tagged by `type`.
//!
//! ### Client -> Server
//!
//! - `{"type": "join", "room_id": "lobby", "user_id": "alice"}`
//! - `{"type": "draw", "operation": {"id": "...", "user_id": "...", "payload": [...]}}`
//! - `{"type": "undo"}` / `{"type": "redo"}` (optional `operation` object)
//! - `{"type": "clear"}` (optional `operation` object)
//! - `{"type": "request_snapshot"}`
//! - `{"type": "ping"}`
//!
//! ### Server -> Client
//!
//! - `{"type": "welcome", "version": "...", "connection_id": "...", "room_id": "...", "user_id": "..."}`
//! - `{"type": "snapshot", "room_id": "...", "active_operations": [...], "cursor": 3}`
//! - `{"type": "operation", "operation": {...}}`
//! - `{"type": "ack", "operation_id": "...", "user_id": "..."}`
//! - `{"type": "history", "action": "undo", "user_id": "...", "operation": {...}}`
//! - `{"type": "cleared", "user_id": "...", "operation": {...}}`
//! - `{"type": "user_joined", "user_id": "...", "online": 2}`
//! - `{"type": "user_left", "user_id": "...", "online": 1}`
//! - `{"type": "pong", "timestamp": ...}`
//! - `{"type": "error", "code": "...", "message": "..."}`

use drawboard_core::{Contention, Operation, OperationDraft, OperationId, OperationKind, Snapshot};
use serde::{Deserialize, Serialize};

/// Client-to-server WebSocket message types.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Switch room and/or set the connection's identity.
    Join {
        /// Room to join. Defaults to the current room.
        #[serde(default)]
        room_id: Option<String>,
        /// Identity to adopt. Defaults to the current identity.
        #[serde(default)]
        user_id: Option<String>,
    },
    /// Append a stroke.
    Draw {
        /// The stroke operation.
        operation: OperationDraft,
    },
    /// Global undo.
    Undo {
        /// Optional request details (id, user). Filled in by the server.
        #[serde(default)]
        operation: Option<OperationDraft>,
    },
    /// Global redo.
    Redo {
        /// Optional request details (id, user). Filled in by the server.
        #[serde(default)]
        operation: Option<OperationDraft>,
    },
    /// Wipe the room's canvas and history.
    Clear {
        /// Optional request details (id, user). Filled in by the server.
        #[serde(default)]
        operation: Option<OperationDraft>,
    },
    /// Ask for a fresh snapshot of the room.
    RequestSnapshot,
    /// Keepalive ping.
    Ping,
}

impl ClientMessage {
    /// Wire name of the message type, used as a metric label.
    #[must_use]
    pub const fn msg_type(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Draw { .. } => "draw",
            Self::Undo { .. } => "undo",
            Self::Redo { .. } => "redo",
            Self::Clear { .. } => "clear",
            Self::RequestSnapshot => "request_snapshot",
            Self::Ping => "ping",
        }
    }
}

/// Server-to-client WebSocket message types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent on connection and after every join.
    Welcome {
        /// Server version.
        version: String,
        /// Server-assigned connection ID.
        connection_id: String,
        /// Room the connection is now in.
        room_id: String,
        /// Identity the connection acts as.
        user_id: String,
        /// Event timestamp.
        timestamp: u64,
    },
    /// Full visible state of a room.
    Snapshot {
        /// Room the snapshot belongs to.
        room_id: String,
        /// Active prefix of the room's history.
        active_operations: Vec<Operation>,
        /// History cursor in `-1..len`.
        cursor: isize,
        /// Time the snapshot was taken.
        timestamp: u64,
    },
    /// A draw applied by another participant.
    Operation {
        /// The stored operation.
        operation: Operation,
    },
    /// Acknowledgment of the recipient's own draw.
    Ack {
        /// Client-assigned ID of the acknowledged operation.
        operation_id: OperationId,
        /// Author of the acknowledged operation.
        user_id: String,
        /// Contention detected while applying, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conflict: Option<Contention>,
    },
    /// A global undo or redo moved the shared timeline.
    History {
        /// `undo` or `redo`.
        action: OperationKind,
        /// Participant who issued the request.
        user_id: String,
        /// Operation that was undone or re-activated.
        operation: Operation,
        /// Event timestamp.
        timestamp: u64,
    },
    /// The room's history was wiped.
    Cleared {
        /// Participant who issued the clear.
        user_id: String,
        /// Synthetic operation now heading the history.
        operation: Operation,
        /// Event timestamp.
        timestamp: u64,
    },
    /// A participant entered the room.
    UserJoined {
        /// The participant.
        user_id: String,
        /// Connections now in the room.
        online: usize,
        /// Event timestamp.
        timestamp: u64,
    },
    /// A participant left the room.
    UserLeft {
        /// The participant.
        user_id: String,
        /// Connections now in the room.
        online: usize,
        /// Event timestamp.
        timestamp: u64,
    },
    /// Reply to a ping.
    Pong {
        /// Server timestamp.
        timestamp: u64,
    },
    /// A request was rejected.
    Error {
        /// Machine-readable error code.
        code: String,
        /// Human-readable description.
        message: String,
        /// Operation the error refers to, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operation_id: Option<OperationId>,
    },
}

impl ServerMessage {
    /// Build an error message.
    #[must_use]
    pub fn error(
        code: impl Into<String>,
        message: impl Into<String>,
        operation_id: Option<OperationId>,
    ) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
            operation_id,
        }
    }

    /// Wrap a history snapshot for a room.
    #[must_use]
    pub fn snapshot(room_id: &str, snapshot: Snapshot) -> Self {
        Self::Snapshot {
            room_id: room_id.to_string(),
            active_operations: snapshot.active_operations,
            cursor: snapshot.cursor,
            timestamp: snapshot.timestamp,
        }
    }

    /// Wire name of the message type, used as a metric label.
    #[must_use]
    pub const fn msg_type(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::Snapshot { .. } => "snapshot",
            Self::Operation { .. } => "operation",
            Self::Ack { .. } => "ack",
            Self::History { .. } => "history",
            Self::Cleared { .. } => "cleared",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::Pong { .. } => "pong",
            Self::Error { .. } => "error",
        }
    }
}
