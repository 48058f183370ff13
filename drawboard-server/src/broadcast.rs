//! # State Broadcaster
//!
//! Maps history outcomes to the messages each participant should receive.
//!
//! Everything here is pure: the room worker calls these functions and pushes
//! the resulting [`Delivery`] values onto the room's broadcast channel, and
//! every connection forwards the deliveries whose [`Audience`] includes it.
//! Routing origin-only messages through the same channel keeps them ordered
//! with the room's other events.

use std::fmt;

use drawboard_core::{
    HistoryError, HistoryStep, Operation, OperationId, OperationKind, Snapshot, Submission,
};
use uuid::Uuid;

use crate::protocol::ServerMessage;

/// Server-assigned identity of one WebSocket connection.
///
/// Distinct from the user ID: one user may hold several connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh connection ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Identity used until the client names itself with a `join`.
    #[must_use]
    pub fn default_user_id(&self) -> String {
        format!("user-{}", self.0.simple())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Who receives a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every connection in the room.
    All,
    /// Every connection except the given one.
    AllExcept(ConnectionId),
    /// Only the given connection.
    Only(ConnectionId),
}

impl Audience {
    /// Whether `connection` is part of this audience.
    #[must_use]
    pub fn includes(&self, connection: ConnectionId) -> bool {
        match self {
            Self::All => true,
            Self::AllExcept(excluded) => *excluded != connection,
            Self::Only(target) => *target == connection,
        }
    }
}

/// A message tagged with its audience.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Recipients.
    pub audience: Audience,
    /// Payload.
    pub message: ServerMessage,
}

impl Delivery {
    /// Deliver to every connection in the room.
    #[must_use]
    pub fn all(message: ServerMessage) -> Self {
        Self {
            audience: Audience::All,
            message,
        }
    }

    /// Deliver to every connection except `origin`.
    #[must_use]
    pub fn others(origin: ConnectionId, message: ServerMessage) -> Self {
        Self {
            audience: Audience::AllExcept(origin),
            message,
        }
    }

    /// Deliver to `connection` only.
    #[must_use]
    pub fn only(connection: ConnectionId, message: ServerMessage) -> Self {
        Self {
            audience: Audience::Only(connection),
            message,
        }
    }
}

/// Deliveries for an accepted submission.
///
/// - draw: `operation` to everyone else, `ack` to the origin
/// - undo/redo that moved the cursor: `history` then `snapshot` to everyone,
///   the origin included
/// - undo/redo at a boundary: `error` to the origin only
/// - clear: `cleared` to everyone
#[must_use]
pub fn for_submission(
    origin: ConnectionId,
    room_id: &str,
    submission: Submission,
    timestamp: u64,
) -> Vec<Delivery> {
    match submission {
        Submission::Applied(applied) => {
            let ack = ServerMessage::Ack {
                operation_id: applied.operation.id.clone(),
                user_id: applied.operation.user_id.clone(),
                conflict: applied.conflict.contention().cloned(),
            };
            vec![
                Delivery::others(
                    origin,
                    ServerMessage::Operation {
                        operation: applied.operation,
                    },
                ),
                Delivery::only(origin, ack),
            ]
        }
        Submission::Undo { request, step } | Submission::Redo { request, step } => {
            history_step(origin, room_id, &request, step, timestamp)
        }
        Submission::Cleared { request, operation } => vec![Delivery::all(ServerMessage::Cleared {
            user_id: request.user_id,
            operation,
            timestamp,
        })],
    }
}

fn history_step(
    origin: ConnectionId,
    room_id: &str,
    request: &Operation,
    step: HistoryStep,
    timestamp: u64,
) -> Vec<Delivery> {
    let Some(operation) = step.operation else {
        let (code, message) = match request.kind {
            OperationKind::Redo => ("nothing_to_redo", "Nothing to redo"),
            _ => ("nothing_to_undo", "Nothing to undo"),
        };
        return vec![Delivery::only(
            origin,
            ServerMessage::error(code, message, Some(request.id.clone())),
        )];
    };

    let snapshot = Snapshot {
        active_operations: step.active_operations,
        cursor: step.cursor,
        timestamp,
    };
    vec![
        Delivery::all(ServerMessage::History {
            action: request.kind,
            user_id: request.user_id.clone(),
            operation,
            timestamp,
        }),
        Delivery::all(ServerMessage::snapshot(room_id, snapshot)),
    ]
}

/// Delivery for a submission the history rejected.
#[must_use]
pub fn for_rejection(
    origin: ConnectionId,
    error: &HistoryError,
    operation_id: Option<OperationId>,
) -> Delivery {
    Delivery::only(
        origin,
        ServerMessage::error(error.code(), error.to_string(), operation_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawboard_core::{HistoryController, OperationDraft, PathPoint};

    fn clock() -> u64 {
        1_000
    }

    fn history() -> HistoryController {
        HistoryController::new().with_clock(clock)
    }

    fn draw(id: &str, user: &str, timestamp: u64) -> OperationDraft {
        OperationDraft::new(OperationKind::Draw, id, user)
            .with_payload(vec![PathPoint::new(1.0, 1.0)])
            .with_timestamp(timestamp)
    }

    #[test]
    fn test_audience_includes() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();

        assert!(Audience::All.includes(a));
        assert!(!Audience::AllExcept(a).includes(a));
        assert!(Audience::AllExcept(a).includes(b));
        assert!(Audience::Only(a).includes(a));
        assert!(!Audience::Only(a).includes(b));
    }

    #[test]
    fn test_draw_broadcasts_to_others_and_acks_origin() {
        let origin = ConnectionId::generate();
        let other = ConnectionId::generate();
        let mut history = history();
        let submission = history.submit(draw("d1", "alice", 10)).expect("submit");

        let deliveries = for_submission(origin, "lobby", submission, clock());
        assert_eq!(deliveries.len(), 2);

        let for_other: Vec<_> = deliveries
            .iter()
            .filter(|d| d.audience.includes(other))
            .map(|d| d.message.msg_type())
            .collect();
        assert_eq!(for_other, ["operation"]);

        let for_origin: Vec<_> = deliveries
            .iter()
            .filter(|d| d.audience.includes(origin))
            .map(|d| &d.message)
            .collect();
        assert_eq!(
            for_origin,
            [&ServerMessage::Ack {
                operation_id: OperationId::from("d1"),
                user_id: "alice".to_string(),
                conflict: None,
            }]
        );
    }

    #[test]
    fn test_ack_carries_contention() {
        let origin = ConnectionId::generate();
        let mut history = history();
        history.submit(draw("d1", "alice", 500)).expect("submit");
        let submission = history.submit(draw("d1", "bob", 520)).expect("submit");

        let deliveries = for_submission(origin, "lobby", submission, clock());
        let ack = deliveries
            .iter()
            .find(|d| d.audience == Audience::Only(origin))
            .expect("ack");
        let ServerMessage::Ack {
            user_id, conflict, ..
        } = &ack.message
        else {
            panic!("expected ack");
        };
        // Same id, different author: the ack names both so clients can tell them apart.
        assert_eq!(user_id, "bob");
        assert_eq!(conflict.as_ref().map(|c| c.user_id.as_str()), Some("alice"));
    }

    #[test]
    fn test_undo_goes_to_everyone_with_snapshot() {
        let origin = ConnectionId::generate();
        let mut history = history();
        history.submit(draw("d1", "alice", 0)).expect("submit");
        history.submit(draw("d2", "bob", 5_000)).expect("submit");
        let submission = history
            .submit(OperationDraft::new(OperationKind::Undo, "u1", "alice"))
            .expect("submit");

        let deliveries = for_submission(origin, "lobby", submission, clock());
        assert_eq!(deliveries.len(), 2);
        assert!(deliveries.iter().all(|d| d.audience == Audience::All));

        match &deliveries[0].message {
            ServerMessage::History {
                action,
                user_id,
                operation,
                ..
            } => {
                assert_eq!(*action, OperationKind::Undo);
                assert_eq!(user_id, "alice");
                assert_eq!(operation.id.as_str(), "d2");
            }
            other => panic!("expected history, got {other:?}"),
        }
        match &deliveries[1].message {
            ServerMessage::Snapshot {
                room_id,
                active_operations,
                cursor,
                timestamp,
            } => {
                assert_eq!(room_id, "lobby");
                assert_eq!(active_operations.len(), 1);
                assert_eq!(*cursor, 0);
                assert_eq!(*timestamp, clock());
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn test_redo_reports_redo_action() {
        let origin = ConnectionId::generate();
        let mut history = history();
        history.submit(draw("d1", "alice", 0)).expect("submit");
        history.global_undo();
        let submission = history
            .submit(OperationDraft::new(OperationKind::Redo, "r1", "bob"))
            .expect("submit");

        let deliveries = for_submission(origin, "lobby", submission, clock());
        assert!(matches!(
            deliveries[0].message,
            ServerMessage::History {
                action: OperationKind::Redo,
                ..
            }
        ));
    }

    #[test]
    fn test_noop_undo_only_tells_origin() {
        let origin = ConnectionId::generate();
        let mut history = history();
        let submission = history
            .submit(OperationDraft::new(OperationKind::Undo, "u1", "alice"))
            .expect("submit");

        let deliveries = for_submission(origin, "lobby", submission, clock());
        assert_eq!(
            deliveries,
            [Delivery::only(
                origin,
                ServerMessage::error(
                    "nothing_to_undo",
                    "Nothing to undo",
                    Some(OperationId::from("u1"))
                )
            )]
        );
    }

    #[test]
    fn test_noop_redo_only_tells_origin() {
        let origin = ConnectionId::generate();
        let mut history = history();
        let submission = history
            .submit(OperationDraft::new(OperationKind::Redo, "r1", "alice"))
            .expect("submit");

        let deliveries = for_submission(origin, "lobby", submission, clock());
        assert_eq!(deliveries.len(), 1);
        assert!(matches!(
            &deliveries[0].message,
            ServerMessage::Error { code, .. } if code == "nothing_to_redo"
        ));
    }

    #[test]
    fn test_clear_goes_to_everyone() {
        let origin = ConnectionId::generate();
        let mut history = history();
        history.submit(draw("d1", "alice", 0)).expect("submit");
        let submission = history
            .submit(OperationDraft::new(OperationKind::Clear, "c1", "bob"))
            .expect("submit");

        let deliveries = for_submission(origin, "lobby", submission, clock());
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].audience, Audience::All);
        match &deliveries[0].message {
            ServerMessage::Cleared {
                user_id, operation, ..
            } => {
                assert_eq!(user_id, "bob");
                assert_eq!(operation.kind, OperationKind::Clear);
                assert_eq!(operation.user_id, drawboard_core::SYSTEM_USER);
            }
            other => panic!("expected cleared, got {other:?}"),
        }
    }

    #[test]
    fn test_rejection_is_origin_only() {
        let origin = ConnectionId::generate();
        let error = HistoryError::MalformedOperation { field: "id" };
        let delivery = for_rejection(origin, &error, None);

        assert_eq!(delivery.audience, Audience::Only(origin));
        match delivery.message {
            ServerMessage::Error { code, message, .. } => {
                assert_eq!(code, "malformed_operation");
                assert!(message.contains("id"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }
}
