//! # Rooms
//!
//! A room is one shared canvas: a [`HistoryController`] owned by a single
//! worker task, a bounded command queue into it and a broadcast channel out.
//!
//! ```text
//!  connection ──RoomCommand──▶ ┌──────────────┐ ──Delivery──▶ connection
//!  connection ──RoomCommand──▶ │ room worker  │ ──Delivery──▶ connection
//!  HTTP route ──Stats/Snapshot▶└──────────────┘ ──Delivery──▶ connection
//! ```
//!
//! The worker processes commands one at a time to completion, so submissions
//! are totally ordered by arrival at the queue and no lock guards the log.
//! Join snapshots are produced in queue order as well, which means a joiner
//! never sees a snapshot that skips or repeats an operation it is about to
//! receive through the broadcast channel.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use drawboard_core::{
    now_ms, HistoryConfig, HistoryController, HistoryStats, OperationDraft, OperationKind,
    Snapshot, Submission,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::broadcast::{self as fanout, ConnectionId, Delivery};
use crate::metrics;
use crate::protocol::ServerMessage;
use crate::validation::{validate_room_id, ValidationError};

/// Room every connection starts in.
pub const DEFAULT_ROOM: &str = "default";

/// Capacity of a room's command queue.
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Capacity of a room's broadcast channel. Slower receivers lag and resync.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Room-level errors.
#[derive(Debug, Error)]
pub enum RoomError {
    /// The room worker has stopped.
    #[error("room {0} is closed")]
    Closed(String),
    /// Creating the room would exceed the configured limit.
    #[error("room limit reached (max {0})")]
    TooManyRooms(usize),
    /// The room ID is invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl RoomError {
    /// Machine-readable error code sent to clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Closed(_) => "room_closed",
            Self::TooManyRooms(_) => "too_many_rooms",
            Self::Validation(_) => "validation_error",
        }
    }
}

/// Commands processed by a room worker, in arrival order.
#[derive(Debug)]
pub enum RoomCommand {
    /// A connection entered the room. The worker replies with a snapshot to
    /// that connection and announces the user to everyone else.
    Join {
        /// Joining connection.
        connection: ConnectionId,
        /// Identity of the connection.
        user_id: String,
    },
    /// A connection left the room.
    Leave {
        /// Leaving connection.
        connection: ConnectionId,
    },
    /// Submit a draw, undo, redo or clear.
    Submit {
        /// Originating connection.
        connection: ConnectionId,
        /// The operation as received, with user and kind filled in.
        draft: OperationDraft,
    },
    /// Send a fresh snapshot to one connection.
    Resync {
        /// Connection to resynchronize.
        connection: ConnectionId,
    },
    /// Read a snapshot (HTTP API).
    Snapshot {
        /// Reply channel.
        reply: oneshot::Sender<Snapshot>,
    },
    /// Read statistics (HTTP API, readiness probe).
    Stats {
        /// Reply channel.
        reply: oneshot::Sender<RoomStats>,
    },
}

/// Statistics for one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomStats {
    /// Room ID.
    pub room_id: String,
    /// History statistics.
    #[serde(flatten)]
    pub history: HistoryStats,
    /// Connections currently in the room.
    pub online: usize,
}

/// Cloneable handle to a running room.
///
/// Every clone counts as a lease on the room. The registry may reap a room
/// once it holds the only lease left.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: Arc<str>,
    commands: mpsc::Sender<RoomCommand>,
    events: broadcast::Sender<Delivery>,
    lease: Arc<()>,
}

impl RoomHandle {
    /// Room ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Subscribe to the room's deliveries.
    ///
    /// Subscribe before sending [`RoomCommand::Join`] so the join snapshot
    /// is not missed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.events.subscribe()
    }

    /// Queue a command for the worker.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Closed`] if the worker has stopped.
    pub async fn send(&self, command: RoomCommand) -> Result<(), RoomError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RoomError::Closed(self.id.to_string()))
    }

    // Only the registry's copy is left.
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.lease) == 1
    }

    /// Snapshot of the room, taken in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Closed`] if the worker has stopped.
    pub async fn snapshot(&self) -> Result<Snapshot, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| RoomError::Closed(self.id.to_string()))
    }

    /// Statistics of the room, taken in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Closed`] if the worker has stopped.
    pub async fn stats(&self) -> Result<RoomStats, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Stats { reply }).await?;
        rx.await.map_err(|_| RoomError::Closed(self.id.to_string()))
    }
}

/// Spawn a room worker and return its handle.
///
/// Must be called from within a Tokio runtime. The worker runs until every
/// handle has been dropped.
#[must_use]
pub fn spawn_room(id: &str, config: HistoryConfig) -> RoomHandle {
    let (commands, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let id: Arc<str> = Arc::from(id);

    let worker = RoomWorker {
        id: Arc::clone(&id),
        history: HistoryController::with_config(config),
        online: HashMap::new(),
        events: events.clone(),
    };
    tokio::spawn(worker.run(rx));

    RoomHandle {
        id,
        commands,
        events,
        lease: Arc::new(()),
    }
}

struct RoomWorker {
    id: Arc<str>,
    history: HistoryController,
    /// Connections in the room and the identity each acts as.
    online: HashMap<ConnectionId, String>,
    events: broadcast::Sender<Delivery>,
}

impl RoomWorker {
    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        tracing::debug!(room_id = %self.id, "Room worker started");
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        tracing::debug!(room_id = %self.id, "Room worker stopped");
    }

    fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                connection,
                user_id,
            } => self.join(connection, user_id),
            RoomCommand::Leave { connection } => self.leave(connection),
            RoomCommand::Submit { connection, draft } => self.submit(connection, draft),
            RoomCommand::Resync { connection } => {
                let snapshot = ServerMessage::snapshot(&self.id, self.history.snapshot());
                self.publish(Delivery::only(connection, snapshot));
            }
            RoomCommand::Snapshot { reply } => {
                // The requester may have gone away; nothing to do then.
                let _ = reply.send(self.history.snapshot());
            }
            RoomCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    fn join(&mut self, connection: ConnectionId, user_id: String) {
        self.online.insert(connection, user_id.clone());
        metrics::set_room_participants(&self.id, self.online.len());
        tracing::info!(
            room_id = %self.id,
            connection_id = %connection,
            user_id = %user_id,
            online = self.online.len(),
            "Participant joined"
        );

        let snapshot = ServerMessage::snapshot(&self.id, self.history.snapshot());
        self.publish(Delivery::only(connection, snapshot));
        self.publish(Delivery::others(
            connection,
            ServerMessage::UserJoined {
                user_id,
                online: self.online.len(),
                timestamp: now_ms(),
            },
        ));
    }

    fn leave(&mut self, connection: ConnectionId) {
        let Some(user_id) = self.online.remove(&connection) else {
            return;
        };
        metrics::set_room_participants(&self.id, self.online.len());
        tracing::info!(
            room_id = %self.id,
            connection_id = %connection,
            user_id = %user_id,
            online = self.online.len(),
            "Participant left"
        );

        self.publish(Delivery::all(ServerMessage::UserLeft {
            user_id,
            online: self.online.len(),
            timestamp: now_ms(),
        }));
    }

    fn submit(&mut self, connection: ConnectionId, draft: OperationDraft) {
        let operation_id = draft.id.clone();
        let kind = draft.kind;

        let deliveries = match self.history.submit(draft) {
            Ok(submission) => {
                record_submission(&submission);
                tracing::debug!(
                    room_id = %self.id,
                    connection_id = %connection,
                    kind = %submission.kind(),
                    changed = submission.changed_history(),
                    "Operation processed"
                );
                fanout::for_submission(connection, &self.id, submission, now_ms())
            }
            Err(err) => {
                if let Some(kind) = kind {
                    metrics::record_operation(kind, "rejected");
                }
                tracing::warn!(
                    room_id = %self.id,
                    connection_id = %connection,
                    operation_id = ?operation_id,
                    "Rejected operation: {}",
                    err
                );
                vec![fanout::for_rejection(connection, &err, operation_id)]
            }
        };

        for delivery in deliveries {
            self.publish(delivery);
        }
    }

    fn stats(&self) -> RoomStats {
        RoomStats {
            room_id: self.id.to_string(),
            history: self.history.stats(),
            online: self.online.len(),
        }
    }

    fn publish(&self, delivery: Delivery) {
        // No receivers is fine: the room may be empty.
        let _ = self.events.send(delivery);
    }
}

fn record_submission(submission: &Submission) {
    match submission {
        Submission::Applied(applied) => {
            metrics::record_operation(OperationKind::Draw, "applied");
            if applied.conflict.is_contended() {
                metrics::record_conflict();
            }
            if applied.truncated > 0 {
                metrics::record_truncated(applied.truncated);
            }
            if applied.evicted.is_some() {
                metrics::record_eviction();
            }
        }
        Submission::Undo { step, .. } | Submission::Redo { step, .. } => {
            let kind = submission.kind();
            if step.success {
                metrics::record_operation(kind, "applied");
            } else {
                metrics::record_operation(kind, "noop");
                metrics::record_history_noop(kind);
            }
        }
        Submission::Cleared { .. } => metrics::record_operation(OperationKind::Clear, "applied"),
    }
}

/// All rooms of the server, created on first use.
#[derive(Debug, Clone)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, RoomHandle>>>,
    history: HistoryConfig,
    max_rooms: usize,
}

impl RoomRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(history: HistoryConfig, max_rooms: usize) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            history,
            max_rooms: max_rooms.max(1),
        }
    }

    /// Get a room, spawning its worker if it does not exist yet.
    ///
    /// At the room limit, rooms nobody holds a handle to are dropped first.
    /// The default room is never dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Validation`] for an invalid room ID and
    /// [`RoomError::TooManyRooms`] if the room limit is reached.
    pub fn get_or_create(&self, room_id: &str) -> Result<RoomHandle, RoomError> {
        validate_room_id(room_id)?;

        if let Some(room) = self.get(room_id) {
            return Ok(room);
        }

        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        // Another connection may have created it between the two locks.
        if let Some(room) = rooms.get(room_id) {
            return Ok(room.clone());
        }
        if rooms.len() >= self.max_rooms {
            reap_idle(&mut rooms);
        }
        if rooms.len() >= self.max_rooms {
            tracing::warn!(room_id, max_rooms = self.max_rooms, "Room limit reached");
            return Err(RoomError::TooManyRooms(self.max_rooms));
        }

        let room = spawn_room(room_id, self.history);
        rooms.insert(room_id.to_string(), room.clone());
        metrics::set_rooms(rooms.len());
        tracing::info!(room_id, rooms = rooms.len(), "Room created");
        Ok(room)
    }

    /// Get an existing room.
    #[must_use]
    pub fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
            .cloned()
    }

    /// IDs of all rooms, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Number of rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no room exists yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Room limit.
    #[must_use]
    pub const fn max_rooms(&self) -> usize {
        self.max_rooms
    }
}

// Dropping the registry's handle closes the command queue and stops the worker.
fn reap_idle(rooms: &mut HashMap<String, RoomHandle>) {
    let before = rooms.len();
    rooms.retain(|id, room| {
        let keep = id == DEFAULT_ROOM || !room.is_idle();
        if !keep {
            tracing::info!(room_id = %id, "Reaping idle room");
        }
        keep
    });
    if rooms.len() < before {
        metrics::set_rooms(rooms.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Audience;
    use drawboard_core::PathPoint;

    fn draw(id: &str, user: &str, timestamp: u64) -> OperationDraft {
        OperationDraft::new(OperationKind::Draw, id, user)
            .with_payload(vec![PathPoint::new(3.0, 4.0)])
            .with_timestamp(timestamp)
    }

    async fn next_for(
        rx: &mut broadcast::Receiver<Delivery>,
        connection: ConnectionId,
    ) -> ServerMessage {
        loop {
            let delivery = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
                .await
                .expect("timed out waiting for delivery")
                .expect("channel open");
            if delivery.audience.includes(connection) {
                return delivery.message;
            }
        }
    }

    #[tokio::test]
    async fn test_join_sends_snapshot_then_announces() {
        let room = spawn_room("lobby", HistoryConfig::default());
        let alice = ConnectionId::generate();
        let bob = ConnectionId::generate();
        let mut alice_rx = room.subscribe();

        room.send(RoomCommand::Join {
            connection: alice,
            user_id: "alice".to_string(),
        })
        .await
        .expect("send");
        let first = next_for(&mut alice_rx, alice).await;
        assert!(matches!(first, ServerMessage::Snapshot { cursor: -1, .. }));

        room.send(RoomCommand::Join {
            connection: bob,
            user_id: "bob".to_string(),
        })
        .await
        .expect("send");
        match next_for(&mut alice_rx, alice).await {
            ServerMessage::UserJoined {
                user_id, online, ..
            } => {
                assert_eq!(user_id, "bob");
                assert_eq!(online, 2);
            }
            other => panic!("expected user_joined, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submissions_are_processed_in_order() {
        let room = spawn_room("lobby", HistoryConfig::default());
        let origin = ConnectionId::generate();

        for i in 0..50_u64 {
            room.send(RoomCommand::Submit {
                connection: origin,
                draft: draw(&format!("d{i}"), "alice", i * 1000),
            })
            .await
            .expect("send");
        }

        let snapshot = room.snapshot().await.expect("snapshot");
        let ids: Vec<_> = snapshot
            .active_operations
            .iter()
            .map(|op| op.id.to_string())
            .collect();
        let expected: Vec<_> = (0..50).map(|i| format!("d{i}")).collect();
        assert_eq!(ids, expected);
        assert_eq!(snapshot.cursor, 49);
    }

    #[tokio::test]
    async fn test_concurrent_undos_each_step_once() {
        let room = spawn_room("lobby", HistoryConfig::default());
        let origin = ConnectionId::generate();
        for (i, user) in ["alice", "bob", "carol"].into_iter().enumerate() {
            room.send(RoomCommand::Submit {
                connection: origin,
                draft: draw(&format!("d{i}"), user, i as u64 * 1000),
            })
            .await
            .expect("send");
        }

        let a = room.clone();
        let b = room.clone();
        let undo = |handle: RoomHandle, user: &'static str| async move {
            handle
                .send(RoomCommand::Submit {
                    connection: ConnectionId::generate(),
                    draft: OperationDraft::new(OperationKind::Undo, format!("u-{user}"), user),
                })
                .await
        };
        let (ra, rb) = tokio::join!(undo(a, "alice"), undo(b, "bob"));
        ra.expect("send");
        rb.expect("send");

        let stats = room.stats().await.expect("stats");
        assert_eq!(stats.history.cursor, 0);
        assert!(stats.history.can_redo);
    }

    #[tokio::test]
    async fn test_submit_routes_ack_and_operation() {
        let room = spawn_room("lobby", HistoryConfig::default());
        let origin = ConnectionId::generate();
        let other = ConnectionId::generate();
        let mut rx = room.subscribe();

        room.send(RoomCommand::Submit {
            connection: origin,
            draft: draw("d1", "alice", 10),
        })
        .await
        .expect("send");

        let first = rx.recv().await.expect("delivery");
        assert_eq!(first.audience, Audience::AllExcept(origin));
        assert!(first.audience.includes(other));
        assert!(matches!(first.message, ServerMessage::Operation { .. }));

        let second = rx.recv().await.expect("delivery");
        assert_eq!(second.audience, Audience::Only(origin));
        assert!(matches!(second.message, ServerMessage::Ack { .. }));
    }

    #[tokio::test]
    async fn test_malformed_submit_is_rejected_to_origin() {
        let room = spawn_room("lobby", HistoryConfig::default());
        let origin = ConnectionId::generate();
        let mut rx = room.subscribe();

        let draft = OperationDraft {
            id: None,
            ..draw("ignored", "alice", 0)
        };
        room.send(RoomCommand::Submit {
            connection: origin,
            draft,
        })
        .await
        .expect("send");

        match next_for(&mut rx, origin).await {
            ServerMessage::Error { code, .. } => assert_eq!(code, "malformed_operation"),
            other => panic!("expected error, got {other:?}"),
        }
        let stats = room.stats().await.expect("stats");
        assert_eq!(stats.history.total_operations, 0);
    }

    #[tokio::test]
    async fn test_leave_updates_online_count() {
        let room = spawn_room("lobby", HistoryConfig::default());
        let alice = ConnectionId::generate();
        let bob = ConnectionId::generate();
        for (connection, user) in [(alice, "alice"), (bob, "bob")] {
            room.send(RoomCommand::Join {
                connection,
                user_id: user.to_string(),
            })
            .await
            .expect("send");
        }
        assert_eq!(room.stats().await.expect("stats").online, 2);

        let mut rx = room.subscribe();
        room.send(RoomCommand::Leave { connection: bob })
            .await
            .expect("send");
        match next_for(&mut rx, alice).await {
            ServerMessage::UserLeft {
                user_id, online, ..
            } => {
                assert_eq!(user_id, "bob");
                assert_eq!(online, 1);
            }
            other => panic!("expected user_left, got {other:?}"),
        }

        // Leaving twice is harmless.
        room.send(RoomCommand::Leave { connection: bob })
            .await
            .expect("send");
        assert_eq!(room.stats().await.expect("stats").online, 1);
    }

    #[tokio::test]
    async fn test_resync_targets_one_connection() {
        let room = spawn_room("lobby", HistoryConfig::default());
        let target = ConnectionId::generate();
        room.send(RoomCommand::Submit {
            connection: ConnectionId::generate(),
            draft: draw("d1", "alice", 0),
        })
        .await
        .expect("send");
        // Wait for d1 to be broadcast so the receiver only sees the resync.
        room.stats().await.expect("stats");

        let mut rx = room.subscribe();
        room.send(RoomCommand::Resync { connection: target })
            .await
            .expect("send");
        let delivery = rx.recv().await.expect("delivery");
        assert_eq!(delivery.audience, Audience::Only(target));
        match delivery.message {
            ServerMessage::Snapshot {
                room_id,
                active_operations,
                ..
            } => {
                assert_eq!(room_id, "lobby");
                assert_eq!(active_operations.len(), 1);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_registry_reuses_rooms() {
        let registry = RoomRegistry::new(HistoryConfig::default(), 4);
        assert!(registry.is_empty());

        let first = registry.get_or_create("lobby").expect("create");
        let again = registry.get_or_create("lobby").expect("get");
        assert_eq!(first.id(), again.id());
        assert_eq!(registry.len(), 1);
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_registry_limits_rooms() {
        let registry = RoomRegistry::new(HistoryConfig::default(), 2);
        let _a = registry.get_or_create("a").expect("create");
        let _b = registry.get_or_create("b").expect("create");

        let err = registry.get_or_create("c").expect_err("limit");
        assert!(matches!(err, RoomError::TooManyRooms(2)));
        assert_eq!(err.code(), "too_many_rooms");
        // Existing rooms are still reachable at the limit.
        assert!(registry.get_or_create("a").is_ok());
        assert_eq!(registry.ids(), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_registry_reaps_rooms_everyone_left() {
        let registry = RoomRegistry::new(HistoryConfig::default(), 3);
        for id in ["a", "b", "c"] {
            let room = registry.get_or_create(id).expect("create");
            let connection = ConnectionId::generate();
            room.send(RoomCommand::Join {
                connection,
                user_id: "alice".to_string(),
            })
            .await
            .expect("send");
            room.send(RoomCommand::Leave { connection })
                .await
                .expect("send");
        }
        assert_eq!(registry.len(), 3);

        let fresh = registry.get_or_create("fresh").expect("idle rooms reaped");
        assert_eq!(fresh.id(), "fresh");
        assert_eq!(registry.ids(), ["fresh"]);
    }

    #[tokio::test]
    async fn test_registry_keeps_held_and_default_rooms() {
        let registry = RoomRegistry::new(HistoryConfig::default(), 2);
        drop(registry.get_or_create(DEFAULT_ROOM).expect("create"));
        let held = registry.get_or_create("held").expect("create");

        let err = registry.get_or_create("other").expect_err("limit");
        assert!(matches!(err, RoomError::TooManyRooms(2)));
        assert_eq!(registry.ids(), ["default", "held"]);

        drop(held);
        assert!(registry.get_or_create("other").is_ok());
        assert_eq!(registry.ids(), ["default", "other"]);
    }

    #[tokio::test]
    async fn test_reaped_room_worker_stops() {
        let registry = RoomRegistry::new(HistoryConfig::default(), 1);
        let room = registry.get_or_create("old").expect("create");
        let mut rx = room.subscribe();
        drop(room);

        registry.get_or_create("new").expect("create");
        // The worker owns the last sender, so the channel closes with it.
        let closed = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .expect("worker stopped");
        assert!(matches!(closed, Err(broadcast::error::RecvError::Closed)));
    }

    #[tokio::test]
    async fn test_registry_validates_room_ids() {
        let registry = RoomRegistry::new(HistoryConfig::default(), 4);
        let err = registry.get_or_create("../etc").expect_err("invalid");
        assert!(matches!(err, RoomError::Validation(_)));
        assert_eq!(err.code(), "validation_error");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_rooms_have_independent_histories() {
        let registry = RoomRegistry::new(HistoryConfig::default(), 4);
        let lobby = registry.get_or_create("lobby").expect("create");
        let other = registry.get_or_create("other").expect("create");

        lobby
            .send(RoomCommand::Submit {
                connection: ConnectionId::generate(),
                draft: draw("d1", "alice", 0),
            })
            .await
            .expect("send");

        assert_eq!(
            lobby.stats().await.expect("stats").history.total_operations,
            1
        );
        assert_eq!(
            other.stats().await.expect("stats").history.total_operations,
            0
        );
    }
}
