//! # WebSocket Connections
//!
//! One task per connection. It parses client frames, stamps and validates
//! operations, queues them on the current room and forwards the room's
//! deliveries addressed to it.
//!
//! On connect the task joins [`DEFAULT_ROOM`] and sends `welcome`; the join
//! snapshot follows through the room's broadcast channel.

use axum::extract::ws::{Message, WebSocket};
use drawboard_core::{now_ms, OperationDraft, OperationId, OperationKind};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::broadcast::{ConnectionId, Delivery};
use crate::metrics::{
    dec_ws_connections, inc_ws_connections, record_rate_limited, record_validation_failure,
    record_ws_message,
};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::{RoomCommand, RoomError, RoomHandle, RoomRegistry, DEFAULT_ROOM};
use crate::validation::{
    validate_message_size, validate_operation_id, validate_path, validate_user_id,
    ValidationError,
};
use crate::AppState;

type WsSender = SplitSink<WebSocket, Message>;

/// What to do with an event from the room.
#[derive(Debug)]
enum Forward {
    /// Send this message to the client.
    Send(ServerMessage),
    /// Not addressed to this connection.
    Skip,
    /// The room is gone.
    Closed,
}

/// Per-connection state.
struct Session {
    connection_id: ConnectionId,
    user_id: String,
    room: RoomHandle,
    events: broadcast::Receiver<Delivery>,
}

impl Session {
    fn new(connection_id: ConnectionId, room: RoomHandle) -> Self {
        // Subscribe before joining so the join snapshot cannot be missed.
        let events = room.subscribe();
        Self {
            connection_id,
            user_id: connection_id.default_user_id(),
            room,
            events,
        }
    }

    fn welcome(&self) -> ServerMessage {
        ServerMessage::Welcome {
            version: env!("CARGO_PKG_VERSION").to_string(),
            connection_id: self.connection_id.to_string(),
            room_id: self.room.id().to_string(),
            user_id: self.user_id.clone(),
            timestamp: now_ms(),
        }
    }

    async fn enter(&self) -> Result<(), RoomError> {
        self.room
            .send(RoomCommand::Join {
                connection: self.connection_id,
                user_id: self.user_id.clone(),
            })
            .await
    }

    async fn leave(&self) {
        // A closed room has no participants left to notify.
        let _ = self
            .room
            .send(RoomCommand::Leave {
                connection: self.connection_id,
            })
            .await;
    }

    /// Handle a parsed client message. Returns a direct reply, if any.
    async fn handle_message(
        &mut self,
        rooms: &RoomRegistry,
        msg: ClientMessage,
    ) -> Option<ServerMessage> {
        match msg {
            ClientMessage::Join { room_id, user_id } => self.join(rooms, room_id, user_id).await,
            ClientMessage::Draw { operation } => {
                self.submit(OperationKind::Draw, Some(operation)).await
            }
            ClientMessage::Undo { operation } => self.submit(OperationKind::Undo, operation).await,
            ClientMessage::Redo { operation } => self.submit(OperationKind::Redo, operation).await,
            ClientMessage::Clear { operation } => {
                self.submit(OperationKind::Clear, operation).await
            }
            ClientMessage::RequestSnapshot => self.resync().await,
            ClientMessage::Ping => Some(ServerMessage::Pong {
                timestamp: now_ms(),
            }),
        }
    }

    async fn join(
        &mut self,
        rooms: &RoomRegistry,
        room_id: Option<String>,
        user_id: Option<String>,
    ) -> Option<ServerMessage> {
        if let Some(user_id) = &user_id {
            if let Err(e) = validate_user_id(user_id) {
                return Some(validation_error(&e, None));
            }
        }

        let target = match room_id {
            Some(room_id) => match rooms.get_or_create(&room_id) {
                Ok(room) => room,
                Err(e) => {
                    if let RoomError::Validation(v) = &e {
                        record_validation_failure(v.kind());
                    }
                    return Some(ServerMessage::error(e.code(), e.to_string(), None));
                }
            },
            None => self.room.clone(),
        };

        self.leave().await;
        if let Some(user_id) = user_id {
            self.user_id = user_id;
        }
        self.events = target.subscribe();
        self.room = target;

        tracing::info!(
            connection_id = %self.connection_id,
            room_id = %self.room.id(),
            user_id = %self.user_id,
            "Connection joined room"
        );

        if let Err(e) = self.enter().await {
            return Some(ServerMessage::error(e.code(), e.to_string(), None));
        }
        Some(self.welcome())
    }

    async fn submit(
        &self,
        kind: OperationKind,
        draft: Option<OperationDraft>,
    ) -> Option<ServerMessage> {
        let mut draft = draft.unwrap_or_default();
        // The envelope decides the kind; history requests may omit their id.
        draft.kind = Some(kind);
        if kind != OperationKind::Draw && draft.id.is_none() {
            draft.id = Some(OperationId::generate());
        }

        // An empty user_id counts as missing and is stamped like one.
        if draft.user_id.as_deref() == Some("") {
            draft.user_id = None;
        }
        let user_id = draft.user_id.get_or_insert_with(|| self.user_id.clone());
        if *user_id != self.user_id {
            let message = format!(
                "Operation user_id {user_id} does not match connection identity {}",
                self.user_id
            );
            tracing::warn!(connection_id = %self.connection_id, "{}", message);
            return Some(ServerMessage::error("user_mismatch", message, draft.id));
        }

        if let Err(e) = validate_draft(&draft) {
            return Some(validation_error(&e, draft.id));
        }

        let submit = RoomCommand::Submit {
            connection: self.connection_id,
            draft,
        };
        match self.room.send(submit).await {
            Ok(()) => None,
            Err(e) => Some(ServerMessage::error(e.code(), e.to_string(), None)),
        }
    }

    /// Decide what to do with one event from the room's broadcast channel.
    ///
    /// A lagged receiver has lost deliveries, so it asks the room for a
    /// fresh snapshot, which arrives behind the deliveries still buffered.
    async fn on_event(&self, event: Result<Delivery, broadcast::error::RecvError>) -> Forward {
        match event {
            Ok(delivery) if delivery.audience.includes(self.connection_id) => {
                Forward::Send(delivery.message)
            }
            Ok(_) => Forward::Skip,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    room_id = %self.room.id(),
                    "Lagged behind by {} messages, resyncing",
                    n
                );
                self.resync().await.map_or(Forward::Skip, Forward::Send)
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!(room_id = %self.room.id(), "Room channel closed");
                Forward::Closed
            }
        }
    }

    async fn resync(&self) -> Option<ServerMessage> {
        let resync = RoomCommand::Resync {
            connection: self.connection_id,
        };
        match self.room.send(resync).await {
            Ok(()) => None,
            Err(e) => Some(ServerMessage::error(e.code(), e.to_string(), None)),
        }
    }
}

fn validate_draft(draft: &OperationDraft) -> Result<(), ValidationError> {
    if let Some(id) = &draft.id {
        validate_operation_id(id)?;
    }
    validate_path(&draft.payload)
}

fn validation_error(err: &ValidationError, operation_id: Option<OperationId>) -> ServerMessage {
    record_validation_failure(err.kind());
    ServerMessage::error("validation_error", err.to_string(), operation_id)
}

/// Serialize and send a message. Returns `false` if the socket is gone.
async fn send_message(sender: &mut WsSender, message: &ServerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => {
            record_ws_message("outbound", message.msg_type());
            sender.send(Message::Text(json.into())).await.is_ok()
        }
        Err(e) => {
            tracing::error!("Failed to serialize {} message: {}", message.msg_type(), e);
            true
        }
    }
}

/// Handle a WebSocket connection until the client goes away.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = ConnectionId::generate();

    let room = match state.rooms.get_or_create(DEFAULT_ROOM) {
        Ok(room) => room,
        Err(e) => {
            tracing::error!(connection_id = %connection_id, "Cannot open default room: {}", e);
            let error = ServerMessage::error(e.code(), e.to_string(), None);
            let _ = send_message(&mut sender, &error).await;
            return;
        }
    };

    let mut session = Session::new(connection_id, room);
    let mut rate_limiter = state.config.rate_limiter();
    inc_ws_connections();
    tracing::info!(
        connection_id = %connection_id,
        user_id = %session.user_id,
        "WebSocket connection opened"
    );

    if send_message(&mut sender, &session.welcome()).await && session.enter().await.is_ok() {
        loop {
            tokio::select! {
                // Handle incoming WebSocket messages
                msg = receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            // Check rate limit first
                            if !rate_limiter.try_consume() {
                                tracing::warn!(connection_id = %connection_id, "Rate limit exceeded");
                                record_rate_limited("websocket");
                                let error = ServerMessage::error(
                                    "rate_limited",
                                    format!("Rate limit exceeded. Retry after {}ms", rate_limiter.retry_after_ms()),
                                    None,
                                );
                                if !send_message(&mut sender, &error).await {
                                    break;
                                }
                                continue;
                            }

                            // Validate message size before processing
                            if let Err(e) = validate_message_size(text.len()) {
                                tracing::warn!(connection_id = %connection_id, "Message rejected: {}", e);
                                record_validation_failure(e.kind());
                                let error = ServerMessage::error("message_too_large", e.to_string(), None);
                                if !send_message(&mut sender, &error).await {
                                    break;
                                }
                                continue;
                            }

                            tracing::trace!(connection_id = %connection_id, "Received: {}", text.as_str());

                            let reply = match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(client_msg) => {
                                    record_ws_message("inbound", client_msg.msg_type());
                                    session.handle_message(&state.rooms, client_msg).await
                                }
                                Err(e) => Some(ServerMessage::error("parse_error", e.to_string(), None)),
                            };
                            if let Some(reply) = reply {
                                if !send_message(&mut sender, &reply).await {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!(connection_id = %connection_id, "Client closed connection");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::error!(connection_id = %connection_id, "WebSocket error: {}", e);
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }

                // Forward room deliveries addressed to this connection
                event = session.events.recv() => {
                    match session.on_event(event).await {
                        Forward::Send(message) => {
                            if !send_message(&mut sender, &message).await {
                                break;
                            }
                        }
                        Forward::Skip => {}
                        Forward::Closed => break,
                    }
                }
            }
        }
    }

    session.leave().await;
    dec_ws_connections();
    tracing::info!(
        connection_id = %connection_id,
        user_id = %session.user_id,
        "WebSocket connection closed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::EVENT_CHANNEL_CAPACITY;
    use drawboard_core::{HistoryConfig, PathPoint};
    use std::time::Duration;

    fn session() -> (Session, RoomRegistry) {
        let rooms = RoomRegistry::new(HistoryConfig::default(), 8);
        let room = rooms.get_or_create(DEFAULT_ROOM).expect("room");
        (Session::new(ConnectionId::generate(), room), rooms)
    }

    fn error_code(reply: Option<ServerMessage>) -> String {
        match reply {
            Some(ServerMessage::Error { code, .. }) => code,
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_welcome_uses_generated_identity() {
        let (session, _rooms) = session();
        match session.welcome() {
            ServerMessage::Welcome {
                room_id, user_id, ..
            } => {
                assert_eq!(room_id, DEFAULT_ROOM);
                assert!(user_id.starts_with("user-"));
                assert!(validate_user_id(&user_id).is_ok());
            }
            other => panic!("expected welcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_stamps_missing_user() {
        let (session, _rooms) = session();
        let draft = OperationDraft {
            id: Some(OperationId::from("d1")),
            payload: vec![PathPoint::new(0.0, 0.0)],
            ..OperationDraft::default()
        };
        let reply = session.submit(OperationKind::Draw, Some(draft)).await;
        assert!(reply.is_none());

        let stats = session.room.stats().await.expect("stats");
        assert_eq!(stats.history.total_operations, 1);
        let snapshot = session.room.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.active_operations[0].user_id, session.user_id);
    }

    #[tokio::test]
    async fn test_submit_stamps_empty_user() {
        let (session, _rooms) = session();
        let draft = OperationDraft::new(OperationKind::Draw, "d1", "")
            .with_payload(vec![PathPoint::new(0.0, 0.0)]);
        let reply = session.submit(OperationKind::Draw, Some(draft)).await;
        assert!(reply.is_none());

        let snapshot = session.room.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.active_operations.len(), 1);
        assert_eq!(snapshot.active_operations[0].user_id, session.user_id);
    }

    #[tokio::test]
    async fn test_submit_rejects_foreign_user() {
        let (session, _rooms) = session();
        let draft = OperationDraft::new(OperationKind::Draw, "d1", "mallory");
        let reply = session.submit(OperationKind::Draw, Some(draft)).await;
        assert_eq!(error_code(reply), "user_mismatch");

        let stats = session.room.stats().await.expect("stats");
        assert_eq!(stats.history.total_operations, 0);
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_payload() {
        let (session, _rooms) = session();
        let mut point = PathPoint::new(0.0, 0.0);
        point.size = f64::INFINITY;
        let draft = OperationDraft {
            id: Some(OperationId::from("d1")),
            payload: vec![point],
            ..OperationDraft::default()
        };
        let reply = session.submit(OperationKind::Draw, Some(draft)).await;
        assert_eq!(error_code(reply), "validation_error");
    }

    #[tokio::test]
    async fn test_bare_undo_gets_an_id() {
        let (session, _rooms) = session();
        let mut events = session.room.subscribe();
        assert!(session.submit(OperationKind::Undo, None).await.is_none());

        // Empty history: the origin hears back with an error naming the request id.
        let delivery = events.recv().await.expect("delivery");
        assert!(delivery.audience.includes(session.connection_id));
        match delivery.message {
            ServerMessage::Error {
                code, operation_id, ..
            } => {
                assert_eq!(code, "nothing_to_undo");
                assert!(operation_id.is_some_and(|id| !id.is_empty()));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_join_switches_room_and_identity() {
        let (mut session, rooms) = session();
        session.enter().await.expect("enter");

        let reply = session
            .handle_message(
                &rooms,
                ClientMessage::Join {
                    room_id: Some("lobby".to_string()),
                    user_id: Some("alice".to_string()),
                },
            )
            .await;
        match reply {
            Some(ServerMessage::Welcome {
                room_id, user_id, ..
            }) => {
                assert_eq!(room_id, "lobby");
                assert_eq!(user_id, "alice");
            }
            other => panic!("expected welcome, got {other:?}"),
        }

        let lobby = rooms.get("lobby").expect("lobby exists");
        assert_eq!(lobby.stats().await.expect("stats").online, 1);
        let default = rooms.get(DEFAULT_ROOM).expect("default exists");
        assert_eq!(default.stats().await.expect("stats").online, 0);
    }

    #[tokio::test]
    async fn test_join_rejects_invalid_ids() {
        let (mut session, rooms) = session();
        let reply = session
            .handle_message(
                &rooms,
                ClientMessage::Join {
                    room_id: None,
                    user_id: Some("not valid!".to_string()),
                },
            )
            .await;
        assert_eq!(error_code(reply), "validation_error");

        let reply = session
            .handle_message(
                &rooms,
                ClientMessage::Join {
                    room_id: Some("a/b".to_string()),
                    user_id: None,
                },
            )
            .await;
        assert_eq!(error_code(reply), "validation_error");
        assert_eq!(session.room.id(), DEFAULT_ROOM);
    }

    #[tokio::test]
    async fn test_lagged_session_resyncs_to_room_state() {
        let (mut session, _rooms) = session();
        let other = ConnectionId::generate();
        let draws = EVENT_CHANNEL_CAPACITY + 50;
        for i in 0..draws {
            let draft = OperationDraft::new(OperationKind::Draw, format!("d{i}"), "bob")
                .with_payload(vec![PathPoint::new(0.0, 0.0)]);
            session
                .room
                .send(RoomCommand::Submit {
                    connection: other,
                    draft,
                })
                .await
                .expect("submit");
        }
        // Stats are answered in queue order, so every draw has been broadcast.
        session.room.stats().await.expect("stats");

        let mut lagged = false;
        let resynced = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = session.events.recv().await;
                lagged |= matches!(event, Err(broadcast::error::RecvError::Lagged(_)));
                match session.on_event(event).await {
                    Forward::Send(ServerMessage::Snapshot {
                        active_operations,
                        cursor,
                        ..
                    }) => break (active_operations, cursor),
                    Forward::Send(_) | Forward::Skip => {}
                    Forward::Closed => panic!("room closed"),
                }
            }
        })
        .await
        .expect("resync snapshot");

        assert!(lagged);
        let expected = session.room.snapshot().await.expect("snapshot");
        assert_eq!(resynced.0, expected.active_operations);
        assert_eq!(resynced.1, expected.cursor);
        assert_eq!(resynced.0.len(), draws);
    }

    #[tokio::test]
    async fn test_events_for_other_connections_are_skipped() {
        let (session, _rooms) = session();
        let other = ConnectionId::generate();
        let delivery = Delivery::only(other, ServerMessage::Pong { timestamp: 0 });
        assert!(matches!(session.on_event(Ok(delivery)).await, Forward::Skip));

        let delivery = Delivery::others(other, ServerMessage::Pong { timestamp: 0 });
        assert!(matches!(
            session.on_event(Ok(delivery)).await,
            Forward::Send(ServerMessage::Pong { .. })
        ));

        let closed = Err(broadcast::error::RecvError::Closed);
        assert!(matches!(session.on_event(closed).await, Forward::Closed));
    }

    #[tokio::test]
    async fn test_ping_replies_pong() {
        let (mut session, rooms) = session();
        let reply = session.handle_message(&rooms, ClientMessage::Ping).await;
        assert!(matches!(reply, Some(ServerMessage::Pong { .. })));
    }
}
