//! # Drawboard Server Library
//!
//! Shared types and functionality for the drawboard server.
//! This library is used by both the binary and integration tests.

use std::sync::Arc;

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod health;
pub mod metrics;
pub mod protocol;
pub mod rate_limit;
pub mod room;
pub mod routes;
pub mod validation;

pub use config::{CliArgs, LogFormat, ServerConfig};
pub use room::{RoomError, RoomHandle, RoomRegistry, DEFAULT_ROOM};
pub use routes::router;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// All rooms, created on first use.
    pub rooms: RoomRegistry,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create the state and start the default room.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the default room cannot be created.
    pub fn new(config: ServerConfig) -> Result<Self, RoomError> {
        let rooms = RoomRegistry::new(config.history, config.max_rooms);
        rooms.get_or_create(DEFAULT_ROOM)?;
        Ok(Self {
            rooms,
            config: Arc::new(config),
        })
    }
}
