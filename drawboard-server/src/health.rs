//! Health check endpoints for Kubernetes probes.
//!
//! Provides liveness and readiness probes for container orchestration:
//! - `/health/live` - Liveness probe (restart if fails)
//! - `/health/ready` - Readiness probe (remove from LB if fails)
//! - `/health` - Combined check for backward compatibility

use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::{AppState, DEFAULT_ROOM};

/// How long the default room may take to answer a readiness check.
const READINESS_TIMEOUT: Duration = Duration::from_secs(1);

/// Health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Overall status: "healthy" or "unhealthy"
    pub status: &'static str,
    /// Server version
    pub version: &'static str,
    /// Individual component checks
    pub checks: HealthChecks,
    /// Number of rooms
    pub rooms: usize,
}

/// Individual health checks.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Room registry holds the default room
    pub room_registry: bool,
    /// Default room worker answers queries
    pub default_room: bool,
}

/// Liveness probe - is the server running?
///
/// Returns 200 OK if the process is alive.
/// Kubernetes will restart the pod if this fails.
#[tracing::instrument(name = "liveness_probe")]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe - is the server ready to accept traffic?
///
/// Round-trips a stats query through the default room's worker, which
/// proves the worker is alive and not stuck behind a full queue.
/// Kubernetes will remove the pod from the load balancer if this fails.
#[tracing::instrument(name = "readiness_probe", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let default_room = state.rooms.get(DEFAULT_ROOM);
    let registry_ok = default_room.is_some();

    let room_ok = match default_room {
        Some(room) => matches!(
            tokio::time::timeout(READINESS_TIMEOUT, room.stats()).await,
            Ok(Ok(_))
        ),
        None => false,
    };

    let all_ok = registry_ok && room_ok;
    if !all_ok {
        tracing::warn!(registry_ok, room_ok, "Readiness check failed");
    }

    let status = HealthStatus {
        status: if all_ok { "healthy" } else { "unhealthy" },
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            room_registry: registry_ok,
            default_room: room_ok,
        },
        rooms: state.rooms.len(),
    };

    let code = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(status))
}
