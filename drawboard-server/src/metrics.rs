//! Prometheus metrics for drawboard-server.
//!
//! Provides metrics collection and a Prometheus-compatible `/metrics` endpoint.

use drawboard_core::OperationKind;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// Metric names as constants for consistency
const OPERATIONS_TOTAL: &str = "drawboard_operations_total";
const HISTORY_NOOP_TOTAL: &str = "drawboard_history_noop_total";
const CONFLICTS_TOTAL: &str = "drawboard_conflicts_detected_total";
const EVICTIONS_TOTAL: &str = "drawboard_evictions_total";
const TRUNCATED_TOTAL: &str = "drawboard_truncated_operations_total";
const WS_CONNECTIONS_ACTIVE: &str = "drawboard_ws_connections_active";
const WS_MESSAGES_TOTAL: &str = "drawboard_ws_messages_total";
const VALIDATION_FAILURES_TOTAL: &str = "drawboard_validation_failures_total";
const RATE_LIMITED_TOTAL: &str = "drawboard_rate_limited_total";
const ROOMS_ACTIVE: &str = "drawboard_rooms_active";
const ROOM_PARTICIPANTS: &str = "drawboard_room_participants";

/// Initialize metrics and return the Prometheus handle.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed
/// (e.g., if another recorder is already installed).
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record a submitted operation.
///
/// # Arguments
///
/// * `kind` - Operation kind
/// * `outcome` - "applied", "noop" or "rejected"
pub fn record_operation(kind: OperationKind, outcome: &'static str) {
    counter!(
        OPERATIONS_TOTAL,
        "kind" => kind.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an undo or redo that found nothing to do.
pub fn record_history_noop(kind: OperationKind) {
    counter!(
        HISTORY_NOOP_TOTAL,
        "action" => kind.as_str()
    )
    .increment(1);
}

/// Record a contention flagged by the conflict classifier.
pub fn record_conflict() {
    counter!(CONFLICTS_TOTAL).increment(1);
}

/// Record an operation evicted by the retention bound.
pub fn record_eviction() {
    counter!(EVICTIONS_TOTAL).increment(1);
}

/// Record undone operations discarded by a new append.
pub fn record_truncated(count: usize) {
    counter!(TRUNCATED_TOTAL).increment(count as u64);
}

/// Increment active WebSocket connections.
pub fn inc_ws_connections() {
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement active WebSocket connections.
pub fn dec_ws_connections() {
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a WebSocket message.
///
/// # Arguments
///
/// * `direction` - "inbound" or "outbound"
/// * `msg_type` - Message type (e.g., "draw", "ping", "snapshot")
pub fn record_ws_message(direction: &'static str, msg_type: &'static str) {
    counter!(
        WS_MESSAGES_TOTAL,
        "direction" => direction,
        "type" => msg_type
    )
    .increment(1);
}

/// Record an input validation failure.
///
/// # Arguments
///
/// * `validation_type` - Type of validation that failed (room_id, user_id, payload, etc.)
pub fn record_validation_failure(validation_type: &'static str) {
    counter!(VALIDATION_FAILURES_TOTAL, "type" => validation_type).increment(1);
}

/// Record a rate-limited request.
///
/// # Arguments
///
/// * `source` - Source of the rate-limited request (websocket, http, etc.)
pub fn record_rate_limited(source: &'static str) {
    counter!(RATE_LIMITED_TOTAL, "source" => source).increment(1);
}

/// Update the number of live rooms.
#[allow(clippy::cast_precision_loss)]
pub fn set_rooms(count: usize) {
    gauge!(ROOMS_ACTIVE).set(count as f64);
}

/// Update the online participant count of a room.
#[allow(clippy::cast_precision_loss)]
pub fn set_room_participants(room_id: &str, count: usize) {
    gauge!(
        ROOM_PARTICIPANTS,
        "room" => room_id.to_string()
    )
    .set(count as f64);
}
