//! Input validation for untrusted data.
//!
//! All user-supplied input MUST be validated before it reaches a room worker.
//! The history core only checks that required fields are present; the bounds
//! below keep a single client from bloating a room's log or its broadcasts.

use drawboard_core::{OperationId, PathPoint};
use thiserror::Error;

/// Maximum length for room IDs.
pub const MAX_ROOM_ID_LEN: usize = 64;
/// Maximum length for user IDs.
pub const MAX_USER_ID_LEN: usize = 64;
/// Maximum length for operation IDs (UUIDs are 36 chars, timestamps ~13).
pub const MAX_OPERATION_ID_LEN: usize = 128;
/// Maximum points in a single draw payload.
pub const MAX_PATH_POINTS: usize = 10_000;
/// Maximum brush size in pixels.
pub const MAX_BRUSH_SIZE: f64 = 512.0;
/// Maximum length of a colour string.
pub const MAX_COLOR_LEN: usize = 32;
/// Maximum length of a tool name.
pub const MAX_TOOL_LEN: usize = 32;
/// Maximum WebSocket message size.
pub const MAX_WS_MESSAGE_SIZE: usize = 1_048_576; // 1MB

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Room ID exceeds maximum length.
    #[error("room_id too long (max {MAX_ROOM_ID_LEN} chars)")]
    RoomIdTooLong,
    /// Room ID is empty or contains invalid characters.
    #[error("room_id contains invalid characters")]
    RoomIdInvalidChars,
    /// User ID exceeds maximum length.
    #[error("user_id too long (max {MAX_USER_ID_LEN} chars)")]
    UserIdTooLong,
    /// User ID is empty or contains invalid characters.
    #[error("user_id contains invalid characters")]
    UserIdInvalidChars,
    /// Operation ID exceeds maximum length.
    #[error("operation id too long (max {MAX_OPERATION_ID_LEN} chars)")]
    OperationIdTooLong,
    /// Operation ID contains control characters.
    #[error("operation id contains control characters")]
    OperationIdInvalidChars,
    /// Draw payload has too many points.
    #[error("too many points in payload (max {MAX_PATH_POINTS})")]
    TooManyPoints,
    /// A point has a NaN or infinite coordinate.
    #[error("point {0} has a non-finite coordinate")]
    NonFiniteCoordinate(usize),
    /// A point has a brush size outside `0..=MAX_BRUSH_SIZE`.
    #[error("point {0} has an invalid brush size (0..={MAX_BRUSH_SIZE})")]
    InvalidBrushSize(usize),
    /// A point's colour string is too long.
    #[error("point {0} colour too long (max {MAX_COLOR_LEN} chars)")]
    ColorTooLong(usize),
    /// A point's tool name is too long.
    #[error("point {0} tool too long (max {MAX_TOOL_LEN} chars)")]
    ToolTooLong(usize),
    /// WebSocket message exceeds maximum size.
    #[error("message too large (max {MAX_WS_MESSAGE_SIZE} bytes)")]
    MessageTooLarge,
}

impl ValidationError {
    /// Metric label for the failed check.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RoomIdTooLong | Self::RoomIdInvalidChars => "room_id",
            Self::UserIdTooLong | Self::UserIdInvalidChars => "user_id",
            Self::OperationIdTooLong | Self::OperationIdInvalidChars => "operation_id",
            Self::TooManyPoints
            | Self::NonFiniteCoordinate(_)
            | Self::InvalidBrushSize(_)
            | Self::ColorTooLong(_)
            | Self::ToolTooLong(_) => "payload",
            Self::MessageTooLarge => "message_size",
        }
    }
}

/// Check if a character is valid for IDs (alphanumeric, hyphen, or underscore).
fn is_valid_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Validate a room ID.
///
/// Valid room IDs:
/// - 1-64 characters
/// - ASCII alphanumeric, hyphen, underscore only
///
/// # Errors
///
/// Returns [`ValidationError::RoomIdTooLong`] if the ID exceeds 64 characters.
/// Returns [`ValidationError::RoomIdInvalidChars`] if the ID is empty or contains invalid characters.
pub fn validate_room_id(id: &str) -> Result<(), ValidationError> {
    if id.len() > MAX_ROOM_ID_LEN {
        return Err(ValidationError::RoomIdTooLong);
    }
    if id.is_empty() || !id.chars().all(is_valid_id_char) {
        return Err(ValidationError::RoomIdInvalidChars);
    }
    Ok(())
}

/// Validate a user ID. Same rules as room IDs.
///
/// # Errors
///
/// Returns [`ValidationError::UserIdTooLong`] if the ID exceeds 64 characters.
/// Returns [`ValidationError::UserIdInvalidChars`] if the ID is empty or contains invalid characters.
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    if id.len() > MAX_USER_ID_LEN {
        return Err(ValidationError::UserIdTooLong);
    }
    if id.is_empty() || !id.chars().all(is_valid_id_char) {
        return Err(ValidationError::UserIdInvalidChars);
    }
    Ok(())
}

/// Validate a client-assigned operation ID.
///
/// Operation IDs are opaque, so any printable text is accepted. Emptiness is
/// left to the history core, which reports it as a malformed operation.
///
/// # Errors
///
/// Returns [`ValidationError::OperationIdTooLong`] if the ID exceeds 128 characters.
/// Returns [`ValidationError::OperationIdInvalidChars`] if the ID contains control characters.
pub fn validate_operation_id(id: &OperationId) -> Result<(), ValidationError> {
    let id = id.as_str();
    if id.len() > MAX_OPERATION_ID_LEN {
        return Err(ValidationError::OperationIdTooLong);
    }
    if id.chars().any(char::is_control) {
        return Err(ValidationError::OperationIdInvalidChars);
    }
    Ok(())
}

/// Validate a draw payload.
///
/// # Errors
///
/// Returns the first violated bound, naming the offending point index.
pub fn validate_path(points: &[PathPoint]) -> Result<(), ValidationError> {
    if points.len() > MAX_PATH_POINTS {
        return Err(ValidationError::TooManyPoints);
    }
    for (index, point) in points.iter().enumerate() {
        if !point.x.is_finite() || !point.y.is_finite() {
            return Err(ValidationError::NonFiniteCoordinate(index));
        }
        if !point.size.is_finite() || !(0.0..=MAX_BRUSH_SIZE).contains(&point.size) {
            return Err(ValidationError::InvalidBrushSize(index));
        }
        if point.color.len() > MAX_COLOR_LEN {
            return Err(ValidationError::ColorTooLong(index));
        }
        if point.tool.len() > MAX_TOOL_LEN {
            return Err(ValidationError::ToolTooLong(index));
        }
    }
    Ok(())
}

/// Validate WebSocket message size.
///
/// # Errors
///
/// Returns [`ValidationError::MessageTooLarge`] if the message exceeds 1MB.
pub fn validate_message_size(size: usize) -> Result<(), ValidationError> {
    if size > MAX_WS_MESSAGE_SIZE {
        return Err(ValidationError::MessageTooLarge);
    }
    Ok(())
}
