use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::state::{allocation::AllocationError, room_code::RoomCodeError};

/// Errors surfaced by room operations. All of them are client-input or state-conflict
/// errors reported synchronously; none are retried server-side.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No active room has this code.
    #[error("room not found")]
    RoomNotFound,
    /// The roster is at capacity.
    #[error("room is full")]
    RoomFull,
    /// Joining is only possible while the room is waiting in the lobby.
    #[error("game already started")]
    GameAlreadyStarted,
    /// Only the host may start the game.
    #[error("only the host can start the game")]
    NotHost,
    /// Not enough players to start.
    #[error("need at least {0} players to start")]
    InsufficientPlayers(usize),
    /// The game was already started.
    #[error("game has already been started")]
    AlreadyStarted,
    /// The player is not part of this room.
    #[error("player is not in this room")]
    NotInRoom,
    /// No round is open for submissions.
    #[error("round not active")]
    RoundNotActive,
    /// The allocation failed validation.
    #[error("invalid allocation: {0}")]
    InvalidAllocation(#[from] AllocationError),
    /// The player already submitted for this round.
    #[error("allocation already submitted for this round")]
    AlreadySubmitted,
    /// No room code could be allocated.
    #[error("no room capacity available, try again later")]
    Capacity,
    /// Malformed request field.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<RoomCodeError> for ServiceError {
    fn from(err: RoomCodeError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// Caller lacks the required role.
    #[error("{0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("{0}")]
    Conflict(String),
    /// Well-formed request whose content is not acceptable.
    #[error("{0}")]
    Unprocessable(String),
    /// Service unavailable.
    #[error("{0}")]
    ServiceUnavailable(String),
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let detail = rejection.body_text();
        match rejection {
            // Syntactically valid JSON with missing fields or wrongly typed values.
            JsonRejection::JsonDataError(_) => AppError::Unprocessable(detail),
            _ => AppError::BadRequest(detail),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let detail = err.to_string();
        match err {
            ServiceError::RoomNotFound | ServiceError::NotInRoom => AppError::NotFound(detail),
            ServiceError::NotHost => AppError::Forbidden(detail),
            ServiceError::RoomFull
            | ServiceError::GameAlreadyStarted
            | ServiceError::AlreadyStarted
            | ServiceError::RoundNotActive
            | ServiceError::AlreadySubmitted => AppError::Conflict(detail),
            ServiceError::InsufficientPlayers(_) | ServiceError::InvalidInput(_) => {
                AppError::BadRequest(detail)
            }
            ServiceError::InvalidAllocation(_) => AppError::Unprocessable(detail),
            ServiceError::Capacity => AppError::ServiceUnavailable(detail),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            detail: self.to_string(),
        });

        (status, payload).into_response()
    }
}
