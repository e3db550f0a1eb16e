use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::rooms::{
        ActionResponse, CreateRoomRequest, CreateRoomResponse, JoinRoomRequest, JoinRoomResponse,
        PlayerActionRequest, RoomSnapshot, RoomStateQuery, SubmitAllocationRequest,
    },
    error::AppError,
    routes::extract::{AppJson, AppPath, AppQuery},
    services::room_service,
    state::SharedState,
};

/// Room control endpoints, mounted under `/api/multiplayer`.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/api/multiplayer/create-room", post(create_room))
        .route("/api/multiplayer/join-room", post(join_room))
        .route("/api/multiplayer/{room_code}/start", post(start_game))
        .route("/api/multiplayer/{room_code}/submit", post(submit_allocation))
        .route("/api/multiplayer/{room_code}/leave", post(leave_room))
        .route("/api/multiplayer/{room_code}/state", get(room_state))
}

/// Open a new room; the caller becomes its host.
#[utoipa::path(
    post,
    path = "/api/multiplayer/create-room",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = CreateRoomResponse),
        (status = 400, description = "Invalid display name"),
        (status = 422, description = "Malformed request body"),
        (status = 503, description = "No room capacity left")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    AppJson(payload): AppJson<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, AppError> {
    payload.validate()?;
    Ok(Json(room_service::create_room(&state, payload).await?))
}

/// Join a waiting room by code.
#[utoipa::path(
    post,
    path = "/api/multiplayer/join-room",
    tag = "rooms",
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Joined the room", body = JoinRoomResponse),
        (status = 400, description = "Invalid display name or room code"),
        (status = 404, description = "Unknown room"),
        (status = 409, description = "Room full or game already started"),
        (status = 422, description = "Malformed request body")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    AppJson(payload): AppJson<JoinRoomRequest>,
) -> Result<Json<JoinRoomResponse>, AppError> {
    payload.validate()?;
    Ok(Json(room_service::join_room(&state, payload).await?))
}

/// Start the game (host only).
#[utoipa::path(
    post,
    path = "/api/multiplayer/{room_code}/start",
    tag = "rooms",
    params(("room_code" = String, Path, description = "Six-character room code")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Game started", body = ActionResponse),
        (status = 400, description = "Not enough players"),
        (status = 403, description = "Requester is not the host"),
        (status = 404, description = "Unknown room"),
        (status = 409, description = "Game already started")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    AppPath(room_code): AppPath<String>,
    AppJson(payload): AppJson<PlayerActionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        room_service::start_game(&state, &room_code, payload).await?,
    ))
}

/// Submit an allocation for the open round.
#[utoipa::path(
    post,
    path = "/api/multiplayer/{room_code}/submit",
    tag = "rooms",
    params(("room_code" = String, Path, description = "Six-character room code")),
    request_body = SubmitAllocationRequest,
    responses(
        (status = 200, description = "Allocation recorded", body = ActionResponse),
        (status = 404, description = "Unknown room or player"),
        (status = 409, description = "No open round or already submitted"),
        (status = 422, description = "Malformed body, allocation not summing to 100 or unknown tickers")
    )
)]
pub async fn submit_allocation(
    State(state): State<SharedState>,
    AppPath(room_code): AppPath<String>,
    AppJson(payload): AppJson<SubmitAllocationRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        room_service::submit_allocation(&state, &room_code, payload).await?,
    ))
}

/// Leave the room.
#[utoipa::path(
    post,
    path = "/api/multiplayer/{room_code}/leave",
    tag = "rooms",
    params(("room_code" = String, Path, description = "Six-character room code")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Player left", body = ActionResponse),
        (status = 404, description = "Unknown room or player")
    )
)]
pub async fn leave_room(
    State(state): State<SharedState>,
    AppPath(room_code): AppPath<String>,
    AppJson(payload): AppJson<PlayerActionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        room_service::leave_room(&state, &room_code, payload).await?,
    ))
}

/// Read the room state as seen by one player.
#[utoipa::path(
    get,
    path = "/api/multiplayer/{room_code}/state",
    tag = "rooms",
    params(
        ("room_code" = String, Path, description = "Six-character room code"),
        RoomStateQuery
    ),
    responses(
        (status = 200, description = "Current room state", body = RoomSnapshot),
        (status = 404, description = "Unknown room or player")
    )
)]
pub async fn room_state(
    State(state): State<SharedState>,
    AppPath(room_code): AppPath<String>,
    AppQuery(query): AppQuery<RoomStateQuery>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(
        room_service::room_state(&state, &room_code, &query.player_id).await?,
    ))
}
