use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the multiplayer room server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::start_game,
        crate::routes::rooms::submit_allocation,
        crate::routes::rooms::leave_room,
        crate::routes::rooms::room_state,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::phase::VisibleRoomPhase,
            crate::dto::rooms::CreateRoomRequest,
            crate::dto::rooms::CreateRoomResponse,
            crate::dto::rooms::JoinRoomRequest,
            crate::dto::rooms::JoinRoomResponse,
            crate::dto::rooms::PlayerActionRequest,
            crate::dto::rooms::SubmitAllocationRequest,
            crate::dto::rooms::ActionResponse,
            crate::dto::rooms::PlayerSummary,
            crate::dto::rooms::LeaderboardEntry,
            crate::dto::rooms::RoomSnapshot,
            crate::dto::ws::PlayerJoinedEvent,
            crate::dto::ws::PlayerLeftEvent,
            crate::dto::ws::PlayerReconnectedEvent,
            crate::dto::ws::RoundStartEvent,
            crate::dto::ws::PlayerSubmittedEvent,
            crate::dto::ws::RoundEndEvent,
            crate::dto::ws::GameCompleteEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room control: create, join, start, submit, leave"),
        (name = "push", description = "Per-player WebSocket push channel"),
    )
)]
pub struct ApiDoc;
