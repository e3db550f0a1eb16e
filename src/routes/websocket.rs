use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{routes::extract::AppPath, services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/api/multiplayer/ws/{room_code}/{player_id}",
    tag = "push",
    params(
        ("room_code" = String, Path, description = "Six-character room code"),
        ("player_id" = String, Path, description = "Identifier returned by create-room or join-room")
    ),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a player's push channel.
pub async fn ws_handler(
    State(state): State<SharedState>,
    AppPath((room_code, player_id)): AppPath<(String, String)>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        websocket_service::handle_socket(state, socket, room_code, player_id)
    })
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/api/multiplayer/ws/{room_code}/{player_id}", get(ws_handler))
}
