use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::rooms::{LeaderboardEntry, PlayerSummary, RoomSnapshot};

/// Envelope pushed to players: `{"type": ..., "payload": {...}}`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum PushMessage {
    PlayerJoined(PlayerJoinedEvent),
    PlayerLeft(PlayerLeftEvent),
    PlayerReconnected(PlayerReconnectedEvent),
    RoundStart(RoundStartEvent),
    PlayerSubmitted(PlayerSubmittedEvent),
    RoundEnd(RoundEndEvent),
    GameComplete(GameCompleteEvent),
    RoomSnapshot(RoomSnapshot),
}

impl PushMessage {
    /// Wire name of the message type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            PushMessage::PlayerJoined(_) => "player_joined",
            PushMessage::PlayerLeft(_) => "player_left",
            PushMessage::PlayerReconnected(_) => "player_reconnected",
            PushMessage::RoundStart(_) => "round_start",
            PushMessage::PlayerSubmitted(_) => "player_submitted",
            PushMessage::RoundEnd(_) => "round_end",
            PushMessage::GameComplete(_) => "game_complete",
            PushMessage::RoomSnapshot(_) => "room_snapshot",
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// A player joined the lobby.
pub struct PlayerJoinedEvent {
    pub player_id: Uuid,
    pub display_name: String,
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// A player left the lobby or lost their connection; carries the (possibly new) host.
pub struct PlayerLeftEvent {
    pub player_id: Uuid,
    pub players: Vec<PlayerSummary>,
    pub host_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// A previously disconnected player is back.
pub struct PlayerReconnectedEvent {
    pub player_id: Uuid,
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// A round opened for allocations.
pub struct RoundStartEvent {
    pub current_round: usize,
    pub total_rounds: usize,
    /// Round duration in seconds.
    pub timer_duration: u64,
    pub tickers: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Someone submitted; only the count is revealed, never the allocation.
pub struct PlayerSubmittedEvent {
    pub player_id: Uuid,
    pub submitted_count: usize,
    pub total_players: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// The round was scored.
pub struct RoundEndEvent {
    pub round: usize,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Final standings after the last round.
pub struct GameCompleteEvent {
    pub final_leaderboard: Vec<LeaderboardEntry>,
}
