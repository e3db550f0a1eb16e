//! Request and response bodies of the room control API.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        format_system_time,
        phase::VisibleRoomPhase,
        validation::{validate_display_name, validate_room_code},
    },
    state::room::{Player, PlayerId, Room},
};

/// Payload for opening a new room; the caller becomes its host.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    #[validate(custom(function = "validate_display_name"))]
    pub display_name: String,
}

/// Payload for joining an existing room by code.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    #[validate(custom(function = "validate_room_code"))]
    pub room_code: String,
    #[validate(custom(function = "validate_display_name"))]
    pub display_name: String,
}

/// Payload identifying the acting player (start, leave).
#[derive(Debug, Deserialize, ToSchema)]
pub struct PlayerActionRequest {
    pub player_id: String,
}

/// A player's allocation for the open round: ticker to whole percentage.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitAllocationRequest {
    pub player_id: String,
    #[schema(value_type = Object)]
    pub allocations: IndexMap<String, f64>,
}

/// Query identifying the caller when reading room state.
#[derive(Debug, Deserialize, IntoParams)]
pub struct RoomStateQuery {
    /// Player whose submission status is reported.
    pub player_id: String,
}

/// Response to a successful room creation.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateRoomResponse {
    pub room_code: String,
    pub player_id: Uuid,
    pub host_id: Uuid,
}

/// Response to a successful join.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinRoomResponse {
    pub room_code: String,
    pub player_id: Uuid,
    pub host_id: Uuid,
    pub players: Vec<PlayerSummary>,
}

/// Generic acknowledgement for control actions.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub status: String,
}

impl ActionResponse {
    /// Build an acknowledgement carrying `status`.
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

/// Public projection of a roster entry.
#[derive(Clone, Debug, Serialize, ToSchema, PartialEq)]
pub struct PlayerSummary {
    pub player_id: Uuid,
    pub display_name: String,
    pub is_host: bool,
    pub connected: bool,
}

impl PlayerSummary {
    /// Project `player`, flagging the host.
    pub fn from_player(player: &Player, host_id: PlayerId) -> Self {
        Self {
            player_id: player.id,
            display_name: player.display_name.clone(),
            is_host: player.id == host_id,
            connected: player.connected,
        }
    }
}

/// One line of the leaderboard.
#[derive(Clone, Debug, Serialize, ToSchema, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: Uuid,
    pub display_name: String,
    pub round_return: f64,
    pub round_score: u32,
    pub total_score: u64,
}

/// Full room state for a single player, sent on (re)connect and served by the state route.
///
/// Enough to rebuild phase, round, roster and whether the caller already submitted.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RoomSnapshot {
    pub room_code: String,
    pub phase: VisibleRoomPhase,
    pub current_round: usize,
    pub total_rounds: usize,
    /// Full round duration in seconds.
    pub timer_duration: u64,
    /// Seconds left in the open round; present only while playing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_remaining: Option<u64>,
    pub host_id: Uuid,
    pub players: Vec<PlayerSummary>,
    pub submitted_count: usize,
    pub has_submitted: bool,
    /// Tickers tradable in the current round; empty outside of a game.
    pub tickers: Vec<String>,
    /// Latest standings; present once at least one round has been scored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
    pub created_at: String,
}

/// Roster of `room` in join order.
pub fn roster(room: &Room) -> Vec<PlayerSummary> {
    room.players()
        .iter()
        .map(|player| PlayerSummary::from_player(player, room.host_id()))
        .collect()
}

/// Wall-clock creation time of `room` as RFC 3339.
pub fn room_created_at(room: &Room) -> String {
    format_system_time(room.created_at())
}
