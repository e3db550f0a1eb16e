use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::RoomPhase;

/// Room phase as exposed to clients (REST and push channel).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleRoomPhase {
    /// Lobby, waiting for the host to start.
    Waiting,
    /// A round is open for allocations.
    Playing,
    /// Round results are on display.
    Scoreboard,
    /// The game is over.
    Complete,
}

impl From<RoomPhase> for VisibleRoomPhase {
    fn from(value: RoomPhase) -> Self {
        match value {
            RoomPhase::Waiting => VisibleRoomPhase::Waiting,
            RoomPhase::Playing => VisibleRoomPhase::Playing,
            RoomPhase::Scoreboard => VisibleRoomPhase::Scoreboard,
            RoomPhase::Complete => VisibleRoomPhase::Complete,
        }
    }
}
