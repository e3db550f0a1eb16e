use axum::extract::ws::Utf8Bytes;
use tracing::{debug, warn};

use crate::{
    config::AppConfig,
    dto::{
        rooms::{RoomSnapshot, roster},
        ws::{
            GameCompleteEvent, PlayerJoinedEvent, PlayerLeftEvent, PlayerReconnectedEvent,
            PlayerSubmittedEvent, PushMessage, RoundEndEvent, RoundStartEvent,
        },
    },
    services::scoring,
    state::room::{PlayerId, Room, SubmitProgress},
};

// Every broadcast below is issued while the caller holds the room lock, so all players
// receive the messages of one transition before any message of the next one.

/// Announce a new lobby member with the updated roster.
pub fn broadcast_player_joined(room: &mut Room, player_id: PlayerId) {
    let Some(player) = room.player(&player_id) else {
        return;
    };
    let payload = PlayerJoinedEvent {
        player_id,
        display_name: player.display_name.clone(),
        players: roster(room),
    };
    send_room_event(room, &PushMessage::PlayerJoined(payload));
}

/// Announce a departure (leave or disconnect) along with the current host.
pub fn broadcast_player_left(room: &mut Room, player_id: PlayerId) {
    let payload = PlayerLeftEvent {
        player_id,
        players: roster(room),
        host_id: room.host_id(),
    };
    send_room_event(room, &PushMessage::PlayerLeft(payload));
}

/// Announce that a disconnected player is back.
pub fn broadcast_player_reconnected(room: &mut Room, player_id: PlayerId) {
    let payload = PlayerReconnectedEvent {
        player_id,
        players: roster(room),
    };
    send_room_event(room, &PushMessage::PlayerReconnected(payload));
}

/// Announce the round that was just opened.
pub fn broadcast_round_start(room: &mut Room, config: &AppConfig) {
    let current_round = room.current_round();
    let tickers = config
        .round(current_round)
        .map(|table| table.tickers())
        .unwrap_or_default();
    let payload = RoundStartEvent {
        current_round,
        total_rounds: room.total_rounds(),
        timer_duration: config.round_duration.as_secs(),
        tickers,
    };
    send_room_event(room, &PushMessage::RoundStart(payload));
}

/// Report submission progress without revealing the allocation.
pub fn broadcast_player_submitted(room: &mut Room, player_id: PlayerId, progress: SubmitProgress) {
    let payload = PlayerSubmittedEvent {
        player_id,
        submitted_count: progress.submitted,
        total_players: progress.total,
    };
    send_room_event(room, &PushMessage::PlayerSubmitted(payload));
}

/// Publish the leaderboard of the round that was just scored.
pub fn broadcast_round_end(room: &mut Room) {
    let payload = RoundEndEvent {
        round: room.current_round(),
        leaderboard: scoring::standings(room.players()),
    };
    send_room_event(room, &PushMessage::RoundEnd(payload));
}

/// Publish the final standings.
pub fn broadcast_game_complete(room: &mut Room) {
    let payload = GameCompleteEvent {
        final_leaderboard: scoring::standings(room.players()),
    };
    send_room_event(room, &PushMessage::GameComplete(payload));
}

/// Send the resync snapshot to a single (re)connecting player.
pub fn send_snapshot(room: &mut Room, player_id: PlayerId, snapshot: RoomSnapshot) -> bool {
    let Some(text) = serialize(&PushMessage::RoomSnapshot(snapshot)) else {
        return false;
    };
    room.hub_mut().send_to(player_id, text)
}

fn send_room_event(room: &mut Room, message: &PushMessage) {
    if room.hub().is_empty() {
        return;
    }
    let Some(text) = serialize(message) else {
        return;
    };
    let failed = room.hub_mut().broadcast(text);
    debug!(
        room = %room.code(),
        kind = message.kind(),
        recipients = room.hub().len(),
        failed = failed.len(),
        "push event sent"
    );
}

fn serialize(message: &PushMessage) -> Option<Utf8Bytes> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Utf8Bytes::from(text)),
        Err(err) => {
            warn!(kind = message.kind(), error = %err, "failed to serialize push event");
            None
        }
    }
}
