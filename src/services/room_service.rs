use axum::extract::ws::Message;
use tokio::{sync::mpsc, time::Instant};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::rooms::{
        ActionResponse, CreateRoomRequest, CreateRoomResponse, JoinRoomRequest, JoinRoomResponse,
        PlayerActionRequest, RoomSnapshot, SubmitAllocationRequest, room_created_at, roster,
    },
    error::ServiceError,
    services::{push_events, round_service, scoring},
    state::{
        SharedState,
        hub::{ConnectionId, Detach},
        registry::SharedRoom,
        room::{Player, PlayerId, Presence, Room},
        room_code::RoomCode,
        state_machine::RoomPhase,
    },
};

/// Open a new lobby with the caller as host.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<CreateRoomResponse, ServiceError> {
    let config = state.config();
    let host = Player::new(Uuid::new_v4(), request.display_name.trim().to_string());
    let host_id = host.id;

    let (code, _) = state
        .rooms()
        .create(host, config.total_rounds(), config.max_rooms)?;
    info!(room = %code, host_id = %host_id, "room created");

    Ok(CreateRoomResponse {
        room_code: code.to_string(),
        player_id: host_id,
        host_id,
    })
}

/// Add a player to a waiting room and announce them to everyone already connected.
pub async fn join_room(
    state: &SharedState,
    request: JoinRoomRequest,
) -> Result<JoinRoomResponse, ServiceError> {
    let code = RoomCode::parse(&request.room_code)?;
    let handle = state.rooms().get(&code).ok_or(ServiceError::RoomNotFound)?;
    let mut room = handle.lock().await;
    ensure_open(&room)?;

    let player_id = room.add_player(
        request.display_name.trim().to_string(),
        state.config().max_players,
    )?;
    info!(room = %code, player_id = %player_id, players = room.players().len(), "player joined");
    push_events::broadcast_player_joined(&mut room, player_id);

    Ok(JoinRoomResponse {
        room_code: code.to_string(),
        player_id,
        host_id: room.host_id(),
        players: roster(&room),
    })
}

/// Start the game on behalf of the host; the first round opens immediately.
pub async fn start_game(
    state: &SharedState,
    room_code: &str,
    request: PlayerActionRequest,
) -> Result<ActionResponse, ServiceError> {
    let (code, handle) = find_room(state, room_code)?;
    let mut room = handle.lock().await;
    ensure_open(&room)?;

    // An id that does not even parse cannot be the host.
    let requester = parse_player_id(&request.player_id).map_err(|_| ServiceError::NotHost)?;
    let config = state.config();
    room.start(&requester, config.min_players, config.round_duration)?;

    info!(room = %code, players = room.players().len(), rounds = room.total_rounds(), "game started");
    push_events::broadcast_round_start(&mut room, config);
    round_service::schedule_round_expiry(state, &handle, &mut room);

    Ok(ActionResponse::new("started"))
}

/// Record a player's allocation; the last missing submission ends the round at once.
pub async fn submit_allocation(
    state: &SharedState,
    room_code: &str,
    request: SubmitAllocationRequest,
) -> Result<ActionResponse, ServiceError> {
    let (code, handle) = find_room(state, room_code)?;
    let mut room = handle.lock().await;
    ensure_open(&room)?;

    let player_id = parse_player_id(&request.player_id)?;
    let round = room.current_round();
    let table = state.config().round(round).cloned().unwrap_or_default();
    let progress = room.submit(&player_id, &request.allocations, &table)?;
    info!(
        room = %code,
        player_id = %player_id,
        round,
        submitted = progress.submitted,
        total = progress.total,
        "allocation submitted"
    );
    push_events::broadcast_player_submitted(&mut room, player_id, progress);

    if progress.is_complete() {
        round_service::end_round(state, &handle, &mut room, round);
    }
    Ok(ActionResponse::new("submitted"))
}

/// Leave a room. In the lobby the player is removed from the roster; once the game has
/// started the player stays for scoring and is only marked disconnected.
pub async fn leave_room(
    state: &SharedState,
    room_code: &str,
    request: PlayerActionRequest,
) -> Result<ActionResponse, ServiceError> {
    let (code, handle) = find_room(state, room_code)?;
    let mut room = handle.lock().await;
    ensure_open(&room)?;

    let player_id = parse_player_id(&request.player_id)?;
    if room.player(&player_id).is_none() {
        return Err(ServiceError::NotInRoom);
    }

    if room.phase() == RoomPhase::Waiting {
        let change = room.remove_player(&player_id)?;
        room.hub_mut().close(&player_id);
        info!(room = %code, player_id = %player_id, "player left the lobby");

        if room.players().is_empty() {
            evict(state, &code, &mut room, "last player left");
            return Ok(ActionResponse::new("left"));
        }
        if let Some(change) = change {
            info!(room = %code, from = %change.from, to = %change.to, "host reassigned");
        }
        push_events::broadcast_player_left(&mut room, player_id);
    } else {
        room.hub_mut().close(&player_id);
        mark_offline(state, &code, &mut room, player_id);
    }
    Ok(ActionResponse::new("left"))
}

/// Current room state as seen by `player_id`.
pub async fn room_state(
    state: &SharedState,
    room_code: &str,
    player_id: &str,
) -> Result<RoomSnapshot, ServiceError> {
    let (_, handle) = find_room(state, room_code)?;
    let room = handle.lock().await;
    ensure_open(&room)?;

    let player_id = parse_player_id(player_id)?;
    if room.player(&player_id).is_none() {
        return Err(ServiceError::NotInRoom);
    }
    Ok(build_snapshot(&room, state.config(), &player_id))
}

/// A live push channel registered for one player.
#[derive(Debug, Clone)]
pub struct PlayerSession {
    /// Room the channel belongs to.
    pub code: RoomCode,
    /// The room itself.
    pub room: SharedRoom,
    /// Player owning the channel.
    pub player_id: PlayerId,
    /// Identifier of this channel, used to tell it apart from a newer one.
    pub connection_id: ConnectionId,
}

/// Attach a push channel for `player_id`, superseding any previous one, and send the
/// resync snapshot on it.
pub async fn connect_player(
    state: &SharedState,
    room_code: &str,
    player_id: &str,
    tx: mpsc::UnboundedSender<Message>,
) -> Result<PlayerSession, ServiceError> {
    let (code, handle) = find_room(state, room_code)?;
    let player_id = parse_player_id(player_id)?;
    let mut room = handle.lock().await;
    ensure_open(&room)?;

    let presence = room.mark_connected(&player_id)?;
    let connection_id = room.hub_mut().attach(player_id, tx);
    let snapshot = build_snapshot(&room, state.config(), &player_id);
    push_events::send_snapshot(&mut room, player_id, snapshot);

    info!(room = %code, player_id = %player_id, ?presence, "player connected");
    if presence == Presence::Returning {
        push_events::broadcast_player_reconnected(&mut room, player_id);
    }
    drop(room);

    Ok(PlayerSession {
        code,
        room: handle,
        player_id,
        connection_id,
    })
}

/// Tear down a push channel. Does nothing when a newer channel already replaced it.
pub async fn disconnect_player(state: &SharedState, session: &PlayerSession) {
    let mut room = session.room.lock().await;
    if room.hub_mut().detach(session.player_id, session.connection_id) == Detach::Superseded {
        return;
    }
    if room.is_closed() {
        return;
    }
    mark_offline(state, &session.code, &mut room, session.player_id);
}

fn mark_offline(state: &SharedState, code: &RoomCode, room: &mut Room, player_id: PlayerId) {
    // Already offline (left explicitly, or removed from the lobby).
    if !room.player(&player_id).is_some_and(|player| player.connected) {
        return;
    }

    let change = room.mark_disconnected(&player_id);
    info!(room = %code, player_id = %player_id, "player disconnected");
    if let Some(change) = change {
        info!(room = %code, from = %change.from, to = %change.to, "host reassigned");
    }

    // Players who joined but never opened their channel keep the lobby alive; the janitor
    // reclaims it if they never show up.
    if room.phase() == RoomPhase::Waiting
        && room.connected_count() == 0
        && room.players().iter().all(|player| player.seen_online)
    {
        evict(state, code, room, "lobby has no connected players");
        return;
    }
    push_events::broadcast_player_left(room, player_id);
}

/// Close `room` and drop it from the registry. The caller holds the room lock.
pub(crate) fn evict(state: &SharedState, code: &RoomCode, room: &mut Room, reason: &str) {
    room.close();
    state.rooms().remove(code);
    info!(room = %code, reason, "room evicted");
}

/// Resync payload for `viewer`: enough to rebuild phase, round, roster and whether the
/// viewer already submitted.
pub fn build_snapshot(room: &Room, config: &AppConfig, viewer: &PlayerId) -> RoomSnapshot {
    let phase = room.phase();
    let current_round = room.current_round().min(room.total_rounds());
    let tickers = match phase {
        RoomPhase::Playing | RoomPhase::Scoreboard => config
            .round(current_round)
            .map(|table| table.tickers())
            .unwrap_or_default(),
        RoomPhase::Waiting | RoomPhase::Complete => Vec::new(),
    };
    let seconds_remaining = room.round_deadline().map(|deadline| {
        deadline
            .saturating_duration_since(Instant::now())
            .as_secs_f64()
            .ceil() as u64
    });
    let leaderboard = room
        .players()
        .iter()
        .any(|player| player.last_round.is_some())
        .then(|| scoring::standings(room.players()));

    RoomSnapshot {
        room_code: room.code().to_string(),
        phase: phase.into(),
        current_round,
        total_rounds: room.total_rounds(),
        timer_duration: config.round_duration.as_secs(),
        seconds_remaining,
        host_id: room.host_id(),
        players: roster(room),
        submitted_count: room.submitted_count(),
        has_submitted: room.has_submitted(viewer),
        tickers,
        leaderboard,
        created_at: room_created_at(room),
    }
}

fn find_room(state: &SharedState, raw_code: &str) -> Result<(RoomCode, SharedRoom), ServiceError> {
    // A path segment that is not a valid code names no room.
    let code = RoomCode::parse(raw_code).map_err(|_| ServiceError::RoomNotFound)?;
    let room = state.rooms().get(&code).ok_or(ServiceError::RoomNotFound)?;
    Ok((code, room))
}

fn ensure_open(room: &Room) -> Result<(), ServiceError> {
    if room.is_closed() {
        return Err(ServiceError::RoomNotFound);
    }
    Ok(())
}

fn parse_player_id(raw: &str) -> Result<PlayerId, ServiceError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ServiceError::NotInRoom)
}
