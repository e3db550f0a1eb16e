//! Server-side round clock: the per-round deadline and the scoreboard dwell.
//!
//! Both timers are plain tasks whose abort handle is parked in the room. A timer that
//! fires after its round already moved on finds the room in another round or phase and
//! does nothing.

use std::sync::Arc;

use tokio::time::{Instant, sleep_until};
use tracing::{info, warn};

use crate::{
    services::push_events,
    state::{
        SharedState,
        registry::SharedRoom,
        room::{Advance, Room},
    },
};

/// Arm the deadline of the round currently open in `room`.
pub(crate) fn schedule_round_expiry(state: &SharedState, handle: &SharedRoom, room: &mut Room) {
    let Some(deadline) = room.round_deadline() else {
        return;
    };
    let round = room.current_round();
    let state = Arc::clone(state);
    let handle = Arc::clone(handle);

    let task = tokio::spawn(async move {
        sleep_until(deadline).await;
        expire_round(&state, &handle, round).await;
    });
    room.set_timer(task.abort_handle());
}

/// Close `round` because its deadline passed, scoring missing players as cash.
///
/// Returns `false` when the round had already ended (late timer).
pub async fn expire_round(state: &SharedState, handle: &SharedRoom, round: usize) -> bool {
    let mut room = handle.lock().await;
    if !room.is_playing_round(round) {
        return false;
    }

    room.clear_timer();
    info!(
        room = %room.code(),
        round,
        submitted = room.submitted_count(),
        players = room.players().len(),
        "round deadline reached"
    );
    end_round(state, handle, &mut room, round)
}

/// Score `round`, publish the leaderboard and start the scoreboard dwell.
///
/// The caller holds the room lock. Returns `false` when the round was already scored.
pub(crate) fn end_round(
    state: &SharedState,
    handle: &SharedRoom,
    room: &mut Room,
    round: usize,
) -> bool {
    let config = state.config();
    let Some(table) = config.round(round) else {
        warn!(room = %room.code(), round, "no return table configured for round");
        return false;
    };
    if !room.close_round(round, table, &config.scoring) {
        return false;
    }

    info!(room = %room.code(), round, "round scored");
    push_events::broadcast_round_end(room);
    schedule_scoreboard_dwell(state, handle, room);
    true
}

fn schedule_scoreboard_dwell(state: &SharedState, handle: &SharedRoom, room: &mut Room) {
    let round = room.current_round();
    let until = Instant::now() + state.config().scoreboard_dwell;
    let state = Arc::clone(state);
    let handle = Arc::clone(handle);

    let task = tokio::spawn(async move {
        sleep_until(until).await;
        finish_scoreboard(&state, &handle, round).await;
    });
    room.set_timer(task.abort_handle());
}

/// Leave the scoreboard of `round`: open the next round or complete the game.
///
/// Returns `None` when the room is no longer showing that scoreboard.
pub async fn finish_scoreboard(
    state: &SharedState,
    handle: &SharedRoom,
    round: usize,
) -> Option<Advance> {
    let mut room = handle.lock().await;
    if !room.is_showing_scoreboard(round) {
        return None;
    }

    room.clear_timer();
    let advance = room.advance(round, state.config().round_duration)?;
    match advance {
        Advance::NextRound(next) => {
            info!(room = %room.code(), round = next, "round started");
            push_events::broadcast_round_start(&mut room, state.config());
            schedule_round_expiry(state, handle, &mut room);
        }
        Advance::Complete => {
            info!(room = %room.code(), rounds = room.total_rounds(), "game completed");
            push_events::broadcast_game_complete(&mut room);
        }
    }
    Some(advance)
}
