use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::{
    config::AppConfig,
    services::room_service,
    state::{SharedState, room::Room},
};

/// Periodically evict finished, abandoned and overly old rooms. Runs until the process exits.
pub async fn run(state: SharedState) {
    let interval = state.config().janitor_interval;
    info!(interval_secs = interval.as_secs(), "room janitor started");

    loop {
        sleep(interval).await;
        if state.rooms().is_empty() {
            continue;
        }
        let evicted = sweep(&state).await;
        if evicted > 0 {
            info!(evicted, active = state.rooms().len(), "room sweep finished");
        } else {
            debug!(active = state.rooms().len(), "room sweep found nothing to evict");
        }
    }
}

/// Evict every room whose lifetime is over, returning how many were removed.
pub async fn sweep(state: &SharedState) -> usize {
    let now = Instant::now();
    let mut evicted = 0;

    for (code, handle) in state.rooms().handles() {
        let mut room = handle.lock().await;
        if room.is_closed() {
            continue;
        }
        if let Some(reason) = eviction_reason(&room, state.config(), now) {
            room_service::evict(state, &code, &mut room, reason);
            evicted += 1;
        }
    }
    evicted
}

fn eviction_reason(room: &Room, config: &AppConfig, now: Instant) -> Option<&'static str> {
    if room
        .completed_at()
        .is_some_and(|done| now.saturating_duration_since(done) >= config.completed_grace)
    {
        return Some("completion grace period elapsed");
    }
    if room.connected_count() == 0
        && now.saturating_duration_since(room.last_activity()) >= config.idle_timeout
    {
        return Some("idle without connected players");
    }
    if now.saturating_duration_since(room.created_instant()) >= config.max_room_age {
        return Some("maximum room age reached");
    }
    None
}
