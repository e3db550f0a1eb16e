use std::time::SystemTime;

use indexmap::IndexMap;
use tokio::{task::AbortHandle, time::Instant};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    services::scoring::{self, RoundTable, ScoringCurve},
    state::{
        allocation::Allocation,
        hub::ConnectionHub,
        room_code::RoomCode,
        state_machine::{RoomEvent, RoomPhase, RoomStateMachine},
    },
};

/// Opaque player identifier, generated at join time and never reused.
pub type PlayerId = Uuid;

/// Result of the most recent scored round for one player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundOutcome {
    /// Portfolio return in percent, rounded to two decimals.
    pub round_return: f64,
    /// Points earned for the round.
    pub round_score: u32,
}

/// A participant of a room.
#[derive(Debug, Clone)]
pub struct Player {
    /// Stable identifier.
    pub id: PlayerId,
    /// Name shown to other players (not unique).
    pub display_name: String,
    /// Whether the push channel is currently live.
    pub connected: bool,
    /// Whether the player ever opened a push channel.
    pub seen_online: bool,
    /// Running total, only updated when a round is scored.
    pub cumulative_score: u64,
    /// Outcome of the last scored round, if any.
    pub last_round: Option<RoundOutcome>,
}

impl Player {
    /// Fresh player with no score and no live connection yet.
    pub fn new(id: PlayerId, display_name: String) -> Self {
        Self {
            id,
            display_name,
            connected: false,
            seen_online: false,
            cumulative_score: 0,
            last_round: None,
        }
    }
}

/// Progress reported after a submission is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitProgress {
    /// Submissions recorded for the current round.
    pub submitted: usize,
    /// Roster size.
    pub total: usize,
}

impl SubmitProgress {
    /// Every player has submitted.
    pub fn is_complete(&self) -> bool {
        self.submitted >= self.total
    }
}

/// How a push-channel attach relates to the player's previous presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// First connection since joining.
    First,
    /// Back after a disconnect.
    Returning,
    /// Replaces a connection that is still considered live.
    Replacing,
}

/// What follows the scoreboard dwell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The given round was opened.
    NextRound(usize),
    /// The game is over.
    Complete,
}

/// Host change caused by a player leaving or disconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostChange {
    /// Previous host.
    pub from: PlayerId,
    /// New host.
    pub to: PlayerId,
}

/// Server-side state of one multiplayer room. Every mutation goes through the room's
/// mutex, so methods here never race with each other.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    host_id: PlayerId,
    players: Vec<Player>,
    machine: RoomStateMachine,
    current_round: usize,
    total_rounds: usize,
    round_deadline: Option<Instant>,
    submissions: IndexMap<PlayerId, Allocation>,
    hub: ConnectionHub,
    timer: Option<AbortHandle>,
    created_at: SystemTime,
    created_instant: Instant,
    last_activity: Instant,
    completed_at: Option<Instant>,
    closed: bool,
}

impl Room {
    /// Open a lobby with `host` as its only player.
    pub fn new(code: RoomCode, host: Player, total_rounds: usize) -> Self {
        let now = Instant::now();
        Self {
            code,
            host_id: host.id,
            players: vec![host],
            machine: RoomStateMachine::new(),
            current_round: 1,
            total_rounds,
            round_deadline: None,
            submissions: IndexMap::new(),
            hub: ConnectionHub::new(),
            timer: None,
            created_at: SystemTime::now(),
            created_instant: now,
            last_activity: now,
            completed_at: None,
            closed: false,
        }
    }

    /// Canonical room code.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Current host.
    pub fn host_id(&self) -> PlayerId {
        self.host_id
    }

    /// Roster in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Look up a player.
    pub fn player(&self, player_id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == *player_id)
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RoomPhase {
        self.machine.phase()
    }

    /// 1-based round index; `total_rounds + 1` once the game is complete.
    pub fn current_round(&self) -> usize {
        self.current_round
    }

    /// Rounds in a game.
    pub fn total_rounds(&self) -> usize {
        self.total_rounds
    }

    /// Whether `round` is the round currently open for submissions.
    pub fn is_playing_round(&self, round: usize) -> bool {
        !self.closed && self.phase() == RoomPhase::Playing && self.current_round == round
    }

    /// Whether the scoreboard of `round` is on display.
    pub fn is_showing_scoreboard(&self, round: usize) -> bool {
        !self.closed && self.phase() == RoomPhase::Scoreboard && self.current_round == round
    }

    /// Deadline of the open round, only set while playing.
    pub fn round_deadline(&self) -> Option<Instant> {
        self.round_deadline
    }

    /// Submissions recorded for the current round.
    pub fn submitted_count(&self) -> usize {
        self.submissions.len()
    }

    /// Whether `player_id` already submitted this round.
    pub fn has_submitted(&self, player_id: &PlayerId) -> bool {
        self.submissions.contains_key(player_id)
    }

    /// Players with a live push channel.
    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|player| player.connected).count()
    }

    /// Wall-clock creation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Monotonic creation time.
    pub fn created_instant(&self) -> Instant {
        self.created_instant
    }

    /// Last time a player acted on or connected to the room.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// When the game finished.
    pub fn completed_at(&self) -> Option<Instant> {
        self.completed_at
    }

    /// Whether the room was evicted. Closed rooms reject every operation.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Push-channel connections.
    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    /// Mutable access to the push-channel connections.
    pub fn hub_mut(&mut self) -> &mut ConnectionHub {
        &mut self.hub
    }

    /// Record activity for the inactivity timeout.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Install the pending round or dwell timer, cancelling any previous one.
    pub fn set_timer(&mut self, handle: AbortHandle) {
        if let Some(previous) = self.timer.replace(handle) {
            previous.abort();
        }
    }

    /// Forget the pending timer without cancelling it (called from the timer itself).
    pub fn clear_timer(&mut self) {
        self.timer = None;
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }

    /// Mark the room evicted: cancel timers and close every push channel.
    pub fn close(&mut self) {
        self.closed = true;
        self.cancel_timer();
        self.round_deadline = None;
        self.hub.close_all();
    }

    /// Append a player to the lobby.
    pub fn add_player(
        &mut self,
        display_name: String,
        max_players: usize,
    ) -> Result<PlayerId, ServiceError> {
        if self.phase() != RoomPhase::Waiting {
            return Err(ServiceError::GameAlreadyStarted);
        }
        if self.players.len() >= max_players {
            return Err(ServiceError::RoomFull);
        }

        let id = Uuid::new_v4();
        self.players.push(Player::new(id, display_name));
        self.touch();
        Ok(id)
    }

    /// Remove a player from the lobby. Only valid before the game starts.
    pub fn remove_player(
        &mut self,
        player_id: &PlayerId,
    ) -> Result<Option<HostChange>, ServiceError> {
        let index = self
            .players
            .iter()
            .position(|player| player.id == *player_id)
            .ok_or(ServiceError::NotInRoom)?;
        if self.phase() != RoomPhase::Waiting {
            return Err(ServiceError::GameAlreadyStarted);
        }

        self.players.remove(index);
        self.touch();

        if self.host_id != *player_id {
            return Ok(None);
        }
        let next = self
            .players
            .iter()
            .find(|player| player.connected)
            .or_else(|| self.players.first())
            .map(|player| player.id);
        Ok(next.map(|to| {
            self.host_id = to;
            HostChange {
                from: *player_id,
                to,
            }
        }))
    }

    /// Start the game: first round opens immediately.
    pub fn start(
        &mut self,
        requester: &PlayerId,
        min_players: usize,
        round_duration: std::time::Duration,
    ) -> Result<(), ServiceError> {
        if *requester != self.host_id {
            return Err(ServiceError::NotHost);
        }
        if self.phase() != RoomPhase::Waiting {
            return Err(ServiceError::AlreadyStarted);
        }
        if self.players.len() < min_players {
            return Err(ServiceError::InsufficientPlayers(min_players));
        }

        self.machine
            .apply(RoomEvent::StartGame)
            .map_err(|_| ServiceError::AlreadyStarted)?;
        self.current_round = 1;
        self.open_round(round_duration);
        Ok(())
    }

    fn open_round(&mut self, round_duration: std::time::Duration) {
        self.submissions.clear();
        self.round_deadline = Some(Instant::now() + round_duration);
        self.touch();
    }

    /// Accept one player's allocation for the open round.
    pub fn submit(
        &mut self,
        player_id: &PlayerId,
        raw: &IndexMap<String, f64>,
        table: &RoundTable,
    ) -> Result<SubmitProgress, ServiceError> {
        if self.player(player_id).is_none() {
            return Err(ServiceError::NotInRoom);
        }
        if self.phase() != RoomPhase::Playing {
            return Err(ServiceError::RoundNotActive);
        }
        let allocation = Allocation::from_request(raw, table)?;
        if self.submissions.contains_key(player_id) {
            return Err(ServiceError::AlreadySubmitted);
        }

        self.submissions.insert(*player_id, allocation);
        self.touch();
        Ok(SubmitProgress {
            submitted: self.submissions.len(),
            total: self.players.len(),
        })
    }

    /// Score the open round and move to the scoreboard.
    ///
    /// Players without a submission are scored with the cash allocation. Returns `false`
    /// when the room is not playing `round`, which makes late or repeated calls no-ops.
    pub fn close_round(&mut self, round: usize, table: &RoundTable, curve: &ScoringCurve) -> bool {
        if !self.is_playing_round(round) {
            return false;
        }
        if self.machine.apply(RoomEvent::RoundScored).is_err() {
            return false;
        }

        self.cancel_timer();
        self.round_deadline = None;

        let cash = Allocation::cash();
        for player in &mut self.players {
            let allocation = self.submissions.get(&player.id).unwrap_or(&cash);
            let round_return = scoring::round_percent(scoring::portfolio_return(allocation, table));
            let round_score = curve.score(round_return, table);
            player.cumulative_score += u64::from(round_score);
            player.last_round = Some(RoundOutcome {
                round_return,
                round_score,
            });
        }
        true
    }

    /// Leave the scoreboard of `round`: open the next round or complete the game.
    ///
    /// Returns `None` when the room is not showing that round's scoreboard.
    pub fn advance(&mut self, round: usize, round_duration: std::time::Duration) -> Option<Advance> {
        if !self.is_showing_scoreboard(round) {
            return None;
        }

        self.current_round += 1;
        if self.current_round <= self.total_rounds {
            self.machine.apply(RoomEvent::NextRound).ok()?;
            self.open_round(round_duration);
            Some(Advance::NextRound(self.current_round))
        } else {
            self.machine.apply(RoomEvent::FinishGame).ok()?;
            self.submissions.clear();
            self.completed_at = Some(Instant::now());
            Some(Advance::Complete)
        }
    }

    /// Mark a player's push channel live.
    pub fn mark_connected(&mut self, player_id: &PlayerId) -> Result<Presence, ServiceError> {
        let player = self
            .players
            .iter_mut()
            .find(|player| player.id == *player_id)
            .ok_or(ServiceError::NotInRoom)?;
        let presence = match (player.connected, player.seen_online) {
            (true, _) => Presence::Replacing,
            (false, true) => Presence::Returning,
            (false, false) => Presence::First,
        };
        player.connected = true;
        player.seen_online = true;
        self.touch();
        Ok(presence)
    }

    /// Mark a player's push channel gone, handing the host role to the earliest-joined
    /// connected player when the host drops. The player stays on the roster for scoring.
    pub fn mark_disconnected(&mut self, player_id: &PlayerId) -> Option<HostChange> {
        let player = self
            .players
            .iter_mut()
            .find(|player| player.id == *player_id)?;
        player.connected = false;

        if self.host_id != *player_id {
            return None;
        }
        let to = self.players.iter().find(|player| player.connected)?.id;
        self.host_id = to;
        Some(HostChange {
            from: *player_id,
            to,
        })
    }
}
