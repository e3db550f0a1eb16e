use thiserror::Error;

/// Lifecycle phases of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Lobby: players join, the host may start the game.
    Waiting,
    /// A round is open for allocations and its timer is running.
    Playing,
    /// The round has been scored and the leaderboard is on display.
    Scoreboard,
    /// Every round has been played. Terminal.
    Complete,
}

/// Events that move a room between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Host starts the game from the lobby.
    StartGame,
    /// All submissions resolved (explicitly or by the timer) and the round was scored.
    RoundScored,
    /// Scoreboard dwell elapsed and another round remains.
    NextRound,
    /// Scoreboard dwell elapsed after the last round.
    FinishGame,
}

/// Error returned when an event is not valid in the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the room was in.
    pub from: RoomPhase,
    /// Rejected event.
    pub event: RoomEvent,
}

/// Phase tracker for one room. `Playing` and `Scoreboard` alternate once per round;
/// every other edge is one-way.
#[derive(Debug, Clone)]
pub struct RoomStateMachine {
    phase: RoomPhase,
}

impl Default for RoomStateMachine {
    fn default() -> Self {
        Self {
            phase: RoomPhase::Waiting,
        }
    }
}

impl RoomStateMachine {
    /// Create a state machine in the lobby phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Apply `event`, returning the new phase.
    pub fn apply(&mut self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        Ok(next)
    }

    fn compute_transition(&self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (RoomPhase::Waiting, RoomEvent::StartGame) => RoomPhase::Playing,
            (RoomPhase::Playing, RoomEvent::RoundScored) => RoomPhase::Scoreboard,
            (RoomPhase::Scoreboard, RoomEvent::NextRound) => RoomPhase::Playing,
            (RoomPhase::Scoreboard, RoomEvent::FinishGame) => RoomPhase::Complete,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_waiting() {
        let sm = RoomStateMachine::new();
        assert_eq!(sm.phase(), RoomPhase::Waiting);
    }

    #[test]
    fn full_game_alternates_playing_and_scoreboard() {
        let mut sm = RoomStateMachine::new();
        assert_eq!(sm.apply(RoomEvent::StartGame), Ok(RoomPhase::Playing));
        for _ in 0..3 {
            assert_eq!(sm.apply(RoomEvent::RoundScored), Ok(RoomPhase::Scoreboard));
            assert_eq!(sm.apply(RoomEvent::NextRound), Ok(RoomPhase::Playing));
        }
        assert_eq!(sm.apply(RoomEvent::RoundScored), Ok(RoomPhase::Scoreboard));
        assert_eq!(sm.apply(RoomEvent::FinishGame), Ok(RoomPhase::Complete));
    }

    #[test]
    fn scoring_twice_is_rejected() {
        let mut sm = RoomStateMachine::new();
        sm.apply(RoomEvent::StartGame).unwrap();
        sm.apply(RoomEvent::RoundScored).unwrap();
        let err = sm.apply(RoomEvent::RoundScored).unwrap_err();
        assert_eq!(err.from, RoomPhase::Scoreboard);
        assert_eq!(err.event, RoomEvent::RoundScored);
    }

    #[test]
    fn complete_is_terminal() {
        let mut sm = RoomStateMachine::new();
        sm.apply(RoomEvent::StartGame).unwrap();
        sm.apply(RoomEvent::RoundScored).unwrap();
        sm.apply(RoomEvent::FinishGame).unwrap();
        for event in [
            RoomEvent::StartGame,
            RoomEvent::RoundScored,
            RoomEvent::NextRound,
            RoomEvent::FinishGame,
        ] {
            assert!(sm.apply(event).is_err());
        }
        assert_eq!(sm.phase(), RoomPhase::Complete);
    }

    #[test]
    fn cannot_restart_a_started_game() {
        let mut sm = RoomStateMachine::new();
        sm.apply(RoomEvent::StartGame).unwrap();
        assert!(sm.apply(RoomEvent::StartGame).is_err());
        assert_eq!(sm.phase(), RoomPhase::Playing);
    }
}
