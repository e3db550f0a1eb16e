//! Application-level configuration: round return tables, timers, capacity limits and
//! the scoring curve. Loaded once at startup and never mutated afterwards.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::services::scoring::{RoundTable, ScoringCurve};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MARKET_ROOMS_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Time players get to submit an allocation.
    pub round_duration: Duration,
    /// How long the scoreboard is shown between rounds.
    pub scoreboard_dwell: Duration,
    /// Roster capacity.
    pub max_players: usize,
    /// Players required to start a game.
    pub min_players: usize,
    /// Upper bound on simultaneously active rooms.
    pub max_rooms: usize,
    /// How long a completed room stays reachable.
    pub completed_grace: Duration,
    /// How long a room without connected players survives.
    pub idle_timeout: Duration,
    /// Hard limit on a room's lifetime.
    pub max_room_age: Duration,
    /// Period of the eviction sweep.
    pub janitor_interval: Duration,
    /// Curve turning round returns into points.
    pub scoring: ScoringCurve,
    rounds: Vec<RoundTable>,
}

/// Reasons a configuration file is rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No rounds configured.
    #[error("at least one round must be configured")]
    NoRounds,
    /// A round has no tradable tickers.
    #[error("round {0} has no tickers")]
    EmptyRound(usize),
    /// A return is NaN or infinite.
    #[error("round {round} has a non-finite return for `{ticker}`")]
    NonFiniteReturn {
        /// 1-based round index.
        round: usize,
        /// Offending ticker.
        ticker: String,
    },
    /// Two tickers collide once upper-cased.
    #[error("round {round} lists `{ticker}` twice")]
    DuplicateTicker {
        /// 1-based round index.
        round: usize,
        /// Offending ticker.
        ticker: String,
    },
    /// Player bounds are inconsistent.
    #[error("player bounds are invalid (min {min}, max {max})")]
    PlayerBounds {
        /// Configured minimum.
        min: usize,
        /// Configured maximum.
        max: usize,
    },
    /// A duration that must be positive is zero.
    #[error("`{0}` must be greater than zero")]
    ZeroDuration(&'static str),
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        rounds = app_config.total_rounds(),
                        "loaded room configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(contents: &str) -> anyhow::Result<Self> {
        let raw = serde_json::from_str::<RawConfig>(contents)?;
        Ok(Self::try_from(raw)?)
    }

    /// Number of rounds in a game.
    pub fn total_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Return table for a 1-based round index.
    pub fn round(&self, index: usize) -> Option<&RoundTable> {
        index.checked_sub(1).and_then(|i| self.rounds.get(i))
    }

    /// Replace the round tables, e.g. for tests with a custom stock set.
    pub fn with_rounds(mut self, rounds: Vec<RoundTable>) -> Self {
        self.rounds = rounds;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            round_duration: Duration::from_secs(30),
            scoreboard_dwell: Duration::from_secs(8),
            max_players: 8,
            min_players: 2,
            max_rooms: 10_000,
            completed_grace: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(1_800),
            max_room_age: Duration::from_secs(86_400),
            janitor_interval: Duration::from_secs(30),
            scoring: ScoringCurve::default(),
            rounds: default_rounds(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    round_duration_secs: u64,
    scoreboard_dwell_secs: u64,
    max_players: usize,
    min_players: usize,
    max_rooms: usize,
    completed_grace_secs: u64,
    idle_timeout_secs: u64,
    max_room_age_secs: u64,
    janitor_interval_secs: u64,
    scoring: ScoringCurve,
    rounds: Option<Vec<RawRound>>,
}

impl Default for RawConfig {
    fn default() -> Self {
        let defaults = AppConfig::default();
        Self {
            round_duration_secs: defaults.round_duration.as_secs(),
            scoreboard_dwell_secs: defaults.scoreboard_dwell.as_secs(),
            max_players: defaults.max_players,
            min_players: defaults.min_players,
            max_rooms: defaults.max_rooms,
            completed_grace_secs: defaults.completed_grace.as_secs(),
            idle_timeout_secs: defaults.idle_timeout.as_secs(),
            max_room_age_secs: defaults.max_room_age.as_secs(),
            janitor_interval_secs: defaults.janitor_interval.as_secs(),
            scoring: defaults.scoring,
            rounds: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of one round's return table.
struct RawRound {
    #[serde(default)]
    title: String,
    returns: IndexMap<String, f64>,
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = ConfigError;

    fn try_from(value: RawConfig) -> Result<Self, Self::Error> {
        if value.min_players < 1 || value.max_players < value.min_players {
            return Err(ConfigError::PlayerBounds {
                min: value.min_players,
                max: value.max_players,
            });
        }
        for (name, secs) in [
            ("round_duration_secs", value.round_duration_secs),
            ("janitor_interval_secs", value.janitor_interval_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ZeroDuration(name));
            }
        }

        let rounds = match value.rounds {
            Some(rounds) => rounds
                .into_iter()
                .enumerate()
                .map(|(index, raw)| build_round(index + 1, raw))
                .collect::<Result<Vec<_>, _>>()?,
            None => default_rounds(),
        };
        if rounds.is_empty() {
            return Err(ConfigError::NoRounds);
        }

        Ok(Self {
            round_duration: Duration::from_secs(value.round_duration_secs),
            scoreboard_dwell: Duration::from_secs(value.scoreboard_dwell_secs),
            max_players: value.max_players,
            min_players: value.min_players,
            max_rooms: value.max_rooms,
            completed_grace: Duration::from_secs(value.completed_grace_secs),
            idle_timeout: Duration::from_secs(value.idle_timeout_secs),
            max_room_age: Duration::from_secs(value.max_room_age_secs),
            janitor_interval: Duration::from_secs(value.janitor_interval_secs),
            scoring: value.scoring,
            rounds,
        })
    }
}

fn build_round(round: usize, raw: RawRound) -> Result<RoundTable, ConfigError> {
    if raw.returns.is_empty() {
        return Err(ConfigError::EmptyRound(round));
    }
    let mut returns = IndexMap::with_capacity(raw.returns.len());
    for (ticker, value) in raw.returns {
        let ticker = ticker.trim().to_ascii_uppercase();
        if !value.is_finite() {
            return Err(ConfigError::NonFiniteReturn { round, ticker });
        }
        if returns.insert(ticker.clone(), value).is_some() {
            return Err(ConfigError::DuplicateTicker { round, ticker });
        }
    }
    let title = if raw.title.trim().is_empty() {
        format!("Round {round}")
    } else {
        raw.title
    };
    Ok(RoundTable { title, returns })
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in historical scenarios shipped with the binary.
fn default_rounds() -> Vec<RoundTable> {
    vec![
        RoundTable::new(
            "AI Boom Divergence (May-Jun 2023)",
            &[
                ("NVDA", 30.8),
                ("AMD", 23.5),
                ("MSFT", 7.2),
                ("GOOGL", 12.1),
                ("INTC", -3.8),
                ("SNAP", -16.2),
                ("IBM", 1.5),
                ("DIS", -8.4),
                ("MRNA", -7.1),
                ("SPY", 4.2),
            ],
        ),
        RoundTable::new(
            "Banking Crisis (Mar-Apr 2023)",
            &[
                ("JPM", 7.5),
                ("SCHW", -28.4),
                ("KRE", -18.2),
                ("GLD", 9.8),
                ("AAPL", 5.2),
                ("PFE", -2.1),
                ("WFC", -10.3),
                ("VNO", -12.5),
                ("COIN", -5.8),
                ("SPY", 2.5),
            ],
        ),
        RoundTable::new(
            "Inflation Regime Change (May-Jun 2022)",
            &[
                ("XOM", 15.3),
                ("DVN", 22.1),
                ("META", -12.8),
                ("AMZN", -8.5),
                ("COST", -16.2),
                ("LMT", 4.7),
                ("TSLA", -11.3),
                ("WMT", -17.4),
                ("TGT", -29.1),
                ("SPY", -1.2),
            ],
        ),
        RoundTable::new(
            "ZIRP Unwind (Jan-Mar 2022)",
            &[
                ("NFLX", -37.8),
                ("META", -34.5),
                ("PYPL", -28.6),
                ("JPM", 8.2),
                ("XLE", 39.2),
                ("PG", 4.8),
                ("T", 6.3),
                ("SPY", -4.6),
                ("ARKK", -41.2),
                ("TSLA", -11.5),
            ],
        ),
        RoundTable::new(
            "Nvidia Singularity (Nov 2023-Jan 2024)",
            &[
                ("NVDA", 64.2),
                ("SMCI", 95.3),
                ("ARM", 48.7),
                ("MSFT", 18.4),
                ("GOOGL", 15.2),
                ("INTC", -8.3),
                ("AAPL", 11.2),
                ("SPY", 8.9),
                ("PLTR", 52.8),
                ("CVNA", -18.2),
            ],
        ),
    ]
}
