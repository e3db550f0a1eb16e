//! Round scoring: portfolio return of an allocation against a round's return table, the
//! points curve applied to that return, and leaderboard ordering.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    dto::rooms::LeaderboardEntry,
    state::{allocation::Allocation, room::Player},
};

const DEFAULT_LINEAR_BASE: f64 = 1000.0;
const DEFAULT_POINTS_PER_PERCENT: f64 = 10.0;
const DEFAULT_MAX_PER_STOCK: f64 = 50.0;

/// Fixed historical returns (in percent) for the tickers tradable during one round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundTable {
    /// Scenario name shown to players.
    pub title: String,
    /// Ticker to return percentage, in display order.
    pub returns: IndexMap<String, f64>,
}

impl RoundTable {
    /// Build a table from `(ticker, return)` pairs.
    pub fn new<S: Into<String>>(title: S, returns: &[(&str, f64)]) -> Self {
        Self {
            title: title.into(),
            returns: returns
                .iter()
                .map(|(ticker, value)| ((*ticker).to_string(), *value))
                .collect(),
        }
    }

    /// Tickers tradable this round.
    pub fn tickers(&self) -> Vec<String> {
        self.returns.keys().cloned().collect()
    }

    /// Whether `ticker` is part of this round's stock set.
    pub fn contains(&self, ticker: &str) -> bool {
        self.returns.contains_key(ticker)
    }

    /// Best return reachable when no single ticker may exceed `max_per_stock` percent.
    ///
    /// Greedily fills the highest returners first. Cash is allowed, so the result is never
    /// pushed below zero by a table whose tickers are all negative.
    pub fn optimal_return(&self, max_per_stock: f64) -> f64 {
        let mut sorted: Vec<f64> = self.returns.values().copied().collect();
        sorted.sort_by(|a, b| b.total_cmp(a));

        let mut remaining = 100.0;
        let mut total = 0.0;
        for value in sorted {
            if remaining <= 0.0 || value <= 0.0 {
                break;
            }
            let weight = max_per_stock.min(remaining);
            total += weight / 100.0 * value;
            remaining -= weight;
        }
        total
    }
}

/// Monotonic transform from a round return into points.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "curve", rename_all = "snake_case")]
pub enum ScoringCurve {
    /// `round(base + return * points_per_percent)`, clamped at zero.
    Linear {
        /// Points awarded for a flat (0%) round.
        #[serde(default = "default_linear_base")]
        base: f64,
        /// Points gained per percentage point of return.
        #[serde(default = "default_points_per_percent")]
        points_per_percent: f64,
    },
    /// 0-100 points by proximity to the best allocation achievable with at most
    /// `max_per_stock` percent in any single ticker.
    RelativeToOptimal {
        /// Per-ticker cap used to compute the reference optimum.
        #[serde(default = "default_max_per_stock")]
        max_per_stock: f64,
    },
}

impl Default for ScoringCurve {
    fn default() -> Self {
        Self::Linear {
            base: DEFAULT_LINEAR_BASE,
            points_per_percent: DEFAULT_POINTS_PER_PERCENT,
        }
    }
}

impl ScoringCurve {
    /// Points earned for `round_return` on `table`.
    pub fn score(&self, round_return: f64, table: &RoundTable) -> u32 {
        match *self {
            ScoringCurve::Linear {
                base,
                points_per_percent,
            } => clamp_points(base + round_return * points_per_percent),
            ScoringCurve::RelativeToOptimal { max_per_stock } => {
                let optimal = table.optimal_return(max_per_stock);
                let points = if optimal <= 0.0 {
                    if round_return >= 0.0 {
                        100.0
                    } else {
                        50.0 + round_return
                    }
                } else if round_return >= optimal {
                    100.0
                } else if round_return <= 0.0 {
                    25.0 + round_return / optimal * 25.0
                } else {
                    round_return / optimal * 100.0
                };
                clamp_points(points.floor()).min(100)
            }
        }
    }
}

/// Weighted return of `allocation` over every ticker of the round.
///
/// An all-cash allocation returns exactly zero.
pub fn portfolio_return(allocation: &Allocation, table: &RoundTable) -> f64 {
    table
        .returns
        .iter()
        .map(|(ticker, value)| f64::from(allocation.weight(ticker)) / 100.0 * value)
        .sum()
}

/// Round a percentage to two decimals for display and scoring.
pub fn round_percent(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Leaderboard sorted by descending total score, ties kept in join order.
pub fn standings(players: &[Player]) -> Vec<LeaderboardEntry> {
    let mut ordered: Vec<&Player> = players.iter().collect();
    // `sort_by` is stable, so equal totals keep roster (join) order.
    ordered.sort_by(|a, b| b.cumulative_score.cmp(&a.cumulative_score));

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, player)| {
            let (round_return, round_score) = player
                .last_round
                .map(|outcome| (outcome.round_return, outcome.round_score))
                .unwrap_or((0.0, 0));
            LeaderboardEntry {
                rank: index + 1,
                player_id: player.id,
                display_name: player.display_name.clone(),
                round_return,
                round_score,
                total_score: player.cumulative_score,
            }
        })
        .collect()
}

fn clamp_points(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        value.round().min(f64::from(u32::MAX)) as u32
    }
}

fn default_linear_base() -> f64 {
    DEFAULT_LINEAR_BASE
}

fn default_points_per_percent() -> f64 {
    DEFAULT_POINTS_PER_PERCENT
}

fn default_max_per_stock() -> f64 {
    DEFAULT_MAX_PER_STOCK
}
