use indexmap::IndexMap;
use thiserror::Error;

use crate::services::scoring::RoundTable;

/// Required sum of an explicit allocation, in percent.
pub const FULL_ALLOCATION: u32 = 100;

/// Reasons an allocation request is rejected. Allocations are never normalised or clamped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    /// The request carried no weights at all.
    #[error("allocation is empty")]
    Empty,
    /// Ticker is not tradable during the active round.
    #[error("unknown ticker `{0}` for this round")]
    UnknownTicker(String),
    /// The same ticker appears twice once tickers are upper-cased.
    #[error("ticker `{0}` appears more than once")]
    DuplicateTicker(String),
    /// Weight is negative.
    #[error("weight for `{ticker}` must not be negative (got {weight})")]
    Negative {
        /// Offending ticker.
        ticker: String,
        /// Submitted weight.
        weight: f64,
    },
    /// Weight is not a whole, finite percentage.
    #[error("weight for `{ticker}` must be a whole percentage (got {weight})")]
    NotWhole {
        /// Offending ticker.
        ticker: String,
        /// Submitted weight.
        weight: f64,
    },
    /// Weights do not add up to exactly 100.
    #[error("weights must sum to exactly {FULL_ALLOCATION} (got {0})")]
    BadTotal(u64),
}

/// Validated per-ticker percentages for one player and one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    weights: IndexMap<String, u32>,
}

impl Allocation {
    /// The all-cash allocation recorded for players who let the round timer run out.
    ///
    /// It sums to zero and is exempt from the sum-to-100 rule.
    pub fn cash() -> Self {
        Self::default()
    }

    /// Validate a client allocation against the round's stock set.
    pub fn from_request(
        raw: &IndexMap<String, f64>,
        table: &RoundTable,
    ) -> Result<Self, AllocationError> {
        if raw.is_empty() {
            return Err(AllocationError::Empty);
        }

        let mut weights = IndexMap::with_capacity(raw.len());
        let mut total: u64 = 0;
        for (ticker, &weight) in raw {
            let canonical = ticker.trim().to_ascii_uppercase();
            if !table.contains(&canonical) {
                return Err(AllocationError::UnknownTicker(ticker.clone()));
            }
            if weight.is_finite() && weight < 0.0 {
                return Err(AllocationError::Negative {
                    ticker: canonical,
                    weight,
                });
            }
            if !weight.is_finite() || weight.fract() != 0.0 || weight > f64::from(u32::MAX) {
                return Err(AllocationError::NotWhole {
                    ticker: canonical,
                    weight,
                });
            }

            let value = weight as u32;
            total += u64::from(value);
            if weights.insert(canonical.clone(), value).is_some() {
                return Err(AllocationError::DuplicateTicker(canonical));
            }
        }

        if total != u64::from(FULL_ALLOCATION) {
            return Err(AllocationError::BadTotal(total));
        }

        Ok(Self { weights })
    }

    /// Percentage held in `ticker`; zero when the ticker was not allocated.
    pub fn weight(&self, ticker: &str) -> u32 {
        self.weights.get(ticker).copied().unwrap_or(0)
    }

    #[cfg(test)]
    fn total(&self) -> u32 {
        self.weights.values().sum()
    }

    #[cfg(test)]
    fn is_cash(&self) -> bool {
        self.total() == 0
    }
}
