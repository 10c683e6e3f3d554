//! Odds and stake calculation.
//!
//! Pure functions: no state, no I/O. All arithmetic stays in unrounded
//! `f64`; rounding to pence happens only in `money` and `RoundedOutcome`,
//! which exist for display.

pub mod each_way;
pub mod standard;

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{CalculationError, HorseRacingOpportunity, Opportunity, Sport};
pub use each_way::{calculate_each_way, EachWayHedge};
pub use standard::{calculate_standard, StandardHedge};

/// Which hedge the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CalculationMode {
    #[default]
    Standard,
    EachWay,
}

/// Immutable snapshot of one calculation: one opportunity, one stake, one
/// commission rate. A new calculation produces a new value.
///
/// An `EachWay` result can only hold a horse racing opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "calculation_type")]
pub enum CalculatedOpportunity {
    Standard {
        opportunity: Opportunity,
        commission_pct: f64,
        hedge: StandardHedge,
    },
    EachWay {
        opportunity: HorseRacingOpportunity,
        commission_pct: f64,
        hedge: EachWayHedge,
    },
}

/// Price an opportunity.
///
/// Football is always a standard hedge. Horse racing is standard (win only)
/// or each-way depending on `mode`.
pub fn calculate(
    opportunity: &Opportunity,
    stake: f64,
    commission_pct: f64,
    mode: CalculationMode,
) -> Result<CalculatedOpportunity, CalculationError> {
    match (opportunity, mode) {
        (Opportunity::HorseRacing(racing), CalculationMode::EachWay) => {
            let hedge = calculate_each_way(
                racing.back_odds,
                racing.lay_odds,
                racing.place_terms,
                stake,
                commission_pct,
            )?;
            Ok(CalculatedOpportunity::EachWay {
                opportunity: racing.clone(),
                commission_pct,
                hedge,
            })
        }
        (Opportunity::Football(_), CalculationMode::EachWay) => {
            Err(CalculationError::EachWayUnavailable(Sport::Football))
        }
        (_, CalculationMode::Standard) => {
            let hedge = calculate_standard(
                opportunity.back_odds(),
                opportunity.lay_odds(),
                stake,
                commission_pct,
            )?;
            Ok(CalculatedOpportunity::Standard {
                opportunity: opportunity.clone(),
                commission_pct,
                hedge,
            })
        }
    }
}

impl CalculatedOpportunity {
    pub fn mode(&self) -> CalculationMode {
        match self {
            CalculatedOpportunity::Standard { .. } => CalculationMode::Standard,
            CalculatedOpportunity::EachWay { .. } => CalculationMode::EachWay,
        }
    }

    pub fn opportunity_id(&self) -> &str {
        match self {
            CalculatedOpportunity::Standard { opportunity, .. } => opportunity.id(),
            CalculatedOpportunity::EachWay { opportunity, .. } => &opportunity.id,
        }
    }

    pub fn sport(&self) -> Sport {
        match self {
            CalculatedOpportunity::Standard { opportunity, .. } => opportunity.sport(),
            CalculatedOpportunity::EachWay { .. } => Sport::HorseRacing,
        }
    }

    pub fn liquidity(&self) -> Decimal {
        match self {
            CalculatedOpportunity::Standard { opportunity, .. } => opportunity.liquidity(),
            CalculatedOpportunity::EachWay { opportunity, .. } => opportunity.liquidity,
        }
    }

    /// Total placed with the bookmaker.
    pub fn stake(&self) -> f64 {
        match self {
            CalculatedOpportunity::Standard { hedge, .. } => hedge.back_stake,
            CalculatedOpportunity::EachWay { hedge, .. } => hedge.total_stake,
        }
    }

    /// Stake as money, for session accounting and limit checks.
    pub fn staked(&self) -> Decimal {
        money(self.stake())
    }

    /// Total exchange liability that must be available to place the lay(s).
    pub fn liability(&self) -> f64 {
        match self {
            CalculatedOpportunity::Standard { hedge, .. } => hedge.liability,
            CalculatedOpportunity::EachWay { hedge, .. } => hedge.total_liability(),
        }
    }

    /// Expected net result once the bet settles: the qualifying loss for a
    /// standard hedge, the losing outcome for each-way.
    pub fn net_outcome(&self) -> f64 {
        match self {
            CalculatedOpportunity::Standard { hedge, .. } => hedge.qualifying_loss,
            CalculatedOpportunity::EachWay { hedge, .. } => hedge.profit_if_lose,
        }
    }

    /// Presentation view with every figure rounded to pence.
    pub fn rounded(&self) -> RoundedOutcome {
        match self {
            CalculatedOpportunity::Standard { hedge, .. } => RoundedOutcome::Standard {
                back_stake: money(hedge.back_stake),
                lay_stake: money(hedge.lay_stake),
                liability: money(hedge.liability),
                profit_if_back_wins: money(hedge.profit_if_back_wins),
                qualifying_loss: money(hedge.qualifying_loss),
            },
            CalculatedOpportunity::EachWay { hedge, .. } => RoundedOutcome::EachWay {
                total_stake: money(hedge.total_stake),
                win_back_stake: money(hedge.win_back_stake),
                win_lay_stake: money(hedge.win_lay_stake),
                win_liability: money(hedge.win_liability),
                place_back_stake: money(hedge.place_back_stake),
                place_lay_stake: money(hedge.place_lay_stake),
                place_liability: money(hedge.place_liability),
                profit_if_win: money(hedge.profit_if_win),
                profit_if_place: money(hedge.profit_if_place),
                profit_if_lose: money(hedge.profit_if_lose),
            },
        }
    }
}

impl fmt::Display for CalculatedOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalculatedOpportunity::Standard { opportunity, commission_pct, hedge } => write!(
                f,
                "{} | back £{:.2} lay £{:.2} @ {:.2} (liability £{:.2}, comm {}%) | win {:+.2} lose {:+.2}",
                opportunity.label(),
                hedge.back_stake,
                hedge.lay_stake,
                opportunity.lay_odds(),
                hedge.liability,
                commission_pct,
                hedge.profit_if_back_wins,
                hedge.qualifying_loss,
            ),
            CalculatedOpportunity::EachWay { opportunity, commission_pct, hedge } => write!(
                f,
                "{} ({}) EW £{:.2} | lay win £{:.2} place £{:.2} (comm {}%) | win {:+.2} place {:+.2} lose {:+.2}",
                opportunity.horse_name,
                opportunity.event_name,
                hedge.total_stake,
                hedge.win_lay_stake,
                hedge.place_lay_stake,
                commission_pct,
                hedge.profit_if_win,
                hedge.profit_if_place,
                hedge.profit_if_lose,
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Presentation rounding
// ---------------------------------------------------------------------------

/// Round an amount to pence, half away from zero. Non-finite input maps to zero.
pub fn money(amount: f64) -> Decimal {
    Decimal::from_f64(amount)
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Figures of a `CalculatedOpportunity` rounded for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RoundedOutcome {
    Standard {
        back_stake: Decimal,
        lay_stake: Decimal,
        liability: Decimal,
        profit_if_back_wins: Decimal,
        qualifying_loss: Decimal,
    },
    EachWay {
        total_stake: Decimal,
        win_back_stake: Decimal,
        win_lay_stake: Decimal,
        win_liability: Decimal,
        place_back_stake: Decimal,
        place_lay_stake: Decimal,
        place_liability: Decimal,
        profit_if_win: Decimal,
        profit_if_place: Decimal,
        profit_if_lose: Decimal,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
