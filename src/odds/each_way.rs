//! Each-way hedge (horse racing).
//!
//! The total stake is split evenly into a win part and a place part. Each
//! part is laid separately: the win part against the exchange win market,
//! the place part against a place price derived from the lay odds.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::standard::{commission_rate, lay_stake};
use crate::types::{CalculationError, PlaceTerms};

/// Result of pricing an each-way hedge. Values are unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EachWayHedge {
    pub total_stake: f64,
    pub win_back_stake: f64,
    pub win_lay_stake: f64,
    pub win_liability: f64,
    pub place_back_stake: f64,
    pub place_lay_stake: f64,
    pub place_liability: f64,
    /// Effective bookmaker odds paid on the place part.
    pub place_odds: f64,
    /// Exchange odds the place part is laid at.
    pub place_lay_odds: f64,
    pub profit_if_win: f64,
    pub profit_if_place: f64,
    pub profit_if_lose: f64,
}

impl EachWayHedge {
    /// Combined exchange exposure if the selection wins.
    pub fn total_liability(&self) -> f64 {
        self.win_liability + self.place_liability
    }

    /// The worst of the three outcomes.
    pub fn worst_case(&self) -> f64 {
        self.profit_if_win
            .min(self.profit_if_place)
            .min(self.profit_if_lose)
    }
}

/// Scale decimal odds by a place fraction: `1 + (odds − 1) × fraction`.
pub fn scale_odds(odds: f64, fraction: f64) -> f64 {
    1.0 + (odds - 1.0) * fraction
}

/// Price an each-way hedge for `total_stake` split evenly over win and place.
///
/// The place lay price mirrors the bookmaker's place terms onto the exchange
/// win price, so both legs are scaled the same way.
pub fn calculate_each_way(
    back_odds: f64,
    lay_odds: f64,
    place_terms: PlaceTerms,
    total_stake: f64,
    commission_pct: f64,
) -> Result<EachWayHedge, CalculationError> {
    let rate = commission_rate(commission_pct)?;

    if !(place_terms.fraction > 0.0 && place_terms.fraction <= 1.0) {
        return Err(CalculationError::PlaceFractionOutOfRange(place_terms.fraction));
    }
    if place_terms.places < 1 {
        return Err(CalculationError::NoPlaces(place_terms.places));
    }
    if !(lay_odds > rate) {
        return Err(CalculationError::LayOddsBelowCommission {
            lay_odds,
            commission_rate: rate,
        });
    }
    if !(back_odds > 1.0) {
        return Err(CalculationError::BackOddsTooLow(back_odds));
    }
    if !(lay_odds > 1.0) {
        return Err(CalculationError::LayOddsTooLow(lay_odds));
    }
    if !(total_stake > 0.0) {
        return Err(CalculationError::NonPositiveStake(total_stake));
    }

    let win_back_stake = total_stake / 2.0;
    let place_back_stake = total_stake / 2.0;

    // Win leg
    let win_lay_stake = lay_stake(back_odds, lay_odds, win_back_stake, rate);
    let win_liability = win_lay_stake * (lay_odds - 1.0);
    let win_lay_profit = win_lay_stake * (1.0 - rate);

    // Place leg
    let place_odds = scale_odds(back_odds, place_terms.fraction);
    let place_lay_odds = scale_odds(lay_odds, place_terms.fraction);
    let place_lay_stake = lay_stake(place_odds, place_lay_odds, place_back_stake, rate);
    let place_liability = place_lay_stake * (place_lay_odds - 1.0);
    let place_lay_profit = place_lay_stake * (1.0 - rate);

    let profit_if_win = win_back_stake * (back_odds - 1.0)
        + place_back_stake * (place_odds - 1.0)
        - win_liability
        - place_liability;

    let profit_if_place =
        place_back_stake * (place_odds - 1.0) - win_back_stake + win_lay_profit - place_liability;

    let profit_if_lose = win_lay_profit + place_lay_profit - total_stake;

    debug!(
        back_odds,
        lay_odds,
        fraction = place_terms.fraction,
        places = place_terms.places,
        total_stake,
        win = format!("{:.2}", profit_if_win),
        place = format!("{:.2}", profit_if_place),
        lose = format!("{:.2}", profit_if_lose),
        "Each-way hedge priced"
    );

    Ok(EachWayHedge {
        total_stake,
        win_back_stake,
        win_lay_stake,
        win_liability,
        place_back_stake,
        place_lay_stake,
        place_liability,
        place_odds,
        place_lay_odds,
        profit_if_win,
        profit_if_place,
        profit_if_lose,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
