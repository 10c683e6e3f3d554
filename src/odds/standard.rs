//! Standard back/lay hedge.
//!
//! Back `stake` at the bookmaker at `back_odds`, lay the same outcome on the
//! exchange at `lay_odds`, paying `commission_pct` on exchange winnings.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::CalculationError;

/// Result of pricing a standard hedge. Values are unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardHedge {
    pub back_stake: f64,
    pub lay_stake: f64,
    /// Exposure on the exchange if the backed outcome happens.
    pub liability: f64,
    /// Net result when the back bet wins.
    pub profit_if_back_wins: f64,
    /// Net result when the lay bet wins.
    pub qualifying_loss: f64,
}

impl StandardHedge {
    /// Gap between the two outcome branches. Near zero means the pair is
    /// balanced.
    pub fn spread(&self) -> f64 {
        (self.profit_if_back_wins - self.qualifying_loss).abs()
    }

    /// The worse of the two outcomes.
    pub fn worst_case(&self) -> f64 {
        self.profit_if_back_wins.min(self.qualifying_loss)
    }
}

/// Convert a commission percentage to a rate, checking it is within [0, 100).
pub(crate) fn commission_rate(commission_pct: f64) -> Result<f64, CalculationError> {
    if !(0.0..100.0).contains(&commission_pct) {
        return Err(CalculationError::CommissionOutOfRange(commission_pct));
    }
    Ok(commission_pct / 100.0)
}

/// Stake to lay so that both branches of a back bet come out level:
/// `(back_odds × back_stake) / (lay_odds − commission_rate)`.
pub(crate) fn lay_stake(back_odds: f64, lay_odds: f64, back_stake: f64, commission_rate: f64) -> f64 {
    (back_odds * back_stake) / (lay_odds - commission_rate)
}

/// Price a standard hedge.
///
/// Fails when `back_odds ≤ 1`, `lay_odds ≤ 1`, `lay_odds` does not exceed the
/// commission rate, `stake ≤ 0`, or the commission is outside [0, 100).
pub fn calculate_standard(
    back_odds: f64,
    lay_odds: f64,
    stake: f64,
    commission_pct: f64,
) -> Result<StandardHedge, CalculationError> {
    let rate = commission_rate(commission_pct)?;

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
    if !(stake > 0.0) {
        return Err(CalculationError::NonPositiveStake(stake));
    }

    let lay_stake = lay_stake(back_odds, lay_odds, stake, rate);
    let liability = lay_stake * (lay_odds - 1.0);
    let profit_if_back_wins = stake * (back_odds - 1.0) - liability;
    let qualifying_loss = lay_stake * (1.0 - rate) - stake;

    debug!(
        back_odds,
        lay_odds,
        stake,
        lay_stake = format!("{:.2}", lay_stake),
        liability = format!("{:.2}", liability),
        qualifying_loss = format!("{:.2}", qualifying_loss),
        "Standard hedge priced"
    );

    Ok(StandardHedge {
        back_stake: stake,
        lay_stake,
        liability,
        profit_if_back_wins,
        qualifying_loss,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_baseline_hedge() {
        // 10.0 / 11.0, £10 stake, 2% commission
        let h = assert_ok!(calculate_standard(10.0, 11.0, 10.0, 2.0));

        let expected_lay = 100.0 / 10.98;
        assert!(close(h.lay_stake, expected_lay));
        assert!(close(h.liability, expected_lay * 10.0));
        assert!(close(h.profit_if_back_wins, 90.0 - expected_lay * 10.0));
        assert!(close(h.qualifying_loss, expected_lay * 0.98 - 10.0));

        assert!((h.lay_stake - 9.11).abs() < 0.01);
        assert!((h.liability - 91.07).abs() < 0.01);
        assert!((h.profit_if_back_wins - -1.07).abs() < 0.01);
        assert!((h.qualifying_loss - -1.07).abs() < 0.01);
        assert_eq!(h.back_stake, 10.0);
    }

    #[test]
    fn test_zero_commission_short_odds() {
        let h = calculate_standard(2.0, 2.0, 10.0, 0.0).unwrap();
        assert!(close(h.lay_stake, 10.0));
        assert!(close(h.liability, 10.0));
        assert!(close(h.profit_if_back_wins, 0.0));
        assert!(close(h.qualifying_loss, 0.0));
        assert!(h.spread() < 1e-9);
    }

    #[test]
    fn test_branches_level_when_hedged() {
        let h = calculate_standard(3.0, 3.1, 25.0, 5.0).unwrap();
        assert!(h.spread() < 1e-9);
        assert!((h.qualifying_loss - -1.64).abs() < 0.01);
        assert!(close(h.worst_case(), h.profit_if_back_wins.min(h.qualifying_loss)));
    }

    #[test]
    fn test_boosted_odds_profit() {
        // Back price above the lay price: the hedge locks in a profit
        let h = calculate_standard(4.0, 3.5, 10.0, 2.0).unwrap();
        assert!(h.qualifying_loss > 0.0);
        assert!(h.profit_if_back_wins > 0.0);
    }

    #[test]
    fn test_rejects_back_odds_at_one() {
        assert_eq!(
            assert_err!(calculate_standard(1.0, 2.0, 10.0, 2.0)),
            CalculationError::BackOddsTooLow(1.0)
        );
    }

    #[test]
    fn test_rejects_lay_odds_at_one() {
        assert_eq!(
            assert_err!(calculate_standard(2.0, 1.0, 10.0, 2.0)),
            CalculationError::LayOddsTooLow(1.0)
        );
    }

    #[test]
    fn test_rejects_lay_odds_below_commission() {
        assert_eq!(
            calculate_standard(2.0, 0.01, 10.0, 2.0).unwrap_err(),
            CalculationError::LayOddsBelowCommission { lay_odds: 0.01, commission_rate: 0.02 }
        );
    }

    #[test]
    fn test_rejects_non_positive_stake() {
        assert_eq!(
            calculate_standard(2.0, 2.1, 0.0, 2.0).unwrap_err(),
            CalculationError::NonPositiveStake(0.0)
        );
        assert!(calculate_standard(2.0, 2.1, -5.0, 2.0).is_err());
    }

    #[test]
    fn test_rejects_commission_out_of_range() {
        assert_eq!(
            calculate_standard(2.0, 2.1, 10.0, 100.0).unwrap_err(),
            CalculationError::CommissionOutOfRange(100.0)
        );
        assert!(calculate_standard(2.0, 2.1, 10.0, -1.0).is_err());
    }

    #[test]
    fn test_rejects_nan_inputs() {
        assert!(calculate_standard(f64::NAN, 2.1, 10.0, 2.0).is_err());
        assert!(calculate_standard(2.0, 2.1, f64::NAN, 2.0).is_err());
        assert!(calculate_standard(2.0, 2.1, 10.0, f64::NAN).is_err());
    }
}
