//! End-to-end: price opportunities, ask the guardrails, record bets.

use chrono::Duration;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use calmbet::clock::ManualClock;
use calmbet::guardrail::GuardrailEngine;
use calmbet::odds::{money, CalculatedOpportunity, CalculationMode};
use calmbet::session::SettingField;
use calmbet::types::*;

use crate::fixtures::{football, racing, saturday};

fn engine_at(hour: u32, minute: u32) -> (GuardrailEngine, ManualClock) {
    let clock = ManualClock::new(saturday(hour, minute));
    (GuardrailEngine::in_memory(Arc::new(clock.clone())), clock)
}

#[test]
fn test_afternoon_session() {
    let (mut engine, clock) = engine_at(14, 0);
    let opp = football("m1", 10.0, 11.0, 2500);

    let calc = engine.calculate(&opp, 10.0, CalculationMode::Standard).unwrap();
    let view = calc.rounded();
    match view {
        calmbet::odds::RoundedOutcome::Standard { lay_stake, liability, qualifying_loss, .. } => {
            assert_eq!(lay_stake, dec!(9.11));
            assert_eq!(liability, dec!(91.07));
            assert_eq!(qualifying_loss, dec!(-1.07));
        }
        other => panic!("expected a standard view, got {other:?}"),
    }

    // Default filters: liquidity ≥ 200, loss no worse than -1.00
    assert!(!engine.settings().admits(&calc));
    assert_ok!(engine.update_setting(SettingField::MaxQualifyingLoss, "-1.50"));
    assert!(engine.settings().admits(&calc));

    assert_eq!(engine.evaluate(Some(calc.staked())), None);
    let stats = engine.complete_opportunity(calc, CompletionStatus::Done).unwrap();
    assert_eq!(stats.actions_today, 1);
    assert_eq!(stats.today_stake, dec!(10));
    assert_eq!(engine.today_net(), dec!(-1.07));

    // Four more and the streak nudge appears
    for i in 0..4 {
        clock.advance(Duration::minutes(5));
        let calc = engine
            .calculate(&football(&format!("m{}", i + 2), 3.0, 3.05, 900), 10.0, CalculationMode::Standard)
            .unwrap();
        assert_eq!(engine.evaluate(Some(calc.staked())), None);
        engine.complete_opportunity(calc, CompletionStatus::Done).unwrap();
    }
    let nudge = engine.evaluate(Some(dec!(10))).unwrap();
    assert_eq!(nudge, Nudge::SessionStreak { actions: 5 });
    assert_eq!(nudge.secondary_action(), Some(NudgeAction::Dismiss));

    engine.respond(&nudge, NudgeAction::Dismiss).unwrap();
    assert_eq!(engine.evaluate(Some(dec!(10))), None);
    assert_eq!(engine.history().len(), 5);
}

#[test]
fn test_each_way_racing() {
    let (mut engine, _) = engine_at(13, 0);
    let opp = racing("r1", 10.0, 11.0, 0.25, 4);

    let calc = engine.calculate(&opp, 10.0, CalculationMode::EachWay).unwrap();
    assert_eq!(calc.mode(), CalculationMode::EachWay);
    assert_eq!(calc.staked(), dec!(10));
    match &calc {
        CalculatedOpportunity::EachWay { hedge, .. } => {
            assert!((hedge.win_back_stake - 5.0).abs() < 1e-12);
            assert!((hedge.place_odds - 3.25).abs() < 1e-12);
            assert!((hedge.place_lay_odds - 3.5).abs() < 1e-12);
            assert!((hedge.profit_if_lose - -0.9612).abs() < 0.005);
        }
        other => panic!("expected each-way, got {other:?}"),
    }

    let football = football("m9", 2.0, 2.1, 500);
    let err = assert_err!(engine.calculate(&football, 10.0, CalculationMode::EachWay));
    assert_eq!(err, CalculationError::EachWayUnavailable(Sport::Football));

    engine.complete_opportunity(calc, CompletionStatus::Done).unwrap();
    assert_eq!(engine.stats().today_stake, dec!(10));
}

#[test]
fn test_unpriceable_hedge_is_reported() {
    let (engine, _) = engine_at(13, 0);
    let err = assert_err!(engine.calculate(&football("bad", 1.0, 2.0, 500), 10.0, CalculationMode::Standard));
    assert_eq!(err, CalculationError::BackOddsTooLow(1.0));
}

#[test]
fn test_limits_late_in_the_day() {
    let (mut engine, clock) = engine_at(18, 0);
    for i in 0..4 {
        let calc = engine
            .calculate(&football(&format!("d{i}"), 2.5, 2.56, 900), 45.0, CalculationMode::Standard)
            .unwrap();
        engine.complete_opportunity(calc, CompletionStatus::Done).unwrap();
    }
    engine.start_new_session();
    assert_eq!(engine.stats().today_stake, dec!(180));

    // Per-bet limit comes before the daily limit
    let nudge = engine.evaluate(Some(dec!(70))).unwrap();
    assert_eq!(nudge.kind(), NudgeKind::StakeLimit);
    assert_eq!(nudge.secondary_action(), None);

    let nudge = engine.evaluate(Some(dec!(50))).unwrap();
    assert_eq!(
        nudge,
        Nudge::DailyLimit {
            staked_today: dec!(180),
            proposed: dec!(50),
            limit: dec!(200)
        }
    );
    assert_err!(engine.dismiss_nudge(NudgeKind::DailyLimit));

    // Late night outranks the limit check
    clock.set(saturday(23, 45));
    let nudge = engine.evaluate(Some(dec!(500))).unwrap();
    assert_eq!(nudge.kind(), NudgeKind::LateNight);

    // After midnight the day counters reset but quiet hours still apply
    clock.advance(Duration::hours(1));
    engine.dismiss_nudge(NudgeKind::LateNight).unwrap();
    assert_eq!(engine.evaluate(Some(dec!(50))), None);
    assert_eq!(engine.stats().today_stake, dec!(0));
}

#[test]
fn test_self_exclusion_locks_everything() {
    let (mut engine, clock) = engine_at(20, 0);
    let until = engine.request_self_exclusion(7).unwrap();

    // Asking for less later never shortens it
    clock.advance(Duration::days(1));
    assert_eq!(engine.request_self_exclusion(1), Some(until));

    let calc = engine
        .calculate(&football("x1", 4.0, 4.2, 900), 10.0, CalculationMode::Standard)
        .unwrap();
    assert_eq!(engine.evaluate(Some(dec!(10))), Some(Nudge::SelfExclusion { until }));
    let nudge = engine.evaluate(None).unwrap();
    assert_eq!(nudge.secondary_action(), None);
    assert_err!(engine.dismiss_nudge(NudgeKind::SelfExclusion));

    let err = assert_err!(engine.complete_opportunity(calc.clone(), CompletionStatus::Done));
    assert_eq!(err, GuardrailError::SelfExcluded { until });
    assert!(engine.history().is_empty());

    clock.set(until.with_timezone(&saturday(0, 0).timezone()));
    assert_eq!(engine.evaluate(None).map(|n| n.kind()), None);
    assert_ok!(engine.complete_opportunity(calc, CompletionStatus::Done));
    assert_eq!(money(engine.history()[0].calculation.stake()), dec!(10));
}
