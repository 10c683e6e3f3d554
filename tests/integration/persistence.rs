//! State survives a restart; damaged keys only reset themselves.

use chrono::Duration;
use rust_decimal_macros::dec;
use std::sync::Arc;

use calmbet::clock::ManualClock;
use calmbet::guardrail::GuardrailEngine;
use calmbet::odds::CalculationMode;
use calmbet::session::{SessionStats, SettingField};
use calmbet::storage::{JsonFileStore, MemoryStore, PersistenceGateway, PersistenceWriter, StorageKey};
use calmbet::types::*;

use crate::fixtures::{football, saturday};

#[tokio::test]
async fn test_restart_mid_day_keeps_counters() {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::new(saturday(11, 0));
    let (writer, _task) = PersistenceWriter::spawn(store.clone());

    {
        let mut engine = GuardrailEngine::load(store.as_ref(), writer.clone(), Arc::new(clock.clone())).await;
        engine.update_setting(SettingField::MaxDailyStake, "90").unwrap();
        for id in ["a", "b"] {
            let calc = engine
                .calculate(&football(id, 3.0, 3.1, 700), 25.0, CalculationMode::Standard)
                .unwrap();
            engine.complete_opportunity(calc, CompletionStatus::Done).unwrap();
        }
        engine.dismiss_nudge(NudgeKind::SessionStreak).unwrap();
        writer.flush().await;
    }

    clock.advance(Duration::hours(2));
    let mut engine = GuardrailEngine::load(store.as_ref(), PersistenceWriter::detached(), Arc::new(clock.clone())).await;
    assert_eq!(engine.settings().max_daily_stake, dec!(90));
    assert_eq!(engine.stats().actions_today, 2);
    assert_eq!(engine.stats().today_stake, dec!(50));
    assert_eq!(engine.history().len(), 2);
    assert!(engine.harm().is_dismissed(NudgeKind::SessionStreak));

    let nudge = engine.evaluate(Some(dec!(75))).unwrap();
    assert_eq!(nudge.kind(), NudgeKind::StakeLimit);
    let nudge = engine.evaluate(Some(dec!(45))).unwrap();
    assert_eq!(nudge.kind(), NudgeKind::DailyLimit);
    assert_eq!(engine.evaluate(Some(dec!(40))), None);
}

#[tokio::test]
async fn test_restart_next_day_resets_day_counters() {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::new(saturday(21, 0));
    let (writer, _task) = PersistenceWriter::spawn(store.clone());

    let mut engine = GuardrailEngine::load(store.as_ref(), writer.clone(), Arc::new(clock.clone())).await;
    engine.record_action(dec!(30)).unwrap();
    engine.record_action(dec!(30)).unwrap();
    writer.flush().await;
    drop(engine);

    clock.advance(Duration::hours(12));
    let engine = GuardrailEngine::load(store.as_ref(), PersistenceWriter::detached(), Arc::new(clock.clone())).await;
    assert_eq!(engine.stats().actions_today, 0);
    assert_eq!(engine.stats().today_stake, dec!(0));
    assert_eq!(engine.stats().current_session_actions, 2);
}

#[tokio::test]
async fn test_self_exclusion_survives_restart() {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::new(saturday(22, 0));
    let (writer, _task) = PersistenceWriter::spawn(store.clone());

    let mut engine = GuardrailEngine::load(store.as_ref(), writer.clone(), Arc::new(clock.clone())).await;
    let until = engine.request_self_exclusion(30).unwrap();
    writer.flush().await;
    drop(engine);

    clock.advance(Duration::days(3));
    let mut engine = GuardrailEngine::load(store.as_ref(), writer.clone(), Arc::new(clock.clone())).await;
    assert!(engine.is_self_excluded());
    assert_eq!(engine.request_self_exclusion(2), Some(until));
    assert_eq!(engine.evaluate(None), Some(Nudge::SelfExclusion { until }));
}

#[tokio::test]
async fn test_exclusion_end_date_alone_decides() {
    let store = Arc::new(MemoryStore::new());
    store.insert_raw(StorageKey::SelfExclusion.as_str(), r#"{"until":"2026-12-31T00:00:00Z"}"#);
    let clock = ManualClock::new(saturday(12, 0));
    let (writer, _task) = PersistenceWriter::spawn(store.clone());

    let mut engine = GuardrailEngine::load(store.as_ref(), writer.clone(), Arc::new(clock.clone())).await;
    assert!(engine.is_self_excluded());
    assert_eq!(engine.evaluate(None).map(|n| n.kind()), Some(NudgeKind::SelfExclusion));
    assert!(engine.record_action(dec!(5)).is_err());
    writer.flush().await;
    drop(engine);

    // Stored record now says active
    let raw = store.load(StorageKey::SelfExclusion.as_str()).await.unwrap().unwrap();
    assert!(raw.contains("\"active\":true"));

    // Past the end, then the clock is wound back before it
    clock.set(saturday(12, 0) + Duration::days(120));
    let mut engine = GuardrailEngine::load(store.as_ref(), writer.clone(), Arc::new(clock.clone())).await;
    assert!(!engine.is_self_excluded());
    assert!(engine.record_action(dec!(5)).is_ok());
    writer.flush().await;
    drop(engine);

    clock.set(saturday(12, 0) + Duration::days(60));
    let mut engine = GuardrailEngine::load(store.as_ref(), PersistenceWriter::detached(), Arc::new(clock.clone())).await;
    assert!(engine.is_self_excluded());
    assert!(engine.record_action(dec!(5)).is_err());
}

#[tokio::test]
async fn test_corrupted_keys_fall_back_independently() {
    let store = MemoryStore::new();
    let stats = SessionStats {
        day: Some(saturday(9, 0).date_naive()),
        actions_today: 3,
        today_stake: dec!(45),
        current_session_actions: 3,
        ..Default::default()
    };
    store.insert_raw(StorageKey::SessionStats.as_str(), &serde_json::to_string(&stats).unwrap());
    store.insert_raw(StorageKey::Settings.as_str(), "{\"commission_pct\": \"lots\"");
    store.insert_raw(StorageKey::History.as_str(), "not json");
    store.insert_raw(StorageKey::SelfExclusion.as_str(), "[]");

    let clock = ManualClock::new(saturday(10, 0));
    let engine = GuardrailEngine::load(&store, PersistenceWriter::detached(), Arc::new(clock)).await;

    assert_eq!(engine.settings().commission_pct, 2.0);
    assert!(engine.history().is_empty());
    assert!(!engine.is_self_excluded());
    assert_eq!(engine.stats().today_stake, dec!(45));
}

#[tokio::test]
async fn test_json_file_store_round_trip() {
    let dir = std::env::temp_dir().join(format!("calmbet-it-{}", uuid::Uuid::new_v4()));
    let dir_str = dir.to_string_lossy().to_string();
    let store = Arc::new(JsonFileStore::new(Some(&dir_str)));
    let clock = ManualClock::new(saturday(15, 0));
    let (writer, _task) = PersistenceWriter::spawn(store.clone());

    let mut engine = GuardrailEngine::load(store.as_ref(), writer.clone(), Arc::new(clock.clone())).await;
    engine.take_break(20).unwrap();
    engine.update_setting(SettingField::QuietHours, "22:00-06:30").unwrap();
    writer.flush().await;

    let raw = store.load(StorageKey::BreakUntil.as_str()).await.unwrap();
    assert!(raw.is_some());

    let reloaded = GuardrailEngine::load(store.as_ref(), PersistenceWriter::detached(), Arc::new(clock.clone())).await;
    assert!(reloaded.is_on_break());
    assert_eq!(
        reloaded.settings().quiet_hours.map(|q| q.start.to_string()),
        Some("22:00".to_string())
    );

    let _ = tokio::fs::remove_dir_all(&dir).await;
}
