//! The scheduler running against a shared engine.

use chrono::Duration;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;
use tokio::time::timeout;

use calmbet::clock::ManualClock;
use calmbet::config::AppConfig;
use calmbet::guardrail::{GuardrailEngine, RealityCheck, RealityCheckScheduler};
use calmbet::storage::{MemoryStore, PersistenceWriter};
use calmbet::types::NudgeKind;

use crate::fixtures::saturday;

#[tokio::test]
async fn test_summary_after_an_hour_then_break() {
    let cfg = AppConfig::parse("[reality_check]\npoll_interval_secs = 1\n").unwrap();
    let store = Arc::new(MemoryStore::new());
    let (writer, _task) = PersistenceWriter::spawn(store.clone());
    let clock = ManualClock::new(saturday(15, 0));

    let engine = GuardrailEngine::load(store.as_ref(), writer.clone(), Arc::new(clock.clone())).await;
    let check = RealityCheck::load(store.as_ref(), writer.clone(), cfg.reality_check.clone()).await;
    let engine = Arc::new(Mutex::new(engine));
    let scheduler = RealityCheckScheduler::new(check, engine.clone())
        .with_poll_interval(StdDuration::from_millis(10));

    // First poll only stamps the start
    assert_eq!(scheduler.poll_now(), None);

    {
        let mut e = engine.lock().unwrap();
        e.record_action(dec!(12)).unwrap();
        e.record_action(dec!(8)).unwrap();
    }
    clock.advance(Duration::minutes(61));

    let (handle, mut summaries) = scheduler.spawn();
    let summary = timeout(StdDuration::from_secs(2), summaries.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.actions_completed, 2);
    assert_eq!(summary.total_staked, dec!(20));
    assert_eq!(summary.session_minutes, 61);

    // Prompt is open; nothing more arrives
    clock.advance(Duration::minutes(61));
    assert!(timeout(StdDuration::from_millis(100), summaries.recv()).await.is_err());

    scheduler.take_break().unwrap();
    {
        let mut e = engine.lock().unwrap();
        assert!(e.is_on_break());
        assert_eq!(e.evaluate(None).map(|n| n.kind()), Some(NudgeKind::Break));
    }

    handle.stop().await;
}

#[tokio::test]
async fn test_self_excluded_user_gets_no_summaries() {
    let clock = ManualClock::new(saturday(15, 0));
    let mut engine = GuardrailEngine::in_memory(Arc::new(clock.clone()));
    let mut check = RealityCheck::new(Default::default(), PersistenceWriter::detached());
    check.poll(&engine);

    for _ in 0..12 {
        engine.record_action(dec!(5)).unwrap();
    }
    engine.request_self_exclusion(1);
    clock.advance(Duration::minutes(90));

    let scheduler = RealityCheckScheduler::new(check, Arc::new(Mutex::new(engine)))
        .with_poll_interval(StdDuration::from_millis(5));
    let (handle, mut summaries) = scheduler.spawn();
    assert!(timeout(StdDuration::from_millis(100), summaries.recv()).await.is_err());
    assert!(!scheduler.is_prompt_open());
    drop(handle);
}
