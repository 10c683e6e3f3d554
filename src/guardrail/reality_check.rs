//! Reality checks: a periodic full session summary, separate from the
//! per-action nudges.
//!
//! A summary is due when any of these hold:
//! - time since the last summary exceeds `summary_interval_mins`
//! - the session gained `action_count` actions since the last summary
//! - today's stake passed `daily_stake_fraction` of the daily limit (once a day)
//!
//! Nothing is evaluated while a prompt is open or while self-excluded.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::GuardrailEngine;
use crate::config::RealityCheckConfig;
use crate::storage::{load_or_default, PersistenceGateway, PersistenceWriter, StorageKey};
use crate::types::GuardrailError;

/// Payload of the session-summary prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_minutes: i64,
    pub total_staked: Decimal,
    pub net_profit: Decimal,
    pub actions_completed: u32,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} min | {} bets | £{:.2} staked | £{:.2} net",
            self.session_minutes, self.actions_completed, self.total_staked, self.net_profit,
        )
    }
}

/// Persisted bookkeeping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
struct CheckRecord {
    last_check: Option<DateTime<Utc>>,
    /// Session actions at the last summary.
    actions_baseline: u32,
    /// Local day the stake trigger last fired.
    stake_alert_day: Option<NaiveDate>,
}

/// Trigger evaluation and prompt state.
#[derive(Debug)]
pub struct RealityCheck {
    record: CheckRecord,
    prompt_open: bool,
    config: RealityCheckConfig,
    writer: PersistenceWriter,
}

impl RealityCheck {
    pub fn new(config: RealityCheckConfig, writer: PersistenceWriter) -> Self {
        Self {
            record: CheckRecord::default(),
            prompt_open: false,
            config,
            writer,
        }
    }

    pub async fn load(
        gateway: &dyn PersistenceGateway,
        writer: PersistenceWriter,
        config: RealityCheckConfig,
    ) -> Self {
        let record: CheckRecord = load_or_default(gateway, StorageKey::RealityCheck).await;
        Self {
            record,
            ..Self::new(config, writer)
        }
    }

    pub fn config(&self) -> &RealityCheckConfig {
        &self.config
    }

    pub fn is_prompt_open(&self) -> bool {
        self.prompt_open
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.record.last_check
    }

    /// Evaluate the triggers once. Returns the summary to show when one
    /// fires; the prompt then stays open until answered.
    pub fn poll(&mut self, engine: &GuardrailEngine) -> Option<SessionSummary> {
        if self.prompt_open || engine.is_self_excluded() {
            return None;
        }

        let now = engine.now();
        let now_utc = now.with_timezone(&Utc);
        let today = now.date_naive();

        let Some(last_check) = self.record.last_check else {
            self.record.last_check = Some(now_utc);
            self.persist();
            return None;
        };

        let stats = engine.stats();
        if stats.current_session_actions < self.record.actions_baseline {
            // A new session started since the last summary
            self.record.actions_baseline = 0;
        }

        let time_due = now_utc - last_check > self.config.summary_interval();
        let actions_due =
            stats.current_session_actions - self.record.actions_baseline >= self.config.action_count;
        // Counters left over from a previous day do not count
        let today_stake = if stats.day == Some(today) { stats.today_stake } else { Decimal::ZERO };
        let stake_high = today_stake > self.stake_threshold(engine);
        let stake_due = stake_high && self.record.stake_alert_day != Some(today);

        if !(time_due || actions_due || stake_due) {
            return None;
        }

        self.record.last_check = Some(now_utc);
        self.record.actions_baseline = stats.current_session_actions;
        if stake_high {
            self.record.stake_alert_day = Some(today);
        }
        self.prompt_open = true;
        self.persist();

        let summary = engine.session_summary();
        info!(time_due, actions_due, stake_due, %summary, "Reality check due");
        Some(summary)
    }

    /// Close the prompt and carry on.
    pub fn continue_session(&mut self) {
        self.prompt_open = false;
        debug!("Reality check acknowledged");
    }

    /// Close the prompt and start the configured break.
    pub fn take_break(&mut self, engine: &mut GuardrailEngine) -> Result<DateTime<Utc>, GuardrailError> {
        self.prompt_open = false;
        engine.take_break(self.config.break_minutes)
    }

    fn stake_threshold(&self, engine: &GuardrailEngine) -> Decimal {
        let fraction = Decimal::from_f64(self.config.daily_stake_fraction).unwrap_or(Decimal::ONE);
        engine.settings().max_daily_stake * fraction
    }

    fn persist(&self) {
        self.writer.save(StorageKey::RealityCheck, &self.record);
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Engine shared between the presentation layer and the scheduler task.
pub type SharedEngine = Arc<Mutex<GuardrailEngine>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives `RealityCheck::poll` on a fixed interval.
#[derive(Clone)]
pub struct RealityCheckScheduler {
    check: Arc<Mutex<RealityCheck>>,
    engine: SharedEngine,
    poll_interval: Duration,
}

impl RealityCheckScheduler {
    pub fn new(check: RealityCheck, engine: SharedEngine) -> Self {
        let poll_interval = check.config().poll_interval();
        Self {
            check: Arc::new(Mutex::new(check)),
            engine,
            poll_interval,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Run one evaluation now.
    pub fn poll_now(&self) -> Option<SessionSummary> {
        let mut check = lock(&self.check);
        let mut engine = lock(&self.engine);
        engine.refresh();
        check.poll(&engine)
    }

    pub fn is_prompt_open(&self) -> bool {
        lock(&self.check).is_prompt_open()
    }

    pub fn continue_session(&self) {
        lock(&self.check).continue_session();
    }

    pub fn take_break(&self) -> Result<DateTime<Utc>, GuardrailError> {
        let mut check = lock(&self.check);
        let mut engine = lock(&self.engine);
        check.take_break(&mut engine)
    }

    /// Start polling. Summaries arrive on the returned receiver; the task
    /// stops when the handle is stopped or dropped, or the receiver is
    /// dropped.
    pub fn spawn(&self) -> (RealityCheckHandle, mpsc::Receiver<SessionSummary>) {
        let (summary_tx, summary_rx) = mpsc::channel(4);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let scheduler = self.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                interval_ms = scheduler.poll_interval.as_millis() as u64,
                "Reality check scheduler started"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let Some(summary) = scheduler.poll_now() else {
                            continue;
                        };
                        if summary_tx.send(summary).await.is_err() {
                            debug!("Summary receiver dropped");
                            break;
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            info!("Reality check scheduler stopped");
        });

        let handle = RealityCheckHandle {
            shutdown: Some(shutdown_tx),
            task,
        };
        (handle, summary_rx)
    }
}

impl fmt::Debug for RealityCheckScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealityCheckScheduler")
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Owns the polling task. Dropping it cancels the task.
#[derive(Debug)]
pub struct RealityCheckHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RealityCheckHandle {
    /// Stop polling and wait for the task to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RealityCheckHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
