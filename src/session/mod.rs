//! Session state owners: day/session counters, user settings, and the
//! history of completed opportunities.
//!
//! Each store owns one concern, mutates it synchronously, and mirrors the
//! new snapshot to storage through a `PersistenceWriter`.

pub mod history;
pub mod settings;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::storage::{load_or_default, PersistenceGateway, PersistenceWriter, StorageKey};
pub use history::{CompletedOpportunity, History, MAX_HISTORY_ENTRIES};
pub use settings::{SettingField, SettingsPatch, SettingsStore, UserSettings};

// ---------------------------------------------------------------------------
// Session stats
// ---------------------------------------------------------------------------

/// Counters for the current day and the current session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionStats {
    /// Local calendar day the day-scoped counters belong to.
    pub day: Option<NaiveDate>,
    pub actions_today: u32,
    pub today_stake: Decimal,
    pub current_session_actions: u32,
    pub session_start_time: Option<DateTime<Utc>>,
    pub last_action_time: Option<DateTime<Utc>>,
}

impl SessionStats {
    /// Whole minutes since the session started (0 when no session is running).
    pub fn session_minutes(&self, now: DateTime<Utc>) -> i64 {
        self.session_start_time
            .map(|start| (now - start).num_minutes().max(0))
            .unwrap_or(0)
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "today: {} actions £{:.2} staked | session: {} actions",
            self.actions_today, self.today_stake, self.current_session_actions,
        )
    }
}

/// Owner of `SessionStats`.
#[derive(Debug)]
pub struct SessionStore {
    stats: SessionStats,
    writer: PersistenceWriter,
}

impl SessionStore {
    pub fn new(stats: SessionStats, writer: PersistenceWriter) -> Self {
        Self { stats, writer }
    }

    /// Restore persisted stats, applying the day-rollover rule for `today`.
    pub async fn load(
        gateway: &dyn PersistenceGateway,
        writer: PersistenceWriter,
        today: NaiveDate,
    ) -> Self {
        let stats: SessionStats = load_or_default(gateway, StorageKey::SessionStats).await;
        let mut store = Self::new(stats, writer);
        store.roll_over(today);
        store
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Reset day-scoped counters if the stored day is not `today`.
    /// Returns true when a reset happened.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.stats.day == Some(today) {
            return false;
        }
        if let Some(previous) = self.stats.day {
            info!(%previous, %today, "New day, resetting daily counters");
        }
        self.stats.day = Some(today);
        self.stats.actions_today = 0;
        self.stats.today_stake = Decimal::ZERO;
        self.persist();
        true
    }

    /// Count one completed bet of `stake`.
    pub fn record_action(&mut self, now: DateTime<FixedOffset>, stake: Decimal) -> SessionStats {
        self.roll_over(now.date_naive());

        let now_utc = now.with_timezone(&Utc);
        let stats = &mut self.stats;
        stats.actions_today += 1;
        stats.today_stake += stake.max(Decimal::ZERO);
        stats.current_session_actions += 1;
        if stats.session_start_time.is_none() {
            stats.session_start_time = Some(now_utc);
        }
        stats.last_action_time = Some(now_utc);

        debug!(
            actions_today = stats.actions_today,
            today_stake = %stats.today_stake,
            session_actions = stats.current_session_actions,
            "Action recorded"
        );

        self.persist();
        self.stats.clone()
    }

    /// Start a fresh session. Day-scoped counters are untouched.
    pub fn start_new_session(&mut self) {
        self.stats.current_session_actions = 0;
        self.stats.session_start_time = None;
        info!("New session started");
        self.persist();
    }

    fn persist(&self) {
        self.writer.save(StorageKey::SessionStats, &self.stats);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
