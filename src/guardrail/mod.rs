//! Guardrails: the policy engine that decides which (if any) nudge to show.
//!
//! `GuardrailEngine` is the single owner of every state store. Callers
//! propose a stake before recording a bet, show whatever nudge comes back,
//! and report the user's answer through the engine.

pub mod harm;
pub mod quiet_hours;
pub mod reality_check;

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::odds::{self, CalculatedOpportunity, CalculationMode};
use crate::session::{
    CompletedOpportunity, History, SessionStats, SessionStore, SettingField, SettingsPatch,
    SettingsStore, UserSettings,
};
use crate::storage::{PersistenceGateway, PersistenceWriter};
use crate::types::{
    CalculationError, CompletionStatus, GuardrailError, Nudge, NudgeAction, NudgeKind, Opportunity,
    SettingsError,
};

pub use harm::{HarmState, SelfExclusion};
pub use quiet_hours::{QuietHours, TimeOfDay};
pub use reality_check::{
    RealityCheck, RealityCheckHandle, RealityCheckScheduler, SessionSummary, SharedEngine,
};

/// Owner of settings, session counters, harm state and history.
pub struct GuardrailEngine {
    settings: SettingsStore,
    session: SessionStore,
    harm: HarmState,
    history: History,
    clock: Arc<dyn Clock>,
}

impl GuardrailEngine {
    pub fn new(
        settings: SettingsStore,
        session: SessionStore,
        harm: HarmState,
        history: History,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            session,
            harm,
            history,
            clock,
        }
    }

    /// In-memory engine with default state and no persistence.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        let today = clock.now().date_naive();
        let mut session = SessionStore::new(SessionStats::default(), PersistenceWriter::detached());
        session.roll_over(today);
        Self::new(
            SettingsStore::new(UserSettings::default(), PersistenceWriter::detached()),
            session,
            HarmState::new(PersistenceWriter::detached()),
            History::new(Vec::new(), PersistenceWriter::detached()),
            clock,
        )
    }

    /// Restore every store from `gateway`. Each key falls back to its
    /// defaults on its own.
    pub async fn load(
        gateway: &dyn PersistenceGateway,
        writer: PersistenceWriter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let settings = SettingsStore::load(gateway, writer.clone()).await;
        let session = SessionStore::load(gateway, writer.clone(), now.date_naive()).await;
        let harm = HarmState::load(gateway, writer.clone()).await;
        let history = History::load(gateway, writer).await;

        let mut engine = Self::new(settings, session, harm, history, clock);
        engine.refresh();
        info!(
            stats = %engine.session.stats(),
            self_excluded = engine.is_self_excluded(),
            on_break = engine.is_on_break(),
            "Guardrail state restored"
        );
        engine
    }

    // -- Accessors ----------------------------------------------------------

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }

    pub fn settings(&self) -> &UserSettings {
        self.settings.settings()
    }

    pub fn stats(&self) -> &SessionStats {
        self.session.stats()
    }

    pub fn harm(&self) -> &HarmState {
        &self.harm
    }

    pub fn history(&self) -> &[CompletedOpportunity] {
        self.history.entries()
    }

    pub fn is_self_excluded(&self) -> bool {
        self.harm.is_self_excluded(self.clock.now_utc())
    }

    pub fn is_on_break(&self) -> bool {
        self.harm.is_on_break(self.clock.now_utc())
    }

    /// Expected result of today's placed bets.
    pub fn today_net(&self) -> Decimal {
        self.history.today_net(&self.clock.now())
    }

    // -- Time-driven transitions --------------------------------------------

    /// Apply day rollover, expire finished breaks and resync the
    /// self-exclusion flag with its end date.
    pub fn refresh(&mut self) {
        let now = self.clock.now();
        let now_utc = now.with_timezone(&Utc);
        self.session.roll_over(now.date_naive());
        self.harm.expire_break(now_utc);
        self.harm.sync_self_exclusion(now_utc);
    }

    // -- Evaluation ---------------------------------------------------------

    /// Pick the one nudge to show, if any. First match wins:
    /// self-exclusion, break, late night, session streak, stake limit,
    /// daily limit.
    pub fn evaluate(&mut self, proposed_stake: Option<Decimal>) -> Option<Nudge> {
        self.refresh();
        let now = self.clock.now();
        let now_utc = now.with_timezone(&Utc);
        let settings = self.settings.settings();
        let stats = self.session.stats();

        let excluded_until = self
            .harm
            .self_exclusion()
            .until
            .filter(|_| self.harm.is_self_excluded(now_utc));
        let break_until = self.harm.break_until().filter(|_| self.harm.is_on_break(now_utc));

        let nudge = if let Some(until) = excluded_until {
            Some(Nudge::SelfExclusion { until })
        } else if let Some(until) = break_until {
            Some(Nudge::Break { until })
        } else if let Some(window) = settings
            .quiet_hours
            .filter(|w| w.is_active(&now) && !self.harm.is_dismissed(NudgeKind::LateNight))
        {
            Some(Nudge::LateNight {
                start: window.start.to_string(),
                end: window.end.to_string(),
            })
        } else if stats.current_session_actions >= settings.session_nudge_threshold
            && !self.harm.is_dismissed(NudgeKind::SessionStreak)
        {
            Some(Nudge::SessionStreak {
                actions: stats.current_session_actions,
            })
        } else {
            proposed_stake.and_then(|proposed| {
                if proposed > settings.max_stake_per_bet {
                    Some(Nudge::StakeLimit {
                        proposed,
                        limit: settings.max_stake_per_bet,
                    })
                } else if stats.today_stake + proposed > settings.max_daily_stake {
                    Some(Nudge::DailyLimit {
                        staked_today: stats.today_stake,
                        proposed,
                        limit: settings.max_daily_stake,
                    })
                } else {
                    None
                }
            })
        };

        if let Some(n) = &nudge {
            debug!(kind = %n.kind(), proposed = ?proposed_stake, "Nudge selected");
        }
        nudge
    }

    // -- Betting actions ----------------------------------------------------

    /// Price `opportunity` with the user's commission rate.
    pub fn calculate(
        &self,
        opportunity: &Opportunity,
        stake: f64,
        mode: CalculationMode,
    ) -> Result<CalculatedOpportunity, CalculationError> {
        odds::calculate(opportunity, stake, self.settings().commission_pct, mode)
    }

    fn ensure_not_excluded(&self) -> Result<(), GuardrailError> {
        let now = self.clock.now_utc();
        match self.harm.self_exclusion().until {
            Some(until) if self.harm.is_self_excluded(now) => Err(GuardrailError::SelfExcluded { until }),
            _ => Ok(()),
        }
    }

    /// Count one placed bet. Refused while self-excluded.
    pub fn record_action(&mut self, stake: Decimal) -> Result<SessionStats, GuardrailError> {
        self.refresh();
        self.ensure_not_excluded()?;
        Ok(self.session.record_action(self.clock.now(), stake))
    }

    /// Record the outcome of working an opportunity. Every outcome goes to
    /// history; only `Done` counts as a placed bet.
    pub fn complete_opportunity(
        &mut self,
        calculation: CalculatedOpportunity,
        status: CompletionStatus,
    ) -> Result<SessionStats, GuardrailError> {
        self.refresh();
        self.ensure_not_excluded()?;

        let now = self.clock.now();
        let stake = calculation.staked();
        self.history.record(calculation, status, now.with_timezone(&Utc));

        if status == CompletionStatus::Done {
            Ok(self.session.record_action(now, stake))
        } else {
            Ok(self.session.stats().clone())
        }
    }

    // -- Harm controls ------------------------------------------------------

    /// Start a break. The session counters start over with it.
    pub fn take_break(&mut self, minutes: u32) -> Result<DateTime<Utc>, GuardrailError> {
        let until = self.harm.take_break(self.clock.now_utc(), minutes)?;
        self.session.start_new_session();
        Ok(until)
    }

    pub fn end_break(&mut self) -> bool {
        self.harm.end_break()
    }

    /// Extend self-exclusion by `days` from now. Never shortens it.
    pub fn request_self_exclusion(&mut self, days: u32) -> Option<DateTime<Utc>> {
        self.harm.request_self_exclusion(self.clock.now_utc(), days)
    }

    pub fn dismiss_nudge(&mut self, kind: NudgeKind) -> Result<(), GuardrailError> {
        self.harm.dismiss(kind)
    }

    /// Reset session counters and forget session-scoped dismissals.
    pub fn start_new_session(&mut self) {
        self.session.start_new_session();
        self.harm.clear_dismissals();
    }

    /// Carry out the button the user pressed on `nudge`.
    pub fn respond(&mut self, nudge: &Nudge, action: NudgeAction) -> Result<(), GuardrailError> {
        match action {
            NudgeAction::Acknowledge | NudgeAction::ReduceStake => Ok(()),
            NudgeAction::Dismiss => self.dismiss_nudge(nudge.kind()),
            NudgeAction::TakeBreak { minutes } => self.take_break(minutes).map(|_| ()),
            NudgeAction::EndBreak => {
                self.end_break();
                Ok(())
            }
            NudgeAction::StopForToday => {
                self.start_new_session();
                Ok(())
            }
        }
    }

    // -- Settings -----------------------------------------------------------

    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<&UserSettings, SettingsError> {
        self.settings.update(patch)
    }

    pub fn update_setting(&mut self, field: SettingField, raw: &str) -> Result<&UserSettings, SettingsError> {
        self.settings.update_field(field, raw)
    }

    // -- Summary ------------------------------------------------------------

    /// Snapshot for the reality-check prompt.
    pub fn session_summary(&self) -> SessionSummary {
        let now = self.clock.now();
        let stats = self.session.stats();
        SessionSummary {
            session_minutes: stats.session_minutes(now.with_timezone(&Utc)),
            total_staked: stats.today_stake,
            net_profit: self.history.today_net(&now),
            actions_completed: stats.current_session_actions,
        }
    }
}

impl std::fmt::Debug for GuardrailEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardrailEngine")
            .field("settings", self.settings.settings())
            .field("stats", self.session.stats())
            .field("harm", &self.harm)
            .field("history_len", &self.history.entries().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
