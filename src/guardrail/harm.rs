//! Harm-minimisation state: breaks, self-exclusion, dismissed nudges.
//!
//! Self-exclusion only ever moves forward: a request that would end it
//! earlier than the current end date is ignored without error. Whether it is
//! in force depends on the end date alone; `active` mirrors that for readers
//! of the persisted record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::storage::{load_or_default, PersistenceGateway, PersistenceWriter, StorageKey};
use crate::types::{GuardrailError, NudgeKind};

/// Longest exclusion a single request can set (about a hundred years).
pub const MAX_SELF_EXCLUSION_DAYS: u32 = 36_525;

/// Persisted self-exclusion record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfExclusion {
    /// Derived from `until`; never consulted on its own.
    pub active: bool,
    /// Never decreases once set.
    pub until: Option<DateTime<Utc>>,
}

impl SelfExclusion {
    pub fn is_in_force(&self, now: DateTime<Utc>) -> bool {
        self.until.is_some_and(|until| now < until)
    }
}

/// Owner of breaks, self-exclusion and dismissed nudges.
#[derive(Debug)]
pub struct HarmState {
    dismissed: BTreeSet<NudgeKind>,
    break_until: Option<DateTime<Utc>>,
    self_exclusion: SelfExclusion,
    writer: PersistenceWriter,
}

impl HarmState {
    pub fn new(writer: PersistenceWriter) -> Self {
        Self {
            dismissed: BTreeSet::new(),
            break_until: None,
            self_exclusion: SelfExclusion::default(),
            writer,
        }
    }

    /// Restore each persisted part independently.
    pub async fn load(gateway: &dyn PersistenceGateway, writer: PersistenceWriter) -> Self {
        let dismissed: BTreeSet<NudgeKind> = load_or_default(gateway, StorageKey::DismissedNudges).await;
        let break_until: Option<DateTime<Utc>> = load_or_default(gateway, StorageKey::BreakUntil).await;
        let self_exclusion: SelfExclusion = load_or_default(gateway, StorageKey::SelfExclusion).await;

        Self {
            dismissed: dismissed.into_iter().filter(NudgeKind::is_dismissible).collect(),
            break_until,
            self_exclusion,
            writer,
        }
    }

    // -- Breaks -------------------------------------------------------------

    pub fn break_until(&self) -> Option<DateTime<Utc>> {
        self.break_until
    }

    pub fn is_on_break(&self, now: DateTime<Utc>) -> bool {
        self.break_until.is_some_and(|until| now < until)
    }

    /// Start a break of `minutes` from `now`, replacing any running break.
    pub fn take_break(&mut self, now: DateTime<Utc>, minutes: u32) -> Result<DateTime<Utc>, GuardrailError> {
        if minutes == 0 {
            return Err(GuardrailError::InvalidBreak);
        }
        let until = now
            .checked_add_signed(Duration::minutes(i64::from(minutes)))
            .ok_or(GuardrailError::InvalidBreak)?;
        self.break_until = Some(until);
        self.writer.save(StorageKey::BreakUntil, &self.break_until);
        info!(minutes, %until, "Break started");
        Ok(until)
    }

    /// End the break, if any. Clearing a break also re-arms the session
    /// streak nudge.
    pub fn end_break(&mut self) -> bool {
        if self.break_until.take().is_none() {
            return false;
        }
        self.writer.save(StorageKey::BreakUntil, &self.break_until);
        if self.dismissed.remove(&NudgeKind::SessionStreak) {
            self.persist_dismissed();
        }
        info!("Break ended");
        true
    }

    /// End the break if `now` has reached its end. Returns true if it did.
    pub fn expire_break(&mut self, now: DateTime<Utc>) -> bool {
        match self.break_until {
            Some(until) if now >= until => self.end_break(),
            _ => false,
        }
    }

    // -- Self-exclusion -----------------------------------------------------

    pub fn self_exclusion(&self) -> SelfExclusion {
        self.self_exclusion
    }

    pub fn is_self_excluded(&self, now: DateTime<Utc>) -> bool {
        self.self_exclusion.is_in_force(now)
    }

    /// Exclude for `days` from `now`, capped at `MAX_SELF_EXCLUSION_DAYS`.
    /// Only applied when it ends later than the current exclusion; returns
    /// the end date in force afterwards.
    pub fn request_self_exclusion(&mut self, now: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
        if days == 0 {
            return self.self_exclusion.until;
        }
        let span = Duration::days(i64::from(days.min(MAX_SELF_EXCLUSION_DAYS)));
        let candidate = now.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC);

        match self.self_exclusion.until {
            Some(current) if candidate <= current => {
                debug!(%candidate, %current, "Self-exclusion request would not extend; ignored");
                self.sync_self_exclusion(now);
            }
            _ => {
                self.self_exclusion = SelfExclusion {
                    active: true,
                    until: Some(candidate),
                };
                self.writer.save(StorageKey::SelfExclusion, &self.self_exclusion);
                info!(days, until = %candidate, "Self-exclusion in force");
            }
        }
        self.self_exclusion.until
    }

    /// Bring `active` in line with the end date. The end date is never
    /// touched. Returns true if the flag changed.
    pub fn sync_self_exclusion(&mut self, now: DateTime<Utc>) -> bool {
        let in_force = self.self_exclusion.is_in_force(now);
        if self.self_exclusion.active == in_force {
            return false;
        }
        self.self_exclusion.active = in_force;
        self.writer.save(StorageKey::SelfExclusion, &self.self_exclusion);
        match self.self_exclusion.until {
            Some(until) if in_force => info!(%until, "Self-exclusion in force"),
            until => info!(until = ?until, "Self-exclusion period finished"),
        }
        true
    }

    // -- Dismissals ---------------------------------------------------------

    pub fn is_dismissed(&self, kind: NudgeKind) -> bool {
        self.dismissed.contains(&kind)
    }

    pub fn dismiss(&mut self, kind: NudgeKind) -> Result<(), GuardrailError> {
        if !kind.is_dismissible() {
            return Err(GuardrailError::NotDismissible(kind));
        }
        if self.dismissed.insert(kind) {
            self.persist_dismissed();
            debug!(%kind, "Nudge dismissed");
        }
        Ok(())
    }

    /// Forget every dismissal (new session).
    pub fn clear_dismissals(&mut self) {
        if !self.dismissed.is_empty() {
            self.dismissed.clear();
            self.persist_dismissed();
        }
    }

    fn persist_dismissed(&self) {
        self.writer.save(StorageKey::DismissedNudges, &self.dismissed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
