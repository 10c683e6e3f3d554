//! User settings and their validated update path.
//!
//! Updates are all-or-nothing: every provided field is checked against a
//! candidate copy first, and the stored value only changes when all of
//! them pass.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::guardrail::quiet_hours::{QuietHours, TimeOfDay};
use crate::odds::{money, CalculatedOpportunity};
use crate::storage::{load_or_default, PersistenceGateway, PersistenceWriter, StorageKey};
use crate::types::{SettingsError, Sport};

/// Everything the user can configure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub default_back_stake: Decimal,
    /// Exchange commission, percent.
    pub commission_pct: f64,
    /// Hide opportunities with less exchange liquidity than this.
    pub min_liquidity: Decimal,
    /// Hide opportunities whose expected result is worse than this (≤ 0).
    pub max_qualifying_loss: Decimal,
    pub max_stake_per_bet: Decimal,
    pub max_daily_stake: Decimal,
    /// `None` turns the late-night nudge off.
    pub quiet_hours: Option<QuietHours>,
    /// Session actions before the streak nudge appears.
    pub session_nudge_threshold: u32,
    pub sport_preference: Sport,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            default_back_stake: Decimal::from(10),
            commission_pct: 2.0,
            min_liquidity: Decimal::from(200),
            max_qualifying_loss: Decimal::from(-1),
            max_stake_per_bet: Decimal::from(50),
            max_daily_stake: Decimal::from(200),
            quiet_hours: Some(QuietHours::default()),
            session_nudge_threshold: 5,
            sport_preference: Sport::Football,
        }
    }
}

impl UserSettings {
    /// Check every field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        positive("default_back_stake", self.default_back_stake)?;
        commission("commission_pct", self.commission_pct)?;
        if self.min_liquidity < Decimal::ZERO {
            return Err(out_of_range("min_liquidity", "must not be negative"));
        }
        if self.max_qualifying_loss > Decimal::ZERO {
            return Err(out_of_range("max_qualifying_loss", "must be zero or negative"));
        }
        positive("max_stake_per_bet", self.max_stake_per_bet)?;
        positive("max_daily_stake", self.max_daily_stake)?;
        if self.session_nudge_threshold < 1 {
            return Err(out_of_range("session_nudge_threshold", "must be at least 1"));
        }
        Ok(())
    }

    /// Whether a calculated opportunity passes the liquidity and loss filters.
    pub fn admits(&self, calc: &CalculatedOpportunity) -> bool {
        calc.liquidity() >= self.min_liquidity && money(calc.net_outcome()) >= self.max_qualifying_loss
    }
}

fn out_of_range(field: &'static str, reason: &str) -> SettingsError {
    SettingsError::OutOfRange {
        field,
        reason: reason.to_string(),
    }
}

fn positive(field: &'static str, value: Decimal) -> Result<(), SettingsError> {
    if value <= Decimal::ZERO {
        return Err(out_of_range(field, "must be greater than zero"));
    }
    Ok(())
}

fn commission(field: &'static str, value: f64) -> Result<(), SettingsError> {
    if !(0.0..100.0).contains(&value) {
        return Err(out_of_range(field, "must be between 0 and 100 percent"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// A partial update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub default_back_stake: Option<Decimal>,
    pub commission_pct: Option<f64>,
    pub min_liquidity: Option<Decimal>,
    pub max_qualifying_loss: Option<Decimal>,
    pub max_stake_per_bet: Option<Decimal>,
    pub max_daily_stake: Option<Decimal>,
    /// `Some(None)` turns quiet hours off.
    pub quiet_hours: Option<Option<QuietHours>>,
    pub session_nudge_threshold: Option<u32>,
    pub sport_preference: Option<Sport>,
}

impl SettingsPatch {
    fn apply_to(&self, target: &mut UserSettings) {
        if let Some(v) = self.default_back_stake {
            target.default_back_stake = v;
        }
        if let Some(v) = self.commission_pct {
            target.commission_pct = v;
        }
        if let Some(v) = self.min_liquidity {
            target.min_liquidity = v;
        }
        if let Some(v) = self.max_qualifying_loss {
            target.max_qualifying_loss = v;
        }
        if let Some(v) = self.max_stake_per_bet {
            target.max_stake_per_bet = v;
        }
        if let Some(v) = self.max_daily_stake {
            target.max_daily_stake = v;
        }
        if let Some(v) = self.quiet_hours {
            target.quiet_hours = v;
        }
        if let Some(v) = self.session_nudge_threshold {
            target.session_nudge_threshold = v;
        }
        if let Some(v) = self.sport_preference {
            target.sport_preference = v;
        }
    }
}

/// A single setting addressed by name, for text-entry forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingField {
    DefaultBackStake,
    CommissionPct,
    MinLiquidity,
    MaxQualifyingLoss,
    MaxStakePerBet,
    MaxDailyStake,
    /// `HH:MM-HH:MM`, or `off`.
    QuietHours,
    SessionNudgeThreshold,
    SportPreference,
}

impl SettingField {
    pub fn name(&self) -> &'static str {
        match self {
            SettingField::DefaultBackStake => "default_back_stake",
            SettingField::CommissionPct => "commission_pct",
            SettingField::MinLiquidity => "min_liquidity",
            SettingField::MaxQualifyingLoss => "max_qualifying_loss",
            SettingField::MaxStakePerBet => "max_stake_per_bet",
            SettingField::MaxDailyStake => "max_daily_stake",
            SettingField::QuietHours => "quiet_hours",
            SettingField::SessionNudgeThreshold => "session_nudge_threshold",
            SettingField::SportPreference => "sport_preference",
        }
    }

    /// Parse raw user input into a single-field patch. Range checks happen
    /// later, in `SettingsStore::update`.
    pub fn parse(&self, raw: &str) -> Result<SettingsPatch, SettingsError> {
        let field = self.name();
        let raw = raw.trim();
        let decimal = || {
            Decimal::from_str(raw).map_err(|_| SettingsError::NotNumeric {
                field,
                input: raw.to_string(),
            })
        };

        let mut patch = SettingsPatch::default();
        match self {
            SettingField::DefaultBackStake => patch.default_back_stake = Some(decimal()?),
            SettingField::MinLiquidity => patch.min_liquidity = Some(decimal()?),
            SettingField::MaxQualifyingLoss => patch.max_qualifying_loss = Some(decimal()?),
            SettingField::MaxStakePerBet => patch.max_stake_per_bet = Some(decimal()?),
            SettingField::MaxDailyStake => patch.max_daily_stake = Some(decimal()?),
            SettingField::CommissionPct => {
                let pct: f64 = raw.parse().map_err(|_| SettingsError::NotNumeric {
                    field,
                    input: raw.to_string(),
                })?;
                patch.commission_pct = Some(pct);
            }
            SettingField::SessionNudgeThreshold => {
                let n: u32 = raw.parse().map_err(|_| SettingsError::NotNumeric {
                    field,
                    input: raw.to_string(),
                })?;
                patch.session_nudge_threshold = Some(n);
            }
            SettingField::QuietHours => {
                if raw.eq_ignore_ascii_case("off") {
                    patch.quiet_hours = Some(None);
                } else {
                    let invalid = || SettingsError::InvalidTime {
                        field,
                        input: raw.to_string(),
                    };
                    let (start, end) = raw.split_once('-').ok_or_else(invalid)?;
                    let start: TimeOfDay = start.parse().map_err(|_| invalid())?;
                    let end: TimeOfDay = end.parse().map_err(|_| invalid())?;
                    patch.quiet_hours = Some(Some(QuietHours::new(start, end)));
                }
            }
            SettingField::SportPreference => {
                let sport: Sport = raw
                    .parse()
                    .map_err(|_| out_of_range(field, &format!("unknown sport '{raw}'")))?;
                patch.sport_preference = Some(sport);
            }
        }
        Ok(patch)
    }
}

impl FromStr for SettingField {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const FIELDS: &[SettingField] = &[
            SettingField::DefaultBackStake,
            SettingField::CommissionPct,
            SettingField::MinLiquidity,
            SettingField::MaxQualifyingLoss,
            SettingField::MaxStakePerBet,
            SettingField::MaxDailyStake,
            SettingField::QuietHours,
            SettingField::SessionNudgeThreshold,
            SettingField::SportPreference,
        ];
        FIELDS
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| SettingsError::UnknownField(s.to_string()))
    }
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Owner of `UserSettings`.
#[derive(Debug)]
pub struct SettingsStore {
    settings: UserSettings,
    writer: PersistenceWriter,
}

impl SettingsStore {
    pub fn new(settings: UserSettings, writer: PersistenceWriter) -> Self {
        Self { settings, writer }
    }

    /// Restore persisted settings. A stored value that fails validation is
    /// discarded in favour of the defaults.
    pub async fn load(gateway: &dyn PersistenceGateway, writer: PersistenceWriter) -> Self {
        let settings: UserSettings = load_or_default(gateway, StorageKey::Settings).await;
        let settings = match settings.validate() {
            Ok(()) => settings,
            Err(e) => {
                warn!(error = %e, "Persisted settings are invalid, using defaults");
                UserSettings::default()
            }
        };
        Self::new(settings, writer)
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    /// Apply `patch` if every resulting field is valid; otherwise keep the
    /// current settings untouched.
    pub fn update(&mut self, patch: &SettingsPatch) -> Result<&UserSettings, SettingsError> {
        let mut candidate = self.settings.clone();
        patch.apply_to(&mut candidate);
        candidate.validate()?;

        self.settings = candidate;
        self.writer.save(StorageKey::Settings, &self.settings);
        info!(?patch, "Settings updated");
        Ok(&self.settings)
    }

    /// Parse text input for one field and apply it.
    pub fn update_field(&mut self, field: SettingField, raw: &str) -> Result<&UserSettings, SettingsError> {
        let patch = field.parse(raw)?;
        self.update(&patch)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
