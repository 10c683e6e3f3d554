//! Shared types for CalmBet.
//!
//! Opportunity data supplied by the presentation layer, the ephemeral
//! `Nudge` values handed back to it, and the domain error enums. Kept free
//! of behaviour beyond accessors so that `odds`, `session` and `guardrail`
//! can all depend on it without cycles.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Sport an opportunity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sport {
    Football,
    HorseRacing,
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sport::Football => write!(f, "Football"),
            Sport::HorseRacing => write!(f, "Horse Racing"),
        }
    }
}

/// Parse a sport name (case-insensitive).
impl std::str::FromStr for Sport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '_', '-'], "").as_str() {
            "football" | "soccer" => Ok(Sport::Football),
            "horseracing" | "racing" => Ok(Sport::HorseRacing),
            _ => Err(anyhow::anyhow!("Unknown sport: {s}")),
        }
    }
}

/// Bookmakers the back bet can be placed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bookmaker {
    Bet365,
    SkyBet,
    WilliamHill,
    PaddyPower,
    Ladbrokes,
}

impl Bookmaker {
    pub const ALL: &'static [Bookmaker] = &[
        Bookmaker::Bet365,
        Bookmaker::SkyBet,
        Bookmaker::WilliamHill,
        Bookmaker::PaddyPower,
        Bookmaker::Ladbrokes,
    ];
}

impl fmt::Display for Bookmaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bookmaker::Bet365 => write!(f, "Bet365"),
            Bookmaker::SkyBet => write!(f, "Sky Bet"),
            Bookmaker::WilliamHill => write!(f, "William Hill"),
            Bookmaker::PaddyPower => write!(f, "Paddy Power"),
            Bookmaker::Ladbrokes => write!(f, "Ladbrokes"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyKind {
    Boost,
    Liquidity,
    Margin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Something unusual about the prices that the feed wants to flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// Bookmaker each-way terms: the place part pays `fraction` of the win odds
/// if the selection finishes in the first `places` positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaceTerms {
    pub fraction: f64,
    pub places: u32,
}

impl fmt::Display for PlaceTerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fraction > 0.0 {
            write!(f, "1/{:.0} odds, {} places", 1.0 / self.fraction, self.places)
        } else {
            write!(f, "{} odds, {} places", self.fraction, self.places)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootballOpportunity {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub competition: String,
    pub kickoff: DateTime<Utc>,
    pub bookmaker: Bookmaker,
    pub back_odds: f64,
    pub lay_odds: f64,
    /// Money available at `lay_odds` on the exchange.
    pub liquidity: Decimal,
    pub exchange_market_id: String,
    #[serde(default)]
    pub anomaly: Option<Anomaly>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorseRacingOpportunity {
    pub id: String,
    /// e.g. "15:30 Ascot"
    pub event_name: String,
    pub horse_name: String,
    pub kickoff: DateTime<Utc>,
    pub bookmaker: Bookmaker,
    pub back_odds: f64,
    pub lay_odds: f64,
    pub liquidity: Decimal,
    pub exchange_market_id: String,
    pub place_terms: PlaceTerms,
    #[serde(default)]
    pub anomaly: Option<Anomaly>,
}

/// A back/lay pair offered by the feed. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sport")]
pub enum Opportunity {
    Football(FootballOpportunity),
    HorseRacing(HorseRacingOpportunity),
}

impl Opportunity {
    pub fn id(&self) -> &str {
        match self {
            Opportunity::Football(o) => &o.id,
            Opportunity::HorseRacing(o) => &o.id,
        }
    }

    pub fn sport(&self) -> Sport {
        match self {
            Opportunity::Football(_) => Sport::Football,
            Opportunity::HorseRacing(_) => Sport::HorseRacing,
        }
    }

    pub fn bookmaker(&self) -> Bookmaker {
        match self {
            Opportunity::Football(o) => o.bookmaker,
            Opportunity::HorseRacing(o) => o.bookmaker,
        }
    }

    pub fn back_odds(&self) -> f64 {
        match self {
            Opportunity::Football(o) => o.back_odds,
            Opportunity::HorseRacing(o) => o.back_odds,
        }
    }

    pub fn lay_odds(&self) -> f64 {
        match self {
            Opportunity::Football(o) => o.lay_odds,
            Opportunity::HorseRacing(o) => o.lay_odds,
        }
    }

    pub fn liquidity(&self) -> Decimal {
        match self {
            Opportunity::Football(o) => o.liquidity,
            Opportunity::HorseRacing(o) => o.liquidity,
        }
    }

    pub fn kickoff(&self) -> DateTime<Utc> {
        match self {
            Opportunity::Football(o) => o.kickoff,
            Opportunity::HorseRacing(o) => o.kickoff,
        }
    }

    /// Place terms, present only for each-way eligible opportunities.
    pub fn place_terms(&self) -> Option<PlaceTerms> {
        match self {
            Opportunity::Football(_) => None,
            Opportunity::HorseRacing(o) => Some(o.place_terms),
        }
    }

    pub fn anomaly(&self) -> Option<&Anomaly> {
        match self {
            Opportunity::Football(o) => o.anomaly.as_ref(),
            Opportunity::HorseRacing(o) => o.anomaly.as_ref(),
        }
    }

    /// Short human-readable label ("Arsenal v Chelsea", "Lucky Star (15:30 Ascot)").
    pub fn label(&self) -> String {
        match self {
            Opportunity::Football(o) => format!("{} v {}", o.home_team, o.away_team),
            Opportunity::HorseRacing(o) => format!("{} ({})", o.horse_name, o.event_name),
        }
    }

    /// Helper to build a sample football opportunity for tests.
    #[cfg(test)]
    pub fn sample_football(back_odds: f64, lay_odds: f64) -> Self {
        Opportunity::Football(FootballOpportunity {
            id: "fb-001".to_string(),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            competition: "Premier League".to_string(),
            kickoff: Utc::now() + chrono::Duration::hours(3),
            bookmaker: Bookmaker::Bet365,
            back_odds,
            lay_odds,
            liquidity: Decimal::from(1500),
            exchange_market_id: "1.234567".to_string(),
            anomaly: None,
        })
    }

    /// Helper to build a sample horse racing opportunity for tests.
    #[cfg(test)]
    pub fn sample_racing(back_odds: f64, lay_odds: f64, place_terms: PlaceTerms) -> Self {
        Opportunity::HorseRacing(HorseRacingOpportunity {
            id: "hr-001".to_string(),
            event_name: "15:30 Ascot".to_string(),
            horse_name: "Lucky Star".to_string(),
            kickoff: Utc::now() + chrono::Duration::hours(1),
            bookmaker: Bookmaker::SkyBet,
            back_odds,
            lay_odds,
            liquidity: Decimal::from(1000),
            exchange_market_id: "1.765432".to_string(),
            place_terms,
            anomaly: None,
        })
    }
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} @ {} back {:.2} / lay {:.2} (liq £{:.0})",
            self.sport(),
            self.label(),
            self.bookmaker(),
            self.back_odds(),
            self.lay_odds(),
            self.liquidity(),
        )?;
        if let Some(terms) = self.place_terms() {
            write!(f, " EW {terms}")?;
        }
        Ok(())
    }
}

/// How a calculated opportunity ended up when the user finished with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Done,
    OddsChanged,
    NotAvailable,
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionStatus::Done => write!(f, "done"),
            CompletionStatus::OddsChanged => write!(f, "odds changed"),
            CompletionStatus::NotAvailable => write!(f, "not available"),
        }
    }
}

// ---------------------------------------------------------------------------
// Nudges
// ---------------------------------------------------------------------------

/// Discriminant of a `Nudge`, used for dismissal bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeKind {
    SelfExclusion,
    Break,
    LateNight,
    SessionStreak,
    StakeLimit,
    DailyLimit,
}

impl NudgeKind {
    /// Only the soft, session-scoped nudges can be dismissed. The others are
    /// evaluated fresh every time.
    pub fn is_dismissible(&self) -> bool {
        matches!(self, NudgeKind::LateNight | NudgeKind::SessionStreak)
    }
}

impl fmt::Display for NudgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NudgeKind::SelfExclusion => write!(f, "self_exclusion"),
            NudgeKind::Break => write!(f, "break"),
            NudgeKind::LateNight => write!(f, "late_night"),
            NudgeKind::SessionStreak => write!(f, "session_streak"),
            NudgeKind::StakeLimit => write!(f, "stake_limit"),
            NudgeKind::DailyLimit => write!(f, "daily_limit"),
        }
    }
}

/// Break length offered by the session-streak nudge and the reality check.
pub const DEFAULT_BREAK_MINUTES: u32 = 15;

/// What a nudge button does when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgeAction {
    /// Close the prompt; nothing else changes.
    Acknowledge,
    /// Dismiss the nudge for the rest of the session.
    Dismiss,
    /// Start a break of the given length.
    TakeBreak { minutes: u32 },
    /// End the current break early.
    EndBreak,
    /// Go back and lower the proposed stake.
    ReduceStake,
    /// Stop for the day.
    StopForToday,
}

impl fmt::Display for NudgeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NudgeAction::Acknowledge => write!(f, "OK"),
            NudgeAction::Dismiss => write!(f, "Continue anyway"),
            NudgeAction::TakeBreak { minutes } => write!(f, "Take a {minutes} minute break"),
            NudgeAction::EndBreak => write!(f, "End break early"),
            NudgeAction::ReduceStake => write!(f, "Lower my stake"),
            NudgeAction::StopForToday => write!(f, "Stop for today"),
        }
    }
}

/// A single intervention to show the user. Ephemeral: never persisted,
/// recomputed on demand by `GuardrailEngine::evaluate`.
#[derive(Debug, Clone, PartialEq)]
pub enum Nudge {
    SelfExclusion { until: DateTime<Utc> },
    Break { until: DateTime<Utc> },
    LateNight { start: String, end: String },
    SessionStreak { actions: u32 },
    StakeLimit { proposed: Decimal, limit: Decimal },
    DailyLimit { staked_today: Decimal, proposed: Decimal, limit: Decimal },
}

impl Nudge {
    pub fn kind(&self) -> NudgeKind {
        match self {
            Nudge::SelfExclusion { .. } => NudgeKind::SelfExclusion,
            Nudge::Break { .. } => NudgeKind::Break,
            Nudge::LateNight { .. } => NudgeKind::LateNight,
            Nudge::SessionStreak { .. } => NudgeKind::SessionStreak,
            Nudge::StakeLimit { .. } => NudgeKind::StakeLimit,
            Nudge::DailyLimit { .. } => NudgeKind::DailyLimit,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Nudge::SelfExclusion { .. } => "You're self-excluded",
            Nudge::Break { .. } => "You're on a break",
            Nudge::LateNight { .. } => "It's getting late",
            Nudge::SessionStreak { .. } => "Time for a pause?",
            Nudge::StakeLimit { .. } => "Stake above your limit",
            Nudge::DailyLimit { .. } => "Daily limit reached",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Nudge::SelfExclusion { until } => format!(
                "Betting is locked until {}. This can't be shortened.",
                until.format("%d %b %Y %H:%M UTC")
            ),
            Nudge::Break { until } => format!(
                "Your break runs until {}. Step away for a bit.",
                until.format("%H:%M UTC")
            ),
            Nudge::LateNight { start, end } => format!(
                "You set quiet hours from {start} to {end}. Decisions made late at night are often ones we regret."
            ),
            Nudge::SessionStreak { actions } => format!(
                "You've completed {actions} bets this session. A short break helps keep things in check."
            ),
            Nudge::StakeLimit { proposed, limit } => format!(
                "A £{:.2} stake is above your £{:.2} per-bet limit.",
                proposed, limit
            ),
            Nudge::DailyLimit { staked_today, proposed, limit } => format!(
                "£{:.2} staked today plus £{:.2} would pass your £{:.2} daily limit.",
                staked_today, proposed, limit
            ),
        }
    }

    pub fn primary_action(&self) -> NudgeAction {
        match self {
            Nudge::SelfExclusion { .. } => NudgeAction::Acknowledge,
            Nudge::Break { .. } => NudgeAction::Acknowledge,
            Nudge::LateNight { .. } => NudgeAction::StopForToday,
            Nudge::SessionStreak { .. } => NudgeAction::TakeBreak {
                minutes: DEFAULT_BREAK_MINUTES,
            },
            Nudge::StakeLimit { .. } => NudgeAction::ReduceStake,
            Nudge::DailyLimit { .. } => NudgeAction::StopForToday,
        }
    }

    pub fn secondary_action(&self) -> Option<NudgeAction> {
        match self {
            Nudge::SelfExclusion { .. } => None,
            Nudge::Break { .. } => Some(NudgeAction::EndBreak),
            Nudge::LateNight { .. } => Some(NudgeAction::Dismiss),
            Nudge::SessionStreak { .. } => Some(NudgeAction::Dismiss),
            Nudge::StakeLimit { .. } => None,
            Nudge::DailyLimit { .. } => None,
        }
    }
}

impl fmt::Display for Nudge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind(), self.title(), self.message())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A hedge that cannot be priced. The caller must not display a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalculationError {
    #[error("back odds must be greater than 1 (got {0})")]
    BackOddsTooLow(f64),

    #[error("lay odds must be greater than 1 (got {0})")]
    LayOddsTooLow(f64),

    #[error("lay odds {lay_odds} must exceed the commission rate {commission_rate}; the hedge cannot be priced")]
    LayOddsBelowCommission { lay_odds: f64, commission_rate: f64 },

    #[error("stake must be positive (got {0})")]
    NonPositiveStake(f64),

    #[error("commission must be within [0, 100) percent (got {0})")]
    CommissionOutOfRange(f64),

    #[error("place fraction must be within (0, 1] (got {0})")]
    PlaceFractionOutOfRange(f64),

    #[error("place terms must pay at least one place (got {0})")]
    NoPlaces(u32),

    #[error("each-way is only available for {0} opportunities with place terms")]
    EachWayUnavailable(Sport),
}

/// A rejected settings update. The prior value is retained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("{field}: '{input}' is not a number")]
    NotNumeric { field: &'static str, input: String },

    #[error("{field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    #[error("{field}: '{input}' is not a valid HH:MM time")]
    InvalidTime { field: &'static str, input: String },

    #[error("unknown setting: {0}")]
    UnknownField(String),
}

/// A guardrail refused the requested action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardrailError {
    #[error("self-excluded until {until}; betting actions are disabled")]
    SelfExcluded { until: DateTime<Utc> },

    #[error("{0} nudges cannot be dismissed")]
    NotDismissible(NudgeKind),

    #[error("break length must be at least one minute")]
    InvalidBreak,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
