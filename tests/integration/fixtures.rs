//! Deterministic opportunities and clocks for integration tests.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use rust_decimal::Decimal;

use calmbet::types::*;

/// Local wall time at UTC+1 on a fixed Saturday.
pub fn saturday(hour: u32, minute: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2026, 9, 12, hour, minute, 0)
        .unwrap()
}

pub fn football(id: &str, back_odds: f64, lay_odds: f64, liquidity: i64) -> Opportunity {
    Opportunity::Football(FootballOpportunity {
        id: id.to_string(),
        home_team: "Liverpool".to_string(),
        away_team: "Everton".to_string(),
        competition: "Premier League".to_string(),
        kickoff: Utc.with_ymd_and_hms(2026, 9, 12, 16, 30, 0).unwrap(),
        bookmaker: Bookmaker::WilliamHill,
        back_odds,
        lay_odds,
        liquidity: Decimal::from(liquidity),
        exchange_market_id: format!("1.{id}"),
        anomaly: None,
    })
}

pub fn racing(id: &str, back_odds: f64, lay_odds: f64, fraction: f64, places: u32) -> Opportunity {
    Opportunity::HorseRacing(HorseRacingOpportunity {
        id: id.to_string(),
        event_name: "14:10 Doncaster".to_string(),
        horse_name: "Quiet Harbour".to_string(),
        kickoff: Utc.with_ymd_and_hms(2026, 9, 12, 13, 10, 0).unwrap(),
        bookmaker: Bookmaker::PaddyPower,
        back_odds,
        lay_odds,
        liquidity: Decimal::from(800),
        exchange_market_id: format!("1.{id}"),
        place_terms: PlaceTerms { fraction, places },
        anomaly: Some(Anomaly {
            kind: AnomalyKind::Boost,
            severity: Severity::Medium,
            description: "Enhanced place terms".to_string(),
        }),
    })
}
