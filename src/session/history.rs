//! History of completed opportunities, newest first.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::odds::{money, CalculatedOpportunity};
use crate::storage::{load_or_default, PersistenceGateway, PersistenceWriter, StorageKey};
use crate::types::CompletionStatus;

/// Oldest entries beyond this are dropped.
pub const MAX_HISTORY_ENTRIES: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedOpportunity {
    pub id: Uuid,
    pub calculation: CalculatedOpportunity,
    pub completed_at: DateTime<Utc>,
    pub status: CompletionStatus,
}

impl CompletedOpportunity {
    /// Whether this entry falls on the same local day as `now`.
    pub fn is_on_day_of(&self, now: &DateTime<FixedOffset>) -> bool {
        self.completed_at.with_timezone(now.offset()).date_naive() == now.date_naive()
    }
}

impl fmt::Display for CompletedOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.completed_at.format("%Y-%m-%d %H:%M"),
            self.status,
            self.calculation,
        )
    }
}

/// Owner of the completed-opportunity list.
#[derive(Debug)]
pub struct History {
    entries: Vec<CompletedOpportunity>,
    writer: PersistenceWriter,
}

impl History {
    pub fn new(mut entries: Vec<CompletedOpportunity>, writer: PersistenceWriter) -> Self {
        entries.truncate(MAX_HISTORY_ENTRIES);
        Self { entries, writer }
    }

    pub async fn load(gateway: &dyn PersistenceGateway, writer: PersistenceWriter) -> Self {
        let entries: Vec<CompletedOpportunity> = load_or_default(gateway, StorageKey::History).await;
        Self::new(entries, writer)
    }

    pub fn entries(&self) -> &[CompletedOpportunity] {
        &self.entries
    }

    /// Prepend a new entry and return it.
    pub fn record(
        &mut self,
        calculation: CalculatedOpportunity,
        status: CompletionStatus,
        completed_at: DateTime<Utc>,
    ) -> &CompletedOpportunity {
        let entry = CompletedOpportunity {
            id: Uuid::new_v4(),
            calculation,
            completed_at,
            status,
        };
        debug!(id = %entry.id, status = %entry.status, "Opportunity completed");
        self.entries.insert(0, entry);
        self.entries.truncate(MAX_HISTORY_ENTRIES);
        self.writer.save(StorageKey::History, &self.entries);
        &self.entries[0]
    }

    /// Entries completed on the local day of `now`.
    pub fn today<'a>(
        &'a self,
        now: &'a DateTime<FixedOffset>,
    ) -> impl Iterator<Item = &'a CompletedOpportunity> + 'a {
        self.entries.iter().filter(move |e| e.is_on_day_of(now))
    }

    /// Sum of today's expected results for bets actually placed, rounded
    /// once at the end.
    pub fn today_net(&self, now: &DateTime<FixedOffset>) -> Decimal {
        money(
            self.today(now)
                .filter(|e| e.status == CompletionStatus::Done)
                .map(|e| e.calculation.net_outcome())
                .sum(),
        )
    }
}
