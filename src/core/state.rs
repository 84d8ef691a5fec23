//! Process-wide monitoring state
//!
//! `MonitoringState` is explicitly owned and passed into orchestrator
//! calls rather than living in globals. On startup it is rebuilt
//! deterministically from the persisted alert log so a restart neither
//! causes an alert storm nor silently suppresses legitimate alerts.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use crate::adapters::errors::StoreResult;
use crate::adapters::traits::PriceStore;

/// Last-alert-time table keyed by (event_id, section)
///
/// Cooldown is evaluated per pair independently: a recent alert for one
/// section never suppresses a drop in another section of the same event.
#[derive(Debug, Clone, Default)]
pub struct CooldownTable {
    entries: HashMap<(String, String), DateTime<Utc>>,
}

impl CooldownTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_alert(&self, event_id: &str, section: &str) -> Option<DateTime<Utc>> {
        self.entries
            .get(&(event_id.to_string(), section.to_string()))
            .copied()
    }

    /// Record an alert time. Qualifying decisions update the table
    /// regardless of delivery outcome: the cooldown protects the
    /// operator from alert floods, not from delivery retries.
    pub fn note_alert(&mut self, event_id: &str, section: &str, at: DateTime<Utc>) {
        self.entries
            .insert((event_id.to_string(), section.to_string()), at);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<HashMap<(String, String), DateTime<Utc>>> for CooldownTable {
    fn from(entries: HashMap<(String, String), DateTime<Utc>>) -> Self {
        Self { entries }
    }
}

/// Process-lifetime monitoring state
#[derive(Debug, Clone, Default)]
pub struct MonitoringState {
    pub last_run: Option<DateTime<Utc>>,
    pub last_summary_date: Option<NaiveDate>,
    pub last_cleanup_date: Option<NaiveDate>,
    pub cooldowns: CooldownTable,
}

impl MonitoringState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state from the persisted alert log.
    ///
    /// The cooldown table is seeded with the most recent alert time per
    /// (event, section) so suppression decisions after a restart match
    /// an uninterrupted run over the same observation sequence.
    pub async fn rebuild<S: PriceStore + ?Sized>(store: &S) -> StoreResult<Self> {
        let entries = store.latest_alert_times().await?;
        let cooldowns = CooldownTable::from(entries);
        info!(
            cooldown_entries = cooldowns.len(),
            "Monitoring state rebuilt from alert log"
        );
        Ok(Self {
            last_run: None,
            last_summary_date: None,
            last_cleanup_date: None,
            cooldowns,
        })
    }
}
