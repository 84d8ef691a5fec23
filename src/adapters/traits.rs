//! Adapter traits for the external collaborators
//!
//! The core only depends on these contracts. Production implementations
//! live in `ticketmaster` (fetch), `sqlite` (store) and `email`
//! (notify); tests substitute mocks.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::{FetchResult, SendResult, StoreResult};
use crate::core::types::{AlertRecord, EventSummary, PriceObservation};

/// Fetches current price observations for one event
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    /// Returns one observation per section/ticket type, or a typed error.
    async fn fetch(&self, event_id: &str) -> FetchResult<Vec<PriceObservation>>;
}

/// Durable, append-only price history plus the alert log
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Persist a batch of observations atomically. Partial writes for
    /// one event must never be visible.
    async fn append(&self, event_id: &str, observations: &[PriceObservation]) -> StoreResult<()>;

    /// Most recent persisted observation for an event, optionally
    /// restricted to one section.
    async fn latest(
        &self,
        event_id: &str,
        section: Option<&str>,
    ) -> StoreResult<Option<PriceObservation>>;

    /// All observations for an event since a point in time, oldest first.
    async fn history(
        &self,
        event_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<PriceObservation>>;

    /// Record a fired alert and its delivery outcome.
    async fn record_alert(&self, record: &AlertRecord) -> StoreResult<()>;

    /// Most recent alert time per (event, section), for rebuilding the
    /// cooldown table on startup.
    async fn latest_alert_times(&self) -> StoreResult<HashMap<(String, String), DateTime<Utc>>>;

    /// Delete observations older than the retention window. Returns
    /// the number of rows removed.
    async fn cleanup_older_than(&self, days: u32) -> StoreResult<usize>;
}

/// Sends rendered alert and summary messages to the operator
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one price alert, optionally with a chart image
    /// attachment rendered by the caller.
    async fn send_alert(&self, record: &AlertRecord, chart: Option<&[u8]>) -> SendResult<()>;

    /// Deliver the daily summary covering every tracked event.
    async fn send_summary(&self, entries: &[EventSummary]) -> SendResult<()>;
}
