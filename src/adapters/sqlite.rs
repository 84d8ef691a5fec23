//! SQLite price history and alert log
//!
//! Implements the `PriceStore` trait on a single rusqlite connection
//! behind a tokio mutex. Prices are stored as decimal strings, never
//! floats, and timestamps as RFC 3339 UTC strings so lexicographic
//! order matches chronological order.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;

use crate::adapters::errors::{StoreError, StoreResult};
use crate::adapters::traits::PriceStore;
use crate::core::types::{AlertRecord, PriceObservation};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS price_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL,
    section TEXT NOT NULL,
    price TEXT NOT NULL,
    availability INTEGER NOT NULL DEFAULT 0,
    observed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_price_history_event
    ON price_history(event_id, observed_at);

CREATE TABLE IF NOT EXISTS alert_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL,
    section TEXT NOT NULL,
    old_price TEXT NOT NULL,
    new_price TEXT NOT NULL,
    percent_drop TEXT NOT NULL,
    fired_at TEXT NOT NULL,
    outcome TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_alert_log_pair
    ON alert_log(event_id, section, fired_at);
";

/// Raw row as read from SQLite, parsed into a `PriceObservation` after
/// the statement is done
struct RawObservation {
    event_id: String,
    section: String,
    price: String,
    availability: u32,
    observed_at: String,
}

impl RawObservation {
    fn parse(self) -> StoreResult<PriceObservation> {
        let price = Decimal::from_str(&self.price)
            .map_err(|e| StoreError::CorruptRow(format!("bad price '{}': {e}", self.price)))?;
        let observed_at = parse_timestamp(&self.observed_at)?;
        Ok(PriceObservation {
            event_id: self.event_id,
            price,
            section: self.section,
            availability: self.availability,
            observed_at,
        })
    }
}

fn fmt_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow(format!("bad timestamp '{raw}': {e}")))
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// SQLite-backed implementation of `PriceStore`
pub struct SqlitePriceStore {
    conn: Mutex<Connection>,
}

impl SqlitePriceStore {
    /// Open (or create) the database file and bootstrap the schema.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        info!(path = %path.display(), "opened price database");
        Self::with_connection(conn)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    async fn execute_raw(&self, sql: &str) {
        let conn = self.conn.lock().await;
        conn.execute_batch(sql).unwrap();
    }
}

#[async_trait]
impl PriceStore for SqlitePriceStore {
    async fn append(&self, event_id: &str, observations: &[PriceObservation]) -> StoreResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(db_err)?;
        for obs in observations {
            tx.execute(
                "INSERT INTO price_history (event_id, section, price, availability, observed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    event_id,
                    obs.section,
                    obs.price.to_string(),
                    obs.availability,
                    fmt_timestamp(obs.observed_at),
                ],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)
    }

    async fn latest(
        &self,
        event_id: &str,
        section: Option<&str>,
    ) -> StoreResult<Option<PriceObservation>> {
        let conn = self.conn.lock().await;

        let raw: Option<RawObservation> = match section {
            Some(section) => conn
                .query_row(
                    "SELECT event_id, section, price, availability, observed_at
                     FROM price_history
                     WHERE event_id = ?1 AND section = ?2
                     ORDER BY observed_at DESC, id DESC LIMIT 1",
                    params![event_id, section],
                    read_raw,
                )
                .map(Some),
            None => conn
                .query_row(
                    "SELECT event_id, section, price, availability, observed_at
                     FROM price_history
                     WHERE event_id = ?1
                     ORDER BY observed_at DESC, id DESC LIMIT 1",
                    params![event_id],
                    read_raw,
                )
                .map(Some),
        }
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(db_err(other)),
        })?;

        raw.map(RawObservation::parse).transpose()
    }

    async fn history(
        &self,
        event_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<PriceObservation>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT event_id, section, price, availability, observed_at
                 FROM price_history
                 WHERE event_id = ?1 AND observed_at >= ?2
                 ORDER BY observed_at ASC, id ASC",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![event_id, fmt_timestamp(since)], read_raw)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        rows.into_iter().map(RawObservation::parse).collect()
    }

    async fn record_alert(&self, record: &AlertRecord) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO alert_log
                 (event_id, section, old_price, new_price, percent_drop, fired_at, outcome)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.event_id,
                record.section,
                record.old_price.to_string(),
                record.new_price.to_string(),
                record.percent_drop.to_string(),
                fmt_timestamp(record.fired_at),
                record.outcome.to_string(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn latest_alert_times(&self) -> StoreResult<HashMap<(String, String), DateTime<Utc>>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT event_id, section, MAX(fired_at)
                 FROM alert_log
                 GROUP BY event_id, section",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        let mut times = HashMap::new();
        for (event_id, section, fired_at) in rows {
            times.insert((event_id, section), parse_timestamp(&fired_at)?);
        }
        Ok(times)
    }

    async fn cleanup_older_than(&self, days: u32) -> StoreResult<usize> {
        let cutoff = Utc::now() - ChronoDuration::days(days as i64);
        let conn = self.conn.lock().await;
        let removed = conn
            .execute(
                "DELETE FROM price_history WHERE observed_at < ?1",
                params![fmt_timestamp(cutoff)],
            )
            .map_err(db_err)?;
        if removed > 0 {
            info!(removed, days, "pruned old price history");
        }
        Ok(removed)
    }
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawObservation> {
    Ok(RawObservation {
        event_id: row.get(0)?,
        section: row.get(1)?,
        price: row.get(2)?,
        availability: row.get(3)?,
        observed_at: row.get(4)?,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AlertDecision, DeliveryOutcome};
    use chrono::TimeZone;

    fn observation(event_id: &str, section: &str, price: &str, at: DateTime<Utc>) -> PriceObservation {
        PriceObservation {
            event_id: event_id.to_string(),
            price: Decimal::from_str(price).unwrap(),
            section: section.to_string(),
            availability: 2,
            observed_at: at,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_append_and_latest() {
        let store = SqlitePriceStore::in_memory().unwrap();
        store
            .append(
                "evt1",
                &[
                    observation("evt1", "Floor", "150.00", at(8)),
                    observation("evt1", "Floor", "140.00", at(10)),
                ],
            )
            .await
            .unwrap();

        let latest = store.latest("evt1", None).await.unwrap().unwrap();
        assert_eq!(latest.price, Decimal::from_str("140.00").unwrap());
        assert_eq!(latest.observed_at, at(10));
    }

    #[tokio::test]
    async fn test_latest_filters_by_section() {
        let store = SqlitePriceStore::in_memory().unwrap();
        store
            .append(
                "evt1",
                &[
                    observation("evt1", "Floor", "150.00", at(8)),
                    observation("evt1", "Balcony", "80.00", at(9)),
                ],
            )
            .await
            .unwrap();

        let floor = store.latest("evt1", Some("Floor")).await.unwrap().unwrap();
        assert_eq!(floor.price, Decimal::from_str("150.00").unwrap());

        let balcony = store.latest("evt1", Some("Balcony")).await.unwrap().unwrap();
        assert_eq!(balcony.price, Decimal::from_str("80.00").unwrap());

        assert!(store.latest("evt1", Some("Pit")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_unknown_event_is_none() {
        let store = SqlitePriceStore::in_memory().unwrap();
        assert!(store.latest("nope", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_since_is_ordered_oldest_first() {
        let store = SqlitePriceStore::in_memory().unwrap();
        store
            .append(
                "evt1",
                &[
                    observation("evt1", "Floor", "150.00", at(12)),
                    observation("evt1", "Floor", "160.00", at(6)),
                    observation("evt1", "Floor", "140.00", at(18)),
                ],
            )
            .await
            .unwrap();

        let history = store.history("evt1", at(8)).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].observed_at, at(12));
        assert_eq!(history[1].observed_at, at(18));
    }

    #[tokio::test]
    async fn test_alert_log_round_trip() {
        let store = SqlitePriceStore::in_memory().unwrap();
        let decision = AlertDecision {
            event_id: "evt1".to_string(),
            section: "Floor".to_string(),
            old_price: Decimal::from_str("150.00").unwrap(),
            new_price: Decimal::from_str("100.00").unwrap(),
            percent_drop: Decimal::from_str("33.33").unwrap(),
            decided_at: at(10),
        };

        store
            .record_alert(&AlertRecord::from_decision(&decision, DeliveryOutcome::Sent))
            .await
            .unwrap();

        let times = store.latest_alert_times().await.unwrap();
        assert_eq!(
            times.get(&("evt1".to_string(), "Floor".to_string())),
            Some(&at(10))
        );
    }

    #[tokio::test]
    async fn test_latest_alert_times_takes_max_per_pair() {
        let store = SqlitePriceStore::in_memory().unwrap();
        for (hour, section) in [(8, "Floor"), (14, "Floor"), (11, "Balcony")] {
            let decision = AlertDecision {
                event_id: "evt1".to_string(),
                section: section.to_string(),
                old_price: Decimal::from_str("150.00").unwrap(),
                new_price: Decimal::from_str("100.00").unwrap(),
                percent_drop: Decimal::from_str("33.33").unwrap(),
                decided_at: at(hour),
            };
            store
                .record_alert(&AlertRecord::from_decision(&decision, DeliveryOutcome::Sent))
                .await
                .unwrap();
        }

        let times = store.latest_alert_times().await.unwrap();
        assert_eq!(times.len(), 2);
        assert_eq!(
            times.get(&("evt1".to_string(), "Floor".to_string())),
            Some(&at(14))
        );
        assert_eq!(
            times.get(&("evt1".to_string(), "Balcony".to_string())),
            Some(&at(11))
        );
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_old_rows() {
        let store = SqlitePriceStore::in_memory().unwrap();
        let old = Utc::now() - ChronoDuration::days(120);
        let recent = Utc::now() - ChronoDuration::days(3);
        store
            .append(
                "evt1",
                &[
                    observation("evt1", "Floor", "150.00", old),
                    observation("evt1", "Floor", "140.00", recent),
                ],
            )
            .await
            .unwrap();

        let removed = store.cleanup_older_than(90).await.unwrap();
        assert_eq!(removed, 1);

        let history = store
            .history("evt1", Utc::now() - ChronoDuration::days(365))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].price, Decimal::from_str("140.00").unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_price_surfaces_as_corrupt_row() {
        let store = SqlitePriceStore::in_memory().unwrap();
        store
            .execute_raw(
                "INSERT INTO price_history (event_id, section, price, availability, observed_at)
                 VALUES ('evt1', 'Floor', 'not-a-price', 0, '2025-06-10T08:00:00.000000Z')",
            )
            .await;

        let err = store.latest("evt1", None).await.unwrap_err();
        assert!(matches!(err, StoreError::CorruptRow(_)));
    }
}
