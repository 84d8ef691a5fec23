//! Core data types for price monitoring
//!
//! Observations are append-only: once validated and persisted they are
//! never mutated. Alert records carry the delivery outcome so the
//! cooldown table can be rebuilt from the store after a restart.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Section label used when the ticketing API does not report one
pub const DEFAULT_SECTION: &str = "General";

/// A concert/show the operator configured for monitoring
///
/// Created from configuration at startup; never mutated during a run.
/// `threshold_price = None` means the event is monitored for history
/// only and never produces alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedEvent {
    /// Opaque ticketing-provider event id
    pub event_id: String,
    /// Display name
    pub name: String,
    /// Venue name, when known
    pub venue: Option<String>,
    /// Date of the show, when known
    pub event_date: Option<NaiveDate>,
    /// Alert when a price is at or below this ceiling
    pub threshold_price: Option<Decimal>,
    /// Disabled events are skipped by the orchestrator
    pub enabled: bool,
}

/// One observed price for one event section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub event_id: String,
    pub price: Decimal,
    pub section: String,
    pub availability: u32,
    pub observed_at: DateTime<Utc>,
}

impl PriceObservation {
    /// Validate observation data before it enters the system.
    ///
    /// Rejected observations are never persisted and never reach the
    /// decision engine; the orchestrator logs them and continues.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.event_id.trim().is_empty() {
            return Err(AppError::Validation(
                "observation event id cannot be empty".to_string(),
            ));
        }
        if self.price <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "observation price must be positive, got {}",
                self.price
            )));
        }
        if self.section.trim().is_empty() {
            return Err(AppError::Validation(
                "observation section cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A qualifying alert produced by the decision engine, pre-delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDecision {
    pub event_id: String,
    pub section: String,
    pub old_price: Decimal,
    pub new_price: Decimal,
    /// Percent drop from the previous persisted price, positive for drops
    pub percent_drop: Decimal,
    pub decided_at: DateTime<Utc>,
}

/// Delivery outcome of an alert notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Pending => write!(f, "pending"),
            DeliveryOutcome::Sent => write!(f, "sent"),
            DeliveryOutcome::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeliveryOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryOutcome::Pending),
            "sent" => Ok(DeliveryOutcome::Sent),
            "failed" => Ok(DeliveryOutcome::Failed),
            other => Err(format!("unknown delivery outcome '{other}'")),
        }
    }
}

/// Persisted record of a fired alert and its delivery outcome
///
/// One record per qualifying (event, section) pair per cycle. The
/// cooldown check on subsequent cycles (and after restarts) reads the
/// most recent record per pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub event_id: String,
    pub section: String,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub percent_drop: Decimal,
    pub fired_at: DateTime<Utc>,
    pub outcome: DeliveryOutcome,
}

impl AlertRecord {
    pub fn from_decision(decision: &AlertDecision, outcome: DeliveryOutcome) -> Self {
        Self {
            event_id: decision.event_id.clone(),
            section: decision.section.clone(),
            old_price: decision.old_price,
            new_price: decision.new_price,
            percent_drop: decision.percent_drop,
            fired_at: decision.decided_at,
            outcome,
        }
    }
}

/// Per-event, per-cycle state machine
///
/// `FetchFailed` and `StoreFailed` are terminal for the event this
/// cycle; every other path ends in `Done`. No cross-event transitions
/// exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Pending,
    Fetching,
    FetchFailed,
    Fetched,
    Evaluating,
    Alerted,
    NoAlert,
    Persisted,
    StoreFailed,
    Done,
}

/// Outcome of processing one event within one cycle
#[derive(Debug, Clone)]
pub struct EventReport {
    pub event_id: String,
    pub phase: EventPhase,
    pub observations_stored: usize,
    pub observations_rejected: usize,
    pub alerts_fired: usize,
    pub alerts_failed: usize,
    pub api_calls: u32,
    pub error: Option<String>,
}

impl EventReport {
    pub fn new(event_id: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            phase: EventPhase::Pending,
            observations_stored: 0,
            observations_rejected: 0,
            alerts_fired: 0,
            alerts_failed: 0,
            api_calls: 0,
            error: None,
        }
    }
}

/// Per-cycle counters, reset each cycle
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    pub events_checked: usize,
    pub events_failed: usize,
    pub alerts_fired: usize,
    pub alerts_failed: usize,
    pub observations_stored: usize,
    pub observations_rejected: usize,
    pub api_calls: u32,
    pub duration: std::time::Duration,
}

impl CycleStats {
    /// A cycle is healthy if at least one event succeeded.
    pub fn is_healthy(&self) -> bool {
        self.events_checked > 0
    }

    pub fn absorb(&mut self, report: &EventReport) {
        match report.phase {
            EventPhase::FetchFailed | EventPhase::StoreFailed => self.events_failed += 1,
            _ => self.events_checked += 1,
        }
        self.alerts_fired += report.alerts_fired;
        self.alerts_failed += report.alerts_failed;
        self.observations_stored += report.observations_stored;
        self.observations_rejected += report.observations_rejected;
        self.api_calls += report.api_calls;
    }
}

/// Latest known state of one tracked event, for the daily summary
#[derive(Debug, Clone)]
pub struct EventSummary {
    pub event: TrackedEvent,
    pub latest: Option<PriceObservation>,
}

impl EventSummary {
    /// Whether the latest known price sits at or below the threshold.
    pub fn below_threshold(&self) -> bool {
        match (&self.latest, self.event.threshold_price) {
            (Some(obs), Some(threshold)) => obs.price <= threshold,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn observation(price: &str) -> PriceObservation {
        PriceObservation {
            event_id: "evt1".to_string(),
            price: Decimal::from_str(price).unwrap(),
            section: "Floor".to_string(),
            availability: 4,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_valid_observation() {
        assert!(observation("129.99").validate().is_ok());
    }

    #[test]
    fn test_zero_price_rejected() {
        let result = observation("0").validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("must be positive"));
    }

    #[test]
    fn test_negative_price_rejected() {
        assert!(observation("-10.00").validate().is_err());
    }

    #[test]
    fn test_empty_event_id_rejected() {
        let mut obs = observation("50.00");
        obs.event_id = "  ".to_string();
        assert!(obs.validate().is_err());
    }

    #[test]
    fn test_empty_section_rejected() {
        let mut obs = observation("50.00");
        obs.section = String::new();
        assert!(obs.validate().is_err());
    }

    #[test]
    fn test_delivery_outcome_round_trip() {
        for outcome in [
            DeliveryOutcome::Pending,
            DeliveryOutcome::Sent,
            DeliveryOutcome::Failed,
        ] {
            let parsed: DeliveryOutcome = outcome.to_string().parse().unwrap();
            assert_eq!(parsed, outcome);
        }
        assert!("bogus".parse::<DeliveryOutcome>().is_err());
    }

    #[test]
    fn test_cycle_stats_absorb() {
        let mut stats = CycleStats::default();

        let mut ok = EventReport::new("evt1");
        ok.phase = EventPhase::Done;
        ok.observations_stored = 2;
        ok.alerts_fired = 1;
        ok.api_calls = 1;

        let mut failed = EventReport::new("evt2");
        failed.phase = EventPhase::FetchFailed;
        failed.api_calls = 4;
        failed.error = Some("rate limited".to_string());

        stats.absorb(&ok);
        stats.absorb(&failed);

        assert_eq!(stats.events_checked, 1);
        assert_eq!(stats.events_failed, 1);
        assert_eq!(stats.alerts_fired, 1);
        assert_eq!(stats.observations_stored, 2);
        assert_eq!(stats.api_calls, 5);
        assert!(stats.is_healthy());
    }

    #[test]
    fn test_all_events_failed_is_unhealthy() {
        let mut stats = CycleStats::default();
        let mut failed = EventReport::new("evt1");
        failed.phase = EventPhase::FetchFailed;
        stats.absorb(&failed);
        assert!(!stats.is_healthy());
    }

    #[test]
    fn test_event_summary_below_threshold() {
        let event = TrackedEvent {
            event_id: "evt1".to_string(),
            name: "Show".to_string(),
            venue: None,
            event_date: None,
            threshold_price: Some(Decimal::from_str("150.00").unwrap()),
            enabled: true,
        };

        let summary = EventSummary {
            event: event.clone(),
            latest: Some(observation("140.00")),
        };
        assert!(summary.below_threshold());

        let summary = EventSummary {
            event: event.clone(),
            latest: Some(observation("160.00")),
        };
        assert!(!summary.below_threshold());

        let summary = EventSummary {
            event,
            latest: None,
        };
        assert!(!summary.below_threshold());
    }
}
