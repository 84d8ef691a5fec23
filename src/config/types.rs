//! Configuration types for the monitoring bot
//!
//! All settings are loaded from YAML once at startup and validated
//! before the scheduler starts. The core consumes an immutable snapshot
//! (tracked events, decision settings, cadence); a config reload is an
//! explicit process restart, never an in-place mutation mid-cycle.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::decision::{AlertPolicy, DecisionSettings};
use crate::core::scheduler::ScheduleSettings;
use crate::core::types::TrackedEvent;
use crate::error::AppError;

fn default_true() -> bool {
    true
}

/// One tracked event entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Ticketing-provider event id
    pub id: String,
    /// Display name for logs and emails
    pub name: String,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    /// Alert ceiling. Absent means history-only monitoring: the event
    /// never alerts, by policy rather than by accident.
    #[serde(default)]
    pub threshold_price: Option<Decimal>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl EventConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.id.trim().is_empty() {
            return Err(AppError::Config("event id cannot be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::Config(format!(
                "event '{}': name cannot be empty",
                self.id
            )));
        }
        if let Some(threshold) = self.threshold_price {
            if threshold <= Decimal::ZERO {
                return Err(AppError::Config(format!(
                    "event '{}': threshold_price must be positive, got {}",
                    self.id, threshold
                )));
            }
        }
        Ok(())
    }

    pub fn to_tracked_event(&self) -> TrackedEvent {
        TrackedEvent {
            event_id: self.id.clone(),
            name: self.name.clone(),
            venue: self.venue.clone(),
            event_date: self.event_date,
            threshold_price: self.threshold_price,
            enabled: self.enabled,
        }
    }
}

fn default_check_frequency_hours() -> u32 {
    2
}

fn default_cooldown_hours() -> u32 {
    6
}

fn default_daily_summary_time() -> String {
    "09:00".to_string()
}

fn default_max_history_days() -> u32 {
    90
}

fn default_cleanup_interval_days() -> u32 {
    7
}

/// Monitoring cadence and alert rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_check_frequency_hours")]
    pub check_frequency_hours: u32,
    /// Noise filter: minimum percent drop before an at/under-threshold
    /// price alerts. Absent disables the filter.
    #[serde(default)]
    pub minimum_price_drop_percent: Option<Decimal>,
    #[serde(default)]
    pub alert_policy: AlertPolicy,
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: u32,
    /// "HH:MM", UTC
    #[serde(default = "default_daily_summary_time")]
    pub daily_summary_time: String,
    #[serde(default = "default_max_history_days")]
    pub max_history_days: u32,
    #[serde(default = "default_cleanup_interval_days")]
    pub cleanup_interval_days: u32,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            check_frequency_hours: default_check_frequency_hours(),
            minimum_price_drop_percent: None,
            alert_policy: AlertPolicy::default(),
            cooldown_hours: default_cooldown_hours(),
            daily_summary_time: default_daily_summary_time(),
            max_history_days: default_max_history_days(),
            cleanup_interval_days: default_cleanup_interval_days(),
        }
    }
}

impl MonitoringConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.check_frequency_hours == 0 {
            return Err(AppError::Config(
                "check_frequency_hours must be at least 1".to_string(),
            ));
        }
        if let Some(drop) = self.minimum_price_drop_percent {
            if drop <= Decimal::ZERO || drop >= Decimal::from(100) {
                return Err(AppError::Config(format!(
                    "minimum_price_drop_percent must be > 0 and < 100, got {drop}"
                )));
            }
        }
        self.summary_time()?;
        if self.max_history_days == 0 {
            return Err(AppError::Config(
                "max_history_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse the daily summary time-of-day.
    pub fn summary_time(&self) -> Result<NaiveTime, AppError> {
        NaiveTime::parse_from_str(&self.daily_summary_time, "%H:%M").map_err(|e| {
            AppError::Config(format!(
                "daily_summary_time '{}' is not HH:MM: {e}",
                self.daily_summary_time
            ))
        })
    }
}

fn default_base_url() -> String {
    "https://app.ticketmaster.com/discovery/v2".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_cache_minutes() -> u64 {
    30
}

fn default_daily_request_budget() -> u32 {
    5000
}

/// Ticketing API client settings (the API key comes from the
/// `TICKETMASTER_API_KEY` environment variable, never from the file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_cache_minutes")]
    pub cache_minutes: u64,
    #[serde(default = "default_daily_request_budget")]
    pub daily_request_budget: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            cache_minutes: default_cache_minutes(),
            daily_request_budget: default_daily_request_budget(),
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

/// Email recipient settings (SMTP credentials come from the
/// `SMTP_USERNAME`/`SMTP_PASSWORD` environment variables)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub from: String,
    pub to: String,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
}

impl EmailConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        for (label, addr) in [("from", &self.from), ("to", &self.to)] {
            if !addr.contains('@') {
                return Err(AppError::Config(format!(
                    "email.{label} '{addr}' is not a valid address"
                )));
            }
        }
        Ok(())
    }
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub events: Vec<EventConfig>,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub email: EmailConfig,
}

impl AppConfig {
    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        if self.events.is_empty() {
            return Err(AppError::Config(
                "configuration must contain at least one event".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for event in &self.events {
            event.validate()?;
            if !seen.insert(event.id.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate event id '{}'",
                    event.id
                )));
            }
        }

        self.monitoring.validate()?;
        self.email.validate()?;
        Ok(())
    }

    /// Immutable snapshot of tracked events for the orchestrator.
    pub fn tracked_events(&self) -> Vec<TrackedEvent> {
        self.events.iter().map(EventConfig::to_tracked_event).collect()
    }

    pub fn decision_settings(&self) -> DecisionSettings {
        DecisionSettings {
            minimum_drop_percent: self.monitoring.minimum_price_drop_percent,
            alert_policy: self.monitoring.alert_policy,
            cooldown: ChronoDuration::hours(self.monitoring.cooldown_hours as i64),
        }
    }

    pub fn schedule_settings(&self) -> Result<ScheduleSettings, AppError> {
        Ok(ScheduleSettings {
            check_frequency: ChronoDuration::hours(self.monitoring.check_frequency_hours as i64),
            daily_summary_time: self.monitoring.summary_time()?,
            cleanup_interval_days: self.monitoring.cleanup_interval_days as i64,
            max_history_days: self.monitoring.max_history_days,
            ..ScheduleSettings::default()
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn valid_event() -> EventConfig {
        EventConfig {
            id: "G5vYZ4F1e3kBhq".to_string(),
            name: "Example Show".to_string(),
            venue: Some("Example Arena".to_string()),
            event_date: None,
            threshold_price: Some(Decimal::from_str("150.00").unwrap()),
            enabled: true,
        }
    }

    fn valid_config() -> AppConfig {
        AppConfig {
            events: vec![valid_event()],
            monitoring: MonitoringConfig::default(),
            api: ApiConfig::default(),
            email: EmailConfig {
                from: "bot@example.com".to_string(),
                to: "operator@example.com".to_string(),
                smtp_host: default_smtp_host(),
            },
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_events_fails() {
        let mut config = valid_config();
        config.events.clear();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("at least one event"));
    }

    #[test]
    fn test_duplicate_event_ids_fail() {
        let mut config = valid_config();
        config.events.push(valid_event());
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate event id"));
    }

    #[test]
    fn test_zero_threshold_fails() {
        let mut config = valid_config();
        config.events[0].threshold_price = Some(Decimal::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_threshold_is_allowed() {
        let mut config = valid_config();
        config.events[0].threshold_price = None;
        assert!(config.validate().is_ok());

        let tracked = config.tracked_events();
        assert!(tracked[0].threshold_price.is_none());
    }

    #[test]
    fn test_drop_percent_bounds() {
        let mut config = valid_config();
        config.monitoring.minimum_price_drop_percent = Some(Decimal::from(100));
        assert!(config.validate().is_err());

        config.monitoring.minimum_price_drop_percent = Some(Decimal::ZERO);
        assert!(config.validate().is_err());

        config.monitoring.minimum_price_drop_percent = Some(Decimal::from(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_summary_time_fails() {
        let mut config = valid_config();
        config.monitoring.daily_summary_time = "9am".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("HH:MM"));
    }

    #[test]
    fn test_summary_time_parses() {
        let monitoring = MonitoringConfig {
            daily_summary_time: "21:30".to_string(),
            ..MonitoringConfig::default()
        };
        let time = monitoring.summary_time().unwrap();
        assert_eq!(time, NaiveTime::from_hms_opt(21, 30, 0).unwrap());
    }

    #[test]
    fn test_invalid_email_fails() {
        let mut config = valid_config();
        config.email.to = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_schedule_settings_from_config() {
        let config = valid_config();
        let schedule = config.schedule_settings().unwrap();
        assert_eq!(schedule.check_frequency, ChronoDuration::hours(2));
        assert_eq!(schedule.max_history_days, 90);
    }

    #[test]
    fn test_decision_settings_from_config() {
        let mut config = valid_config();
        config.monitoring.minimum_price_drop_percent =
            Some(Decimal::from_str("12.5").unwrap());
        config.monitoring.cooldown_hours = 12;

        let settings = config.decision_settings();
        assert_eq!(
            settings.minimum_drop_percent,
            Some(Decimal::from_str("12.5").unwrap())
        );
        assert_eq!(settings.cooldown, ChronoDuration::hours(12));
        assert_eq!(settings.alert_policy, AlertPolicy::Both);
    }

    #[test]
    fn test_alert_policy_deserialize() {
        let policy: AlertPolicy = serde_yaml::from_str("either").unwrap();
        assert_eq!(policy, AlertPolicy::Either);
        let policy: AlertPolicy = serde_yaml::from_str("both").unwrap();
        assert_eq!(policy, AlertPolicy::Both);
    }
}
