//! Alert decision engine
//!
//! For one event, compares a batch of new observations against the
//! most recent *persisted* price per section, the configured threshold
//! and the cooldown table, and returns the qualifying alerts. The
//! engine is pure: it never touches the store or the notifier, and its
//! output is deterministic (ascending by section label) given identical
//! input.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::state::CooldownTable;
use crate::core::types::{AlertDecision, PriceObservation, TrackedEvent};

/// How the price threshold and the minimum-drop filter combine.
///
/// `Both` (default) requires the new price at/under the threshold AND a
/// drop of at least the configured percent; `Either` fires on one of
/// the two. The drop filter exists to avoid alerting on negligible
/// fluctuations at/under the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertPolicy {
    #[default]
    Both,
    Either,
}

/// Tunables for the decision engine, loaded once from configuration
#[derive(Debug, Clone)]
pub struct DecisionSettings {
    /// Minimum percent drop to consider a price movement significant.
    /// `None` disables the noise filter: the threshold alone decides.
    pub minimum_drop_percent: Option<Decimal>,
    pub alert_policy: AlertPolicy,
    /// Minimum time between two alerts for the same (event, section)
    pub cooldown: Duration,
}

pub struct DecisionEngine {
    settings: DecisionSettings,
}

impl DecisionEngine {
    pub fn new(settings: DecisionSettings) -> Self {
        Self { settings }
    }

    /// Evaluate one event's new observations.
    ///
    /// `prior` holds the most recent persisted observation per section,
    /// read from the store before the new batch was appended. Sections
    /// with no prior price produce no alert (no baseline for the drop
    /// computation) but their observations are still persisted by the
    /// orchestrator.
    pub fn evaluate(
        &self,
        event: &TrackedEvent,
        observations: &[PriceObservation],
        prior: &HashMap<String, PriceObservation>,
        cooldowns: &CooldownTable,
        now: DateTime<Utc>,
    ) -> Vec<AlertDecision> {
        // Events without a threshold are monitored for history only.
        let threshold = match event.threshold_price {
            Some(t) => t,
            None => return Vec::new(),
        };

        // Cheapest observation per section; BTreeMap keeps the output
        // ordered ascending by section label.
        let mut by_section: BTreeMap<&str, &PriceObservation> = BTreeMap::new();
        for obs in observations {
            by_section
                .entry(obs.section.as_str())
                .and_modify(|current| {
                    if obs.price < current.price {
                        *current = obs;
                    }
                })
                .or_insert(obs);
        }

        let mut decisions = Vec::new();

        for (section, obs) in by_section {
            let old_price = match prior.get(section) {
                Some(previous) => previous.price,
                None => {
                    debug!(
                        event_id = %event.event_id,
                        section,
                        "First observation for section, no baseline yet"
                    );
                    continue;
                }
            };
            if old_price <= Decimal::ZERO {
                continue;
            }

            let percent_drop = (old_price - obs.price) / old_price * Decimal::from(100);

            let threshold_met = obs.price <= threshold;
            // Some(met) only when a minimum drop is configured
            let drop_met = self
                .settings
                .minimum_drop_percent
                .map(|min_drop| percent_drop >= min_drop);

            let qualifies = match self.settings.alert_policy {
                AlertPolicy::Both => threshold_met && drop_met.unwrap_or(true),
                AlertPolicy::Either => threshold_met || drop_met.unwrap_or(false),
            };
            if !qualifies {
                continue;
            }

            if let Some(last) = cooldowns.last_alert(&event.event_id, section) {
                if now - last < self.settings.cooldown {
                    debug!(
                        event_id = %event.event_id,
                        section,
                        last_alert = %last,
                        "Alert suppressed by cooldown"
                    );
                    continue;
                }
            }

            decisions.push(AlertDecision {
                event_id: event.event_id.clone(),
                section: section.to_string(),
                old_price,
                new_price: obs.price,
                percent_drop,
                decided_at: now,
            });
        }

        decisions
    }
}
