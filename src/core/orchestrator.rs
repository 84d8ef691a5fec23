//! Monitoring orchestrator
//!
//! Drives one full pass over the tracked events: fetch with bounded
//! retry, validate, evaluate alerts, persist, deliver notifications.
//! Each event is processed in isolation: a failure for one event never
//! aborts the cycle for the others, and every outcome lands in
//! `CycleStats`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapters::traits::{Notifier, PriceFetcher, PriceStore};
use crate::core::clock::Clock;
use crate::core::decision::DecisionEngine;
use crate::core::retry::{fetch_with_retry, RetryPolicy};
use crate::core::state::MonitoringState;
use crate::core::types::{
    AlertDecision, AlertRecord, CycleStats, DeliveryOutcome, EventPhase, EventReport,
    EventSummary, PriceObservation, TrackedEvent,
};

/// Orchestrator tunables
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub retry: RetryPolicy,
    /// Immediate delivery attempts per alert before it is recorded as
    /// failed. Delivery is never retried across cycles.
    pub delivery_attempts: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            delivery_attempts: 2,
        }
    }
}

/// Coordinates fetcher, decision engine, store and notifier for the
/// configured set of tracked events.
pub struct Orchestrator<F, S, N, C> {
    fetcher: Arc<F>,
    store: Arc<S>,
    notifier: Arc<N>,
    clock: Arc<C>,
    engine: DecisionEngine,
    events: Vec<TrackedEvent>,
    settings: OrchestratorSettings,
}

impl<F, S, N, C> Orchestrator<F, S, N, C>
where
    F: PriceFetcher,
    S: PriceStore,
    N: Notifier,
    C: Clock,
{
    pub fn new(
        fetcher: Arc<F>,
        store: Arc<S>,
        notifier: Arc<N>,
        clock: Arc<C>,
        engine: DecisionEngine,
        events: Vec<TrackedEvent>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            fetcher,
            store,
            notifier,
            clock,
            engine,
            events,
            settings,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn tracked_events(&self) -> &[TrackedEvent] {
        &self.events
    }

    /// Run one full price-check cycle over all enabled events.
    ///
    /// Cancellation is observed between events only, so an in-flight
    /// persistence write always completes before the loop exits.
    pub async fn run_cycle(
        &self,
        state: &mut MonitoringState,
        cancel: &CancellationToken,
    ) -> CycleStats {
        let started = Instant::now();
        let mut stats = CycleStats::default();

        info!(events = self.events.len(), "Starting price check cycle");

        for event in &self.events {
            if cancel.is_cancelled() {
                warn!("Shutdown requested, stopping cycle between events");
                break;
            }
            if !event.enabled {
                debug!(event_id = %event.event_id, "Monitoring disabled, skipping");
                continue;
            }

            let report = self.process_event(event, state).await;
            match report.phase {
                EventPhase::FetchFailed | EventPhase::StoreFailed => {
                    error!(
                        event_id = %report.event_id,
                        phase = ?report.phase,
                        error = report.error.as_deref().unwrap_or("unknown"),
                        "Event failed this cycle"
                    );
                }
                _ => {
                    debug!(
                        event_id = %report.event_id,
                        observations = report.observations_stored,
                        alerts = report.alerts_fired,
                        "Event processed"
                    );
                }
            }
            stats.absorb(&report);
        }

        stats.duration = started.elapsed();
        state.last_run = Some(self.clock.now());

        if !stats.is_healthy() && stats.events_failed > 0 {
            error!(
                events_failed = stats.events_failed,
                "All events failed this cycle, waiting for next schedule"
            );
        }
        info!(
            events_checked = stats.events_checked,
            events_failed = stats.events_failed,
            alerts_fired = stats.alerts_fired,
            observations_stored = stats.observations_stored,
            api_calls = stats.api_calls,
            duration_ms = stats.duration.as_millis() as u64,
            "Price check cycle completed"
        );

        stats
    }

    /// Process a single tracked event through its per-cycle state machine.
    async fn process_event(&self, event: &TrackedEvent, state: &mut MonitoringState) -> EventReport {
        let mut report = EventReport::new(&event.event_id);

        report.phase = EventPhase::Fetching;
        let observations = match fetch_with_retry(
            self.fetcher.as_ref(),
            &event.event_id,
            &self.settings.retry,
            &mut report.api_calls,
        )
        .await
        {
            Ok(observations) => observations,
            Err(err) => {
                report.phase = EventPhase::FetchFailed;
                report.error = Some(err.to_string());
                return report;
            }
        };
        report.phase = EventPhase::Fetched;

        let valid = self.validate_batch(event, observations, &mut report);
        if valid.is_empty() {
            // Nothing usable this cycle; not an error.
            debug!(event_id = %event.event_id, "No usable observations this cycle");
            report.phase = EventPhase::Done;
            return report;
        }

        // Prior prices must come from the store, read before the new
        // batch is appended, so the comparison never sees a price that
        // was not durably written.
        let prior = match self.prior_prices(&event.event_id, &valid).await {
            Ok(prior) => prior,
            Err(err) => {
                report.phase = EventPhase::StoreFailed;
                report.error = Some(err);
                return report;
            }
        };

        report.phase = EventPhase::Evaluating;
        let now = self.clock.now();
        let decisions = self
            .engine
            .evaluate(event, &valid, &prior, &state.cooldowns, now);
        report.phase = if decisions.is_empty() {
            EventPhase::NoAlert
        } else {
            EventPhase::Alerted
        };

        // Persist before delivery: an alert must never reference a
        // price that did not reach the store.
        if let Err(err) = self.store.append(&event.event_id, &valid).await {
            error!(
                event_id = %event.event_id,
                observations = valid.len(),
                error = %err,
                "Failed to persist observations"
            );
            report.phase = EventPhase::StoreFailed;
            report.error = Some(err.to_string());
            return report;
        }
        report.observations_stored = valid.len();
        report.phase = EventPhase::Persisted;

        // Every qualifying decision arms the cooldown, whether or not
        // delivery succeeds.
        for decision in &decisions {
            state
                .cooldowns
                .note_alert(&decision.event_id, &decision.section, decision.decided_at);
        }

        for decision in decisions {
            let outcome = self.deliver(&decision).await;
            match outcome {
                DeliveryOutcome::Sent => report.alerts_fired += 1,
                _ => report.alerts_failed += 1,
            }

            let record = AlertRecord::from_decision(&decision, outcome);
            if let Err(err) = self.store.record_alert(&record).await {
                error!(
                    event_id = %record.event_id,
                    section = %record.section,
                    error = %err,
                    "Failed to record alert in store"
                );
            }
        }

        report.phase = EventPhase::Done;
        report
    }

    fn validate_batch(
        &self,
        event: &TrackedEvent,
        observations: Vec<PriceObservation>,
        report: &mut EventReport,
    ) -> Vec<PriceObservation> {
        let mut valid = Vec::with_capacity(observations.len());
        for obs in observations {
            match obs.validate() {
                Ok(()) => valid.push(obs),
                Err(err) => {
                    warn!(
                        event_id = %event.event_id,
                        section = %obs.section,
                        error = %err,
                        "Rejecting invalid observation"
                    );
                    report.observations_rejected += 1;
                }
            }
        }
        valid
    }

    async fn prior_prices(
        &self,
        event_id: &str,
        batch: &[PriceObservation],
    ) -> Result<HashMap<String, PriceObservation>, String> {
        let mut prior = HashMap::new();
        for obs in batch {
            if prior.contains_key(&obs.section) {
                continue;
            }
            match self.store.latest(event_id, Some(&obs.section)).await {
                Ok(Some(previous)) => {
                    prior.insert(obs.section.clone(), previous);
                }
                Ok(None) => {}
                Err(err) => {
                    error!(
                        event_id,
                        section = %obs.section,
                        error = %err,
                        "Failed to read prior price"
                    );
                    return Err(err.to_string());
                }
            }
        }
        Ok(prior)
    }

    /// Deliver one alert with a small fixed number of immediate
    /// retries. A delivery failure never rolls back persisted price
    /// data and is never retried across cycles.
    async fn deliver(&self, decision: &AlertDecision) -> DeliveryOutcome {
        let record = AlertRecord::from_decision(decision, DeliveryOutcome::Pending);

        for attempt in 1..=self.settings.delivery_attempts.max(1) {
            match self.notifier.send_alert(&record, None).await {
                Ok(()) => {
                    info!(
                        event_id = %decision.event_id,
                        section = %decision.section,
                        old_price = %decision.old_price,
                        new_price = %decision.new_price,
                        drop_pct = %format!("{:.1}%", decision.percent_drop),
                        "Price alert sent"
                    );
                    return DeliveryOutcome::Sent;
                }
                Err(err) => {
                    warn!(
                        event_id = %decision.event_id,
                        section = %decision.section,
                        attempt,
                        error = %err,
                        "Alert delivery failed"
                    );
                }
            }
        }

        error!(
            event_id = %decision.event_id,
            section = %decision.section,
            "Alert delivery exhausted retries, recording as failed"
        );
        DeliveryOutcome::Failed
    }

    /// Send the daily summary covering the latest state of every
    /// tracked event. Failure is logged and never blocks the next
    /// price-check cycle.
    pub async fn run_daily_summary(&self, state: &mut MonitoringState) -> bool {
        info!("Sending daily price summary");

        let mut entries = Vec::with_capacity(self.events.len());
        for event in &self.events {
            if !event.enabled {
                continue;
            }
            let latest = match self.store.latest(&event.event_id, None).await {
                Ok(latest) => latest,
                Err(err) => {
                    error!(event_id = %event.event_id, error = %err, "Failed to read latest price for summary");
                    None
                }
            };
            entries.push(EventSummary {
                event: event.clone(),
                latest,
            });
        }

        match self.notifier.send_summary(&entries).await {
            Ok(()) => {
                state.last_summary_date = Some(self.clock.now().date_naive());
                info!(events = entries.len(), "Daily summary sent");
                true
            }
            Err(err) => {
                error!(error = %err, "Failed to send daily summary");
                false
            }
        }
    }

    /// Delete price history beyond the retention window.
    pub async fn run_cleanup(&self, days: u32) -> usize {
        match self.store.cleanup_older_than(days).await {
            Ok(deleted) => {
                info!(days, deleted, "Price history cleanup completed");
                deleted
            }
            Err(err) => {
                error!(days, error = %err, "Price history cleanup failed");
                0
            }
        }
    }
}
