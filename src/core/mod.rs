//! Core module - decision engine, orchestrator, scheduler, state
//!
//! This module uses explicit re-exports instead of glob exports to
//! keep the public API visible and prevent accidental changes.

pub mod clock;
pub mod decision;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;
pub mod state;
pub mod types;

// Explicit re-exports for types module
pub use types::{
    AlertDecision, AlertRecord, CycleStats, DeliveryOutcome, EventPhase, EventReport,
    EventSummary, PriceObservation, TrackedEvent, DEFAULT_SECTION,
};

// Explicit re-exports for decision module
pub use decision::{AlertPolicy, DecisionEngine, DecisionSettings};

// Explicit re-exports for state module
pub use state::{CooldownTable, MonitoringState};

// Explicit re-exports for clock module
pub use clock::{Clock, SystemClock};

// Explicit re-exports for retry module
pub use retry::{fetch_with_retry, RetryPolicy};

// Explicit re-exports for orchestrator module
pub use orchestrator::{Orchestrator, OrchestratorSettings};

// Explicit re-exports for scheduler module
pub use scheduler::{
    check_due, cleanup_due, scheduler_task, summary_due, ScheduleSettings, SchedulerCommand,
};
