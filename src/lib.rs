//! TixScan - ticket price monitoring bot
//!
//! Polls the Ticketmaster Discovery API for tracked events, persists
//! every observed price to SQLite, and emails the operator when a
//! price falls below its configured threshold:
//! - Adapters (Ticketmaster fetcher, SQLite store, SMTP notifier)
//! - Alert decision engine with threshold/drop/cooldown rules
//! - Monitoring orchestrator and scheduler loop

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;

pub use error::AppError;
