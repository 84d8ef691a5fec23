//! Typed errors for the adapter boundaries
//!
//! The orchestrator classifies `FetchError` into transient (bounded
//! retry with backoff) and permanent (fail the event immediately for
//! this cycle) via `is_transient()`.

use thiserror::Error;

/// Errors returned by a `PriceFetcher`
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("event not found: {0}")]
    NotFound(String),

    #[error("authentication rejected by ticketing API")]
    Auth,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("server error: HTTP {0}")]
    ServerError(u16),
}

impl FetchError {
    /// Whether this failure is worth retrying within the same cycle.
    ///
    /// Bad event ids, auth failures and malformed payloads will not
    /// heal by waiting, so they skip the retry loop entirely.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited(_)
                | FetchError::Timeout
                | FetchError::Network(_)
                | FetchError::ServerError(_)
        )
    }
}

/// Errors returned by a `PriceStore`
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Errors returned by a `Notifier`
#[derive(Error, Debug)]
pub enum SendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type SendResult<T> = std::result::Result<T, SendError>;
