//! Ticketmaster Discovery API adapter
//!
//! Implements the `PriceFetcher` trait against the event detail
//! endpoint. Responses are cached for a configurable TTL and requests
//! are counted against a daily budget so a tight check frequency
//! cannot burn through the API quota.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::adapters::errors::{FetchError, FetchResult};
use crate::adapters::traits::PriceFetcher;
use crate::config::ApiConfig;
use crate::core::types::{PriceObservation, DEFAULT_SECTION};

// =============================================================================
// Configuration
// =============================================================================

/// Settings for the Ticketmaster client
#[derive(Debug, Clone)]
pub struct TicketmasterSettings {
    /// Discovery API key
    pub api_key: String,
    /// Base URL, e.g. `https://app.ticketmaster.com/discovery/v2`
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// How long a fetched response stays fresh
    pub cache_ttl: Duration,
    /// Requests allowed per UTC day before the client refuses locally
    pub daily_request_budget: u32,
}

impl TicketmasterSettings {
    /// Build settings from file config plus the `TICKETMASTER_API_KEY`
    /// environment variable. The key never lives in the YAML file.
    pub fn from_config(api: &ApiConfig) -> FetchResult<Self> {
        let api_key = std::env::var("TICKETMASTER_API_KEY")
            .map_err(|_| FetchError::Network("TICKETMASTER_API_KEY not set".to_string()))?;
        Ok(Self {
            api_key,
            base_url: api.base_url.clone(),
            timeout: Duration::from_secs(api.timeout_secs),
            cache_ttl: Duration::from_secs(api.cache_minutes * 60),
            daily_request_budget: api.daily_request_budget,
        })
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct EventDetailResponse {
    #[serde(rename = "priceRanges", default)]
    price_ranges: Vec<PriceRange>,
}

#[derive(Debug, Deserialize)]
struct PriceRange {
    #[serde(rename = "type")]
    range_type: Option<String>,
    min: Option<f64>,
}

// =============================================================================
// Client
// =============================================================================

struct CacheEntry {
    fetched_at: Instant,
    observations: Vec<PriceObservation>,
}

struct RequestBudget {
    day: NaiveDate,
    used: u32,
}

/// Ticketmaster Discovery API client with response caching and a daily
/// request budget
pub struct TicketmasterClient {
    http: reqwest::Client,
    settings: TicketmasterSettings,
    cache: Mutex<HashMap<String, CacheEntry>>,
    budget: Mutex<RequestBudget>,
}

impl TicketmasterClient {
    pub fn new(settings: TicketmasterSettings) -> FetchResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tixscan/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            settings,
            cache: Mutex::new(HashMap::new()),
            budget: Mutex::new(RequestBudget {
                day: Utc::now().date_naive(),
                used: 0,
            }),
        })
    }

    /// Reserve one request from today's budget, resetting the counter
    /// when the UTC day rolls over.
    async fn reserve_request(&self) -> FetchResult<()> {
        let mut budget = self.budget.lock().await;
        let today = Utc::now().date_naive();
        if budget.day != today {
            budget.day = today;
            budget.used = 0;
        }
        if budget.used >= self.settings.daily_request_budget {
            return Err(FetchError::RateLimited(format!(
                "daily request budget of {} exhausted",
                self.settings.daily_request_budget
            )));
        }
        budget.used += 1;
        Ok(())
    }

    async fn cached(&self, event_id: &str) -> Option<Vec<PriceObservation>> {
        let cache = self.cache.lock().await;
        let entry = cache.get(event_id)?;
        if entry.fetched_at.elapsed() < self.settings.cache_ttl {
            Some(entry.observations.clone())
        } else {
            None
        }
    }

    fn classify_status(status: reqwest::StatusCode, event_id: &str) -> FetchError {
        match status.as_u16() {
            401 | 403 => FetchError::Auth,
            404 => FetchError::NotFound(event_id.to_string()),
            429 => FetchError::RateLimited("HTTP 429 from API".to_string()),
            code if status.is_server_error() => FetchError::ServerError(code),
            code => FetchError::InvalidResponse(format!("unexpected HTTP {code}")),
        }
    }

    /// Convert a price-range payload to observations, one per section.
    ///
    /// Ranges without a `min` price are skipped; a missing range type
    /// maps to the default section. The API does not report ticket
    /// counts, so availability stays at zero.
    fn to_observations(event_id: &str, response: EventDetailResponse) -> Vec<PriceObservation> {
        let observed_at = Utc::now();
        response
            .price_ranges
            .into_iter()
            .filter_map(|range| {
                let min = range.min?;
                let price = Decimal::from_f64_retain(min)?.round_dp(2);
                Some(PriceObservation {
                    event_id: event_id.to_string(),
                    price,
                    section: range
                        .range_type
                        .unwrap_or_else(|| DEFAULT_SECTION.to_string()),
                    availability: 0,
                    observed_at,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl PriceFetcher for TicketmasterClient {
    async fn fetch(&self, event_id: &str) -> FetchResult<Vec<PriceObservation>> {
        if let Some(observations) = self.cached(event_id).await {
            debug!(event_id, "serving prices from cache");
            return Ok(observations);
        }

        self.reserve_request().await?;

        let url = format!("{}/events/{}.json", self.settings.base_url, event_id);
        let response = self
            .http
            .get(&url)
            .query(&[("apikey", self.settings.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::classify_status(status, event_id));
        }

        let detail: EventDetailResponse = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(format!("malformed event detail: {e}")))?;

        let observations = Self::to_observations(event_id, detail);
        if observations.is_empty() {
            warn!(event_id, "event detail carried no usable price ranges");
        }

        let mut cache = self.cache.lock().await;
        cache.insert(
            event_id.to_string(),
            CacheEntry {
                fetched_at: Instant::now(),
                observations: observations.clone(),
            },
        );

        Ok(observations)
    }
}

// ============================================================================
// Tests
// ============================================================================
