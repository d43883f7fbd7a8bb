use std::sync::Arc;
use std::time::Duration;

use fastrand::Rng;
use reqwest::Url;

use crate::error::{ConfigError, FatalError};
use crate::keys::KeyPool;
use crate::models::{Location, RawReading};
use crate::transport::Transport;

/// Retry budget and backoff bound for throttled requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    /// Throttle events tolerated before giving up on a location
    pub retry_max_count: u32,
    /// Upper bound of the random backoff factor, in seconds
    pub wait_max_seconds: u64,
}

/// Consecutive throttle events seen by a fetcher.
///
/// Survives across locations and cycles; only a successful response clears it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleState {
    count: u32,
}

impl ThrottleState {
    /// Throttled responses since the last success
    pub fn count(&self) -> u32 {
        self.count
    }

    fn record(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

/// How a single HTTP status is handled
#[derive(Debug, PartialEq, Eq)]
enum StatusClass {
    Success,
    Fatal(FatalError),
    Throttled,
    Other,
}

fn classify(status: u16, location: &Location) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        400 => StatusClass::Fatal(FatalError::InvalidLocation {
            location: location.name.clone(),
        }),
        401 | 403 => StatusClass::Fatal(FatalError::InvalidApiKey { status }),
        404 => StatusClass::Fatal(FatalError::ApiChanged),
        // 402 is what IQAir returns once a key's monthly quota is used up
        402 | 429 => StatusClass::Throttled,
        _ => StatusClass::Other,
    }
}

/// Fetches current conditions for one location at a time, spreading
/// requests over a pool of API keys and backing off when throttled.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    endpoint: Url,
    settings: FetchSettings,
    throttle: ThrottleState,
    rng: Rng,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        api_base: &str,
        settings: FetchSettings,
    ) -> Result<Self, ConfigError> {
        let endpoint = format!("{}/city", api_base.trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| ConfigError::Invalid(format!("IQAir endpoint '{endpoint}': {e}")))?;

        Ok(Self {
            transport,
            endpoint,
            settings,
            throttle: ThrottleState::default(),
            rng: Rng::new(),
        })
    }

    /// Replaces the random source used for key selection and backoff.
    #[cfg(test)]
    pub fn with_rng(mut self, rng: Rng) -> Self {
        self.rng = rng;
        self
    }

    /// Current throttle state, carried across locations
    pub fn throttle(&self) -> ThrottleState {
        self.throttle
    }

    fn city_url(&self, location: &Location, key: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("state", &location.state)
            .append_pair("city", &location.city)
            .append_pair("country", &location.country)
            .append_pair("key", key);
        url
    }

    fn backoff(&mut self, attempt: u32) -> Duration {
        let factor = self.rng.u64(1..=self.settings.wait_max_seconds.max(1));
        Duration::from_secs(1u64.saturating_add(u64::from(attempt).saturating_mul(factor)))
    }

    /// Fetches the current reading for `location`.
    ///
    /// Returns `Ok(None)` when this location has nothing to contribute this
    /// cycle, and `Err` only for conditions that no retry can fix. Throttled
    /// keys are dropped from `keys` for the rest of the cycle while another
    /// key remains.
    pub async fn fetch(
        &mut self,
        location: &Location,
        keys: &mut KeyPool,
    ) -> Result<Option<RawReading>, FatalError> {
        loop {
            let key = keys.choose(&mut self.rng).to_owned();
            let url = self.city_url(location, &key);
            tracing::debug!(
                "Requesting {} (country={}, state={}, city={})",
                location.name,
                location.country,
                location.state,
                location.city
            );

            let reply = match self.transport.get(&url).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!("Request to IQAir failed for {}: {:#}", location.name, e);
                    return Ok(None);
                }
            };

            match classify(reply.status, location) {
                StatusClass::Success => {
                    self.throttle.reset();
                    return match serde_json::from_str::<RawReading>(&reply.body) {
                        Ok(reading) => Ok(Some(reading)),
                        Err(e) => {
                            tracing::error!("Unreadable IQAir response for {}: {}", location.name, e);
                            Ok(None)
                        }
                    };
                }
                StatusClass::Fatal(fatal) => {
                    tracing::error!("Request to IQAir failed with status {}", reply.status);
                    return Err(fatal);
                }
                StatusClass::Throttled => {
                    let attempt = self.throttle.record();
                    if keys.remove(&key) {
                        tracing::debug!("Dropped throttled key, {} left this cycle", keys.len());
                    }
                    if attempt > self.settings.retry_max_count {
                        tracing::warn!(
                            "Being throttled (status {}); giving up on {} after {} attempts",
                            reply.status,
                            location.name,
                            attempt
                        );
                        return Ok(None);
                    }
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        "Being throttled (status {}); retrying {} in {}s",
                        reply.status,
                        location.name,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
                StatusClass::Other => {
                    tracing::error!(
                        "Request to IQAir failed for {} with status {}",
                        location.name,
                        reply.status
                    );
                    return Ok(None);
                }
            }
        }
    }
}
