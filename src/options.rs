//! Configuration options for the extraction engine.
//!
//! This module provides [`EngineOptions`] and [`EngineOptionsBuilder`]. Every
//! timing and length threshold the engine uses lives here: they were tuned
//! against the rendering latency of real webmail pages and are expected to
//! need adjusting as those pages change.
//!
//! ## Example
//!
//! ```rust
//! use mailsnap::EngineOptions;
//! use std::time::Duration;
//!
//! // Using default options
//! let options = EngineOptions::default();
//! assert_eq!(options.cache_ttl, Duration::from_millis(2000));
//!
//! // Using builder for custom options
//! let options = EngineOptions::builder()
//!     .forced_attempts(6)
//!     .retry_delay(Duration::from_millis(250))
//!     .build();
//!
//! // Or from JSON, durations in milliseconds
//! let options = EngineOptions::from_json(r#"{ "body_min_len": 40, "cache_ttl": 1000 }"#).unwrap();
//! assert_eq!(options.body_min_len, 40);
//! ```

use crate::error::{ExtractError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration options for [`ExtractionEngine`](crate::ExtractionEngine)
/// and the built-in provider profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// How long a cached snapshot is served to non-forced requests.
    ///
    /// Default: `2000ms`
    #[serde(with = "millis")]
    pub cache_ttl: Duration,

    /// Delay between extraction attempts while frame content is loading.
    ///
    /// Default: `300ms`
    #[serde(with = "millis")]
    pub retry_delay: Duration,

    /// Attempts made by retrying providers on a normal request.
    ///
    /// Default: `1`
    pub attempts: usize,

    /// Attempts made by retrying providers on a forced request.
    ///
    /// Default: `10`
    pub forced_attempts: usize,

    /// Frame body candidates must be longer than this many characters.
    /// Shorter texts are usually empty editors or boilerplate.
    ///
    /// Default: `60`
    pub body_min_len: usize,

    /// Heuristic subject candidates must be shorter than this many characters,
    /// so oversized unrelated headings are skipped.
    ///
    /// Default: `200`
    pub subject_max_len: usize,

    /// Quiet period after the last mutation before a watched document
    /// triggers a refresh.
    ///
    /// Default: `300ms`
    #[serde(with = "millis")]
    pub debounce: Duration,

    /// Interval between rescans for newly inserted iframes.
    ///
    /// Default: `1500ms`
    #[serde(with = "millis")]
    pub rescan_interval: Duration,

    /// Upper bound a transport should wait for a response. The engine never
    /// enforces it; it is carried here so callers share one configuration.
    ///
    /// Default: `2500ms`
    #[serde(with = "millis")]
    pub response_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_millis(2000),
            retry_delay: Duration::from_millis(300),
            attempts: 1,
            forced_attempts: 10,
            body_min_len: 60,
            subject_max_len: 200,
            debounce: Duration::from_millis(300),
            rescan_interval: Duration::from_millis(1500),
            response_timeout: Duration::from_millis(2500),
        }
    }
}

impl EngineOptions {
    /// Creates a new builder for EngineOptions
    pub fn builder() -> EngineOptionsBuilder {
        EngineOptionsBuilder::default()
    }

    /// Decode options from JSON. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Reject settings that would stall the engine.
    pub fn validate(&self) -> Result<()> {
        if self.attempts == 0 || self.forced_attempts == 0 {
            return Err(ExtractError::Config(
                "attempt counts must be at least 1".to_string(),
            ));
        }
        if self.rescan_interval.is_zero() {
            return Err(ExtractError::Config(
                "rescan_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The retry budget and spacing for retrying providers.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            forced_attempts: self.forced_attempts,
            delay: self.retry_delay,
        }
    }
}

/// Bounded retry schedule used by providers whose content renders late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub forced_attempts: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Number of attempts for a request; never less than one.
    pub fn attempts_for(&self, force: bool) -> usize {
        let attempts = if force {
            self.forced_attempts
        } else {
            self.attempts
        };
        attempts.max(1)
    }
}

/// Builder for [`EngineOptions`].
#[derive(Default)]
pub struct EngineOptionsBuilder {
    cache_ttl: Option<Duration>,
    retry_delay: Option<Duration>,
    attempts: Option<usize>,
    forced_attempts: Option<usize>,
    body_min_len: Option<usize>,
    subject_max_len: Option<usize>,
    debounce: Option<Duration>,
    rescan_interval: Option<Duration>,
    response_timeout: Option<Duration>,
}

impl EngineOptionsBuilder {
    /// Set the cache freshness window
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Set the delay between retry attempts
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Set attempts for normal requests
    pub fn attempts(mut self, attempts: usize) -> Self {
        self.attempts = Some(attempts);
        self
    }

    /// Set attempts for forced requests
    pub fn forced_attempts(mut self, attempts: usize) -> Self {
        self.forced_attempts = Some(attempts);
        self
    }

    /// Set the minimum frame body length
    pub fn body_min_len(mut self, len: usize) -> Self {
        self.body_min_len = Some(len);
        self
    }

    /// Set the maximum heuristic subject length
    pub fn subject_max_len(mut self, len: usize) -> Self {
        self.subject_max_len = Some(len);
        self
    }

    /// Set the mutation debounce
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    /// Set the iframe rescan interval
    pub fn rescan_interval(mut self, interval: Duration) -> Self {
        self.rescan_interval = Some(interval);
        self
    }

    /// Set the transport response timeout
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// Build the EngineOptions
    pub fn build(self) -> EngineOptions {
        let defaults = EngineOptions::default();
        EngineOptions {
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            retry_delay: self.retry_delay.unwrap_or(defaults.retry_delay),
            attempts: self.attempts.unwrap_or(defaults.attempts),
            forced_attempts: self.forced_attempts.unwrap_or(defaults.forced_attempts),
            body_min_len: self.body_min_len.unwrap_or(defaults.body_min_len),
            subject_max_len: self.subject_max_len.unwrap_or(defaults.subject_max_len),
            debounce: self.debounce.unwrap_or(defaults.debounce),
            rescan_interval: self.rescan_interval.unwrap_or(defaults.rescan_interval),
            response_timeout: self.response_timeout.unwrap_or(defaults.response_timeout),
        }
    }
}

/// `Duration` as integer milliseconds.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
