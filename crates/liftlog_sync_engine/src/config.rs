//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Storage key the pending-write queue is persisted under.
pub const DEFAULT_QUEUE_KEY: &str = "workout_sync_queue";

/// Environment variable holding the remote base URL.
pub const ENV_REMOTE_URL: &str = "LIFTLOG_REMOTE_URL";

/// Environment variable holding the remote anonymous API key.
pub const ENV_REMOTE_ANON_KEY: &str = "LIFTLOG_REMOTE_ANON_KEY";

/// Environment variable holding the periodic sync interval in seconds.
pub const ENV_SYNC_INTERVAL_SECS: &str = "LIFTLOG_SYNC_INTERVAL_SECS";

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Key of the persisted queue blob.
    pub queue_key: String,
    /// Retry configuration for queued writes.
    pub retry: RetryConfig,
    /// Interval for periodic queue drains, if any.
    pub sync_interval: Option<Duration>,
    /// Remote store endpoint, if configured.
    pub remote: Option<RemoteConfig>,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            retry: RetryConfig::default(),
            sync_interval: None,
            remote: None,
        }
    }

    /// Reads the remote endpoint and sync interval from the process
    /// environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`SyncConfig::from_env`], reading variables through `lookup`.
    ///
    /// A half-configured remote (URL without key or the reverse) is logged
    /// and ignored, so the application keeps working against local storage.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();

        let url = lookup(ENV_REMOTE_URL).filter(|v| !v.trim().is_empty());
        let key = lookup(ENV_REMOTE_ANON_KEY).filter(|v| !v.trim().is_empty());
        match (url, key) {
            (Some(url), Some(key)) => match RemoteConfig::new(&url, key) {
                Ok(remote) => config.remote = Some(remote),
                Err(e) => warn!(error = %e, "ignoring remote configuration"),
            },
            (None, None) => {}
            (url, key) => warn!(
                url_present = url.is_some(),
                key_present = key.is_some(),
                "remote store half-configured; falling back to local storage"
            ),
        }

        if let Some(raw) = lookup(ENV_SYNC_INTERVAL_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(0) => {}
                Ok(secs) => config.sync_interval = Some(Duration::from_secs(secs)),
                Err(_) => warn!(value = %raw, "ignoring malformed sync interval"),
            }
        }

        config
    }

    /// Sets the queue storage key.
    pub fn with_queue_key(mut self, key: impl Into<String>) -> Self {
        self.queue_key = key.into();
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the maximum replay attempts of a queued write.
    pub fn with_max_retries(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts;
        self
    }

    /// Sets the interval for periodic queue drains.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Sets the remote endpoint.
    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Remote store endpoint and credentials.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the project (e.g. `https://abc.example.co`).
    pub url: Url,
    /// Public anonymous API key, sent with every request.
    pub anon_key: String,
}

impl RemoteConfig {
    /// Creates a remote configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if `url` is not an absolute http(s) URL.
    pub fn new(url: &str, anon_key: impl Into<String>) -> SyncResult<Self> {
        let url = Url::parse(url.trim())
            .map_err(|e| SyncError::Config(format!("invalid remote url {url:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::Config(format!(
                "remote url must be http(s), got {}",
                url.scheme()
            )));
        }
        Ok(Self {
            url,
            anon_key: anon_key.into(),
        })
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Failed replays after which a queued write is dropped.
    pub max_attempts: u32,
    /// Upper bound of the periodic drain interval while failures persist.
    pub max_delay: Duration,
    /// Multiplier applied to the drain interval per consecutive failed drain.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            max_delay: Duration::from_secs(5 * 60),
            backoff_multiplier: 2.0,
        }
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before the next periodic drain after `failures` consecutive
    /// drains that left writes behind.
    pub fn backoff(&self, base: Duration, failures: u32) -> Duration {
        if failures == 0 {
            return base;
        }

        let exponent = i32::try_from(failures).unwrap_or(i32::MAX);
        let secs = base.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64()).max(base.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
