use std::time::Duration;

use crate::errors::SqsConsumerError;
use crate::queue::SQS_MAX_BATCH_SIZE;

const MAX_WAIT_TIME_SECONDS: i32 = 20;
const MAX_VISIBILITY_TIMEOUT_SECONDS: i32 = 12 * 60 * 60;

/// Configuration for the SQS consumer.
///
/// Construction of a [`SqsConsumer`](super::SqsConsumer) validates every
/// bound and fails with [`SqsConsumerError::ConfigError`] before touching
/// the queue.
#[derive(Debug, Clone)]
pub struct SqsConsumerConfig {
    /// The maximum number of messages to receive in a single request (1-10).
    pub max_batch_size: i32,

    /// The wait time for long polling, in seconds (0-20).
    pub wait_time_seconds: i32,

    /// How long a received message stays hidden from other consumers, in seconds (0-43200).
    pub visibility_timeout_seconds: i32,

    /// Fetch a single batch, wait for its handlers and stop.
    pub run_once: bool,

    /// Delay between batches. Must be non-zero unless `run_once` is set.
    pub interval: Duration,

    /// Maximum number of handlers running at once; 0 means unbounded.
    pub max_concurrent_handlers: usize,

    /// How long to wait before re-checking capacity when all handlers are busy.
    pub busy_retry_delay: Duration,

    /// A running handler whose lease is closer than this to expiry triggers a warning
    /// (and an extension, when `lease_extension_seconds` is set).
    pub lease_safety_margin: Duration,

    /// Visibility timeout to apply when a lease nears expiry; `None` disables extension.
    pub lease_extension_seconds: Option<i32>,

    /// Upper bound on waiting for running handlers after cancellation.
    pub shutdown_timeout: Duration,
}

impl Default for SqsConsumerConfig {
    fn default() -> Self {
        SqsConsumerConfig {
            max_batch_size: 10,
            wait_time_seconds: 20,
            visibility_timeout_seconds: 20,
            run_once: false,
            interval: Duration::from_secs(10),
            max_concurrent_handlers: 0,
            busy_retry_delay: Duration::from_secs(1),
            lease_safety_margin: Duration::from_secs(2),
            lease_extension_seconds: None,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl SqsConsumerConfig {
    /// Loads the configuration from process environment variables, falling
    /// back to the defaults for unset ones.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `SQS_BATCH_SIZE` | `max_batch_size` |
    /// | `SQS_WAIT_TIME` | `wait_time_seconds` |
    /// | `SQS_VISIBILITY_TIMEOUT` | `visibility_timeout_seconds` |
    /// | `RUN_ONCE` | `run_once` |
    /// | `RUN_INTERVAL` | `interval` (seconds) |
    /// | `SQS_MAX_HANDLERS` | `max_concurrent_handlers` |
    /// | `SQS_BUSY_TIMEOUT` | `busy_retry_delay` (seconds) |
    pub fn from_env() -> Result<Self, SqsConsumerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SqsConsumerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = SqsConsumerConfig::default();

        if let Some(v) = parse_var(&lookup, "SQS_BATCH_SIZE")? {
            config.max_batch_size = v;
        }
        if let Some(v) = parse_var(&lookup, "SQS_WAIT_TIME")? {
            config.wait_time_seconds = v;
        }
        if let Some(v) = parse_var(&lookup, "SQS_VISIBILITY_TIMEOUT")? {
            config.visibility_timeout_seconds = v;
        }
        if let Some(v) = parse_var(&lookup, "RUN_ONCE")? {
            config.run_once = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "RUN_INTERVAL")? {
            config.interval = Duration::from_secs(v);
        }
        if let Some(v) = parse_var(&lookup, "SQS_MAX_HANDLERS")? {
            config.max_concurrent_handlers = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "SQS_BUSY_TIMEOUT")? {
            config.busy_retry_delay = Duration::from_secs(v);
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks every bound.
    pub fn validate(&self) -> Result<(), SqsConsumerError> {
        if self.max_batch_size < 1 || self.max_batch_size > SQS_MAX_BATCH_SIZE as i32 {
            return Err(SqsConsumerError::config(format!(
                "max_batch_size should be between 1-{SQS_MAX_BATCH_SIZE}, got {}",
                self.max_batch_size
            )));
        }

        if self.wait_time_seconds < 0 || self.wait_time_seconds > MAX_WAIT_TIME_SECONDS {
            return Err(SqsConsumerError::config(format!(
                "wait_time_seconds should be between 0-{MAX_WAIT_TIME_SECONDS}, got {}",
                self.wait_time_seconds
            )));
        }

        if self.visibility_timeout_seconds < 0
            || self.visibility_timeout_seconds > MAX_VISIBILITY_TIMEOUT_SECONDS
        {
            return Err(SqsConsumerError::config(format!(
                "visibility_timeout_seconds should be between 0-{MAX_VISIBILITY_TIMEOUT_SECONDS}, got {}",
                self.visibility_timeout_seconds
            )));
        }

        if !self.run_once && self.interval.is_zero() {
            return Err(SqsConsumerError::config(
                "interval must be greater than zero unless run_once is set",
            ));
        }

        if self.max_concurrent_handlers > 0 && self.busy_retry_delay.is_zero() {
            return Err(SqsConsumerError::config(
                "busy_retry_delay must be greater than zero when max_concurrent_handlers is set",
            ));
        }

        if let Some(extension) = self.lease_extension_seconds {
            if extension < 1 || extension > MAX_VISIBILITY_TIMEOUT_SECONDS {
                return Err(SqsConsumerError::config(format!(
                    "lease_extension_seconds should be between 1-{MAX_VISIBILITY_TIMEOUT_SECONDS}, got {extension}"
                )));
            }
            if Duration::from_secs(extension as u64) <= self.lease_safety_margin {
                return Err(SqsConsumerError::config(format!(
                    "lease_extension_seconds ({extension}) must exceed lease_safety_margin ({:?})",
                    self.lease_safety_margin
                )));
            }
        }

        Ok(())
    }
}

/// Where the consumed queue lives: `SQS_URL` and an optional `AWS_REGION`.
///
/// When `region` is `None` the AWS provider chain picks one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub queue_url: String,
    pub region: Option<String>,
}

impl QueueSettings {
    pub fn from_env() -> Result<Self, SqsConsumerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Fails with [`SqsConsumerError::ConfigError`] when `SQS_URL` is unset or blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SqsConsumerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let queue_url = parse_var::<String, _>(&lookup, "SQS_URL")?
            .ok_or_else(|| SqsConsumerError::config("SQS_URL must be set"))?;
        let region = parse_var::<String, _>(&lookup, "AWS_REGION")?;
        Ok(QueueSettings { queue_url, region })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, SqsConsumerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| SqsConsumerError::config(format!("{key}={raw:?} is invalid: {e}"))),
    }
}
