//! # Configuration
//!
//! [`Config`] holds the tunables of the pipeline and executor: queue depth,
//! retry attempts and backoff, `+POST` chunk size, redirect limit, the HEAD
//! probe switch and the nested [`TimeoutPolicy`]. It loads from JSON and is
//! checked by [`Config::validate`] before a [`Pipeline`](super::Pipeline)
//! accepts it.

use super::timeout::TimeoutPolicy;
use core::time::Duration;
use serde::{Deserialize, Serialize};

/// Deepest supported submission queue.
pub const MAX_QUEUE_DEPTH: usize = 8;
/// Largest supported `+POST` chunk.
pub const MAX_CHUNK_SIZE: usize = 4096;
/// Retry attempts are capped to keep the worst case bounded.
pub const MAX_ATTEMPTS: u32 = 10;

/// Pipeline configuration.
///
/// Every field has a default, so a JSON document only needs to name the
/// values it changes:
///
/// ```rust
/// use bncurl::transfer::Config;
///
/// let config = Config::from_json(br#"{"queue_depth":4,"timeouts":{"connect_ms":5000}}"#).unwrap();
/// assert_eq!(config.queue_depth, 4);
/// assert_eq!(config.chunk_size, 1024);
/// assert_eq!(config.timeouts.connect_ms, 5000);
/// assert_eq!(config.timeouts.base_ms, 60_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Queued plus active requests accepted before `QueueFull`.
    pub queue_depth: usize,
    /// Body bytes per `+POST` chunk.
    pub chunk_size: usize,
    /// Attempts per request, the first one included.
    pub max_attempts: u32,
    /// Backoff unit; the sleep before attempt `n + 1` is `n` units.
    pub backoff_ms: u64,
    /// How long [`Executor::execute`](super::Executor::execute) waits for a
    /// result.
    pub completion_timeout_ms: u64,
    /// Learn the length of GET targets with a HEAD request first.
    pub probe_length: bool,
    pub max_redirects: u32,
    pub timeouts: TimeoutPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_depth: 2,
            chunk_size: 1024,
            max_attempts: 3,
            backoff_ms: 1000,
            completion_timeout_ms: 3_600_000,
            probe_length: true,
            max_redirects: 5,
            timeouts: TimeoutPolicy::default(),
        }
    }
}

/// Why a [`Config`] was rejected.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    Parse,
    QueueDepth,
    ChunkSize,
    Attempts,
    /// A timeout bound has `min > max`, or a throughput of zero.
    Timeouts,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::Parse => f.write_str("malformed configuration"),
            ConfigError::QueueDepth => write!(f, "queue depth must be 1..={MAX_QUEUE_DEPTH}"),
            ConfigError::ChunkSize => write!(f, "chunk size must be 1..={MAX_CHUNK_SIZE}"),
            ConfigError::Attempts => write!(f, "attempts must be 1..={MAX_ATTEMPTS}"),
            ConfigError::Timeouts => f.write_str("inconsistent timeout policy"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConfigError::Parse => defmt::write!(f, "Parse"),
            ConfigError::QueueDepth => defmt::write!(f, "QueueDepth"),
            ConfigError::ChunkSize => defmt::write!(f, "ChunkSize"),
            ConfigError::Attempts => defmt::write!(f, "Attempts"),
            ConfigError::Timeouts => defmt::write!(f, "Timeouts"),
        }
    }
}

impl Config {
    /// Parses and validates a JSON document.
    pub fn from_json(json: &[u8]) -> Result<Self, ConfigError> {
        let (config, _) =
            serde_json_core::from_slice::<Config>(json).map_err(|_| ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_QUEUE_DEPTH).contains(&self.queue_depth) {
            return Err(ConfigError::QueueDepth);
        }
        if !(1..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(ConfigError::ChunkSize);
        }
        if !(1..=MAX_ATTEMPTS).contains(&self.max_attempts) {
            return Err(ConfigError::Attempts);
        }
        let t = &self.timeouts;
        let bounds_ok = [t.get, t.post, t.head]
            .iter()
            .all(|b| b.min_ms <= b.max_ms && b.max_ms > 0);
        if !bounds_ok || t.min_throughput == 0 {
            return Err(ConfigError::Timeouts);
        }
        Ok(())
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }

    /// JSON form of the configuration.
    pub fn to_json(&self) -> Result<heapless::String<768>, serde_json_core::ser::Error> {
        serde_json_core::to_string::<_, 768>(self)
    }
}
