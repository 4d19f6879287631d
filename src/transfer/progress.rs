//! Progress counters of the active transfer and the stop flag the transfer
//! engine polls from its progress hook.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use serde::Serialize;
use std::sync::Arc;

/// Which way the bulk of the bytes is currently flowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upload,
    Download,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upload => "upload",
            Direction::Download => "download",
        }
    }
}

/// Byte counters of the active transfer.
///
/// Rendered for the status query surface as
/// `+BNCURL_PROG:<transferred>/<total|unknown>,<direction>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub direction: Direction,
    pub transferred: u64,
    pub total: Option<u64>,
}

impl ProgressSnapshot {
    pub(crate) fn starting(direction: Direction, total: Option<u64>) -> Self {
        Self {
            direction,
            transferred: 0,
            total,
        }
    }

    /// JSON form, e.g. `{"direction":"download","transferred":10,"total":null}`.
    pub fn to_json(&self) -> Result<heapless::String<96>, serde_json_core::ser::Error> {
        serde_json_core::to_string::<_, 96>(self)
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+BNCURL_PROG:{}/", self.transferred)?;
        match self.total {
            Some(total) => write!(f, "{total}")?,
            None => f.write_str("unknown")?,
        }
        write!(f, ",{}", self.direction.as_str())
    }
}

/// The shared stop signal.
///
/// Set by a status-query caller, polled by the transfer's progress hook.
/// Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.inner.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.inner.store(false, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }
}
