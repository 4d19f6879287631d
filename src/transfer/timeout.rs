//! # Timeout estimation
//!
//! A single fixed timeout either kills large downloads halfway or waits far
//! too long on a dead small one. The total budget is therefore scaled by the
//! number of bytes expected:
//!
//! ```text
//! total = clamp(max(user, base + len * margin * 1000 / min_throughput), min, max)
//! ```
//!
//! with `min`/`max` chosen per method. When the length is unknown the method's
//! minimum applies. For GET the length can be learned up front with a short
//! HEAD probe, see [`probe_length`].
//!
//! | Size | GET budget with the default policy |
//! |------|------------------------------------|
//! | unknown, 1 KiB, 1 MiB | 5 min (floor) |
//! | 10 MiB | 7 min 49.6 s |
//! | 100 MiB | 1 h (ceiling) |

use super::error::Error;
use super::progress::CancelFlag;
use crate::network::http::{self, Method};
use crate::network::transport::{Exchange, Flow, Handler, Progress, Timeouts, Transport};
use core::time::Duration;
use log::debug;
use serde::{Deserialize, Serialize};

/// Inclusive lower and upper limit of a total budget, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Bounds {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn clamp(&self, ms: u64) -> u64 {
        ms.max(self.min_ms).min(self.max_ms)
    }
}

/// Parameters of the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutPolicy {
    /// Fixed allowance for connecting and the first byte.
    pub base_ms: u64,
    /// Multiplier applied to the ideal transfer time.
    pub safety_margin: u64,
    /// Slowest link speed still considered healthy, in bytes per second.
    pub min_throughput: u64,
    /// Budget for establishing a connection.
    pub connect_ms: u64,
    /// Connect budget of the length probe (doubled for https).
    pub probe_connect_ms: u64,
    /// Stall budget when the request does not carry its own timeout.
    pub stall_ms: u64,
    pub get: Bounds,
    pub post: Bounds,
    pub head: Bounds,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            base_ms: 60_000,
            safety_margin: 2,
            min_throughput: 50 * 1024,
            connect_ms: 30_000,
            probe_connect_ms: 10_000,
            stall_ms: 30_000,
            get: Bounds::new(300_000, 3_600_000),
            post: Bounds::new(60_000, 3_600_000),
            head: Bounds::new(30_000, 120_000),
        }
    }
}

impl TimeoutPolicy {
    pub fn bounds(&self, method: Method) -> Bounds {
        match method {
            Method::Get => self.get,
            Method::Post => self.post,
            Method::Head => self.head,
        }
    }

    /// Budget needed to move `len` bytes at the minimum throughput, plus the
    /// base allowance.
    pub fn scaled_ms(&self, len: u64) -> u64 {
        let throughput = u128::from(self.min_throughput.max(1));
        let transfer = u128::from(len) * u128::from(self.safety_margin) * 1000 / throughput;
        let transfer = u64::try_from(transfer).unwrap_or(u64::MAX);
        self.base_ms.saturating_add(transfer)
    }

    /// Budgets for one attempt of `method` moving `length` bytes.
    pub fn estimate(
        &self,
        method: Method,
        length: Option<u64>,
        user: Option<Duration>,
    ) -> Timeouts {
        let bounds = self.bounds(method);
        let stall_ms = user.map_or(self.stall_ms, duration_ms);
        let wanted = match length {
            Some(len) => self.scaled_ms(len),
            None => bounds.min_ms,
        };
        Timeouts {
            connect: Duration::from_millis(self.connect_ms),
            total: Duration::from_millis(bounds.clamp(stall_ms.max(wanted))),
            stall: Duration::from_millis(stall_ms),
        }
    }

    /// Budgets for the length probe: short, and twice as long for https.
    pub fn probe(&self, https: bool) -> Timeouts {
        let connect = if https {
            self.probe_connect_ms.saturating_mul(2)
        } else {
            self.probe_connect_ms
        };
        let total = connect.saturating_add(connect / 2);
        Timeouts {
            connect: Duration::from_millis(connect),
            total: Duration::from_millis(total),
            stall: Duration::from_millis(total),
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

struct Probe<'a> {
    length: Option<u64>,
    cancel: &'a CancelFlag,
    cancelled: bool,
}

impl Handler for Probe<'_> {
    fn header(&mut self, line: &[u8]) -> bool {
        if http::is_status_line(line) {
            self.length = None;
        } else if let Some(len) = http::content_length(line) {
            self.length = Some(len);
        }
        true
    }

    fn body(&mut self, data: &[u8]) -> usize {
        data.len()
    }

    fn upload(&mut self, _buf: &mut [u8]) -> Option<usize> {
        Some(0)
    }

    fn progress(&mut self, _progress: Progress) -> Flow {
        if self.cancel.is_requested() {
            self.cancelled = true;
            return Flow::Abort;
        }
        Flow::Continue
    }
}

/// Learns the body length of `exchange.url` with a HEAD request.
///
/// Any probe failure is reported as an unknown length; only a stop request
/// is an error.
pub fn probe_length<T: Transport + ?Sized>(
    transport: &mut T,
    exchange: &Exchange<'_>,
    cancel: &CancelFlag,
) -> Result<Option<u64>, Error> {
    let mut probe = Probe {
        length: None,
        cancel,
        cancelled: false,
    };
    let exchange = Exchange {
        method: Method::Head,
        upload_len: None,
        verbose: false,
        ..*exchange
    };
    match transport.perform(&exchange, &mut probe) {
        Ok(status) if (200..300).contains(&status) => {
            debug!("probe of {} found length {:?}", exchange.url, probe.length);
            Ok(probe.length)
        }
        Ok(status) => {
            debug!("probe of {} answered {}", exchange.url, status);
            Ok(None)
        }
        Err(_) if probe.cancelled => Err(Error::Cancelled),
        Err(e) => {
            debug!("probe of {} failed: {:?}", exchange.url, e);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn total_secs(policy: &TimeoutPolicy, method: Method, len: Option<u64>) -> u64 {
        policy.estimate(method, len, None).total.as_secs()
    }

    #[test]
    fn get_budgets_follow_size() {
        let policy = TimeoutPolicy::default();
        assert_eq!(total_secs(&policy, Method::Get, None), 300);
        assert_eq!(total_secs(&policy, Method::Get, Some(1024)), 300);
        assert_eq!(total_secs(&policy, Method::Get, Some(MIB)), 300);
        assert_eq!(total_secs(&policy, Method::Get, Some(10 * MIB)), 469);
        assert_eq!(total_secs(&policy, Method::Get, Some(100 * MIB)), 3600);
        assert_eq!(total_secs(&policy, Method::Get, Some(u64::MAX)), 3600);
    }

    #[test]
    fn head_and_post_use_smaller_floors() {
        let policy = TimeoutPolicy::default();
        assert_eq!(total_secs(&policy, Method::Head, None), 30);
        assert_eq!(total_secs(&policy, Method::Post, Some(8)), 60);
        assert_eq!(total_secs(&policy, Method::Post, Some(10 * MIB)), 469);
    }

    #[test]
    fn user_timeout_sets_stall_and_lower_limit() {
        let policy = TimeoutPolicy::default();
        let t = policy.estimate(Method::Head, Some(0), Some(Duration::from_secs(90)));
        assert_eq!(t.stall, Duration::from_secs(90));
        assert_eq!(t.total, Duration::from_secs(90));
        assert_eq!(t.connect, Duration::from_secs(30));
    }

    #[test]
    fn estimate_is_monotonic_and_bounded() {
        let policy = TimeoutPolicy::default();
        for method in [Method::Get, Method::Post, Method::Head] {
            let bounds = policy.bounds(method);
            let mut previous = 0;
            let mut len = 0u64;
            while len < 1 << 40 {
                let ms = policy.estimate(method, Some(len), None).total.as_millis() as u64;
                assert!(ms >= previous, "{method} not monotonic at {len}");
                assert!((bounds.min_ms..=bounds.max_ms).contains(&ms));
                previous = ms;
                len = len * 3 + 1;
            }
        }
    }

    #[test]
    fn probe_budgets() {
        let policy = TimeoutPolicy::default();
        assert_eq!(policy.probe(false).connect, Duration::from_secs(10));
        assert_eq!(policy.probe(false).total, Duration::from_secs(15));
        assert_eq!(policy.probe(true).connect, Duration::from_secs(20));
        assert_eq!(policy.probe(true).total, Duration::from_secs(30));
    }
}
