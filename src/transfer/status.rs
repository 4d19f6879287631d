//! # Shared transfer state and status queries
//!
//! [`Context`] is the one piece of state shared between the worker and the
//! callers asking about it. It is created explicitly, handed to the
//! [`Executor`](super::Executor) (and to whatever answers status queries) as
//! an `Arc`, and reset when the executor shuts down.
//!
//! ```text
//!   worker thread                      query callers
//!  ───────────────                    ───────────────
//!   begin() ──────┐                  ┌── progress()
//!   update() ─────┼─▶ Mutex<Option<  │
//!   finish() ─────┘    Progress>> ◀──┘
//!   finish() ───────▶ Mutex<Option<  ◀── last_operation()
//!                      LastOperation>>
//!   progress hook ◀── CancelFlag ◀────── stop()
//! ```
//!
//! Each mutex is held only long enough to copy a value in or out, never
//! across transport I/O, and no caller ever holds both.

use super::progress::{CancelFlag, Direction, ProgressSnapshot};
use super::request::MAX_URL_LEN;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Outcome of the most recently finished request.
///
/// Rendered as `+BNCURL_LAST:<status>,"<url>"`, with `-1` when the request
/// ended without an HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastOperation {
    /// Final HTTP status, `None` when no response was obtained.
    pub status: Option<u16>,
    pub url: heapless::String<MAX_URL_LEN>,
}

impl LastOperation {
    pub fn to_json(&self) -> Result<heapless::String<320>, serde_json_core::ser::Error> {
        serde_json_core::to_string::<_, 320>(self)
    }
}

impl fmt::Display for LastOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "+BNCURL_LAST:{code},\"{}\"", self.url),
            None => write!(f, "+BNCURL_LAST:-1,\"{}\"", self.url),
        }
    }
}

/// State shared by the worker and status-query callers.
#[derive(Debug, Default)]
pub struct Context {
    progress: Mutex<Option<ProgressSnapshot>>,
    last: Mutex<Option<LastOperation>>,
    cancel: CancelFlag,
    /// Set by executor shutdown; keeps the stop flag raised across `begin`.
    closed: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters of the active transfer, `None` while idle.
    pub fn progress(&self) -> Option<ProgressSnapshot> {
        *lock(&self.progress)
    }

    /// `true` while a request is being executed.
    pub fn is_active(&self) -> bool {
        lock(&self.progress).is_some()
    }

    /// Result of the last finished request, `None` before the first one.
    pub fn last_operation(&self) -> Option<LastOperation> {
        lock(&self.last).clone()
    }

    /// Asks the active transfer to stop. Returns `false` when there is
    /// nothing to stop.
    pub fn stop(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.cancel.request();
        true
    }

    /// Forgets all state. Called on executor shutdown.
    pub fn reset(&self) {
        *lock(&self.progress) = None;
        *lock(&self.last) = None;
        self.closed.store(false, Ordering::SeqCst);
        self.cancel.clear();
    }

    /// Stops the active transfer and any that begins until [`reset`](Self::reset).
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.cancel.request();
    }

    pub(crate) fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub(crate) fn begin(&self, direction: Direction, total: Option<u64>) {
        if !self.closed.load(Ordering::SeqCst) {
            self.cancel.clear();
        }
        *lock(&self.progress) = Some(ProgressSnapshot::starting(direction, total));
    }

    pub(crate) fn update(&self, snapshot: ProgressSnapshot) {
        let mut progress = lock(&self.progress);
        if progress.is_some() {
            *progress = Some(snapshot);
        }
    }

    pub(crate) fn finish(&self, status: Option<u16>, url: &str) {
        *lock(&self.progress) = None;
        let mut stored = heapless::String::new();
        // URLs are validated against MAX_URL_LEN before they get here
        let _ = stored.push_str(url);
        *lock(&self.last) = Some(LastOperation {
            status,
            url: stored,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_only_while_active() {
        let ctx = Context::new();
        assert!(!ctx.stop());
        assert!(!ctx.cancel_flag().is_requested());

        ctx.begin(Direction::Download, Some(10));
        assert!(ctx.stop());
        assert!(ctx.cancel_flag().is_requested());

        // the next request starts with a clean flag
        ctx.finish(None, "http://example.com/");
        ctx.begin(Direction::Download, None);
        assert!(!ctx.cancel_flag().is_requested());
    }

    #[test]
    fn close_outlasts_a_late_begin() {
        let ctx = Context::new();
        // worker popped a job but has not begun it yet
        ctx.close();
        assert!(ctx.cancel_flag().is_requested());
        ctx.begin(Direction::Download, None);
        assert!(ctx.cancel_flag().is_requested());

        ctx.reset();
        ctx.begin(Direction::Download, None);
        assert!(!ctx.cancel_flag().is_requested());
    }

    #[test]
    fn last_operation_rendering() {
        let ctx = Context::new();
        assert_eq!(ctx.last_operation(), None);

        ctx.begin(Direction::Download, None);
        ctx.finish(Some(200), "http://example.com/a");
        assert!(ctx.progress().is_none());
        let last = ctx.last_operation().unwrap();
        assert_eq!(last.to_string(), "+BNCURL_LAST:200,\"http://example.com/a\"");
        assert_eq!(
            last.to_json().unwrap().as_str(),
            r#"{"status":200,"url":"http://example.com/a"}"#
        );

        ctx.finish(None, "https://example.com/b");
        assert_eq!(
            ctx.last_operation().unwrap().to_string(),
            "+BNCURL_LAST:-1,\"https://example.com/b\""
        );

        ctx.reset();
        assert_eq!(ctx.last_operation(), None);
    }

    #[test]
    fn updates_ignored_while_idle() {
        let ctx = Context::new();
        ctx.update(ProgressSnapshot::starting(Direction::Upload, Some(8)));
        assert_eq!(ctx.progress(), None);
    }
}
