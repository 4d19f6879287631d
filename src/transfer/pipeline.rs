//! # Request pipeline
//!
//! Owns the capabilities (transport, serial link, filesystem) and runs one
//! validated [`Request`] at a time from start to final status:
//!
//! ```text
//!  Request ──▶ plan ──────────────────────────────▶ retry loop ──▶ Report / Error
//!              │ custom headers, Cookie:, Range:      │
//!              │ upload length, file append offset    ├─ attempt 1 (engine)
//!              │ HEAD probe for the GET length        ├─ backoff
//!              └ timeout budgets                      └─ attempt n
//! ```
//!
//! The pipeline is synchronous; [`Executor`](super::Executor) runs it on a
//! worker thread. Progress and the last-operation record are published
//! through the shared [`Context`].

use super::config::{Config, ConfigError};
use super::cookies;
use super::engine::Plan;
use super::error::Error;
use super::framing;
use super::progress::{Direction, ProgressSnapshot};
use super::request::Request;
use super::retry::Retry;
use super::status::Context;
use super::timeout;
use crate::network::Write;
use crate::network::http::{Method, split_header};
use crate::network::transport::{Exchange, Transport};
use crate::storage::FileSystem;
use log::{debug, error, info, warn};
use std::sync::Arc;

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("bncurl/", env!("CARGO_PKG_VERSION"));

/// Summary of a successful request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    /// Final HTTP status.
    pub status: u16,
    /// Body bytes delivered to the sink (header bytes for HEAD to a file).
    pub bytes: u64,
    /// CRC-32 of the delivered body.
    pub checksum: u32,
    /// Attempts made, the successful one included.
    pub attempts: u32,
}

/// Runs requests against a transport, a serial link and a filesystem.
#[derive(Debug)]
pub struct Pipeline<T, S, F> {
    pub(crate) transport: T,
    pub(crate) port: S,
    pub(crate) fs: F,
    pub(crate) config: Config,
    pub(crate) ctx: Arc<Context>,
    pub(crate) trust: Option<Vec<u8>>,
}

impl<T: Transport, S: Write, F: FileSystem> Pipeline<T, S, F> {
    pub fn new(
        config: Config,
        ctx: Arc<Context>,
        transport: T,
        port: S,
        fs: F,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            transport,
            port,
            fs,
            config,
            ctx,
            trust: None,
        })
    }

    /// Trust anchors handed to the transport for `https` targets.
    pub fn with_trust(mut self, bundle: Vec<u8>) -> Self {
        self.trust = Some(bundle);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn port(&self) -> &S {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut S {
        &mut self.port
    }

    pub fn fs_mut(&mut self) -> &mut F {
        &mut self.fs
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_parts(self) -> (T, S, F) {
        (self.transport, self.port, self.fs)
    }

    /// Runs `request` to completion, retrying transient failures.
    ///
    /// Every request ends on the serial link with exactly one terminal
    /// marker: `SEND OK` on success, `SEND FAIL` otherwise. An attempt that
    /// announced a length closes it itself; a bare `SEND FAIL` is written
    /// only when no attempt wrote one.
    pub fn run(&mut self, request: &Request) -> Result<Report, Error> {
        info!("{} {}", request.method(), request.url());
        let direction = match request.method() {
            Method::Post => Direction::Upload,
            Method::Get | Method::Head => Direction::Download,
        };
        self.ctx.begin(direction, request.upload_len());

        let (result, status) = self.execute(request);
        match &result {
            Ok(report) => info!(
                "{} {} -> {}, {} bytes in {} attempt(s)",
                request.method(),
                request.url(),
                report.status,
                report.bytes,
                report.attempts
            ),
            Err(e) => error!("{} {} failed: {}", request.method(), request.url(), e),
        }
        self.ctx.finish(status, request.url());
        result
    }

    fn execute(&mut self, request: &Request) -> (Result<Report, Error>, Option<u16>) {
        let plan = match self.plan(request) {
            Ok(plan) => plan,
            Err(error) => {
                self.send_fail();
                return (Err(error), None);
            }
        };

        let retry = Retry::new(self.config.max_attempts, self.config.backoff_unit());
        let cancel = self.ctx.cancel_flag().clone();
        // set once any attempt has closed its own framing with SEND FAIL
        let mut terminated = false;
        let outcome = retry.run(&cancel, |n| {
            let result = self.attempt(request, &plan, n);
            if let Err(failed) = &result {
                terminated |= failed.terminated;
            }
            result
        });
        match outcome.result {
            Ok(done) => {
                let report = Report {
                    status: done.status,
                    bytes: done.bytes,
                    checksum: done.checksum,
                    attempts: outcome.attempts,
                };
                (Ok(report), Some(done.status))
            }
            Err(failed) => {
                if !terminated {
                    self.send_fail();
                }
                (Err(failed.error), failed.status)
            }
        }
    }

    fn send_fail(&mut self) {
        if let Err(e) = framing::send_fail(&mut self.port) {
            warn!("could not write SEND FAIL: {:?}", e);
        }
    }

    fn plan(&mut self, request: &Request) -> Result<Plan, Error> {
        let mut headers: Vec<String> = request.headers().map(String::from).collect();
        if let Some(path) = request.cookie_load() {
            match cookies::load(&mut self.fs, path) {
                Ok(jar) => {
                    if let Some(value) = jar.header_value() {
                        headers.push(format!("Cookie: {value}"));
                    }
                }
                Err(e) => warn!("cookie file {} not loaded: {:?}", path, e),
            }
        }
        if let Some(range) = request.range() {
            headers.push(format!("Range: bytes={range}"));
        }

        let upload_len = match (request.upload_buffer(), request.upload_file()) {
            (Some(data), _) => Some(data.len() as u64),
            (None, Some(path)) => match self.fs.len(path) {
                Ok(Some(len)) => Some(len),
                Ok(None) => {
                    warn!("upload file {} does not exist", path);
                    return Err(Error::UploadRead);
                }
                Err(e) => {
                    warn!("cannot stat upload file {}: {:?}", path, e);
                    return Err(Error::UploadRead);
                }
            },
            (None, None) => None,
        };

        let append_from = match (request.range(), request.output_file()) {
            (Some(_), Some(path)) => {
                let len = self.fs.len(path).map_err(|e| {
                    warn!("cannot stat output file {}: {:?}", path, e);
                    Error::SinkWrite
                })?;
                Some(len.unwrap_or(0))
            }
            _ => None,
        };

        let length = match request.method() {
            Method::Post => upload_len,
            Method::Head => None,
            Method::Get => match request.range().and_then(|range| range.len()) {
                Some(len) => Some(len),
                None if self.config.probe_length => self.probe(request, &headers)?,
                None => None,
            },
        };
        if request.method() == Method::Get && length.is_some() {
            self.ctx.update(ProgressSnapshot {
                direction: Direction::Download,
                transferred: 0,
                total: length,
            });
        }

        let timeouts = self
            .config
            .timeouts
            .estimate(request.method(), length, request.timeout());
        debug!(
            "{}: length {:?}, connect {:?}, total {:?}",
            request.url(),
            length,
            timeouts.connect,
            timeouts.total
        );
        Ok(Plan {
            headers,
            timeouts,
            upload_len,
            append_from,
        })
    }

    fn probe(&mut self, request: &Request, headers: &[String]) -> Result<Option<u64>, Error> {
        let headers: Vec<String> = headers
            .iter()
            .filter(|line| !describes_body(line))
            .cloned()
            .collect();
        let exchange = Exchange {
            method: Method::Head,
            url: request.url(),
            headers: &headers,
            upload_len: None,
            timeouts: self.config.timeouts.probe(request.is_https()),
            user_agent: USER_AGENT,
            max_redirects: self.config.max_redirects,
            verbose: false,
            trust: if request.is_https() {
                self.trust.as_deref()
            } else {
                None
            },
        };
        timeout::probe_length(&mut self.transport, &exchange, self.ctx.cancel_flag())
    }
}

/// Body-describing headers make no sense on a HEAD probe.
fn describes_body(line: &str) -> bool {
    split_header(line).is_some_and(|(name, _)| {
        name.eq_ignore_ascii_case("Content-Type") || name.eq_ignore_ascii_case("Content-Length")
    })
}
