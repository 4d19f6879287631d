//! # Transfer engine
//!
//! One attempt of one request. A fresh [`TransferContext`] is built for every
//! attempt (the output file reopened and truncated, counters zeroed, framing
//! state cleared) and handed to the transport as its [`Handler`]:
//!
//! | Hook | Effect |
//! |------|--------|
//! | header | tracks the status and declared `Content-Length` of the current response, captures `Set-Cookie`, forwards lines in HEAD mode |
//! | body | frames bytes onto the serial link or writes them to the output file |
//! | upload | streams the POST body from memory or from a file |
//! | progress | publishes a [`ProgressSnapshot`], aborts once a stop was requested |
//! | debug | `+VERBOSE:` trace lines when the request asked for them |
//!
//! The first refusal from any hook is remembered so that the attempt reports
//! the real cause (`LengthUnknown`, `SinkWrite`, `Cancelled`) rather than the
//! transport's generic abort.

use super::cookies::{self, Cookie, CookieJar};
use super::error::Error;
use super::framing::{FrameError, Framer};
use super::pipeline::{Pipeline, USER_AGENT};
use super::progress::{Direction, ProgressSnapshot};
use super::request::Request;
use super::retry::Retryable;
use super::status::Context;
use crate::network::error::Error as NetError;
use crate::network::http::{self, Method};
use crate::network::transport::{
    DebugKind, Exchange, Flow, Handler, Progress, Timeouts, Transport,
};
use crate::network::Write;
use crate::storage::{self, FileSystem, ReadFile, WriteFile};
use core::fmt::Write as _;
use log::{debug, warn};

/// Longest `+VERBOSE:` payload.
const VERBOSE_LINE_MAX: usize = 128;

/// Settings computed once per request and shared by all of its attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Plan {
    pub headers: Vec<String>,
    pub timeouts: Timeouts,
    pub upload_len: Option<u64>,
    /// Range requests append to the output file from this length on.
    pub append_from: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Completed {
    pub status: u16,
    pub bytes: u64,
    pub checksum: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Failed {
    pub error: Error,
    pub status: Option<u16>,
    /// `SEND OK` or `SEND FAIL` has already been written for this attempt.
    pub terminated: bool,
}

impl Failed {
    fn early(error: Error) -> Self {
        Self {
            error,
            status: None,
            terminated: false,
        }
    }
}

impl Retryable for Failed {
    fn is_transient(&self) -> bool {
        self.error.is_transient()
    }

    fn cancelled() -> Self {
        Failed::early(Error::Cancelled)
    }
}

enum UploadSource<'a, R> {
    Memory { data: &'a [u8], pos: usize },
    File(R),
}

impl<R: ReadFile> UploadSource<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> Option<usize> {
        match self {
            UploadSource::Memory { data, pos } => {
                let n = buf.len().min(data.len() - *pos);
                buf[..n].copy_from_slice(&data[*pos..*pos + n]);
                *pos += n;
                Some(n)
            }
            UploadSource::File(file) => match file.read(buf) {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("upload file read failed: {:?}", e);
                    None
                }
            },
        }
    }
}

/// Per-attempt state, reset between retries by building a new one.
struct TransferContext<'a, S: Write, W, R> {
    request: &'a Request,
    shared: &'a Context,
    framer: Framer<&'a mut S>,
    file: Option<W>,
    upload: Option<UploadSource<'a, R>>,
    upload_total: Option<u64>,
    jar: CookieJar,
    crc: crc32fast::Hasher,
    delivered: u64,
    status: Option<u16>,
    failure: Option<Error>,
    cancelled: bool,
}

fn frame_error(err: FrameError) -> Error {
    match err {
        FrameError::Port => Error::SinkWrite,
        FrameError::LengthUnknown => Error::LengthUnknown,
        FrameError::Overrun { .. } => Error::Transport(NetError::ProtocolError),
        FrameError::Short { .. } => Error::PartialBody,
    }
}

impl<S: Write, W: WriteFile, R: ReadFile> TransferContext<'_, S, W, R> {
    fn fail_with(&mut self, err: Error) {
        if self.failure.is_none() {
            self.failure = Some(err);
        }
    }

    /// The current response is a final, successful one (or no status line
    /// has been seen).
    fn status_ok(&self) -> bool {
        self.status.is_none_or(|code| (200..300).contains(&code))
    }

    fn deliver_to_file(&mut self, data: &[u8]) -> Result<(), Error> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(data).map_err(|e| {
                warn!("output file write failed: {:?}", e);
                Error::SinkWrite
            })?;
        }
        Ok(())
    }

    fn capture_cookie(&mut self, value: &str) -> Result<(), Error> {
        let Some(cookie) = Cookie::parse(value, self.request.host()) else {
            debug!("ignoring malformed cookie {:?}", value);
            return Ok(());
        };
        let line = cookie.to_string();
        if !self.jar.insert(cookie) {
            warn!("cookie jar full, dropping {}", line);
        }
        self.framer
            .line("+COOKIE:", line.as_bytes())
            .map_err(frame_error)
    }

    fn complete(&mut self, status: u16) -> Result<Completed, Error> {
        if self.cancelled {
            return Err(Error::Cancelled);
        }
        if let Some(err) = self.failure {
            return Err(err);
        }
        if !(200..300).contains(&status) {
            return Err(Error::HttpStatus(status));
        }
        if let Some(file) = self.file.as_mut() {
            file.flush().map_err(|e| {
                warn!("output file flush failed: {:?}", e);
                Error::SinkWrite
            })?;
            self.framer.saved(self.delivered).map_err(frame_error)?;
        } else if self.request.method() == Method::Head {
            self.framer.open_headers().map_err(frame_error)?;
        } else {
            self.framer.finish().map_err(frame_error)?;
        }
        self.framer.succeed().map_err(frame_error)?;
        Ok(Completed {
            status,
            bytes: self.delivered,
            checksum: self.crc.clone().finalize(),
        })
    }

    fn finish(
        mut self,
        outcome: Result<u16, NetError>,
    ) -> (Result<Completed, Failed>, CookieJar) {
        let result = match outcome {
            Ok(status) => {
                self.status = Some(status);
                self.complete(status)
            }
            Err(_) if self.cancelled => Err(Error::Cancelled),
            Err(e) => Err(self.failure.unwrap_or(Error::from(e))),
        };
        let result = match result {
            Ok(done) => Ok(done),
            Err(error) => {
                if let Err(e) = self.framer.fail() {
                    debug!("could not write SEND FAIL: {:?}", e);
                }
                Err(Failed {
                    error,
                    status: self.status,
                    terminated: self.framer.is_terminated(),
                })
            }
        };
        (result, self.jar)
    }
}

impl<S: Write, W: WriteFile, R: ReadFile> Handler for TransferContext<'_, S, W, R> {
    fn header(&mut self, line: &[u8]) -> bool {
        if http::is_status_line(line) {
            let text = core::str::from_utf8(http::trim_line(line)).unwrap_or("");
            self.status = http::status_code(text);
            self.framer.declare(None);
            return true;
        }
        let trimmed = http::trim_line(line);
        if trimmed.is_empty() {
            return true;
        }
        if let Some(len) = http::content_length(line) {
            self.framer.declare(Some(len));
        }

        let result = match http::header_value(line, "Set-Cookie") {
            Some(value) => self.capture_cookie(value),
            None => Ok(()),
        };
        let result = result.and_then(|()| {
            if self.request.method() != Method::Head {
                return Ok(());
            }
            if self.file.is_some() {
                self.deliver_to_file(trimmed)?;
                self.deliver_to_file(b"\r\n")?;
                self.delivered += trimmed.len() as u64 + 2;
                Ok(())
            } else {
                self.framer.header(trimmed).map_err(frame_error)
            }
        });
        match result {
            Ok(()) => true,
            Err(err) => {
                self.fail_with(err);
                false
            }
        }
    }

    fn body(&mut self, data: &[u8]) -> usize {
        if self.cancelled || self.failure.is_some() {
            return 0;
        }
        if self.request.method() == Method::Head || !self.status_ok() {
            // nothing to deliver for HEAD or for an error page
            return data.len();
        }
        let result = if self.file.is_some() {
            self.deliver_to_file(data)
        } else {
            self.framer.body(data).map_err(frame_error)
        };
        match result {
            Ok(()) => {
                self.crc.update(data);
                self.delivered += data.len() as u64;
                data.len()
            }
            Err(err) => {
                self.fail_with(err);
                0
            }
        }
    }

    fn upload(&mut self, buf: &mut [u8]) -> Option<usize> {
        let Some(source) = self.upload.as_mut() else {
            return Some(0);
        };
        let n = source.read(buf);
        if n.is_none() {
            self.fail_with(Error::UploadRead);
        }
        n
    }

    fn progress(&mut self, progress: Progress) -> Flow {
        if self.shared.cancel_flag().is_requested() {
            self.cancelled = true;
            return Flow::Abort;
        }

        let download_total = (progress.download_total > 0).then_some(progress.download_total);
        if self.framer.declared().is_none() && matches!(self.status, Some(200..=299)) {
            self.framer.declare(download_total);
        }

        let upload_total = self
            .upload_total
            .or((progress.upload_total > 0).then_some(progress.upload_total));
        let uploading = self.request.method() == Method::Post
            && progress.download_now == 0
            && upload_total.is_none_or(|total| progress.upload_now < total);
        let snapshot = if uploading {
            ProgressSnapshot {
                direction: Direction::Upload,
                transferred: progress.upload_now,
                total: upload_total,
            }
        } else {
            ProgressSnapshot {
                direction: Direction::Download,
                transferred: progress.download_now.max(self.delivered),
                total: self
                    .framer
                    .announced()
                    .or(self.framer.declared())
                    .or(download_total),
            }
        };
        self.shared.update(snapshot);
        Flow::Continue
    }

    fn debug(&mut self, kind: DebugKind, data: &[u8]) {
        if !self.request.verbose() {
            return;
        }
        let Some(prefix) = kind.prefix() else {
            return;
        };
        let mut head: heapless::String<16> = heapless::String::new();
        if write!(head, "+VERBOSE:{prefix}").is_err() {
            return;
        }
        for line in data.split(|&b| b == b'\n') {
            let line = http::trim_line(line);
            if line.is_empty() {
                continue;
            }
            let line = &line[..line.len().min(VERBOSE_LINE_MAX)];
            if let Err(e) = self.framer.line(&head, line) {
                debug!("verbose trace dropped: {:?}", e);
                return;
            }
        }
    }
}

fn open_output<F: FileSystem>(
    fs: &mut F,
    path: &str,
    append_from: Option<u64>,
) -> Result<F::Writer, F::Error> {
    storage::ensure_parent(fs, path)?;
    match append_from {
        Some(base) => {
            if fs.len(path)?.is_some_and(|len| len > base) {
                fs.truncate(path, base)?;
            }
            fs.append(path)
        }
        None => fs.create(path),
    }
}

impl<T: Transport, S: Write, F: FileSystem> Pipeline<T, S, F> {
    /// Runs attempt number `number` of `request`.
    pub(crate) fn attempt(
        &mut self,
        request: &Request,
        plan: &Plan,
        number: u32,
    ) -> Result<Completed, Failed> {
        debug!("{} {} attempt {}", request.method(), request.url(), number);

        let file = match request.output_file() {
            Some(path) => Some(open_output(&mut self.fs, path, plan.append_from).map_err(|e| {
                warn!("cannot open {} for writing: {:?}", path, e);
                Failed::early(Error::SinkWrite)
            })?),
            None => None,
        };
        let upload = match (request.upload_buffer(), request.upload_file()) {
            (Some(data), _) => Some(UploadSource::Memory { data, pos: 0 }),
            (None, Some(path)) => Some(UploadSource::File(self.fs.open(path).map_err(|e| {
                warn!("cannot open upload file {}: {:?}", path, e);
                Failed::early(Error::UploadRead)
            })?)),
            (None, None) => None,
        };

        let exchange = Exchange {
            method: request.method(),
            url: request.url(),
            headers: &plan.headers,
            upload_len: plan.upload_len,
            timeouts: plan.timeouts,
            user_agent: USER_AGENT,
            max_redirects: self.config.max_redirects,
            verbose: request.verbose(),
            trust: if request.is_https() {
                self.trust.as_deref()
            } else {
                None
            },
        };
        let mut cx = TransferContext {
            request,
            shared: self.ctx.as_ref(),
            framer: Framer::new(&mut self.port, self.config.chunk_size),
            file,
            upload,
            upload_total: plan.upload_len,
            jar: CookieJar::new(),
            crc: crc32fast::Hasher::new(),
            delivered: 0,
            status: None,
            failure: None,
            cancelled: false,
        };
        let outcome = self.transport.perform(&exchange, &mut cx);
        let (result, jar) = cx.finish(outcome);

        if let Some(path) = request.cookie_save() {
            if !jar.is_empty() {
                if let Err(e) = cookies::save(&mut self.fs, path, &jar) {
                    warn!("cannot save cookies to {}: {:?}", path, e);
                }
            }
        }
        result
    }
}

