#![allow(dead_code)]

use bncurl::network::Write;
use bncurl::network::error::Error as NetError;
use bncurl::network::http::Method;
use bncurl::network::transport::{
    DebugKind, Exchange, Flow, Handler, Progress, Timeouts, Transport,
};
use bncurl::storage::{FileSystem, ReadFile, WriteFile};
use bncurl::transfer::{Config, Context, Pipeline};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// -------------------------
// Scripted HTTP transport
// -------------------------

/// One canned response.
#[derive(Debug, Clone)]
pub struct Script {
    pub status: u16,
    pub headers: Vec<String>,
    pub body: Vec<u8>,
    /// Body bytes handed to the handler per call.
    pub piece: usize,
    /// Fail before any response arrives.
    pub error: Option<NetError>,
    /// Fail once this many body bytes were delivered.
    pub fail_after: Option<(usize, NetError)>,
    pub delay: Duration,
    /// Answer with a 302 to the same URL first.
    pub redirect: bool,
}

impl Script {
    pub fn ok(body: &[u8]) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: &[u8]) -> Self {
        Self {
            status,
            headers: vec![format!("Content-Length: {}", body.len())],
            body: body.to_vec(),
            piece: 700,
            error: None,
            fail_after: None,
            delay: Duration::ZERO,
            redirect: false,
        }
    }

    pub fn error(err: NetError) -> Self {
        Self {
            error: Some(err),
            ..Self::ok(b"")
        }
    }

    pub fn without_length(mut self) -> Self {
        self.headers.retain(|h| !h.starts_with("Content-Length"));
        self
    }

    pub fn header(mut self, line: &str) -> Self {
        self.headers.push(line.to_string());
        self
    }

    pub fn fail_after(mut self, bytes: usize, err: NetError) -> Self {
        self.fail_after = Some((bytes, err));
        self
    }

    pub fn piece(mut self, piece: usize) -> Self {
        self.piece = piece;
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn redirected(mut self) -> Self {
        self.redirect = true;
        self
    }
}

/// What the transport was asked to do.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub url: String,
    pub headers: Vec<String>,
    pub upload_len: Option<u64>,
    pub uploaded: Vec<u8>,
    pub timeouts: Timeouts,
    pub user_agent: String,
}

type Responder = Box<dyn FnMut(&Exchange<'_>, usize) -> Script + Send>;

pub struct MockTransport {
    responder: Responder,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl MockTransport {
    /// `responder` gets the exchange and the 1-based call number.
    pub fn new(responder: impl FnMut(&Exchange<'_>, usize) -> Script + Send + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Arc::default(),
        }
    }

    pub fn always(script: Script) -> Self {
        Self::new(move |_, _| script.clone())
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }
}

fn header(handler: &mut dyn Handler, line: &str) -> Result<(), NetError> {
    if handler.header(format!("{line}\r\n").as_bytes()) {
        Ok(())
    } else {
        Err(NetError::WriteAborted)
    }
}

impl Transport for MockTransport {
    fn perform(&mut self, exchange: &Exchange<'_>, handler: &mut dyn Handler) -> Result<u16, NetError> {
        let number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                method: exchange.method,
                url: exchange.url.to_string(),
                headers: exchange.headers.to_vec(),
                upload_len: exchange.upload_len,
                uploaded: Vec::new(),
                timeouts: exchange.timeouts,
                user_agent: exchange.user_agent.to_string(),
            });
            calls.len()
        };
        let script = (self.responder)(exchange, number);
        if let Some(err) = script.error {
            return Err(err);
        }

        if exchange.verbose {
            handler.debug(DebugKind::Text, b"Connected to example.com\n");
            handler.debug(DebugKind::HeaderOut, b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
            handler.debug(DebugKind::SslDataIn, b"\x16\x03\x01secret");
        }

        let mut progress = Progress::default();
        if exchange.method == Method::Post {
            let mut uploaded = Vec::new();
            let mut buf = [0u8; 5];
            loop {
                match handler.upload(&mut buf) {
                    Some(0) => break,
                    Some(n) => uploaded.extend_from_slice(&buf[..n]),
                    None => return Err(NetError::ReadAborted),
                }
                progress.upload_total = exchange.upload_len.unwrap_or(0);
                progress.upload_now = uploaded.len() as u64;
                if handler.progress(progress) == Flow::Abort {
                    return Err(NetError::Aborted);
                }
            }
            self.calls.lock().unwrap()[number - 1].uploaded = uploaded;
        }

        if script.redirect {
            header(handler, "HTTP/1.1 302 Found")?;
            header(handler, "Location: /moved")?;
            header(handler, "Content-Length: 5")?;
            header(handler, "")?;
            if handler.body(b"moved") != 5 {
                return Err(NetError::WriteAborted);
            }
        }

        header(handler, &format!("HTTP/1.1 {} Whatever", script.status))?;
        for line in &script.headers {
            header(handler, line)?;
        }
        header(handler, "")?;

        progress.download_total = script
            .headers
            .iter()
            .find_map(|h| h.strip_prefix("Content-Length: "))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        if handler.progress(progress) == Flow::Abort {
            return Err(NetError::Aborted);
        }
        if exchange.method == Method::Head {
            return Ok(script.status);
        }

        let mut sent = 0;
        for piece in script.body.chunks(script.piece.max(1)) {
            if let Some((limit, err)) = script.fail_after {
                if sent >= limit {
                    return Err(err);
                }
            }
            if handler.body(piece) != piece.len() {
                return Err(NetError::WriteAborted);
            }
            sent += piece.len();
            progress.download_now = sent as u64;
            if handler.progress(progress) == Flow::Abort {
                return Err(NetError::Aborted);
            }
            if !script.delay.is_zero() {
                std::thread::sleep(script.delay);
            }
        }
        if let Some((limit, err)) = script.fail_after {
            if sent >= limit {
                return Err(err);
            }
        }
        Ok(script.status)
    }
}

// -------------------------
// Serial link capture
// -------------------------

#[derive(Debug, Clone, Default)]
pub struct SharedPort {
    bytes: Arc<Mutex<Vec<u8>>>,
    /// Writes starting with this prefix are refused.
    refused: Arc<Mutex<Option<Vec<u8>>>>,
}

impl SharedPort {
    pub fn refuse(&self, prefix: &[u8]) {
        *self.refused.lock().unwrap() = Some(prefix.to_vec());
    }

    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedPort {
    type Error = ();

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if let Some(prefix) = self.refused.lock().unwrap().as_deref() {
            if buf.starts_with(prefix) {
                return Err(());
            }
        }
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// -------------------------
// In-memory filesystem
// -------------------------

type Files = Arc<Mutex<HashMap<String, Vec<u8>>>>;

#[derive(Debug, Clone, Default)]
pub struct MemFs {
    files: Files,
    full: Arc<AtomicBool>,
}

impl MemFs {
    /// Makes every later file write fail, as on a full card.
    pub fn fill_up(&self) {
        self.full.store(true, Ordering::SeqCst);
    }

    pub fn put(&self, path: &str, bytes: &[u8]) {
        self.files.lock().unwrap().insert(path.to_string(), bytes.to_vec());
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

#[derive(Debug)]
pub struct MemReader {
    data: Vec<u8>,
    pos: usize,
}

impl ReadFile for MemReader {
    type Error = &'static str;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[derive(Debug)]
pub struct MemWriter {
    files: Files,
    full: Arc<AtomicBool>,
    path: String,
}

impl WriteFile for MemWriter {
    type Error = &'static str;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.full.load(Ordering::SeqCst) {
            return Err("no space left");
        }
        let mut files = self.files.lock().unwrap();
        files.entry(self.path.clone()).or_default().extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl FileSystem for MemFs {
    type Error = &'static str;
    type Reader = MemReader;
    type Writer = MemWriter;

    fn create_dir_all(&mut self, _path: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    fn open(&mut self, path: &str) -> Result<Self::Reader, Self::Error> {
        let data = self.get(path).ok_or("not found")?;
        Ok(MemReader { data, pos: 0 })
    }

    fn create(&mut self, path: &str) -> Result<Self::Writer, Self::Error> {
        self.put(path, b"");
        Ok(MemWriter {
            files: Arc::clone(&self.files),
            full: Arc::clone(&self.full),
            path: path.to_string(),
        })
    }

    fn append(&mut self, path: &str) -> Result<Self::Writer, Self::Error> {
        self.files.lock().unwrap().entry(path.to_string()).or_default();
        Ok(MemWriter {
            files: Arc::clone(&self.files),
            full: Arc::clone(&self.full),
            path: path.to_string(),
        })
    }

    fn len(&mut self, path: &str) -> Result<Option<u64>, Self::Error> {
        Ok(self.get(path).map(|data| data.len() as u64))
    }

    fn truncate(&mut self, path: &str, len: u64) -> Result<(), Self::Error> {
        let mut files = self.files.lock().unwrap();
        let data = files.get_mut(path).ok_or("not found")?;
        data.truncate(len as usize);
        Ok(())
    }
}

// -------------------------
// Helpers
// -------------------------

pub type TestPipeline = Pipeline<MockTransport, SharedPort, MemFs>;

/// Fast retries, no HEAD probe.
pub fn config() -> Config {
    Config {
        backoff_ms: 1,
        probe_length: false,
        ..Config::default()
    }
}

pub struct Rig {
    pub pipeline: TestPipeline,
    pub port: SharedPort,
    pub fs: MemFs,
    pub calls: Arc<Mutex<Vec<Call>>>,
    pub ctx: Arc<Context>,
}

pub fn rig_with(config: Config, transport: MockTransport) -> Rig {
    let _ = env_logger::builder().is_test(true).try_init();
    let port = SharedPort::default();
    let fs = MemFs::default();
    let calls = transport.calls();
    let ctx = Arc::new(Context::new());
    let pipeline = Pipeline::new(config, Arc::clone(&ctx), transport, port.clone(), fs.clone()).unwrap();
    Rig {
        pipeline,
        port,
        fs,
        calls,
        ctx,
    }
}

pub fn rig(transport: MockTransport) -> Rig {
    rig_with(config(), transport)
}

/// Deterministic body of `len` bytes.
pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Expected serial bytes for a framed body.
pub fn framed(body: &[u8], chunk: usize) -> Vec<u8> {
    let mut out = format!("+LEN:{},\r\n", body.len()).into_bytes();
    for piece in body.chunks(chunk) {
        out.extend_from_slice(format!("+POST:{},", piece.len()).as_bytes());
        out.extend_from_slice(piece);
    }
    out
}

/// Polls `cond` for up to five seconds.
pub fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}
