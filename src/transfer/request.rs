//! # Request descriptor
//!
//! A [`Request`] is an immutable description of one HTTP operation. It can
//! only be obtained from [`RequestBuilder::build`], which enforces every
//! structural rule up front so that nothing downstream has to re-check:
//!
//! - the URL is `http://` or `https://` with a host, at most [`MAX_URL_LEN`] bytes;
//! - POST carries an [`Upload`], GET and HEAD do not;
//! - a [`ByteRange`] needs GET and a file [`Sink`], and its end stays below `u64::MAX`;
//! - at most [`MAX_HEADERS`] custom headers, each a single `Name: value` line;
//! - file paths are absolute and at most [`MAX_PATH_LEN`] bytes;
//! - the server-response timeout lies in `1..=120` seconds.
//!
//! # Example
//!
//! ```rust
//! use bncurl::transfer::{Request, Sink, Upload};
//!
//! let req = Request::post("https://httpbin.org/post", Upload::Buffer(b"hello!!!".to_vec()))
//!     .header("Content-Type: application/octet-stream")
//!     .build()
//!     .unwrap();
//! assert_eq!(req.upload_len(), Some(8));
//!
//! let req = Request::get("http://example.com/big.bin")
//!     .sink(Sink::File("/sdcard/Download/big.bin".into()))
//!     .range("0-2097151".parse().unwrap())
//!     .build()
//!     .unwrap();
//! assert!(req.range().is_some());
//! ```

use super::error::ValidationError;
use crate::network::http::{Method, split_header};
use core::fmt;
use core::str::FromStr;
use core::time::Duration;

/// Longest accepted URL.
pub const MAX_URL_LEN: usize = 256;
/// Longest accepted file path.
pub const MAX_PATH_LEN: usize = 128;
/// Most custom headers per request.
pub const MAX_HEADERS: usize = 10;
/// Longest accepted header line.
pub const MAX_HEADER_LEN: usize = 256;
/// Largest in-memory upload.
pub const MAX_UPLOAD_LEN: usize = 512 * 1024;
/// Accepted server-response timeouts, in seconds.
pub const TIMEOUT_RANGE_SECS: core::ops::RangeInclusive<u64> = 1..=120;

pub type Url = heapless::String<MAX_URL_LEN>;
pub type FilePath = heapless::String<MAX_PATH_LEN>;
pub type HeaderLine = heapless::String<MAX_HEADER_LEN>;

/// Where the request body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upload {
    /// Bytes already received from the host, owned by the request.
    Buffer(std::vec::Vec<u8>),
    /// A file on the mounted filesystem.
    File(std::string::String),
}

/// Where the response body goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Sink {
    /// Framed onto the serial link.
    #[default]
    Serial,
    /// Written to a file; only a byte total is reported on the serial link.
    File(std::string::String),
}

/// An inclusive byte range, `start-end` or open-ended `start-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Number of bytes covered, `None` when open-ended or not representable.
    pub fn len(&self) -> Option<u64> {
        self.end
            .and_then(|end| end.checked_sub(self.start)?.checked_add(1))
    }

    fn is_valid(&self) -> bool {
        self.end
            .is_none_or(|end| end >= self.start && end < u64::MAX)
    }
}

impl FromStr for ByteRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s.split_once('-').ok_or(ValidationError::InvalidRange)?;
        let start = start
            .trim()
            .parse::<u64>()
            .map_err(|_| ValidationError::InvalidRange)?;
        let end = match end.trim() {
            "" => None,
            end => Some(end.parse::<u64>().map_err(|_| ValidationError::InvalidRange)?),
        };
        let range = ByteRange { start, end };
        if !range.is_valid() {
            return Err(ValidationError::InvalidRange);
        }
        Ok(range)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}-", self.start),
        }
    }
}

/// One validated HTTP operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    url: Url,
    upload: Option<Upload>,
    sink: Sink,
    sink_path: Option<FilePath>,
    upload_path: Option<FilePath>,
    headers: heapless::Vec<HeaderLine, MAX_HEADERS>,
    cookie_save: Option<FilePath>,
    cookie_load: Option<FilePath>,
    range: Option<ByteRange>,
    timeout: Option<Duration>,
    verbose: bool,
}

impl Request {
    pub fn get(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::Get, url)
    }

    pub fn head(url: &str) -> RequestBuilder {
        RequestBuilder::new(Method::Head, url)
    }

    pub fn post(url: &str, upload: Upload) -> RequestBuilder {
        RequestBuilder::new(Method::Post, url).upload(upload)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Host part of the URL, without user info or port.
    pub fn host(&self) -> &str {
        let rest = self.url.split_once("://").map_or("", |(_, rest)| rest);
        let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
        let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
        if host.starts_with('[') {
            return host.split_once(']').map_or(host, |(h, _)| &h[1..]);
        }
        host.split_once(':').map_or(host, |(h, _)| h)
    }

    /// `true` for `https://` targets.
    pub fn is_https(&self) -> bool {
        self.url
            .get(..8)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
    }

    /// In-memory upload bytes, if any.
    pub fn upload_buffer(&self) -> Option<&[u8]> {
        match &self.upload {
            Some(Upload::Buffer(data)) => Some(data),
            _ => None,
        }
    }

    /// Upload file path, if any.
    pub fn upload_file(&self) -> Option<&str> {
        self.upload_path.as_deref()
    }

    /// Size of an in-memory upload. File uploads are sized when executed.
    pub fn upload_len(&self) -> Option<u64> {
        self.upload_buffer().map(|data| data.len() as u64)
    }

    /// Output file path, `None` for the serial sink.
    pub fn output_file(&self) -> Option<&str> {
        self.sink_path.as_deref()
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(|h| h.as_str())
    }

    pub fn cookie_save(&self) -> Option<&str> {
        self.cookie_save.as_deref()
    }

    pub fn cookie_load(&self) -> Option<&str> {
        self.cookie_load.as_deref()
    }

    pub fn range(&self) -> Option<ByteRange> {
        self.range
    }

    /// Server-response timeout given by the caller.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

/// Collects the parts of a [`Request`] and validates them in
/// [`build`](RequestBuilder::build).
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    url: std::string::String,
    upload: Option<Upload>,
    sink: Sink,
    headers: std::vec::Vec<std::string::String>,
    cookie_save: Option<std::string::String>,
    cookie_load: Option<std::string::String>,
    range: Option<ByteRange>,
    timeout_secs: Option<u64>,
    verbose: bool,
}

impl RequestBuilder {
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: url.into(),
            upload: None,
            sink: Sink::Serial,
            headers: std::vec::Vec::new(),
            cookie_save: None,
            cookie_load: None,
            range: None,
            timeout_secs: None,
            verbose: false,
        }
    }

    pub fn upload(mut self, upload: Upload) -> Self {
        self.upload = Some(upload);
        self
    }

    pub fn sink(mut self, sink: Sink) -> Self {
        self.sink = sink;
        self
    }

    /// Appends a `Name: value` header line.
    pub fn header(mut self, line: &str) -> Self {
        self.headers.push(line.into());
        self
    }

    pub fn cookie_save(mut self, path: &str) -> Self {
        self.cookie_save = Some(path.into());
        self
    }

    pub fn cookie_load(mut self, path: &str) -> Self {
        self.cookie_load = Some(path.into());
        self
    }

    pub fn range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Server-response timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn build(self) -> Result<Request, ValidationError> {
        let url = validate_url(&self.url)?;

        match (self.method, &self.upload) {
            (Method::Post, None) => return Err(ValidationError::MissingUpload),
            (Method::Get | Method::Head, Some(_)) => {
                return Err(ValidationError::UnexpectedUpload);
            }
            _ => {}
        }
        let upload_path = match &self.upload {
            Some(Upload::Buffer(data)) if data.len() > MAX_UPLOAD_LEN => {
                return Err(ValidationError::UploadTooLarge);
            }
            Some(Upload::File(path)) => Some(validate_path(path)?),
            _ => None,
        };

        let sink_path = match &self.sink {
            Sink::File(path) => Some(validate_path(path)?),
            Sink::Serial => None,
        };

        if let Some(range) = &self.range {
            if self.method != Method::Get {
                return Err(ValidationError::RangeNotAllowed);
            }
            if sink_path.is_none() {
                return Err(ValidationError::RangeWithoutFile);
            }
            if !range.is_valid() {
                return Err(ValidationError::InvalidRange);
            }
        }

        if self.headers.len() > MAX_HEADERS {
            return Err(ValidationError::TooManyHeaders);
        }
        let mut headers = heapless::Vec::new();
        for line in &self.headers {
            let line = validate_header(line)?;
            headers
                .push(line)
                .map_err(|_| ValidationError::TooManyHeaders)?;
        }

        let timeout = match self.timeout_secs {
            Some(secs) if !TIMEOUT_RANGE_SECS.contains(&secs) => {
                return Err(ValidationError::InvalidTimeout);
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(Request {
            method: self.method,
            url,
            upload: self.upload,
            sink: self.sink,
            sink_path,
            upload_path,
            headers,
            cookie_save: self.cookie_save.as_deref().map(validate_path).transpose()?,
            cookie_load: self.cookie_load.as_deref().map(validate_path).transpose()?,
            range: self.range,
            timeout,
            verbose: self.verbose,
        })
    }
}

fn validate_url(url: &str) -> Result<Url, ValidationError> {
    let (scheme, rest) = url.split_once("://").ok_or(ValidationError::InvalidUrl)?;
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return Err(ValidationError::UnsupportedScheme);
    }
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    if host.is_empty() || url.chars().any(|c| c.is_ascii_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidUrl);
    }
    Url::try_from(url).map_err(|_| ValidationError::InvalidUrl)
}

fn validate_path(path: &str) -> Result<FilePath, ValidationError> {
    if !path.starts_with('/') || path.ends_with('/') || path.contains(['\r', '\n', '\0']) {
        return Err(ValidationError::InvalidPath);
    }
    FilePath::try_from(path).map_err(|_| ValidationError::InvalidPath)
}

fn validate_header(line: &str) -> Result<HeaderLine, ValidationError> {
    if line.contains(['\r', '\n']) || split_header(line).is_none() {
        return Err(ValidationError::InvalidHeader);
    }
    HeaderLine::try_from(line).map_err(|_| ValidationError::InvalidHeader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_and_upload_must_agree() {
        assert_eq!(
            RequestBuilder::new(Method::Post, "http://h/").build(),
            Err(ValidationError::MissingUpload)
        );
        assert_eq!(
            Request::get("http://h/")
                .upload(Upload::Buffer(vec![1]))
                .build(),
            Err(ValidationError::UnexpectedUpload)
        );
        assert_eq!(
            Request::head("http://h/")
                .upload(Upload::File("/a".into()))
                .build(),
            Err(ValidationError::UnexpectedUpload)
        );
        assert!(Request::post("http://h/", Upload::File("/sdcard/a.bin".into()))
            .build()
            .is_ok());
    }

    #[test]
    fn url_rules() {
        assert_eq!(
            Request::get("ftp://h/").build(),
            Err(ValidationError::UnsupportedScheme)
        );
        assert_eq!(Request::get("http:///x").build(), Err(ValidationError::InvalidUrl));
        assert_eq!(Request::get("example.com").build(), Err(ValidationError::InvalidUrl));
        let long = format!("http://h/{}", "a".repeat(MAX_URL_LEN));
        assert_eq!(Request::get(&long).build(), Err(ValidationError::InvalidUrl));

        let req = Request::get("HTTPS://Example.com/x?y=1").build().unwrap();
        assert!(req.is_https());
        assert_eq!(req.host(), "Example.com");
        let req = Request::get("http://user:pw@10.0.0.2:8080/a").build().unwrap();
        assert_eq!(req.host(), "10.0.0.2");
        assert!(!req.is_https());
        let req = Request::get("http://[::1]:8080/").build().unwrap();
        assert_eq!(req.host(), "::1");
    }

    #[test]
    fn range_needs_get_and_file_sink() {
        let range: ByteRange = "0-2097151".parse().unwrap();
        assert_eq!(range.len(), Some(2_097_152));

        assert_eq!(
            Request::get("http://h/").range(range).build(),
            Err(ValidationError::RangeWithoutFile)
        );
        assert_eq!(
            Request::head("http://h/")
                .sink(Sink::File("/a.bin".into()))
                .range(range)
                .build(),
            Err(ValidationError::RangeNotAllowed)
        );
        let req = Request::get("http://h/")
            .sink(Sink::File("/a.bin".into()))
            .range(range)
            .build()
            .unwrap();
        assert_eq!(req.output_file(), Some("/a.bin"));

        assert_eq!("10-2".parse::<ByteRange>(), Err(ValidationError::InvalidRange));
        assert_eq!(
            "100-".parse::<ByteRange>(),
            Ok(ByteRange {
                start: 100,
                end: None
            })
        );
        assert_eq!("x-1".parse::<ByteRange>(), Err(ValidationError::InvalidRange));
    }

    #[test]
    fn range_end_must_leave_room_for_its_length() {
        assert_eq!(
            "0-18446744073709551615".parse::<ByteRange>(),
            Err(ValidationError::InvalidRange)
        );
        let widest = ByteRange {
            start: 0,
            end: Some(u64::MAX),
        };
        assert_eq!(widest.len(), None);
        assert_eq!(
            Request::get("http://h/")
                .sink(Sink::File("/a.bin".into()))
                .range(widest)
                .build(),
            Err(ValidationError::InvalidRange)
        );

        let last: ByteRange = "18446744073709551613-18446744073709551614".parse().unwrap();
        assert_eq!(last.len(), Some(2));
    }

    #[test]
    fn header_limits_and_order() {
        let mut builder = Request::get("http://h/");
        for i in 0..MAX_HEADERS {
            builder = builder.header(&format!("X-N{i}: {i}"));
        }
        let req = builder.clone().build().unwrap();
        let names: std::vec::Vec<&str> = req.headers().collect();
        assert_eq!(names[0], "X-N0: 0");
        assert_eq!(names[MAX_HEADERS - 1], "X-N9: 9");

        assert_eq!(
            builder.header("X-Extra: 1").build(),
            Err(ValidationError::TooManyHeaders)
        );
        assert_eq!(
            Request::get("http://h/").header("NoColon").build(),
            Err(ValidationError::InvalidHeader)
        );
        assert_eq!(
            Request::get("http://h/")
                .header("X-A: 1\r\nX-B: 2")
                .build(),
            Err(ValidationError::InvalidHeader)
        );
    }

    #[test]
    fn paths_timeout_and_upload_size() {
        assert_eq!(
            Request::get("http://h/").sink(Sink::File("rel.bin".into())).build(),
            Err(ValidationError::InvalidPath)
        );
        assert_eq!(
            Request::get("http://h/").cookie_save("cookies.txt").build(),
            Err(ValidationError::InvalidPath)
        );
        assert_eq!(
            Request::get("http://h/").timeout_secs(0).build(),
            Err(ValidationError::InvalidTimeout)
        );
        assert_eq!(
            Request::get("http://h/").timeout_secs(121).build(),
            Err(ValidationError::InvalidTimeout)
        );
        assert_eq!(
            Request::get("http://h/").timeout_secs(45).build().unwrap().timeout(),
            Some(Duration::from_secs(45))
        );
        assert_eq!(
            Request::post("http://h/", Upload::Buffer(vec![0; MAX_UPLOAD_LEN + 1])).build(),
            Err(ValidationError::UploadTooLarge)
        );
    }
}
