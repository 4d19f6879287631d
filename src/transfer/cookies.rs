//! # Cookie jar
//!
//! Cookies set by the server are captured from `Set-Cookie` headers, echoed
//! on the serial link as `+COOKIE:` lines and, when the request names a save
//! path, written out in the Netscape format that curl and wget understand:
//!
//! ```text
//! # Netscape HTTP Cookie File
//! # This is a generated file! Do not edit.
//!
//! example.com	TRUE	/	FALSE	0	session	abc123
//! #HttpOnly_example.com	TRUE	/	TRUE	0	token	xyz
//! ```
//!
//! A jar loaded from such a file becomes the request's `Cookie:` header.

use crate::storage::{self, FileError, FileSystem, ReadToEndError};
use core::fmt::{self, Write as _};

/// Most cookies kept per jar.
pub const MAX_COOKIES: usize = 16;
/// Largest cookie file that will be loaded.
pub const MAX_COOKIE_FILE: usize = 16 * 1024;

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File\n# This is a generated file! Do not edit.\n\n";
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: heapless::String<64>,
    pub value: heapless::String<256>,
    pub domain: heapless::String<128>,
    pub path: heapless::String<128>,
    pub secure: bool,
    pub http_only: bool,
    /// Unix expiry time, 0 for a session cookie.
    pub expires: u64,
}

impl Cookie {
    /// Parses the value of a `Set-Cookie` header. `default_domain` is used
    /// when the cookie carries no `Domain` attribute.
    pub fn parse(set_cookie: &str, default_domain: &str) -> Option<Self> {
        let mut parts = set_cookie.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = Cookie {
            name: heapless::String::try_from(name).ok()?,
            value: heapless::String::try_from(value.trim()).ok()?,
            domain: heapless::String::try_from(default_domain).ok()?,
            path: heapless::String::try_from("/").ok()?,
            secure: false,
            http_only: false,
            expires: 0,
        };
        for attr in parts {
            let (key, val) = match attr.split_once('=') {
                Some((key, val)) => (key.trim(), val.trim()),
                None => (attr.trim(), ""),
            };
            if key.eq_ignore_ascii_case("Domain") && !val.is_empty() {
                let val = val.trim_start_matches('.');
                cookie.domain = heapless::String::try_from(val).ok()?;
            } else if key.eq_ignore_ascii_case("Path") && !val.is_empty() {
                cookie.path = heapless::String::try_from(val).ok()?;
            } else if key.eq_ignore_ascii_case("Secure") {
                cookie.secure = true;
            } else if key.eq_ignore_ascii_case("HttpOnly") {
                cookie.http_only = true;
            }
        }
        Some(cookie)
    }

    fn same_slot(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

/// `name=value[; Domain=d][; Path=p][; Secure][; HttpOnly]`, the payload of a
/// `+COOKIE:` line.
impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if !self.domain.is_empty() {
            write!(f, "; Domain={}", self.domain)?;
        }
        if !self.path.is_empty() {
            write!(f, "; Path={}", self.path)?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: heapless::Vec<Cookie, MAX_COOKIES>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    /// Stores a cookie, replacing one with the same name, domain and path.
    /// Returns `false` when the jar is full.
    pub fn insert(&mut self, cookie: Cookie) -> bool {
        if let Some(slot) = self.cookies.iter_mut().find(|c| c.same_slot(&cookie)) {
            *slot = cookie;
            return true;
        }
        self.cookies.push(cookie).is_ok()
    }

    /// Value for a `Cookie:` request header, `None` for an empty jar.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        Some(pairs.join("; "))
    }

    pub fn to_netscape(&self) -> String {
        let mut out = String::from(NETSCAPE_HEADER);
        for c in &self.cookies {
            let prefix = if c.http_only { HTTP_ONLY_PREFIX } else { "" };
            let domain = if c.domain.is_empty() { "localhost" } else { c.domain.as_str() };
            let path = if c.path.is_empty() { "/" } else { c.path.as_str() };
            let secure = if c.secure { "TRUE" } else { "FALSE" };
            // writing into a String cannot fail
            let _ = writeln!(
                out,
                "{prefix}{domain}\tTRUE\t{path}\t{secure}\t{}\t{}\t{}",
                c.expires, c.name, c.value
            );
        }
        out
    }

    /// Parses a Netscape cookie file, skipping comments and malformed lines.
    pub fn from_netscape(text: &str) -> Self {
        let mut jar = CookieJar::new();
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
                Some(rest) => (rest, true),
                None if line.starts_with('#') || line.trim().is_empty() => continue,
                None => (line, false),
            };
            if let Some(cookie) = parse_netscape_line(line, http_only) {
                jar.insert(cookie);
            }
        }
        jar
    }
}

fn parse_netscape_line(line: &str, http_only: bool) -> Option<Cookie> {
    let fields: Vec<&str> = line.split('\t').collect();
    let &[domain, _subdomains, path, secure, expires, name, value] = fields.as_slice() else {
        return None;
    };
    Some(Cookie {
        name: heapless::String::try_from(name).ok()?,
        value: heapless::String::try_from(value).ok()?,
        domain: heapless::String::try_from(domain).ok()?,
        path: heapless::String::try_from(path).ok()?,
        secure: secure.eq_ignore_ascii_case("TRUE"),
        http_only,
        expires: expires.parse().unwrap_or(0),
    })
}

/// Loads a cookie file written by [`save`] (or by curl).
pub fn load<F: FileSystem>(
    fs: &mut F,
    path: &str,
) -> Result<CookieJar, ReadToEndError<FileError<F>>> {
    let bytes = storage::read_to_end(fs, path, MAX_COOKIE_FILE)?;
    Ok(CookieJar::from_netscape(&String::from_utf8_lossy(&bytes)))
}

/// Writes `jar` to `path` in Netscape format.
pub fn save<F: FileSystem>(fs: &mut F, path: &str, jar: &CookieJar) -> Result<(), FileError<F>> {
    storage::write_file(fs, path, jar.to_netscape().as_bytes())
}
