use core::fmt;

/// HTTP methods supported by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Method {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str())
    }
}

/// Strips the trailing `\r\n` (or a lone `\n`) from a raw header line.
pub fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// `true` for an `HTTP/x.y NNN ...` status line, which starts a new
/// response (the first one, or the next one after a redirect).
pub fn is_status_line(line: &[u8]) -> bool {
    line.len() >= 5 && line[..5].eq_ignore_ascii_case(b"HTTP/")
}

/// Parses the status code out of a status line.
pub fn status_code(line: &str) -> Option<u16> {
    let mut parts = line.splitn(3, ' ');
    parts.next()?; // Skip HTTP version
    parts.next()?.trim().parse::<u16>().ok()
}

/// Splits a `Name: value` header line, trimming both halves.
pub fn split_header(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.splitn(2, ':');
    let name = parts.next()?.trim();
    let value = parts.next()?.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value))
}

/// Returns the value of a raw header line if its name matches `wanted`
/// (case-insensitive).
pub fn header_value<'a>(line: &'a [u8], wanted: &str) -> Option<&'a str> {
    let line = core::str::from_utf8(trim_line(line)).ok()?;
    let (name, value) = split_header(line)?;
    name.eq_ignore_ascii_case(wanted).then_some(value)
}

/// Extracts a declared `Content-Length` from a raw header line.
pub fn content_length(line: &[u8]) -> Option<u64> {
    header_value(line, "Content-Length")?.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_is_case_insensitive() {
        assert_eq!(content_length(b"content-length: 5000\r\n"), Some(5000));
        assert_eq!(content_length(b"Content-Length:42"), Some(42));
        assert_eq!(content_length(b"Content-Type: text/plain\r\n"), None);
        assert_eq!(content_length(b"Content-Length: lots\r\n"), None);
    }

    #[test]
    fn status_lines() {
        assert!(is_status_line(b"HTTP/1.1 302 Found\r\n"));
        assert!(is_status_line(b"http/2 200\r\n"));
        assert!(!is_status_line(b"Location: /next\r\n"));
        assert_eq!(status_code("HTTP/1.1 404 Not Found"), Some(404));
        assert_eq!(status_code("HTTP/2 204"), Some(204));
        assert_eq!(status_code("garbage"), None);
    }

    #[test]
    fn header_splitting() {
        assert_eq!(
            split_header("Authorization: Bearer a:b"),
            Some(("Authorization", "Bearer a:b"))
        );
        assert_eq!(split_header(": value"), None);
        assert_eq!(split_header("NoColon"), None);
        assert_eq!(trim_line(b"X: y\r\n"), b"X: y");
    }
}
