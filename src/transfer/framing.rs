//! # Serial framing protocol
//!
//! The serial link cannot tell where a body ends, so every body is framed:
//!
//! ```text
//! +LEN:5000,\r\n                      announced once, before any body byte
//! +POST:1024,<1024 raw bytes>          \
//! +POST:1024,<1024 raw bytes>           |  chunks summing to the announced
//! +POST:1024,<1024 raw bytes>           |  length
//! +POST:1024,<1024 raw bytes>           |
//! +POST:904,<904 raw bytes>            /
//! SEND OK\r\n                          or SEND FAIL\r\n
//! ```
//!
//! The length must be known before the first chunk. When the server never
//! declares one, [`Framer::body`] refuses the bytes with
//! [`FrameError::LengthUnknown`] and nothing is written. Once `+LEN` is out,
//! the transfer must end in `SEND OK` or `SEND FAIL`; see [`Framer::fail`].
//!
//! HEAD responses use a different shape:
//!
//! ```text
//! +HEADERS:\r\n
//! +HDR:Content-Type: text/html\r\n
//! +HDR:Content-Length: 1256\r\n
//! SEND OK\r\n
//! ```

use super::config::MAX_CHUNK_SIZE;
use crate::network::Write;
use crate::network::http::trim_line;
use core::fmt::Write as _;
use log::debug;

/// Why the framer refused to continue.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FrameError {
    /// The serial link rejected a write.
    Port,
    /// Body bytes arrived before a length was declared.
    LengthUnknown,
    /// More bytes arrived than were announced.
    Overrun { announced: u64 },
    /// The body ended before the announced length was reached.
    Short { announced: u64, streamed: u64 },
}

#[cfg(feature = "defmt")]
impl defmt::Format for FrameError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            FrameError::Port => defmt::write!(f, "Port"),
            FrameError::LengthUnknown => defmt::write!(f, "LengthUnknown"),
            FrameError::Overrun { announced } => defmt::write!(f, "Overrun({})", announced),
            FrameError::Short {
                announced,
                streamed,
            } => defmt::write!(f, "Short({}/{})", streamed, announced),
        }
    }
}

/// Writes the framing protocol for one attempt onto a serial stream.
#[derive(Debug)]
pub struct Framer<S> {
    port: S,
    chunk: heapless::Vec<u8, MAX_CHUNK_SIZE>,
    chunk_size: usize,
    declared: Option<u64>,
    announced: Option<u64>,
    streamed: u64,
    headers_open: bool,
    terminated: bool,
}

impl<S: Write> Framer<S> {
    /// `chunk_size` is clamped to `1..=MAX_CHUNK_SIZE`.
    pub fn new(port: S, chunk_size: usize) -> Self {
        Self {
            port,
            chunk: heapless::Vec::new(),
            chunk_size: chunk_size.clamp(1, MAX_CHUNK_SIZE),
            declared: None,
            announced: None,
            streamed: 0,
            headers_open: false,
            terminated: false,
        }
    }

    /// Records the length the server declared. `None` forgets a previous
    /// declaration, as happens when a redirect starts a new response. Ignored
    /// once the length has been announced.
    pub fn declare(&mut self, length: Option<u64>) {
        if self.announced.is_none() {
            self.declared = length;
        }
    }

    pub fn declared(&self) -> Option<u64> {
        self.declared
    }

    pub fn announced(&self) -> Option<u64> {
        self.announced
    }

    /// Body bytes accepted so far, buffered ones included.
    pub fn streamed(&self) -> u64 {
        self.streamed
    }

    /// `true` once `SEND OK` or `SEND FAIL` has been written.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn port_mut(&mut self) -> &mut S {
        &mut self.port
    }

    pub fn into_inner(self) -> S {
        self.port
    }

    fn announce(&mut self, length: u64) -> Result<(), FrameError> {
        let mut line: heapless::String<32> = heapless::String::new();
        write!(line, "+LEN:{length},\r\n").map_err(|_| FrameError::Port)?;
        self.write(line.as_bytes())?;
        self.announced = Some(length);
        Ok(())
    }

    /// Accepts body bytes, announcing the length first if needed and emitting
    /// every chunk that fills up.
    pub fn body(&mut self, data: &[u8]) -> Result<(), FrameError> {
        let announced = match self.announced {
            Some(length) => length,
            None => {
                let length = self.declared.ok_or(FrameError::LengthUnknown)?;
                self.announce(length)?;
                length
            }
        };
        if self.streamed + data.len() as u64 > announced {
            return Err(FrameError::Overrun { announced });
        }

        let mut rest = data;
        while !rest.is_empty() {
            let room = self.chunk_size - self.chunk.len();
            let (head, tail) = rest.split_at(room.min(rest.len()));
            self.chunk
                .extend_from_slice(head)
                .map_err(|_| FrameError::Overrun { announced })?;
            self.streamed += head.len() as u64;
            rest = tail;
            if self.chunk.len() == self.chunk_size {
                self.emit_chunk()?;
            }
        }
        Ok(())
    }

    fn emit_chunk(&mut self) -> Result<(), FrameError> {
        if self.chunk.is_empty() {
            return Ok(());
        }
        let mut prefix: heapless::String<16> = heapless::String::new();
        write!(prefix, "+POST:{},", self.chunk.len()).map_err(|_| FrameError::Port)?;
        self.write(prefix.as_bytes())?;
        let chunk = core::mem::take(&mut self.chunk);
        self.write(&chunk)?;
        // let the rest of the system at the link between chunks
        std::thread::yield_now();
        Ok(())
    }

    /// Flushes the last partial chunk and checks the total. A body-less
    /// response with no declared length is announced as `+LEN:0,`.
    pub fn finish(&mut self) -> Result<u64, FrameError> {
        self.emit_chunk()?;
        let announced = match self.announced {
            Some(length) => length,
            None => match self.declared {
                None | Some(0) => {
                    self.announce(0)?;
                    0
                }
                Some(length) => {
                    return Err(FrameError::Short {
                        announced: length,
                        streamed: 0,
                    });
                }
            },
        };
        if self.streamed != announced {
            return Err(FrameError::Short {
                announced,
                streamed: self.streamed,
            });
        }
        Ok(announced)
    }

    /// Forwards one response header line in HEAD mode.
    pub fn header(&mut self, line: &[u8]) -> Result<(), FrameError> {
        self.open_headers()?;
        self.line("+HDR:", trim_line(line))
    }

    /// Writes `+HEADERS:` unless it is already out.
    pub fn open_headers(&mut self) -> Result<(), FrameError> {
        if !self.headers_open {
            self.write(b"+HEADERS:\r\n")?;
            self.headers_open = true;
        }
        Ok(())
    }

    /// Writes one `<prefix><payload>\r\n` status line.
    pub fn line(&mut self, prefix: &str, payload: &[u8]) -> Result<(), FrameError> {
        self.write(prefix.as_bytes())?;
        self.write(payload)?;
        self.write(b"\r\n")
    }

    /// Reports the byte total of a file sink.
    pub fn saved(&mut self, bytes: u64) -> Result<(), FrameError> {
        let mut line: heapless::String<32> = heapless::String::new();
        write!(line, "+SAVED:{bytes}\r\n").map_err(|_| FrameError::Port)?;
        self.write(line.as_bytes())
    }

    /// Ends the transfer with `SEND OK`.
    pub fn succeed(&mut self) -> Result<(), FrameError> {
        self.terminated = true;
        self.write(b"SEND OK\r\n")?;
        self.flush()
    }

    /// Ends a transfer that announced a length, or opened a header block,
    /// with `SEND FAIL`. Returns whether the marker was written.
    pub fn fail(&mut self) -> Result<bool, FrameError> {
        if self.terminated || (self.announced.is_none() && !self.headers_open) {
            return Ok(false);
        }
        self.terminated = true;
        self.write(b"SEND FAIL\r\n")?;
        self.flush()?;
        Ok(true)
    }

    fn write(&mut self, mut buf: &[u8]) -> Result<(), FrameError> {
        while !buf.is_empty() {
            match self.port.write(buf) {
                Ok(0) => {
                    debug!("serial link accepted no bytes");
                    return Err(FrameError::Port);
                }
                Ok(n) => buf = &buf[n..],
                Err(e) => {
                    debug!("serial write failed: {:?}", e);
                    return Err(FrameError::Port);
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), FrameError> {
        self.port.flush().map_err(|e| {
            debug!("serial flush failed: {:?}", e);
            FrameError::Port
        })
    }
}

/// Writes a bare `SEND FAIL` for a request that failed before its last
/// attempt wrote a terminal marker.
pub fn send_fail<S: Write>(port: &mut S) -> Result<(), FrameError> {
    let mut framer = Framer::new(port, 1);
    framer.write(b"SEND FAIL\r\n")?;
    framer.flush()
}
