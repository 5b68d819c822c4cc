//! Packet header framing.
//!
//! Every packet on the wire is a text header followed by a raw payload:
//!
//! ```text
//! HEADER
//! SEQ_NUM=<u64>
//! TIMESTAMP=<string>
//! PAYLOAD_SIZE=<u64>
//! END_HEADER
//! <payload bytes, exactly PAYLOAD_SIZE long>
//! ```
//!
//! Header parsing is line oriented and ignores unknown keys.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use chrono::Utc;

use crate::error::{FrameError, FrameResult, MessageError, MessageResult};

/// First line of every header.
pub const HEADER_MARKER: &str = "HEADER";

/// Last line of every header.
pub const END_HEADER_MARKER: &str = "END_HEADER";

/// Header key carrying the sequence number.
pub const SEQ_NUM_KEY: &str = "SEQ_NUM";

/// Header key carrying the sender timestamp.
pub const TIMESTAMP_KEY: &str = "TIMESTAMP";

/// Header key carrying the payload length in bytes.
pub const PAYLOAD_SIZE_KEY: &str = "PAYLOAD_SIZE";

/// Timestamp format used when stamping outbound headers.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Parsed packet header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    /// Sender-assigned sequence number.
    pub sequence_number: u64,
    /// Sender timestamp, opaque to the receiver.
    pub timestamp: String,
    /// Length of the payload that follows the header.
    pub payload_size: usize,
}

impl PacketHeader {
    /// Create a header.
    #[must_use]
    pub fn new(sequence_number: u64, timestamp: impl Into<String>, payload_size: usize) -> Self {
        Self {
            sequence_number,
            timestamp: timestamp.into(),
            payload_size,
        }
    }

    /// Render the header in wire form, including the trailing newline.
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!(
            "{HEADER_MARKER}\n{SEQ_NUM_KEY}={}\n{TIMESTAMP_KEY}={}\n{PAYLOAD_SIZE_KEY}={}\n{END_HEADER_MARKER}\n",
            self.sequence_number, self.timestamp, self.payload_size
        )
    }
}

/// A complete packet: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The packet header.
    pub header: PacketHeader,
    /// The payload bytes.
    pub payload: Bytes,
}

impl Packet {
    /// Build a packet, deriving `payload_size` from the payload.
    #[must_use]
    pub fn new(sequence_number: u64, timestamp: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            header: PacketHeader::new(sequence_number, timestamp, payload.len()),
            payload,
        }
    }

    /// Sequence number from the header.
    #[must_use]
    pub const fn sequence_number(&self) -> u64 {
        self.header.sequence_number
    }

    /// Interpret the payload as UTF-8 text.
    pub fn payload_text(&self) -> MessageResult<&str> {
        std::str::from_utf8(&self.payload).map_err(|_| MessageError::NotText)
    }

    /// Serialize header and payload into one buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let header = self.header.to_wire();
        let mut buf = BytesMut::with_capacity(header.len() + self.payload.len());
        buf.extend_from_slice(header.as_bytes());
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }
}

/// Monotonic sequence number source.
///
/// One counter belongs to one framer; there is no process-wide counter.
#[derive(Debug)]
pub struct SequenceCounter {
    next: AtomicU64,
}

impl SequenceCounter {
    /// Create a counter whose first value is `start`.
    #[must_use]
    pub const fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    /// Take the next sequence number.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Peek at the value the next call to [`next`](Self::next) returns.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

/// Stamps payloads with headers using its own sequence counter.
#[derive(Debug, Default)]
pub struct PacketFramer {
    counter: SequenceCounter,
}

impl PacketFramer {
    /// Create a framer whose first sequence number is 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a framer whose first sequence number is `start`.
    #[must_use]
    pub const fn starting_at(start: u64) -> Self {
        Self {
            counter: SequenceCounter::starting_at(start),
        }
    }

    /// Wrap a payload in a packet with the next sequence number and the
    /// current UTC time.
    pub fn frame(&self, payload: impl Into<Bytes>) -> Packet {
        let timestamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        Packet::new(self.counter.next(), timestamp, payload)
    }

    /// Frame a payload and serialize it to wire bytes.
    pub fn encode(&self, payload: impl Into<Bytes>) -> Bytes {
        self.frame(payload).to_bytes()
    }

    /// The sequence number the next packet will carry.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.counter.peek()
    }
}

/// Strip a trailing carriage return so CRLF peers are accepted.
fn trim_line(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Whether `bytes` could be the start of a header.
pub(crate) fn is_header_prefix(bytes: &[u8]) -> bool {
    const LF: &[u8] = b"HEADER\n";
    const CRLF: &[u8] = b"HEADER\r\n";
    let lf = bytes.len().min(LF.len());
    let crlf = bytes.len().min(CRLF.len());
    bytes[..lf] == LF[..lf] || bytes[..crlf] == CRLF[..crlf]
}

/// Offset just past the newline that terminates the `END_HEADER` line.
///
/// Only newline-terminated lines are considered, so a partially received
/// marker is never mistaken for a complete one.
pub(crate) fn find_header_end(input: &[u8]) -> Option<usize> {
    let mut offset = 0;
    while let Some(pos) = input[offset..].iter().position(|&b| b == b'\n') {
        let line = trim_line(&input[offset..offset + pos]);
        offset += pos + 1;
        if line == END_HEADER_MARKER.as_bytes() {
            return Some(offset);
        }
    }
    None
}

/// Parse a header from the start of `input`.
///
/// Returns the header and the number of bytes it occupies. The payload, if
/// any, starts at that offset.
pub fn parse_header(input: &[u8]) -> FrameResult<(PacketHeader, usize)> {
    let mut lines = input.split(|&b| b == b'\n');
    let mut offset = 0;

    match lines.next() {
        Some(first) if trim_line(first) == HEADER_MARKER.as_bytes() => {
            offset += first.len() + 1;
        }
        _ => return Err(FrameError::MissingHeaderMarker),
    }

    let mut sequence_number = None;
    let mut timestamp = None;
    let mut payload_size = None;

    for raw in lines {
        let line = trim_line(raw);
        offset += raw.len() + 1;

        if line == END_HEADER_MARKER.as_bytes() {
            let header = PacketHeader {
                sequence_number: sequence_number.ok_or(FrameError::MissingField(SEQ_NUM_KEY))?,
                timestamp: timestamp.ok_or(FrameError::MissingField(TIMESTAMP_KEY))?,
                payload_size: payload_size.ok_or(FrameError::MissingField(PAYLOAD_SIZE_KEY))?,
            };
            return Ok((header, offset.min(input.len())));
        }

        let text = String::from_utf8_lossy(line);
        let Some((key, value)) = text.split_once('=') else {
            continue;
        };

        match key {
            SEQ_NUM_KEY => {
                sequence_number = Some(value.trim().parse::<u64>().map_err(|_| {
                    FrameError::InvalidField {
                        field: SEQ_NUM_KEY,
                        value: value.to_string(),
                    }
                })?);
            }
            TIMESTAMP_KEY => timestamp = Some(value.trim().to_string()),
            PAYLOAD_SIZE_KEY => {
                payload_size = Some(value.trim().parse::<usize>().map_err(|_| {
                    FrameError::InvalidField {
                        field: PAYLOAD_SIZE_KEY,
                        value: value.to_string(),
                    }
                })?);
            }
            _ => {}
        }
    }

    Err(FrameError::MissingEndMarker)
}

/// Decode a buffer holding exactly one packet.
///
/// The bytes after the header must be exactly `PAYLOAD_SIZE` long.
pub fn decode(input: &[u8]) -> FrameResult<Packet> {
    let (header, consumed) = parse_header(input)?;
    let actual = input.len() - consumed;
    if actual != header.payload_size {
        return Err(FrameError::PayloadSizeMismatch {
            declared: header.payload_size,
            actual,
        });
    }
    Ok(Packet {
        header,
        payload: Bytes::copy_from_slice(&input[consumed..]),
    })
}
