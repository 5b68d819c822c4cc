//! Stream codec that splits a TCP byte stream into packets.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::FrameError;
use crate::frame::{find_header_end, is_header_prefix, parse_header, Packet};

/// Default maximum header size: 1KB.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 1024;

/// Default maximum payload size: 64KB.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Size limits applied while decoding a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Maximum bytes between `HEADER` and the end of `END_HEADER`.
    pub max_header_size: usize,
    /// Maximum declared `PAYLOAD_SIZE`.
    pub max_payload_size: usize,
}

impl FrameLimits {
    /// Create limits with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }

    /// Set the maximum header size.
    #[must_use]
    pub const fn with_max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = size;
        self
    }

    /// Set the maximum payload size.
    #[must_use]
    pub const fn with_max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder/encoder for framed packets over a byte stream.
///
/// A declared `PAYLOAD_SIZE` that disagrees with the stream is detected in
/// two ways: bytes following the payload that do not begin a new header, or
/// the stream ending before the payload is complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec {
    limits: FrameLimits,
}

impl PacketCodec {
    /// Create a codec with default limits.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            limits: FrameLimits::new(),
        }
    }

    /// Create a codec with explicit limits.
    #[must_use]
    pub const fn with_limits(limits: FrameLimits) -> Self {
        Self { limits }
    }

    /// The limits in effect.
    #[must_use]
    pub const fn limits(&self) -> FrameLimits {
        self.limits
    }

    /// Describe bytes left over when no more input will arrive.
    ///
    /// Returns `None` when `src` is empty. A complete header with a short
    /// payload yields [`FrameError::PayloadSizeMismatch`]; a header without
    /// `END_HEADER` yields [`FrameError::MissingEndMarker`].
    #[must_use]
    pub fn incomplete_frame(src: &[u8]) -> Option<FrameError> {
        if src.is_empty() {
            return None;
        }
        if !is_header_prefix(src) {
            return Some(FrameError::MissingHeaderMarker);
        }
        let Some(header_end) = find_header_end(src) else {
            return Some(FrameError::MissingEndMarker);
        };
        Some(match parse_header(&src[..header_end]) {
            Ok((header, _)) => FrameError::PayloadSizeMismatch {
                declared: header.payload_size,
                actual: src.len() - header_end,
            },
            Err(e) => e,
        })
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, FrameError> {
        if src.is_empty() {
            return Ok(None);
        }
        if !is_header_prefix(src) {
            return Err(FrameError::MissingHeaderMarker);
        }

        let Some(header_end) = find_header_end(src) else {
            if src.len() > self.limits.max_header_size {
                return Err(FrameError::HeaderTooLarge {
                    limit: self.limits.max_header_size,
                });
            }
            return Ok(None);
        };
        if header_end > self.limits.max_header_size {
            return Err(FrameError::HeaderTooLarge {
                limit: self.limits.max_header_size,
            });
        }

        let (header, _) = parse_header(&src[..header_end])?;
        if header.payload_size > self.limits.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: header.payload_size,
                limit: self.limits.max_payload_size,
            });
        }

        let total = header_end + header.payload_size;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let trailing = &src[total..];
        if !trailing.is_empty() && !is_header_prefix(trailing) {
            let stray = trailing
                .windows(b"\nHEADER".len())
                .position(|w| w == b"\nHEADER")
                .map_or(trailing.len(), |p| p + 1);
            return Err(FrameError::PayloadSizeMismatch {
                declared: header.payload_size,
                actual: header.payload_size + stray,
            });
        }

        src.advance(header_end);
        let payload = src.split_to(header.payload_size).freeze();
        trace!(seq = header.sequence_number, size = payload.len(), "Decoded packet");

        Ok(Some(Packet { header, payload }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, FrameError> {
        if let Some(packet) = self.decode(src)? {
            return Ok(Some(packet));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let err = Self::incomplete_frame(src);
        src.clear();
        err.map_or(Ok(None), Err)
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = FrameError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), FrameError> {
        let header = packet.header.to_wire();
        dst.reserve(header.len() + packet.payload.len());
        dst.extend_from_slice(header.as_bytes());
        dst.extend_from_slice(&packet.payload);
        Ok(())
    }
}
