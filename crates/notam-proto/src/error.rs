//! Error types for the notam-proto crate.

use thiserror::Error;

/// Errors produced while framing or deframing packets.
///
/// Every variant is a protocol format error: the peer sent bytes that do not
/// form a valid packet. None of them indicate a bug on our side.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The first line of the packet is not the `HEADER` marker.
    #[error("missing HEADER marker")]
    MissingHeaderMarker,

    /// Input ended before the `END_HEADER` marker.
    #[error("missing END_HEADER marker")]
    MissingEndMarker,

    /// A required header field is absent.
    #[error("missing header field: {0}")]
    MissingField(&'static str),

    /// A header field has a value that cannot be parsed.
    #[error("invalid value for header field {field}: {value:?}")]
    InvalidField {
        /// Name of the field.
        field: &'static str,
        /// Raw value received.
        value: String,
    },

    /// The declared payload size does not match the bytes received.
    #[error("payload size mismatch: declared {declared} bytes, received {actual}")]
    PayloadSizeMismatch {
        /// Size announced in `PAYLOAD_SIZE`.
        declared: usize,
        /// Size actually observed.
        actual: usize,
    },

    /// The header grew past the configured limit without terminating.
    #[error("header exceeds {limit} bytes")]
    HeaderTooLarge {
        /// Configured header limit.
        limit: usize,
    },

    /// The declared payload is larger than the configured limit.
    #[error("payload of {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge {
        /// Size announced in `PAYLOAD_SIZE`.
        size: usize,
        /// Configured payload limit.
        limit: usize,
    },

    /// Underlying transport error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while interpreting a packet payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The payload does not start with a known marker line.
    #[error("unrecognized message marker: {0:?}")]
    UnknownMarker(String),

    /// The payload is not valid UTF-8 text.
    #[error("payload is not valid UTF-8")]
    NotText,

    /// A required `KEY=value` line is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A `KEY=value` line carries a value of the wrong shape.
    #[error("invalid value for {key}: {value:?}")]
    InvalidField {
        /// Key of the offending line.
        key: &'static str,
        /// Raw value received.
        value: String,
    },
}

/// Result type for framing operations.
pub type FrameResult<T> = Result<T, FrameError>;

/// Result type for message operations.
pub type MessageResult<T> = Result<T, MessageError>;
