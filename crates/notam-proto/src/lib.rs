//! # notam-proto
//!
//! Wire protocol for the NOTAM flight advisory service.
//!
//! Every packet is a line-oriented text header followed by a raw payload of
//! exactly `PAYLOAD_SIZE` bytes. The payload's first line names its kind:
//!
//! - `REQUEST_CONNECTION`: admission request carrying `CLIENT_ID`
//! - `FLIGHT_PLAN`: first half of a flight submission
//! - `FLIGHT_LOG`: second half of a flight submission
//!
//! Accepted plans are rebroadcast to ATC stations as framed `KEY=value`
//! payloads (see [`FlightPlan::to_broadcast_payload`]).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod flight;
pub mod frame;
pub mod message;
pub mod types;

pub use codec::{FrameLimits, PacketCodec, DEFAULT_MAX_HEADER_SIZE, DEFAULT_MAX_PAYLOAD_SIZE};
pub use error::{FrameError, FrameResult, MessageError, MessageResult};
pub use frame::{decode, parse_header, Packet, PacketFramer, PacketHeader, SequenceCounter};
pub use message::{
    connection_request_payload, error_reply, parse_connection_request, partial_reply,
    ConnectionReply, MessageKind, SubmissionPart,
};
pub use types::{AirspaceInfo, Coordinate, FlightLog, FlightPlan, Notam, WeatherConditions};
