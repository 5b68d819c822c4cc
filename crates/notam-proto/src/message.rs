//! Payload message kinds and server replies.
//!
//! The first line of a payload names its kind. The rest is a sequence of
//! `KEY=value` lines; unknown keys are ignored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MessageError, MessageResult};

/// Marker of an admission request.
pub const REQUEST_CONNECTION: &str = "REQUEST_CONNECTION";

/// Marker of the flight plan part of a submission.
pub const FLIGHT_PLAN_MARKER: &str = "FLIGHT_PLAN";

/// Marker of the flight log part of a submission.
pub const FLIGHT_LOG_MARKER: &str = "FLIGHT_LOG";

/// Key carrying the client identifier in an admission request.
pub const CLIENT_ID_KEY: &str = "CLIENT_ID";

/// First line of an admission acceptance.
pub const CONNECTION_ACCEPTED: &str = "CONNECTION_ACCEPTED";

/// First line of an admission rejection.
pub const CONNECTION_REJECTED: &str = "CONNECTION_REJECTED";

/// First line of a partial-submission acknowledgment.
pub const PARTIAL_SUBMISSION: &str = "PARTIAL_SUBMISSION";

/// Reason sent when the server is at capacity.
pub const CAPACITY_EXCEEDED_REASON: &str =
    "Maximum connections reached. Please hover for 30 more minutes.";

/// Iterate the `KEY=value` lines of a payload.
///
/// Lines without `=` are skipped. Carriage returns are trimmed.
pub fn key_values(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(|line| line.split_once('='))
}

/// Kind of payload, taken from its first line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// `REQUEST_CONNECTION`
    RequestConnection,
    /// `FLIGHT_PLAN`
    FlightPlan,
    /// `FLIGHT_LOG`
    FlightLog,
}

impl MessageKind {
    /// Classify a payload by its marker line.
    pub fn from_payload(text: &str) -> MessageResult<Self> {
        let first = text.lines().next().unwrap_or("").trim_end_matches('\r');
        match first {
            REQUEST_CONNECTION => Ok(Self::RequestConnection),
            FLIGHT_PLAN_MARKER => Ok(Self::FlightPlan),
            FLIGHT_LOG_MARKER => Ok(Self::FlightLog),
            other => Err(MessageError::UnknownMarker(other.to_string())),
        }
    }

    /// The marker line for this kind.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::RequestConnection => REQUEST_CONNECTION,
            Self::FlightPlan => FLIGHT_PLAN_MARKER,
            Self::FlightLog => FLIGHT_LOG_MARKER,
        }
    }

    /// The submission part this kind carries, if any.
    #[must_use]
    pub const fn submission_part(self) -> Option<SubmissionPart> {
        match self {
            Self::RequestConnection => None,
            Self::FlightPlan => Some(SubmissionPart::FlightPlan),
            Self::FlightLog => Some(SubmissionPart::FlightLog),
        }
    }
}

/// One of the two packets that make up a flight submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionPart {
    /// The flight plan packet.
    FlightPlan,
    /// The flight log packet.
    FlightLog,
}

impl SubmissionPart {
    /// The other half of the submission.
    #[must_use]
    pub const fn counterpart(self) -> Self {
        match self {
            Self::FlightPlan => Self::FlightLog,
            Self::FlightLog => Self::FlightPlan,
        }
    }

    /// The marker line that introduces this part.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::FlightPlan => FLIGHT_PLAN_MARKER,
            Self::FlightLog => FLIGHT_LOG_MARKER,
        }
    }
}

impl fmt::Display for SubmissionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// Extract the client id from a `REQUEST_CONNECTION` payload.
///
/// The first line must be the marker and a non-empty `CLIENT_ID=` line must
/// follow.
pub fn parse_connection_request(text: &str) -> MessageResult<String> {
    if MessageKind::from_payload(text)? != MessageKind::RequestConnection {
        return Err(MessageError::UnknownMarker(
            text.lines().next().unwrap_or("").to_string(),
        ));
    }

    key_values(text)
        .find(|(key, _)| *key == CLIENT_ID_KEY)
        .map(|(_, value)| value.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or(MessageError::MissingField(CLIENT_ID_KEY))
}

/// Build a `REQUEST_CONNECTION` payload.
#[must_use]
pub fn connection_request_payload(client_id: &str) -> String {
    format!("{REQUEST_CONNECTION}\n{CLIENT_ID_KEY}={client_id}\n")
}

/// Server answer to an admission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionReply {
    /// The client holds a registry slot.
    Accepted,
    /// The client was turned away.
    Rejected {
        /// Human-readable reason.
        reason: String,
    },
}

impl ConnectionReply {
    /// Rejection sent when the registry is full.
    #[must_use]
    pub fn capacity_exceeded() -> Self {
        Self::Rejected {
            reason: CAPACITY_EXCEEDED_REASON.to_string(),
        }
    }

    /// Rejection sent when the id is already held by another session.
    #[must_use]
    pub fn duplicate_client(client_id: &str) -> Self {
        Self::Rejected {
            reason: format!("Client id {client_id} is already connected."),
        }
    }

    /// Render in wire form.
    #[must_use]
    pub fn to_payload(&self) -> String {
        match self {
            Self::Accepted => format!("{CONNECTION_ACCEPTED}\n"),
            Self::Rejected { reason } => format!("{CONNECTION_REJECTED}\nREASON={reason}\n"),
        }
    }

    /// Parse a reply received from the server.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.lines().next()?.trim_end_matches('\r');
        match first {
            CONNECTION_ACCEPTED => Some(Self::Accepted),
            CONNECTION_REJECTED => {
                let reason = key_values(text)
                    .find(|(key, _)| *key == "REASON")
                    .map_or_else(|| "Unknown reason".to_string(), |(_, v)| v.to_string());
                Some(Self::Rejected { reason })
            }
            _ => None,
        }
    }
}

/// Reply sent before closing a session on a protocol error.
#[must_use]
pub fn error_reply(description: &str) -> String {
    format!("ERROR: {description}\n")
}

/// Acknowledgment for the first half of a submission.
#[must_use]
pub fn partial_reply(awaiting: SubmissionPart) -> String {
    format!("{PARTIAL_SUBMISSION}\nAWAITING={awaiting}\n")
}
