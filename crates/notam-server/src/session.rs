//! Per-connection session state machine.
//!
//! A session starts unidentified, is admitted by a `REQUEST_CONNECTION`
//! packet, then accumulates one flight plan and one flight log. The
//! completed submission is evaluated, the report is written back and, when
//! accepted, the plan is broadcast to ATC stations. The session then closes.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use notam_advisory::{FlightEvaluator, WeatherSource};
use notam_proto::{
    error_reply, parse_connection_request, partial_reply, ConnectionReply, FlightLog, FlightPlan,
    MessageKind, Packet, PacketCodec, PacketFramer, SubmissionPart,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broadcast::broadcast_plan;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::registry::{
    outbound_channel, Admission, AdmissionError, ConnectionRegistry, OutboundSender, PeerHandle,
};

/// State of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no admission request yet.
    Unidentified,
    /// Holds a registry slot, no submission in progress.
    Admitted,
    /// One half of a submission received.
    Accumulating,
    /// Both halves received.
    Complete,
    /// Admission was refused.
    Rejected,
    /// The session is over.
    Closed,
}

impl SessionState {
    /// Whether the session still accepts packets.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Unidentified | Self::Admitted | Self::Accumulating)
    }
}

/// Progress of a submission after one part was accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// The other part is still missing.
    Partial {
        /// The part the session waits for.
        awaiting: SubmissionPart,
    },
    /// Both parts are present.
    Complete {
        /// The flight plan.
        plan: FlightPlan,
        /// The flight log.
        log: FlightLog,
    },
}

/// Reassembles a two-packet submission and guards against replayed packets.
#[derive(Debug, Default)]
pub struct Reassembly {
    seen: HashSet<u64>,
    plan: Option<FlightPlan>,
    log: Option<FlightLog>,
}

impl Reassembly {
    /// Create an empty reassembly buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sequence number, failing if it was already seen.
    pub fn observe_sequence(&mut self, sequence_number: u64) -> ServerResult<()> {
        if self.seen.insert(sequence_number) {
            Ok(())
        } else {
            Err(ServerError::DuplicateSequence(sequence_number))
        }
    }

    /// Store one part of the submission.
    pub fn accept(&mut self, part: SubmissionPart, text: &str) -> ServerResult<Progress> {
        match part {
            SubmissionPart::FlightPlan => {
                if self.plan.is_some() {
                    return Err(ServerError::Protocol(format!("second {part} in one submission")));
                }
                self.plan = Some(FlightPlan::from_submission(text)?);
            }
            SubmissionPart::FlightLog => {
                if self.log.is_some() {
                    return Err(ServerError::Protocol(format!("second {part} in one submission")));
                }
                self.log = Some(FlightLog::from_submission(text)?);
            }
        }

        match (self.plan.take(), self.log.take()) {
            (Some(plan), Some(log)) => Ok(Progress::Complete { plan, log }),
            (plan, log) => {
                self.plan = plan;
                self.log = log;
                Ok(Progress::Partial {
                    awaiting: part.counterpart(),
                })
            }
        }
    }

    /// Whether one half of a submission is held.
    #[must_use]
    pub const fn in_progress(&self) -> bool {
        self.plan.is_some() || self.log.is_some()
    }

    /// Number of distinct sequence numbers seen.
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

/// What an inbound packet asks the session to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The client asks to be admitted under this id.
    ConnectionRequest(String),
    /// Half a submission was stored.
    Partial(SubmissionPart),
    /// The submission is complete.
    Complete(Box<FlightPlan>, Box<FlightLog>),
}

/// Protocol state of one TCP connection.
#[derive(Debug)]
pub struct ClientSession {
    id: Uuid,
    peer: SocketAddr,
    client_id: Option<String>,
    state: SessionState,
    reassembly: Reassembly,
}

impl ClientSession {
    /// Create a session for a freshly accepted connection.
    #[must_use]
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            client_id: None,
            state: SessionState::Unidentified,
            reassembly: Reassembly::new(),
        }
    }

    /// Unique session identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Remote address.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Client id once admitted.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Interpret one decoded packet.
    ///
    /// Every error returned here is a protocol error and ends the session.
    pub fn handle_packet(&mut self, packet: &Packet) -> ServerResult<Inbound> {
        if !self.state.is_open() {
            return Err(ServerError::Protocol("session is closed".into()));
        }
        self.reassembly.observe_sequence(packet.sequence_number())?;

        let text = packet.payload_text()?;
        let kind = MessageKind::from_payload(text)?;

        match (self.state, kind.submission_part()) {
            (SessionState::Unidentified, None) => {
                Ok(Inbound::ConnectionRequest(parse_connection_request(text)?))
            }
            (SessionState::Unidentified, Some(part)) => Err(ServerError::Protocol(format!(
                "{part} received before REQUEST_CONNECTION"
            ))),
            (_, None) => Err(ServerError::Protocol("client is already admitted".into())),
            (_, Some(part)) => match self.reassembly.accept(part, text)? {
                Progress::Partial { awaiting } => {
                    self.state = SessionState::Accumulating;
                    Ok(Inbound::Partial(awaiting))
                }
                Progress::Complete { plan, log } => {
                    self.state = SessionState::Complete;
                    Ok(Inbound::Complete(Box::new(plan), Box::new(log)))
                }
            },
        }
    }

    /// Record a successful admission.
    pub fn mark_admitted(&mut self, client_id: impl Into<String>) {
        self.client_id = Some(client_id.into());
        self.state = SessionState::Admitted;
    }

    /// Record a refused admission.
    pub fn mark_rejected(&mut self) {
        self.state = SessionState::Rejected;
    }

    /// Mark the session closed.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// ATC listeners with nothing in progress are not subject to the idle timeout.
    #[must_use]
    pub fn is_idle_exempt(&self, config: &ServerConfig) -> bool {
        self.state == SessionState::Admitted
            && self.client_id.as_deref().is_some_and(|id| config.is_atc(id))
    }
}

/// Shared, read-mostly state handed to every session.
#[derive(Debug)]
pub struct SessionContext<S> {
    /// Server configuration.
    pub config: ServerConfig,
    /// Admitted clients.
    pub registry: Arc<ConnectionRegistry>,
    /// Decision pipeline.
    pub evaluator: FlightEvaluator<S>,
    /// Framer for broadcast packets.
    pub framer: PacketFramer,
}

impl<S: WeatherSource> SessionContext<S> {
    /// Create a context with an empty registry sized from `config`.
    #[must_use]
    pub fn new(config: ServerConfig, evaluator: FlightEvaluator<S>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(config.max_connections));
        Self {
            config,
            registry,
            evaluator,
            framer: PacketFramer::new(),
        }
    }
}

enum Flow {
    Continue,
    Close,
}

/// Drive one connection until it closes.
///
/// The registry slot, if one was taken, is released on every exit path.
/// A packet left half received when the idle or frame deadline passes is
/// reported as a framing error.
///
/// # Errors
///
/// Returns the error that ended the session. A peer closing the connection
/// or a completed submission ends it with `Ok(())`.
pub async fn run_session<R, W, S>(
    reader: R,
    mut writer: W,
    peer: SocketAddr,
    ctx: Arc<SessionContext<S>>,
) -> ServerResult<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
    S: WeatherSource,
{
    let mut frames = FramedRead::new(reader, PacketCodec::with_limits(ctx.config.frame_limits));
    let (outbound_tx, mut outbound_rx) = outbound_channel(ctx.config.outbound_capacity);
    let mut session = ClientSession::new(peer);
    let mut admission: Option<Admission> = None;
    let mut last_inbound = Instant::now();
    let mut partial_since: Option<Instant> = None;

    debug!(peer = %peer, session_id = %session.id(), "Session started");

    let result = loop {
        partial_since = if frames.read_buffer().is_empty() {
            None
        } else {
            partial_since.or_else(|| Some(Instant::now()))
        };
        let exempt = session.is_idle_exempt(&ctx.config);
        let wake = next_wake(&ctx.config, exempt, last_inbound, partial_since);

        tokio::select! {
            biased;

            frame = frames.next() => {
                last_inbound = Instant::now();
                let packet = match frame {
                    Some(Ok(packet)) => packet,
                    Some(Err(e)) => break Err(ServerError::from(e)),
                    None => break Ok(()),
                };
                match handle_inbound(&ctx, &mut session, &mut admission, &outbound_tx, &mut writer, &packet).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Close) => break Ok(()),
                    Err(e) => break Err(e),
                }
            }
            Some(bytes) = outbound_rx.recv() => {
                if let Err(e) = writer.write_all(&bytes).await {
                    break Err(e.into());
                }
                if let Err(e) = writer.flush().await {
                    break Err(e.into());
                }
            }
            () = tokio::time::sleep_until(wake) => {
                let stalled = partial_since
                    .is_some_and(|since| since.elapsed() >= ctx.config.frame_timeout);
                let idle = !exempt && last_inbound.elapsed() >= ctx.config.idle_timeout;
                if stalled || idle {
                    break Err(match PacketCodec::incomplete_frame(frames.read_buffer()) {
                        Some(err) => ServerError::Frame(err),
                        None => ServerError::IdleTimeout(ctx.config.idle_timeout),
                    });
                }
            }
        }
    };

    if let Err(e) = &result {
        if e.is_protocol_error() {
            warn!(peer = %peer, client_id = ?session.client_id(), error = %e, "Protocol error");
            if let Err(write_err) = write_text(&mut writer, &error_reply(&e.to_string())).await {
                debug!(peer = %peer, error = %write_err, "Could not report protocol error");
            }
        } else {
            debug!(peer = %peer, client_id = ?session.client_id(), error = %e, "Session ended with error");
        }
    }

    session.close();
    drop(admission);
    let _ = writer.shutdown().await;
    info!(peer = %peer, client_id = ?session.client_id(), "Session closed");

    result
}

async fn handle_inbound<W, S>(
    ctx: &SessionContext<S>,
    session: &mut ClientSession,
    admission: &mut Option<Admission>,
    outbound_tx: &OutboundSender,
    writer: &mut W,
    packet: &Packet,
) -> ServerResult<Flow>
where
    W: AsyncWrite + Unpin + Send,
    S: WeatherSource,
{
    match session.handle_packet(packet)? {
        Inbound::ConnectionRequest(client_id) => {
            let handle = PeerHandle::new(client_id.clone(), session.id(), outbound_tx.clone());
            match ctx.registry.admit(handle) {
                Ok(guard) => {
                    *admission = Some(guard);
                    session.mark_admitted(client_id.clone());
                    info!(
                        peer = %session.peer(),
                        client_id = %client_id,
                        connected = ctx.registry.count(),
                        "Client admitted"
                    );
                    write_text(writer, &ConnectionReply::Accepted.to_payload()).await?;
                    Ok(Flow::Continue)
                }
                Err(e) => {
                    session.mark_rejected();
                    let reply = match &e {
                        AdmissionError::Full { .. } => ConnectionReply::capacity_exceeded(),
                        AdmissionError::DuplicateClient(id) => ConnectionReply::duplicate_client(id),
                    };
                    warn!(peer = %session.peer(), client_id = %client_id, reason = %e, "Admission denied");
                    write_text(writer, &reply.to_payload()).await?;
                    Err(ServerError::AdmissionDenied(e.to_string()))
                }
            }
        }
        Inbound::Partial(awaiting) => {
            debug!(client_id = ?session.client_id(), awaiting = %awaiting, "Partial submission");
            write_text(writer, &partial_reply(awaiting)).await?;
            Ok(Flow::Continue)
        }
        Inbound::Complete(plan, log) => {
            let client_id = session.client_id().unwrap_or_default().to_string();
            let evaluation = ctx.evaluator.evaluate(*plan, &log).await;
            info!(
                client_id = %client_id,
                flight_id = %evaluation.plan.flight_id,
                decision = ?evaluation.decision,
                "Submission evaluated"
            );
            write_text(writer, &evaluation.report).await?;

            if evaluation.should_broadcast() {
                broadcast_plan(
                    &ctx.registry,
                    &ctx.framer,
                    &evaluation.plan,
                    &ctx.config.atc_prefix,
                    &client_id,
                    ctx.config.broadcast_timeout,
                )
                .await;
            }
            Ok(Flow::Close)
        }
    }
}

/// Earliest instant at which a deadline may have passed.
///
/// Sessions wake at least once per frame timeout so that bytes of an
/// unfinished packet are noticed even when the idle timeout does not apply.
fn next_wake(
    config: &ServerConfig,
    idle_exempt: bool,
    last_inbound: Instant,
    partial_since: Option<Instant>,
) -> Instant {
    let mut wake = Instant::now() + config.frame_timeout;
    if let Some(since) = partial_since {
        wake = wake.min(since + config.frame_timeout);
    }
    if !idle_exempt {
        wake = wake.min(last_inbound + config.idle_timeout);
    }
    wake
}

async fn write_text<W>(writer: &mut W, text: &str) -> ServerResult<()>
where
    W: AsyncWrite + Unpin + Send,
{
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notam_advisory::{NotamIndex, StaticWeatherSource};
    use notam_proto::{connection_request_payload, AirspaceInfo, Coordinate, FrameError, Notam};
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};
    use std::time::Duration;
    use tokio::task::JoinHandle;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn packet(seq: u64, payload: impl Into<String>) -> Packet {
        Packet::new(seq, "2025-04-07T10:00:00Z", payload.into())
    }

    fn plan() -> FlightPlan {
        FlightPlan {
            flight_id: "AC101".into(),
            departure_airport: "CYYZ".into(),
            arrival_airport: "KJFK".into(),
            aircraft_type: "A321".into(),
            ..FlightPlan::default()
        }
    }

    fn log() -> FlightLog {
        FlightLog {
            flight_id: "AC101".into(),
            total_flight_time: "01:00".into(),
            fuel_on_board: 6000,
            estimated_fuel_burn: 3000,
            ..FlightLog::default()
        }
    }

    fn notams() -> NotamIndex {
        NotamIndex::new(vec![Notam {
            identifier: "A0002/25".into(),
            fir: "CZYZ".into(),
            location: "XXXX".into(),
            start_time: "2504070000".into(),
            end_time: "2504302359".into(),
            affected_airspace: AirspaceInfo::new("KBUF", Coordinate::default(), 10.0),
            description: "Restricted area active".into(),
        }])
    }

    fn context(config: ServerConfig) -> Arc<SessionContext<StaticWeatherSource>> {
        let evaluator = FlightEvaluator::new(notams(), StaticWeatherSource::fair());
        Arc::new(SessionContext::new(config, evaluator))
    }

    fn spawn_session(
        ctx: &Arc<SessionContext<StaticWeatherSource>>,
    ) -> (DuplexStream, JoinHandle<ServerResult<()>>) {
        let (client, server) = duplex(16 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let handle = tokio::spawn(run_session(reader, writer, peer(), Arc::clone(ctx)));
        (client, handle)
    }

    async fn send(client: &mut DuplexStream, packet: &Packet) {
        client.write_all(&packet.to_bytes()).await.unwrap();
    }

    async fn read_until(client: &mut DuplexStream, needle: &str) -> String {
        let mut received = String::new();
        let mut buf = [0u8; 1024];
        tokio::time::timeout(TIMEOUT, async {
            while !received.contains(needle) {
                let n = client.read(&mut buf).await.unwrap();
                assert!(n > 0, "stream closed before {needle:?}; got {received:?}");
                received.push_str(&String::from_utf8_lossy(&buf[..n]));
            }
        })
        .await
        .unwrap();
        received
    }

    // ==================== Reassembly Tests ====================

    #[test]
    fn test_reassembly_plan_then_log() {
        let mut r = Reassembly::new();
        let progress = r
            .accept(SubmissionPart::FlightPlan, &plan().to_submission_payload())
            .unwrap();
        assert_eq!(
            progress,
            Progress::Partial {
                awaiting: SubmissionPart::FlightLog
            }
        );
        assert!(r.in_progress());

        let progress = r
            .accept(SubmissionPart::FlightLog, &log().to_submission_payload())
            .unwrap();
        match progress {
            Progress::Complete { plan, log } => {
                assert_eq!(plan.flight_id, "AC101");
                assert_eq!(log.fuel_on_board, 6000);
            }
            Progress::Partial { .. } => panic!("expected complete submission"),
        }
        assert!(!r.in_progress());
    }

    #[test]
    fn test_reassembly_log_first() {
        let mut r = Reassembly::new();
        let progress = r
            .accept(SubmissionPart::FlightLog, &log().to_submission_payload())
            .unwrap();
        assert_eq!(
            progress,
            Progress::Partial {
                awaiting: SubmissionPart::FlightPlan
            }
        );
        let progress = r
            .accept(SubmissionPart::FlightPlan, &plan().to_submission_payload())
            .unwrap();
        assert!(matches!(progress, Progress::Complete { .. }));
    }

    #[test]
    fn test_reassembly_same_part_twice() {
        let mut r = Reassembly::new();
        let payload = plan().to_submission_payload();
        r.accept(SubmissionPart::FlightPlan, &payload).unwrap();

        let err = r.accept(SubmissionPart::FlightPlan, &payload).unwrap_err();
        assert!(matches!(err, ServerError::Protocol(_)));
    }

    #[test]
    fn test_reassembly_duplicate_sequence() {
        let mut r = Reassembly::new();
        r.observe_sequence(1).unwrap();
        r.observe_sequence(2).unwrap();

        let err = r.observe_sequence(1).unwrap_err();
        assert!(matches!(err, ServerError::DuplicateSequence(1)));
        assert_eq!(r.seen_count(), 2);
    }

    #[test]
    fn test_reassembly_rejects_malformed_part() {
        let mut r = Reassembly::new();
        let err = r
            .accept(SubmissionPart::FlightPlan, "FLIGHT_PLAN\nDEP=CYYZ\n")
            .unwrap_err();
        assert!(err.is_protocol_error());
        assert!(!r.in_progress());
    }

    // ==================== ClientSession Tests ====================

    #[test]
    fn test_session_admission_request() {
        let mut session = ClientSession::new(peer());
        assert_eq!(session.state(), SessionState::Unidentified);

        let inbound = session
            .handle_packet(&packet(1, connection_request_payload("B737")))
            .unwrap();
        assert_eq!(inbound, Inbound::ConnectionRequest("B737".into()));

        session.mark_admitted("B737");
        assert_eq!(session.state(), SessionState::Admitted);
        assert_eq!(session.client_id(), Some("B737"));
    }

    #[test]
    fn test_session_flight_data_before_admission() {
        let mut session = ClientSession::new(peer());
        let err = session
            .handle_packet(&packet(1, plan().to_submission_payload()))
            .unwrap_err();
        assert!(matches!(err, ServerError::Protocol(_)));
    }

    #[test]
    fn test_session_unknown_marker() {
        let mut session = ClientSession::new(peer());
        let err = session.handle_packet(&packet(1, "HELLO\n")).unwrap_err();
        assert!(matches!(err, ServerError::Message(_)));
    }

    #[test]
    fn test_session_second_connection_request() {
        let mut session = ClientSession::new(peer());
        session
            .handle_packet(&packet(1, connection_request_payload("B737")))
            .unwrap();
        session.mark_admitted("B737");

        let err = session
            .handle_packet(&packet(2, connection_request_payload("B737")))
            .unwrap_err();
        assert!(matches!(err, ServerError::Protocol(_)));
    }

    #[test]
    fn test_session_admission_sequence_counts_for_replay() {
        let mut session = ClientSession::new(peer());
        session
            .handle_packet(&packet(5, connection_request_payload("B737")))
            .unwrap();
        session.mark_admitted("B737");

        let err = session
            .handle_packet(&packet(5, plan().to_submission_payload()))
            .unwrap_err();
        assert!(matches!(err, ServerError::DuplicateSequence(5)));
    }

    #[test]
    fn test_session_full_submission() {
        let mut session = ClientSession::new(peer());
        session
            .handle_packet(&packet(1, connection_request_payload("B737")))
            .unwrap();
        session.mark_admitted("B737");

        let inbound = session
            .handle_packet(&packet(2, plan().to_submission_payload()))
            .unwrap();
        assert_eq!(inbound, Inbound::Partial(SubmissionPart::FlightLog));
        assert_eq!(session.state(), SessionState::Accumulating);

        let inbound = session
            .handle_packet(&packet(3, log().to_submission_payload()))
            .unwrap();
        assert!(matches!(inbound, Inbound::Complete(_, _)));
        assert_eq!(session.state(), SessionState::Complete);

        let err = session
            .handle_packet(&packet(4, plan().to_submission_payload()))
            .unwrap_err();
        assert!(matches!(err, ServerError::Protocol(_)));
    }

    #[test]
    fn test_idle_exemption() {
        let config = ServerConfig::default();
        let mut session = ClientSession::new(peer());
        assert!(!session.is_idle_exempt(&config));

        session.mark_admitted("A777");
        assert!(session.is_idle_exempt(&config));
        assert!(!session.is_idle_exempt(&config.clone().with_atc_prefix("TWR")));

        let mut other = ClientSession::new(peer());
        other.mark_admitted("B737");
        assert!(!other.is_idle_exempt(&config));

        session
            .handle_packet(&packet(1, plan().to_submission_payload()))
            .unwrap();
        assert!(!session.is_idle_exempt(&config));
    }

    // ==================== run_session Tests ====================

    #[tokio::test]
    async fn test_run_session_full_submission() {
        let ctx = context(ServerConfig::default());
        let (mut client, handle) = spawn_session(&ctx);

        send(&mut client, &packet(1, connection_request_payload("B737"))).await;
        read_until(&mut client, "CONNECTION_ACCEPTED\n").await;
        assert!(ctx.registry.contains("B737"));

        send(&mut client, &packet(2, plan().to_submission_payload())).await;
        let reply = read_until(&mut client, "AWAITING=FLIGHT_LOG").await;
        assert!(reply.starts_with("PARTIAL_SUBMISSION\n"));

        send(&mut client, &packet(3, log().to_submission_payload())).await;
        let report = read_until(&mut client, "FLIGHT PLAN ACCEPTED").await;
        assert!(report.contains("NOTAM: A0002/25 for XXXX"));

        tokio::time::timeout(TIMEOUT, handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(ctx.registry.count(), 0);
    }

    #[tokio::test]
    async fn test_run_session_duplicate_sequence_reports_error() {
        let ctx = context(ServerConfig::default());
        let (mut client, handle) = spawn_session(&ctx);

        send(&mut client, &packet(1, connection_request_payload("B737"))).await;
        read_until(&mut client, "CONNECTION_ACCEPTED\n").await;
        send(&mut client, &packet(1, plan().to_submission_payload())).await;

        let reply = read_until(&mut client, "\n").await;
        assert!(reply.contains("ERROR: duplicate sequence number 1"));

        let result = tokio::time::timeout(TIMEOUT, handle).await.unwrap().unwrap();
        assert!(matches!(result, Err(ServerError::DuplicateSequence(1))));
        assert_eq!(ctx.registry.count(), 0);
    }

    #[tokio::test]
    async fn test_run_session_bad_header_reports_error() {
        let ctx = context(ServerConfig::default());
        let reader = tokio_test::io::Builder::new().read(b"GARBAGE\n").build();
        let writer = tokio_test::io::Builder::new()
            .write(b"ERROR: invalid packet: missing HEADER marker\n")
            .build();

        let result = run_session(reader, writer, peer(), Arc::clone(&ctx)).await;
        assert!(matches!(result, Err(ServerError::Frame(_))));
        assert_eq!(ctx.registry.count(), 0);
    }

    #[tokio::test]
    async fn test_run_session_capacity_rejection() {
        let ctx = context(ServerConfig::default().with_max_connections(0));
        let (mut client, handle) = spawn_session(&ctx);

        send(&mut client, &packet(1, connection_request_payload("B737"))).await;
        let reply = read_until(&mut client, "minutes.\n").await;
        assert_eq!(
            ConnectionReply::parse(&reply),
            Some(ConnectionReply::capacity_exceeded())
        );

        let result = tokio::time::timeout(TIMEOUT, handle).await.unwrap().unwrap();
        assert!(matches!(result, Err(ServerError::AdmissionDenied(_))));
    }

    #[tokio::test]
    async fn test_run_session_idle_timeout_frees_slot() {
        let config = ServerConfig::default().with_idle_timeout(Duration::from_millis(50));
        let ctx = context(config);
        let (mut client, handle) = spawn_session(&ctx);

        send(&mut client, &packet(1, connection_request_payload("B737"))).await;
        read_until(&mut client, "CONNECTION_ACCEPTED\n").await;

        let result = tokio::time::timeout(TIMEOUT, handle).await.unwrap().unwrap();
        assert!(matches!(result, Err(ServerError::IdleTimeout(_))));
        assert_eq!(ctx.registry.count(), 0);
    }

    const SHORT_PAYLOAD: &[u8] =
        b"HEADER\nSEQ_NUM=2\nTIMESTAMP=t\nPAYLOAD_SIZE=500\nEND_HEADER\nFLIGHT_PLAN\nFLIGHT_NUMBER=AC101\n";

    #[tokio::test]
    async fn test_run_session_short_payload_reported_at_idle_deadline() {
        let config = ServerConfig::default().with_idle_timeout(Duration::from_millis(200));
        let ctx = context(config);
        let (mut client, handle) = spawn_session(&ctx);

        send(&mut client, &packet(1, connection_request_payload("B737"))).await;
        read_until(&mut client, "CONNECTION_ACCEPTED\n").await;
        client.write_all(SHORT_PAYLOAD).await.unwrap();

        let reply = read_until(&mut client, "received 32\n").await;
        assert_eq!(
            reply,
            "ERROR: invalid packet: payload size mismatch: declared 500 bytes, received 32\n"
        );

        let result = tokio::time::timeout(TIMEOUT, handle).await.unwrap().unwrap();
        assert!(matches!(
            result,
            Err(ServerError::Frame(FrameError::PayloadSizeMismatch {
                declared: 500,
                actual: 32
            }))
        ));
        assert_eq!(ctx.registry.count(), 0);
    }

    #[tokio::test]
    async fn test_run_session_short_payload_from_atc_station() {
        let config = ServerConfig::default().with_frame_timeout(Duration::from_millis(200));
        let ctx = context(config);
        let (mut client, handle) = spawn_session(&ctx);

        send(&mut client, &packet(1, connection_request_payload("A777"))).await;
        read_until(&mut client, "CONNECTION_ACCEPTED\n").await;
        client.write_all(SHORT_PAYLOAD).await.unwrap();

        let reply = read_until(&mut client, "\n").await;
        assert!(reply.starts_with("ERROR: "), "got {reply:?}");

        let result = tokio::time::timeout(TIMEOUT, handle).await.unwrap().unwrap();
        assert!(matches!(result, Err(ServerError::Frame(_))));
        assert!(!ctx.registry.contains("A777"));
    }

    #[tokio::test]
    async fn test_run_session_idle_atc_station_stays_admitted() {
        let config = ServerConfig::default()
            .with_idle_timeout(Duration::from_millis(50))
            .with_frame_timeout(Duration::from_millis(50));
        let ctx = context(config);
        let (mut client, handle) = spawn_session(&ctx);

        send(&mut client, &packet(1, connection_request_payload("A777"))).await;
        read_until(&mut client, "CONNECTION_ACCEPTED\n").await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!handle.is_finished());
        assert!(ctx.registry.contains("A777"));

        drop(client);
        tokio::time::timeout(TIMEOUT, handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_session_peer_close_frees_slot() {
        let ctx = context(ServerConfig::default());
        let (mut client, handle) = spawn_session(&ctx);

        send(&mut client, &packet(1, connection_request_payload("A777"))).await;
        read_until(&mut client, "CONNECTION_ACCEPTED\n").await;
        assert_eq!(ctx.registry.count(), 1);
        drop(client);

        tokio::time::timeout(TIMEOUT, handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(ctx.registry.count(), 0);
    }
}
