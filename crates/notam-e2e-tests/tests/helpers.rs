//! Test helpers for E2E tests.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use notam_advisory::{FlightEvaluator, NotamIndex, StaticWeatherSource, WeatherSource};
use notam_proto::message::CONNECTION_ACCEPTED;
use notam_proto::{
    connection_request_payload, decode, ConnectionReply, FlightLog, FlightPlan, Packet,
    PacketFramer,
};
use notam_server::{AdvisoryServer, ConnectionRegistry, ServerConfig};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default test timeout.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait before concluding that nothing will arrive.
pub const QUIET_PERIOD: Duration = Duration::from_millis(300);

/// NOTAM database used by every test server. Only the KBUF entry lies on
/// the CYYZ -> KJFK route.
pub const NOTAM_DATABASE: &str = "\
# id|fir|location|start|end|airspace|lat|lon|radius|description
A0001/25|CZYZ|XXXX|2504070000|2504302359|KBUF|42.94|-78.73|10|Restricted airspace over Buffalo
A0002/25|EGTT|EGLX|2504070000|2504302359|EGLX|51.47|-0.45|5|Crane near threshold
";

/// Find an available port for testing.
pub async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Install a test subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Flight plan for a route that crosses a NOTAM.
pub fn sample_plan(flight_id: &str) -> FlightPlan {
    FlightPlan {
        flight_id: flight_id.to_string(),
        departure_airport: "CYYZ".into(),
        arrival_airport: "KJFK".into(),
        aircraft_reg: "C-FJZS".into(),
        aircraft_type: "A321".into(),
        operator_name: "Air Canada".into(),
        route: "CYYZ KBUF KJFK".into(),
        cruise_altitude: 35000,
        speed: 450,
        etd: "2025-04-07T14:00:00Z".into(),
        eta: "2025-04-07T15:00:00Z".into(),
        ..FlightPlan::default()
    }
}

/// Flight log with enough fuel for [`sample_plan`].
pub fn sample_log(flight_id: &str) -> FlightLog {
    FlightLog {
        flight_id: flight_id.to_string(),
        total_flight_time: "01:00".into(),
        fuel_on_board: 6000,
        estimated_fuel_burn: 3000,
        total_weight: 70000,
        pic_name: "J. Smith".into(),
        remarks: "None".into(),
        ..FlightLog::default()
    }
}

/// Test server that manages its own lifecycle.
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<ConnectionRegistry>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
    _notam_file: NamedTempFile,
}

impl TestServer {
    /// Start a server with fair weather and default limits.
    pub async fn start() -> Self {
        Self::start_with(StaticWeatherSource::fair(), |config| config).await
    }

    /// Start a server with a custom weather source and configuration.
    pub async fn start_with<S, F>(weather: S, configure: F) -> Self
    where
        S: WeatherSource,
        F: FnOnce(ServerConfig) -> ServerConfig,
    {
        init_tracing();

        let mut notam_file = NamedTempFile::new().unwrap();
        notam_file.write_all(NOTAM_DATABASE.as_bytes()).unwrap();
        notam_file.flush().unwrap();

        let port = find_available_port().await;
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();

        let config = configure(
            ServerConfig::new(addr)
                .with_idle_timeout(Duration::from_secs(30))
                .with_broadcast_timeout(Duration::from_millis(500))
                .with_notam_file(notam_file.path()),
        );
        let notams = NotamIndex::load_from_file(&config.notam_file).unwrap();
        assert_eq!(notams.len(), 2);

        let mut server = AdvisoryServer::new(config, FlightEvaluator::new(notams, weather));
        let registry = server.registry();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(async move {
            tokio::select! {
                result = server.serve() => {
                    if let Err(e) = result {
                        eprintln!("Server error: {e}");
                    }
                }
                _ = shutdown_rx => {
                    // Graceful shutdown
                }
            }
        });

        // Give the server time to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            addr,
            registry,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            _notam_file: notam_file,
        }
    }

    /// Wait until the registry holds exactly `count` clients.
    pub async fn wait_for_clients(&self, count: usize) {
        timeout(TEST_TIMEOUT, async {
            while self.registry.count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {count} clients, registry holds {}",
                self.registry.count()
            )
        });
    }

    /// Shutdown the server.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = timeout(Duration::from_secs(5), handle).await;
        }
    }
}

/// Raw TCP station speaking the packet protocol.
pub struct TestStation {
    stream: TcpStream,
    framer: PacketFramer,
    buffer: Vec<u8>,
}

impl TestStation {
    /// Open a connection without requesting admission.
    pub async fn open(addr: SocketAddr) -> Result<Self, String> {
        let stream = timeout(TEST_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| "connect timed out".to_string())?
            .map_err(|e| format!("connect failed: {e}"))?;
        Ok(Self {
            stream,
            framer: PacketFramer::new(),
            buffer: Vec::new(),
        })
    }

    /// Open a connection and request admission as `client_id`.
    pub async fn connect(
        addr: SocketAddr,
        client_id: &str,
    ) -> Result<(Self, ConnectionReply), String> {
        let mut station = Self::open(addr).await?;
        station
            .send_payload(&connection_request_payload(client_id))
            .await?;
        let reply = station.read_connection_reply().await?;
        Ok((station, reply))
    }

    /// Connect and require admission.
    pub async fn admitted(addr: SocketAddr, client_id: &str) -> Result<Self, String> {
        match Self::connect(addr, client_id).await? {
            (station, ConnectionReply::Accepted) => Ok(station),
            (_, ConnectionReply::Rejected { reason }) => {
                Err(format!("{client_id} was rejected: {reason}"))
            }
        }
    }

    /// Frame and send a payload with the next sequence number.
    pub async fn send_payload(&mut self, payload: &str) -> Result<(), String> {
        let bytes = self.framer.encode(payload.to_string());
        self.send_raw(&bytes).await
    }

    /// Send a payload with an explicit sequence number.
    pub async fn send_packet(&mut self, sequence_number: u64, payload: &str) -> Result<(), String> {
        let packet = Packet::new(sequence_number, "2025-04-07T10:00:00Z", payload.to_string());
        self.send_raw(&packet.to_bytes()).await
    }

    /// Send bytes as they are.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), String> {
        self.stream
            .write_all(bytes)
            .await
            .map_err(|e| format!("send failed: {e}"))
    }

    /// Close the sending half of the connection.
    pub async fn finish_sending(&mut self) -> Result<(), String> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| format!("shutdown failed: {e}"))
    }

    async fn fill(&mut self) -> Result<usize, String> {
        let mut chunk = [0u8; 4096];
        let n = self
            .stream
            .read(&mut chunk)
            .await
            .map_err(|e| format!("read failed: {e}"))?;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    fn take_text(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        text
    }

    /// Read until the received text contains `needle`.
    pub async fn read_until(&mut self, needle: &str) -> Result<String, String> {
        timeout(TEST_TIMEOUT, async {
            while !String::from_utf8_lossy(&self.buffer).contains(needle) {
                if self.fill().await? == 0 {
                    return Err(format!(
                        "connection closed before {needle:?}; received {:?}",
                        String::from_utf8_lossy(&self.buffer)
                    ));
                }
            }
            Ok(self.take_text())
        })
        .await
        .map_err(|_| format!("timed out waiting for {needle:?}"))?
    }

    /// Read until the server closes the connection.
    pub async fn read_to_end(&mut self) -> Result<String, String> {
        timeout(TEST_TIMEOUT, async {
            while self.fill().await? > 0 {}
            Ok(self.take_text())
        })
        .await
        .map_err(|_| "timed out waiting for close".to_string())?
    }

    async fn read_connection_reply(&mut self) -> Result<ConnectionReply, String> {
        timeout(TEST_TIMEOUT, async {
            loop {
                if String::from_utf8_lossy(&self.buffer).contains(&format!("{CONNECTION_ACCEPTED}\n")) {
                    break;
                }
                if self.fill().await? == 0 {
                    break;
                }
            }
            Ok::<_, String>(())
        })
        .await
        .map_err(|_| "timed out waiting for admission reply".to_string())??;

        let text = self.take_text();
        ConnectionReply::parse(&text).ok_or_else(|| format!("unexpected reply: {text:?}"))
    }

    /// Send both halves of a submission and return the decision report.
    pub async fn submit(&mut self, plan: &FlightPlan, log: &FlightLog) -> Result<String, String> {
        self.send_payload(&plan.to_submission_payload()).await?;
        self.read_until("AWAITING=FLIGHT_LOG\n").await?;
        self.send_payload(&log.to_submission_payload()).await?;
        self.read_to_end().await
    }

    /// Wait for one framed broadcast packet.
    pub async fn recv_broadcast(&mut self) -> Result<Packet, String> {
        self.recv_broadcast_within(TEST_TIMEOUT)
            .await?
            .ok_or_else(|| "no broadcast received".to_string())
    }

    /// Wait up to `wait` for one framed broadcast packet.
    pub async fn recv_broadcast_within(&mut self, wait: Duration) -> Result<Option<Packet>, String> {
        let received = timeout(wait, async {
            loop {
                if !self.buffer.is_empty() {
                    if let Ok(packet) = decode(&self.buffer) {
                        self.buffer.clear();
                        return Ok(packet);
                    }
                }
                if self.fill().await? == 0 {
                    return Err("connection closed while waiting for broadcast".to_string());
                }
            }
        })
        .await;

        match received {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }
}
