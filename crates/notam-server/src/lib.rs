//! # notam-server
//!
//! TCP flight advisory server.
//!
//! Stations connect, ask to be admitted, then submit a flight plan and a
//! flight log as two framed packets. The completed submission runs through
//! the [`notam_advisory::FlightEvaluator`] pipeline and the report is sent
//! back. Accepted plans are rebroadcast to every connected ATC station.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   framed packets   ┌──────────────────────┐
//! │   station    │───────────────────►│   AdvisoryServer     │
//! │  (B737, ..)  │◄───── report ──────│                      │
//! └──────────────┘                    │  ┌────────────────┐  │
//!                                     │  │ ClientSession  │  │
//! ┌──────────────┐  framed broadcast  │  │  (per socket)  │  │
//! │ ATC station  │◄───────────────────│  └────────────────┘  │
//! │   (A777)     │                    │  ┌────────────────┐  │
//! └──────────────┘                    │  │ Connection-    │  │
//!                                     │  │   Registry     │  │
//!                                     │  └────────────────┘  │
//!                                     └──────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use notam_advisory::{FlightEvaluator, NotamIndex, StaticWeatherSource};
//! use notam_server::{AdvisoryServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default().with_max_connections(5);
//!     let notams = NotamIndex::load_or_empty(&config.notam_file);
//!     let evaluator = FlightEvaluator::new(notams, StaticWeatherSource::fair());
//!
//!     let mut server = AdvisoryServer::new(config, evaluator);
//!     server.serve().await.unwrap();
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broadcast;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod session;

// Re-export main types
pub use broadcast::{broadcast_plan, BroadcastReport};
pub use config::{
    ServerConfig, DEFAULT_ATC_PREFIX, DEFAULT_BROADCAST_TIMEOUT, DEFAULT_FRAME_TIMEOUT,
    DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_NOTAM_FILE, DEFAULT_OUTBOUND_CAPACITY,
    DEFAULT_PORT,
};
pub use error::{ServerError, ServerResult};
pub use registry::{
    outbound_channel, Admission, AdmissionError, ConnectionRegistry, OutboundReceiver,
    OutboundSender, PeerHandle,
};
pub use server::AdvisoryServer;
pub use session::{
    run_session, ClientSession, Inbound, Progress, Reassembly, SessionContext, SessionState,
};
