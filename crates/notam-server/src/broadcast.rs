//! Rebroadcast of accepted flight plans to ATC stations.

use std::time::Duration;

use futures::future::join_all;
use notam_proto::{FlightPlan, PacketFramer};
use tracing::{debug, info, warn};

use crate::registry::ConnectionRegistry;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers whose queue accepted the packet.
    pub delivered: usize,
    /// Peers that were gone or too slow.
    pub failed: usize,
}

/// Frame `plan` once and queue it for every ATC peer except `submitter`.
///
/// The peer list is a snapshot, so the registry lock is not held while
/// sending. Each send has its own deadline and a failed peer is skipped.
pub async fn broadcast_plan(
    registry: &ConnectionRegistry,
    framer: &PacketFramer,
    plan: &FlightPlan,
    atc_prefix: &str,
    submitter: &str,
    send_timeout: Duration,
) -> BroadcastReport {
    let peers: Vec<_> = registry
        .peers_with_prefix(atc_prefix)
        .into_iter()
        .filter(|peer| peer.client_id() != submitter)
        .collect();

    if peers.is_empty() {
        debug!(flight_id = %plan.flight_id, "No ATC stations to notify");
        return BroadcastReport::default();
    }

    let packet = framer.encode(plan.to_broadcast_payload());

    let outcomes = join_all(peers.iter().map(|peer| {
        let packet = packet.clone();
        async move {
            match tokio::time::timeout(send_timeout, peer.sender().send(packet)).await {
                Ok(Ok(())) => true,
                Ok(Err(_)) => {
                    warn!(client_id = %peer.client_id(), "Broadcast skipped: session closed");
                    false
                }
                Err(_) => {
                    warn!(
                        client_id = %peer.client_id(),
                        timeout_ms = send_timeout.as_millis(),
                        "Broadcast skipped: send timed out"
                    );
                    false
                }
            }
        }
    }))
    .await;

    let delivered = outcomes.iter().filter(|ok| **ok).count();
    let report = BroadcastReport {
        delivered,
        failed: outcomes.len() - delivered,
    };
    info!(
        flight_id = %plan.flight_id,
        delivered = report.delivered,
        failed = report.failed,
        "Flight plan broadcast"
    );
    report
}
