//! Admission control and the client address book.
//!
//! The registry is the only state shared between sessions. One
//! `parking_lot::Mutex` guards it and is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Outbound queue of a session. Bytes pushed here are written to its socket.
pub type OutboundSender = mpsc::Sender<Bytes>;

/// Receiving end of a session's outbound queue.
pub type OutboundReceiver = mpsc::Receiver<Bytes>;

/// Create a bounded outbound queue.
#[must_use]
pub fn outbound_channel(capacity: usize) -> (OutboundSender, OutboundReceiver) {
    mpsc::channel(capacity)
}

/// Address of an admitted client.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    client_id: String,
    session_id: Uuid,
    sender: OutboundSender,
}

impl PeerHandle {
    /// Create a handle.
    #[must_use]
    pub fn new(client_id: impl Into<String>, session_id: Uuid, sender: OutboundSender) -> Self {
        Self {
            client_id: client_id.into(),
            session_id,
            sender,
        }
    }

    /// The client identifier.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The owning session.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The session's outbound queue.
    #[must_use]
    pub const fn sender(&self) -> &OutboundSender {
        &self.sender
    }
}

/// Why a client was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// Every slot is taken.
    #[error("registry full ({max} clients)")]
    Full {
        /// Configured capacity.
        max: usize,
    },

    /// Another session holds this client id.
    #[error("client id {0} is already connected")]
    DuplicateClient(String),
}

/// Bounded map of admitted clients.
#[derive(Debug)]
pub struct ConnectionRegistry {
    max_connections: usize,
    peers: Mutex<HashMap<String, PeerHandle>>,
}

impl ConnectionRegistry {
    /// Create a registry with `max_connections` slots.
    #[must_use]
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections,
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// Configured capacity.
    #[must_use]
    pub const fn max_connections(&self) -> usize {
        self.max_connections
    }

    // ---- admission ----

    /// Insert `handle` if a slot is free and its id is unused.
    ///
    /// The registry is unchanged on error.
    pub fn try_admit(&self, handle: PeerHandle) -> Result<(), AdmissionError> {
        let mut peers = self.peers.lock();
        if peers.len() >= self.max_connections {
            return Err(AdmissionError::Full {
                max: self.max_connections,
            });
        }
        if peers.contains_key(&handle.client_id) {
            return Err(AdmissionError::DuplicateClient(handle.client_id));
        }
        debug!(client_id = %handle.client_id, count = peers.len() + 1, "Client admitted");
        peers.insert(handle.client_id.clone(), handle);
        Ok(())
    }

    /// Admit `handle` and return a guard that frees the slot when dropped.
    pub fn admit(self: &Arc<Self>, handle: PeerHandle) -> Result<Admission, AdmissionError> {
        let client_id = handle.client_id.clone();
        self.try_admit(handle)?;
        Ok(Admission {
            registry: Arc::clone(self),
            client_id,
        })
    }

    /// Remove a client. Returns whether it was present.
    pub fn remove(&self, client_id: &str) -> bool {
        let removed = self.peers.lock().remove(client_id).is_some();
        if removed {
            debug!(client_id = %client_id, "Client removed");
        }
        removed
    }

    /// Number of admitted clients.
    #[must_use]
    pub fn count(&self) -> usize {
        self.peers.lock().len()
    }

    // ---- lookup ----

    /// Snapshot of the handles whose client id starts with `prefix`.
    ///
    /// The lock is released before the caller sees the handles.
    #[must_use]
    pub fn peers_with_prefix(&self, prefix: &str) -> Vec<PeerHandle> {
        self.peers
            .lock()
            .values()
            .filter(|peer| peer.client_id.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Whether `client_id` is admitted.
    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        self.peers.lock().contains_key(client_id)
    }
}

/// A held registry slot. Dropping it removes the client.
#[derive(Debug)]
pub struct Admission {
    registry: Arc<ConnectionRegistry>,
    client_id: String,
}

impl Admission {
    /// The admitted client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.registry.remove(&self.client_id);
    }
}
