//! TCP advisory server.

use std::net::SocketAddr;
use std::sync::Arc;

use notam_advisory::{FlightEvaluator, WeatherSource};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::registry::ConnectionRegistry;
use crate::session::{run_session, SessionContext};

/// Flight advisory server accepting station connections over TCP.
#[derive(Debug)]
pub struct AdvisoryServer<S> {
    /// State shared with every session.
    context: Arc<SessionContext<S>>,
    /// Shutdown signal sender.
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl<S: WeatherSource> AdvisoryServer<S> {
    /// Create a server with the given configuration and decision pipeline.
    #[must_use]
    pub fn new(config: ServerConfig, evaluator: FlightEvaluator<S>) -> Self {
        Self {
            context: Arc::new(SessionContext::new(config, evaluator)),
            shutdown_tx: None,
        }
    }

    /// Get the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Get access to the client registry.
    #[must_use]
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.context.registry)
    }

    /// Bind the configured address and serve until shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails.
    pub async fn serve(&mut self) -> ServerResult<()> {
        let addr = self.context.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(addr, e))?;
        self.serve_listener(listener).await
    }

    /// Serve connections from an already bound listener until shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener address cannot be read.
    pub async fn serve_listener(&mut self, listener: TcpListener) -> ServerResult<()> {
        let local_addr = listener.local_addr()?;
        info!(
            addr = %local_addr,
            max_connections = self.context.config.max_connections,
            notams = self.context.evaluator.notams().len(),
            "Advisory server listening"
        );

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => self.handle_connection(stream, peer_addr),
                        Err(e) => warn!(error = %e, "Failed to accept connection"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!("Advisory server shutting down");
        Ok(())
    }

    /// Spawn the session task for a new connection.
    fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) {
        debug!(peer = %peer_addr, "New connection");
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer_addr, error = %e, "Could not disable Nagle");
        }

        let context = Arc::clone(&self.context);
        tokio::spawn(async move {
            let (reader, writer) = stream.into_split();
            match run_session(reader, writer, peer_addr, context).await {
                Ok(()) => debug!(peer = %peer_addr, "Connection closed normally"),
                Err(e) => debug!(peer = %peer_addr, error = %e, "Connection ended with error"),
            }
        });
    }

    /// Trigger server shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown signal cannot be sent.
    pub async fn shutdown(&self) -> ServerResult<()> {
        if let Some(tx) = &self.shutdown_tx {
            tx.send(())
                .await
                .map_err(|e| ServerError::Internal(e.to_string()))?;
        }
        Ok(())
    }
}
