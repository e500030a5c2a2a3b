//! TCP Listener
//!
//! Binds the listening socket, spawns one connection task per client and
//! manages their lifecycle.
//!
//! ## Shutdown
//!
//! `stop()` flips a `watch` channel that the accept loop and every
//! connection task select on, so nobody stays parked in `accept()` or
//! `read()`. The listening socket is closed straight away; connections then
//! get `join_timeout` to deliver the replies they still owe before they are
//! aborted. `stop()` returns once every connection task has finished or been
//! torn down. Tasks already handed to the scheduler always run to completion.

use crate::connection::{handle_connection, ConnectionStats};
use crate::protocol::FrameParser;
use crate::scheduler::SchedulerHandle;
use crate::server::config::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Pause after a failed `accept()` before trying again
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Errors from starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The address could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The bound socket could not report its address
    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// State kept while the accept loop is running.
struct Running {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

/// The listening side of the bridge.
pub struct Server {
    config: ServerConfig,
    scheduler: SchedulerHandle,
    stats: Arc<ConnectionStats>,
    running: Option<Running>,
}

impl Server {
    /// Creates a stopped server that will submit commands to `scheduler`.
    pub fn new(config: ServerConfig, scheduler: SchedulerHandle) -> Self {
        Self {
            config,
            scheduler,
            stats: Arc::new(ConnectionStats::new()),
            running: None,
        }
    }

    /// Starts listening on the configured host and port.
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        let host = self.config.host.clone();
        let port = self.config.port;
        self.start_on(&host, port).await
    }

    /// Binds `host:port` and begins accepting connections.
    ///
    /// Port `0` picks a free port; the bound address is returned. Calling
    /// this while already running logs a warning and returns the current
    /// address.
    pub async fn start_on(&mut self, host: &str, port: u16) -> Result<SocketAddr, ServerError> {
        if let Some(running) = &self.running {
            warn!(addr = %running.local_addr, "Server is already running");
            return Ok(running.local_addr);
        }

        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.scheduler.clone(),
            FrameParser::with_max_frame_size(self.config.max_frame_size),
            Arc::clone(&self.stats),
            self.config.join_timeout,
            shutdown_rx,
        ));

        info!(addr = %local_addr, "Server started");
        self.running = Some(Running {
            local_addr,
            shutdown_tx,
            accept_task,
        });
        Ok(local_addr)
    }

    /// Stops accepting, closes every connection and waits for them.
    ///
    /// Idempotent. Waiting is bounded by the configured join timeout; on
    /// timeout the remaining connection tasks are aborted and a warning is
    /// logged.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            debug!("Server is not running");
            return;
        };

        let _ = running.shutdown_tx.send(true);

        // The accept loop bounds its own wait on connections
        match running.accept_task.await {
            Ok(()) => info!(addr = %running.local_addr, "Server stopped"),
            Err(e) => warn!(error = %e, "Accept loop ended abnormally"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// The bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Connection statistics, shared across restarts.
    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            let _ = running.shutdown_tx.send(true);
        }
    }
}

/// Accepts clients until shutdown, then waits up to `join_timeout` for
/// their tasks before aborting the rest.
async fn accept_loop(
    listener: TcpListener,
    scheduler: SchedulerHandle,
    parser: FrameParser,
    stats: Arc<ConnectionStats>,
    join_timeout: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();
    let client_shutdown = shutdown_rx.clone();

    while !*shutdown_rx.borrow() {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
                    }
                    connections.spawn(handle_connection(
                        stream,
                        addr,
                        parser.clone(),
                        scheduler.clone(),
                        client_shutdown.clone(),
                        Arc::clone(&stats),
                    ));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
            result = shutdown_rx.changed() => {
                if result.is_err() {
                    break;
                }
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    // Close the listening socket before waiting on clients
    drop(listener);
    debug!(open = connections.len(), "Listener closed, waiting for connections");

    let drained = tokio::time::timeout(join_timeout, async {
        while let Some(result) = connections.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Connection task failed");
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            open = connections.len(),
            timeout_ms = join_timeout.as_millis() as u64,
            "Connections did not close in time, aborting them"
        );
        // Aborts every task and waits until each one has been dropped
        connections.shutdown().await;
    }
}
