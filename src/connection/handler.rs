//! Connection Handler Module
//!
//! This module handles individual client connections to the bridge.
//! Each client gets its own reader task that runs in a loop, framing
//! commands and handing them to the execution scheduler, plus a writer task
//! that sends the responses back in order.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned (Connected)
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │  Reading
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Frame JSON documents    │ │  Dispatching (once per document)
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Submit task + queue the │ │
//!    │  │ reply for the writer    │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / I/O error / server stop (Closing)
//!        │
//!        ▼
//! 5. Writer flushes outstanding replies, socket released (Closed)
//! ```
//!
//! ## Buffer Management
//!
//! We use a BytesMut buffer to accumulate incoming data. TCP is a stream
//! protocol, so one read may hold half a command or several commands.
//! Extraction removes exactly the bytes of the document that was parsed.
//!
//! ## Ordering
//!
//! The reader never waits for the scheduler. For every command it pushes the
//! receiving end of the reply channel onto a per-connection FIFO; the writer
//! awaits those in order, so responses go out in the order the commands
//! arrived even when tasks from other connections are interleaved.

use crate::protocol::{leading_whitespace, Command, FrameParser, ParseError, Response};
use crate::scheduler::{SchedulerHandle, Task};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 8192;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands framed and submitted
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// A response that will be written once it is ready.
type PendingReply = oneshot::Receiver<Response>;

/// Counts a connection as active until dropped.
///
/// Held by the handler, so a connection task that is aborted still leaves
/// the statistics consistent.
struct ActiveConnection {
    stats: Arc<ConnectionStats>,
}

impl ActiveConnection {
    fn open(stats: Arc<ConnectionStats>) -> Self {
        stats.connection_opened();
        Self { stats }
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.stats.connection_closed();
    }
}

/// The writer task, aborted if the handler goes away without awaiting it.
struct WriterTask(JoinHandle<()>);

impl Drop for WriterTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handles a single client connection.
///
/// This struct owns the read half of the socket, the receive buffer and the
/// queue of replies still owed to the client.
pub struct ConnectionHandler<T> {
    /// Read half of the client stream
    reader: ReadHalf<T>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Document framer
    parser: FrameParser,

    /// Where commands are executed
    scheduler: SchedulerHandle,

    /// Replies in command order, consumed by the writer task
    replies: mpsc::UnboundedSender<PendingReply>,

    /// Writer task draining `replies`
    writer: WriterTask,

    /// Server shutdown signal
    shutdown: watch::Receiver<bool>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    /// Keeps this connection counted as active
    active: ActiveConnection,
}

impl<T> ConnectionHandler<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Creates a new connection handler and starts its writer task.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client stream
    /// * `addr` - The client's socket address
    /// * `parser` - The framer, carrying the maximum frame size
    /// * `scheduler` - Handle used to submit commands for execution
    /// * `shutdown` - Flips to `true` when the server stops
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: T,
        addr: SocketAddr,
        parser: FrameParser,
        scheduler: SchedulerHandle,
        shutdown: watch::Receiver<bool>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        let active = ActiveConnection::open(Arc::clone(&stats));

        let (reader, writer) = tokio::io::split(stream);
        let (replies, pending) = mpsc::unbounded_channel();
        let writer = WriterTask(tokio::spawn(write_loop(
            writer,
            pending,
            addr,
            Arc::clone(&stats),
        )));

        Self {
            reader,
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            parser,
            scheduler,
            replies,
            writer,
            shutdown,
            stats,
            active,
        }
    }

    /// Runs the connection until the client leaves or the server stops.
    ///
    /// Commands already submitted still get their responses written before
    /// the socket is released.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Connection closed by server"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        // Closing: no more commands, let the writer deliver what is owed.
        let Self {
            replies,
            mut writer,
            addr,
            active,
            ..
        } = self;
        drop(replies);
        if let Err(e) = (&mut writer.0).await {
            warn!(client = %addr, error = %e, "Writer task failed");
        }

        drop(active);
        result
    }

    /// The read-frame-submit loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Dispatch every complete document already buffered
            while let Some(value) = self.try_parse_frame()? {
                self.dispatch(value);
            }

            // Need more data - read from the socket
            if !self.read_more_data().await? {
                return Ok(());
            }
        }
    }

    /// Attempts to extract one document from the buffer.
    fn try_parse_frame(&mut self) -> Result<Option<serde_json::Value>, ConnectionError> {
        // Blank input between documents is dropped so it never counts
        // toward the frame limit
        let blank = leading_whitespace(&self.buffer);
        if blank > 0 {
            let _ = self.buffer.split_to(blank);
        }
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer) {
            Ok(Some((value, consumed))) => {
                // Successfully framed a document - consume exactly its bytes
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Framed document"
                );
                Ok(Some(value))
            }
            Ok(None) => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete document, need more data"
                );
                Ok(None)
            }
            Err(e) => {
                // The buffer cannot be resynchronised; answer and close
                warn!(client = %self.addr, error = %e, "Framing error");
                self.reply_now(Response::error(e.to_string()));
                self.buffer.clear();
                Err(ConnectionError::from(e))
            }
        }
    }

    /// Turns one framed document into a scheduled task.
    fn dispatch(&mut self, value: serde_json::Value) {
        self.stats.command_processed();

        let command = match Command::from_value(value) {
            Ok(command) => command,
            Err(e) => {
                debug!(client = %self.addr, error = %e, "Rejected document");
                self.reply_now(Response::error(e.to_string()));
                return;
            }
        };

        debug!(client = %self.addr, command = %command.name, "Submitting command");
        let (task, rx) = Task::with_channel(command);
        self.scheduler.submit(task);
        self.enqueue(rx);
    }

    /// Queues a response that needs no execution.
    fn reply_now(&mut self, response: Response) {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(response);
        self.enqueue(rx);
    }

    fn enqueue(&mut self, rx: PendingReply) {
        // Only fails once the writer has exited, which means the socket is gone.
        if self.replies.send(rx).is_err() {
            trace!(client = %self.addr, "Writer gone, dropping reply");
        }
    }

    /// Reads more data from the socket into the buffer.
    ///
    /// Returns `false` when the server is stopping.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        if *self.shutdown.borrow() {
            return Ok(false);
        }

        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = tokio::select! {
            read = self.reader.read_buf(&mut self.buffer) => read?,
            _ = self.shutdown.changed() => {
                debug!(client = %self.addr, "Server stopping, closing connection");
                return Ok(false);
            }
        };

        if n == 0 {
            // Connection closed by client
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial document in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(true)
    }
}

/// Writes replies in command order until the reply queue closes.
///
/// A write failure means the peer is gone. It is logged once and the
/// remaining replies are drained without writing, so every task still
/// completes normally on the scheduler side.
async fn write_loop<W>(
    mut writer: WriteHalf<W>,
    mut pending: mpsc::UnboundedReceiver<PendingReply>,
    addr: SocketAddr,
    stats: Arc<ConnectionStats>,
) where
    W: AsyncWrite,
{
    let mut broken = false;

    while let Some(rx) = pending.recv().await {
        let response = rx.await.unwrap_or_else(|_| {
            Response::error("Task was dropped before it produced a response")
        });
        if broken {
            continue;
        }

        let bytes = response.serialize();
        let written = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                stats.bytes_written(bytes.len());
                trace!(client = %addr, bytes = bytes.len(), "Sent response");
            }
            Err(e) => {
                debug!(client = %addr, error = %e, "Failed to send response - client disconnected");
                broken = true;
            }
        }
    }

    if !broken {
        let _ = writer.shutdown().await;
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The buffered bytes are not valid JSON
    #[error("Framing error: {0}")]
    InvalidFrame(String),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial document)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded: {size} bytes (max: {max})")]
    BufferFull { size: usize, max: usize },
}

impl From<ParseError> for ConnectionError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::InvalidJson(detail) => ConnectionError::InvalidFrame(detail),
            ParseError::MessageTooLarge { size, max } => ConnectionError::BufferFull { size, max },
        }
    }
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
///
/// # Arguments
///
/// * `stream` - The client stream
/// * `addr` - The client's socket address
/// * `parser` - The framer, carrying the maximum frame size
/// * `scheduler` - Handle used to submit commands for execution
/// * `shutdown` - Flips to `true` when the server stops
/// * `stats` - Shared connection statistics
pub async fn handle_connection<T>(
    stream: T,
    addr: SocketAddr,
    parser: FrameParser,
    scheduler: SchedulerHandle,
    shutdown: watch::Receiver<bool>,
    stats: Arc<ConnectionStats>,
) where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let handler = ConnectionHandler::new(stream, addr, parser, scheduler, shutdown, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandRegistry, FeatureFlags, HandlerError, Router};
    use crate::protocol::Params;
    use crate::scheduler::{Scheduler, WorkerHandle};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::net::{TcpListener, TcpStream};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn start_scheduler() -> (SchedulerHandle, WorkerHandle<Vec<String>>) {
        let mut registry = CommandRegistry::new();
        registry
            .register("echo_handler", |_: &mut Vec<String>, params: Params| {
                Ok(Value::Object(params))
            })
            .register("log", |log: &mut Vec<String>, params: Params| {
                let text = params
                    .get("text")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| HandlerError::InvalidParams("'text' is required".into()))?;
                log.push(text.to_string());
                Ok(log.len())
            })
            .register("slow", |_: &mut Vec<String>, _: Params| {
                std::thread::sleep(Duration::from_millis(50));
                Ok("done")
            });
        let router = Router::new(registry, Arc::new(FeatureFlags::new()));
        let (scheduler, handle) = Scheduler::new(Vec::new(), router);
        (handle, scheduler.spawn().unwrap())
    }

    fn spawn_duplex(
        scheduler: SchedulerHandle,
    ) -> (DuplexStream, watch::Sender<bool>, Arc<ConnectionStats>, JoinHandle<()>) {
        let (client, server) = tokio::io::duplex(4096);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(ConnectionStats::new());
        let task = tokio::spawn(handle_connection(
            server,
            test_addr(),
            FrameParser::new(),
            scheduler,
            shutdown_rx,
            Arc::clone(&stats),
        ));
        (client, shutdown_tx, stats, task)
    }

    /// Reads newline-terminated responses until `count` have arrived.
    async fn read_responses<R: AsyncRead + Unpin>(client: &mut R, count: usize) -> Vec<Response> {
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        while raw.iter().filter(|b| **b == b'\n').count() < count {
            let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
                .await
                .expect("timed out waiting for responses")
                .unwrap();
            assert!(n > 0, "connection closed early");
            raw.extend_from_slice(&buf[..n]);
        }
        raw.split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_echo_over_tcp() {
        let (scheduler, _worker) = start_scheduler();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                tokio::spawn(handle_connection(
                    stream,
                    client_addr,
                    FrameParser::new(),
                    scheduler.clone(),
                    shutdown_rx.clone(),
                    Arc::new(ConnectionStats::new()),
                ));
            }
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(br#"{"type":"echo_handler","params":{"x":1}}"#)
            .await
            .unwrap();

        let mut buf = [0u8; 128];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(
            &buf[..n],
            b"{\"status\":\"success\",\"result\":{\"x\":1}}\n"
        );
    }

    #[tokio::test]
    async fn test_two_documents_in_one_write() {
        let (scheduler, _worker) = start_scheduler();
        let (mut client, _shutdown, _stats, _task) = spawn_duplex(scheduler);

        client
            .write_all(br#"{"type":"log","params":{"text":"first"}}{"type":"log","params":{"text":"second"}}"#)
            .await
            .unwrap();

        let responses = read_responses(&mut client, 2).await;
        assert_eq!(
            responses,
            vec![Response::success(json!(1)), Response::success(json!(2))]
        );
    }

    #[tokio::test]
    async fn test_byte_by_byte_write_yields_one_response() {
        let (scheduler, _worker) = start_scheduler();
        let (mut client, _shutdown, _stats, _task) = spawn_duplex(scheduler);

        let request = br#"{"type":"echo_handler","params":{"msg":"hi"}}"#;
        let (last, prefix) = request.split_last().unwrap();
        for byte in prefix {
            client.write_all(&[*byte]).await.unwrap();
            tokio::task::yield_now().await;
        }

        // Nothing may arrive before the document is complete
        let mut buf = [0u8; 64];
        let early = tokio::time::timeout(Duration::from_millis(100), client.read(&mut buf)).await;
        assert!(early.is_err(), "response sent before the document was complete");

        client.write_all(&[*last]).await.unwrap();
        let responses = read_responses(&mut client, 1).await;
        assert_eq!(responses, vec![Response::success(json!({"msg": "hi"}))]);
    }

    #[tokio::test]
    async fn test_replies_keep_receipt_order() {
        let (scheduler, _worker) = start_scheduler();
        let (mut client, _shutdown, _stats, _task) = spawn_duplex(scheduler);

        client
            .write_all(
                b"{\"type\":\"slow\"}\n{\"type\":\"nope\"}\n[1,2]\n{\"type\":\"echo_handler\",\"params\":{\"n\":3}}\n",
            )
            .await
            .unwrap();

        let responses = read_responses(&mut client, 4).await;
        assert_eq!(
            responses,
            vec![
                Response::success(json!("done")),
                Response::error("Unknown command type: nope"),
                Response::error("Invalid command: expected a JSON object, got array"),
                Response::success(json!({"n": 3})),
            ]
        );
    }

    #[tokio::test]
    async fn test_handler_error_keeps_connection_open() {
        let (scheduler, _worker) = start_scheduler();
        let (mut client, _shutdown, _stats, _task) = spawn_duplex(scheduler);

        client.write_all(br#"{"type":"log","params":{}}"#).await.unwrap();
        let responses = read_responses(&mut client, 1).await;
        assert_eq!(
            responses,
            vec![Response::error("Invalid parameters: 'text' is required")]
        );

        client
            .write_all(br#"{"type":"log","params":{"text":"after"}}"#)
            .await
            .unwrap();
        let responses = read_responses(&mut client, 1).await;
        assert_eq!(responses, vec![Response::success(json!(1))]);
    }

    #[tokio::test]
    async fn test_invalid_json_replies_then_closes() {
        let (scheduler, _worker) = start_scheduler();
        let (mut client, _shutdown, stats, task) = spawn_duplex(scheduler);

        client
            .write_all(b"{\"type\":\"echo_handler\"} {\"type\" oops}")
            .await
            .unwrap();

        let responses = read_responses(&mut client, 2).await;
        assert_eq!(responses[0], Response::success(json!({})));
        match &responses[1] {
            Response::Error { message } => assert!(message.starts_with("Invalid JSON:")),
            other => panic!("expected an error response, got {:?}", other),
        }

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_oversized_frame_closes_connection() {
        let (scheduler, _worker) = start_scheduler();
        let (mut client, server) = tokio::io::duplex(4096);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(handle_connection(
            server,
            test_addr(),
            FrameParser::with_max_frame_size(32),
            scheduler,
            shutdown_rx,
            Arc::new(ConnectionStats::new()),
        ));

        client
            .write_all(br#"{"type":"echo_handler","params":{"blob":"aaaaaaaaaaaaaaaaaaaa"#)
            .await
            .unwrap();

        let responses = read_responses(&mut client, 1).await;
        assert!(!responses[0].is_success());
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_blank_input_does_not_count_toward_frame_limit() {
        let (scheduler, _worker) = start_scheduler();
        let (mut client, server) = tokio::io::duplex(4096);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(handle_connection(
            server,
            test_addr(),
            FrameParser::with_max_frame_size(32),
            scheduler,
            shutdown_rx,
            Arc::new(ConnectionStats::new()),
        ));

        let blank = b" \n".repeat(512);
        for _ in 0..1024 {
            client.write_all(&blank).await.unwrap();
        }

        // A partial document after the flood still fits under the limit
        client.write_all(br#"{"type":"echo_"#).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());
        client.write_all(br#"handler"}"#).await.unwrap();

        let responses = read_responses(&mut client, 1).await;
        assert_eq!(responses, vec![Response::success(json!({}))]);
        assert!(!task.is_finished());
    }

    #[tokio::test]
    async fn test_aborted_connection_is_no_longer_active() {
        let (scheduler, _worker) = start_scheduler();
        let (mut client, _shutdown, stats, task) = spawn_duplex(scheduler);

        client.write_all(br#"{"type":"slow"}"#).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        // The writer goes with it, so the client sees the stream end
        let mut buf = [0u8; 64];
        let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_shutdown_signal_ends_connection() {
        let (scheduler, _worker) = start_scheduler();
        let (mut client, shutdown, stats, task) = spawn_duplex(scheduler);

        client.write_all(br#"{"type":"slow"}"#).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.send(true).unwrap();

        // The in-flight command still gets its response
        let responses = read_responses(&mut client, 1).await;
        assert_eq!(responses, vec![Response::success(json!("done"))]);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);
    }

    #[tokio::test]
    async fn test_client_disconnect_mid_task_is_swallowed() {
        let (scheduler, _worker) = start_scheduler();
        let (mut client, _shutdown, stats, task) = spawn_duplex(scheduler.clone());

        client.write_all(br#"{"type":"slow"}"#).await.unwrap();
        drop(client);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        // The scheduler is unaffected
        let response = scheduler.execute(Command::named("echo_handler")).await;
        assert!(response.is_success());
    }
}
