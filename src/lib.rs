//! # SceneBridge - A Command Execution Bridge for Single-Threaded Hosts
//!
//! SceneBridge lets external clients drive an application whose state may
//! only be touched from one thread. Clients send JSON commands over TCP; the
//! bridge parses them concurrently, funnels them onto a single owner thread
//! for execution and streams the JSON results back in request order.
//!
//! ## Features
//!
//! - **Streaming JSON framing**: Concatenated or newline-delimited documents,
//!   split at exact byte offsets, with a bounded frame size
//! - **Single-writer execution**: Every command runs on one owner thread, in
//!   submission order, so handlers never need locks
//! - **Feature-gated command groups**: Optional handler groups appear and
//!   disappear with runtime feature flags
//! - **Async I/O**: Built on Tokio, one task per client connection
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            SceneBridge                               │
//! │                                                                      │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────────────┐  │
//! │  │   Server    │───>│ Connection  │───>│   SchedulerHandle        │  │
//! │  │ (Listener)  │    │  Handler    │    │   submit(Task)           │  │
//! │  └─────────────┘    └──────┬──────┘    └────────────┬─────────────┘  │
//! │                            │                        │ FIFO queue     │
//! │  ┌─────────────┐           │ replies, in order      ▼                │
//! │  │    JSON     │<──────────┘           ┌──────────────────────────┐  │
//! │  │ FrameParser │                       │ Scheduler (owner thread) │  │
//! │  └─────────────┘                       │  Router ──> handler(S)   │  │
//! │                                        └──────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use scenebridge::commands::{CommandRegistry, FeatureFlags, Router};
//! use scenebridge::scheduler::Scheduler;
//! use scenebridge::server::{Server, ServerConfig};
//! use serde_json::Value;
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Counter {
//!     value: u64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut registry = CommandRegistry::new();
//!     registry.register("increment", |counter: &mut Counter, _params| {
//!         counter.value += 1;
//!         Ok(Value::from(counter.value))
//!     });
//!     let router = Router::new(registry, Arc::new(FeatureFlags::new()));
//!
//!     // The counter now belongs to the owner thread
//!     let (scheduler, handle) = Scheduler::new(Counter::default(), router);
//!     let worker = scheduler.spawn()?;
//!
//!     let mut server = Server::new(ServerConfig::default(), handle);
//!     server.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.stop().await;
//!
//!     drop(server);
//!     let counter = worker.join()?;
//!     println!("{} increments", counter.value);
//!     Ok(())
//! }
//! ```
//!
//! ## Wire Format
//!
//! Request: `{"type": "<command>", "params": { ... }}`
//!
//! Responses, one per request, each followed by `\n`:
//! - `{"status": "success", "result": <any JSON>}`
//! - `{"status": "error", "message": "<text>"}`
//!
//! ## Module Overview
//!
//! - [`protocol`]: Command/response types and the streaming JSON framer
//! - [`connection`]: Per-client read/dispatch/write handling
//! - [`scheduler`]: The single-writer execution queue
//! - [`commands`]: Handler registry, feature flags and the router
//! - [`server`]: The TCP listener and its configuration
//! - [`scene`]: An in-memory 3-D scene used as the demo host
//!
//! ## Design Highlights
//!
//! ### Ordered Replies Without Blocking Reads
//!
//! A connection keeps reading while its earlier commands wait on the owner
//! thread. Each submitted task hands back a oneshot receiver; a per-connection
//! writer task awaits those receivers in submission order, so replies leave
//! in request order no matter how long each command takes.
//!
//! ### Exactly One Reply
//!
//! A task's reply is an `FnOnce`. The scheduler fires it for every task it
//! dequeues, including ones whose handler failed or panicked, and a task
//! submitted after shutdown is answered on the spot.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod scene;
pub mod scheduler;
pub mod server;

// Re-export commonly used types for convenience
pub use commands::{CommandRegistry, FeatureFlags, FlagSource, HandlerError, Router, SharedFlags};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Command, FrameParser, ParseError, Response};
pub use scheduler::{Scheduler, SchedulerHandle, Task};
pub use server::{Server, ServerConfig, ServerError};

/// The default port SceneBridge listens on
pub const DEFAULT_PORT: u16 = 9876;

/// The default host SceneBridge binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of SceneBridge
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
