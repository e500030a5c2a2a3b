//! Connection Handler Module
//!
//! This module manages individual client connections to the bridge.
//! Each client connection is handled by its own async task, so a slow or
//! silent client never holds up any other.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Listener                                │
//! │                (server module)                              │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read bytes  │───>│ Frame JSON  │───>│ Submit task │──┐   │
//! │  └─────────────┘    └─────────────┘    └─────────────┘  │   │
//! │                                                         │   │
//! │                 ┌──────────────┐   replies, in order    │   │
//! │                 │ Writer task  │<───────────────────────┘   │
//! │                 └──────────────┘                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Async I/O**: Uses Tokio for non-blocking network operations
//! - **Buffer Management**: BytesMut buffer, exactly the consumed bytes are removed
//! - **Pipelining**: Several documents in one TCP packet are answered in order
//! - **Statistics**: Tracks connection and command metrics

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
