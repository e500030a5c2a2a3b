//! Command Routing Module
//!
//! This module maps command names to handler functions that operate on the
//! host's state. It never touches that state itself: the router runs inside
//! the execution scheduler, which owns the state.
//!
//! ## Architecture
//!
//! ```text
//! Command { name, params }
//!       │
//!       ▼
//! ┌─────────────────┐   flags changed?   ┌──────────────────┐
//! │     Router      │ ─────────────────> │ CommandRegistry  │
//! │                 │ <───────────────── │   .build(flags)  │
//! │  cached table   │    CommandTable    └──────────────────┘
//! └────────┬────────┘
//!          │ lookup(name)
//!          ▼
//! ┌─────────────────┐
//! │ handler(state,  │ ──> Ok(value)  ──> { "status": "success", "result": value }
//! │         params) │ ──> Err(e)     ──> { "status": "error", "message": e }
//! └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `registry`: Handler registration and the frozen `CommandTable`
//! - `router`: Flag-aware dispatch with table caching
//! - `flags`: Feature flag snapshots and the `FlagSource` capability
//! - `params`: `HandlerError` and typed parameter projection

pub mod flags;
pub mod params;
pub mod registry;
pub mod router;

pub use flags::{FeatureFlags, FlagSource, SharedFlags};
pub use params::HandlerError;
pub use registry::{CommandRegistry, CommandTable, Handler};
pub use router::Router;
