//! Execution Scheduler Module
//!
//! All state-mutating work runs here, one task at a time, in the order the
//! tasks were submitted. This is how commands arriving concurrently on many
//! connections are serialized onto the single thread allowed to touch the
//! host's state.
//!
//! ## Example
//!
//! ```
//! use scenebridge::commands::{CommandRegistry, FeatureFlags, Router};
//! use scenebridge::protocol::{Command, Params, Response};
//! use scenebridge::scheduler::{Scheduler, Task};
//! use std::sync::Arc;
//!
//! let mut registry = CommandRegistry::new();
//! registry.register("count", |count: &mut u32, _: Params| {
//!     *count += 1;
//!     Ok(*count)
//! });
//! let router = Router::new(registry, Arc::new(FeatureFlags::new()));
//! let (mut scheduler, handle) = Scheduler::new(0u32, router);
//!
//! // Any thread may submit...
//! let (task, mut reply) = Task::with_channel(Command::named("count"));
//! handle.submit(task);
//!
//! // ...but only the owner runs the work.
//! assert_eq!(scheduler.run_pending(), 1);
//! assert_eq!(reply.try_recv().unwrap(), Response::success(serde_json::json!(1)));
//! ```

pub mod executor;
pub mod task;

pub use executor::{Scheduler, SchedulerError, SchedulerHandle, WorkerHandle, WORKER_THREAD_NAME};
pub use task::{Reply, Task};
