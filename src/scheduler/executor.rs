//! Single-Writer Execution Scheduler
//!
//! The scheduler owns the host state and the command router. Connection
//! handlers never touch either; they hand tasks over through a
//! [`SchedulerHandle`], which only appends to a queue and returns.
//!
//! ```text
//!  conn A ──submit──┐
//!  conn B ──submit──┼──> [ unbounded FIFO queue ] ──> worker: one task at a time
//!  conn C ──submit──┘                                   │
//!                                                       ├─ router.dispatch(&mut state, cmd)
//!                                                       └─ reply(response)
//! ```
//!
//! The worker runs on exactly one thread at a time: either a dedicated
//! thread started with [`Scheduler::spawn`], or the host's own thread via
//! [`Scheduler::run`] / [`Scheduler::run_pending`].
//!
//! Handler panics are caught at this boundary and turned into error
//! responses, so a failing task never silently drops its reply or halts the
//! queue.

use crate::commands::Router;
use crate::protocol::{Command, Response};
use crate::scheduler::task::Task;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};

/// Name of the dedicated worker thread
pub const WORKER_THREAD_NAME: &str = "owner";

/// Message sent back when a task reaches a scheduler that has shut down
const NOT_RUNNING: &str = "Execution scheduler is not running";

/// Errors from the scheduler's worker thread.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The worker thread could not be started
    #[error("failed to spawn scheduler worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// The worker thread panicked outside of a handler
    #[error("scheduler worker panicked")]
    WorkerPanicked,
}

/// The cloneable, thread-safe submission side of the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Task>,
}

impl SchedulerHandle {
    /// Queues a task and returns immediately.
    ///
    /// If the worker has already shut down the task is answered on the spot
    /// with an error response, so its reply still fires exactly once.
    pub fn submit(&self, task: Task) {
        if let Err(mpsc::error::SendError(task)) = self.tx.send(task) {
            warn!(command = %task.command().name, "Task submitted after scheduler shutdown");
            task.reject(NOT_RUNNING);
        }
    }

    /// Submits a command and waits for its response.
    pub async fn execute(&self, command: Command) -> Response {
        let (task, rx) = Task::with_channel(command);
        self.submit(task);
        rx.await
            .unwrap_or_else(|_| Response::error("Task was dropped before it produced a response"))
    }

    /// Returns true once the worker has stopped accepting tasks.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The consuming side: owns the host state and the router.
pub struct Scheduler<S> {
    state: S,
    router: Router<S>,
    rx: mpsc::UnboundedReceiver<Task>,
    executed: u64,
}

impl<S: Send + 'static> Scheduler<S> {
    /// Creates a scheduler owning `state`, plus the handle used to feed it.
    ///
    /// The worker stops once every handle has been dropped and the queue is
    /// empty.
    pub fn new(state: S, router: Router<S>) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            state,
            router,
            rx,
            executed: 0,
        };
        (scheduler, SchedulerHandle { tx })
    }

    /// Drains the queue on the current thread until every handle is gone.
    ///
    /// Blocks between tasks, so it must not be called from inside an async
    /// runtime. Returns the host state once the queue is closed and empty.
    pub fn run(mut self) -> S {
        info!("Execution scheduler started");
        while let Some(task) = self.rx.blocking_recv() {
            self.execute(task);
        }
        info!(executed = self.executed, "Execution scheduler stopped");
        self.state
    }

    /// Runs every task currently queued without blocking.
    ///
    /// Meant for hosts that own a main loop and call this once per tick.
    /// Returns the number of tasks executed.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    self.execute(task);
                    count += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        count
    }

    /// Starts the worker loop on a dedicated thread.
    pub fn spawn(self) -> Result<WorkerHandle<S>, SchedulerError> {
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || self.run())?;
        Ok(WorkerHandle { handle })
    }

    /// Read access to the host state from the owner thread.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Total number of tasks executed so far.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Executes one task and fires its reply.
    fn execute(&mut self, task: Task) {
        let (command, reply) = task.into_parts();
        let name = command.name.clone();
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.router.dispatch(&mut self.state, command)
        }));

        let response = match outcome {
            Ok(response) => response,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(command = %name, panic = %message, "Handler panicked");
                Response::error(format!("Handler panicked: {}", message))
            }
        };

        self.executed += 1;
        debug!(
            command = %name,
            success = response.is_success(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Executed command"
        );

        if panic::catch_unwind(AssertUnwindSafe(|| reply(response))).is_err() {
            error!(command = %name, "Reply callback panicked");
        }
    }
}

/// Join handle for a worker started with [`Scheduler::spawn`].
#[derive(Debug)]
pub struct WorkerHandle<S> {
    handle: thread::JoinHandle<S>,
}

impl<S> WorkerHandle<S> {
    /// Waits for the worker to drain its queue and stop.
    ///
    /// The worker only stops after every [`SchedulerHandle`] is dropped.
    pub fn join(self) -> Result<S, SchedulerError> {
        self.handle.join().map_err(|_| SchedulerError::WorkerPanicked)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandRegistry, FeatureFlags, HandlerError};
    use crate::protocol::Params;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    /// Host state whose increment is deliberately non-atomic.
    #[derive(Debug, Default)]
    struct Counter {
        value: u64,
        order: Vec<String>,
    }

    fn router() -> Router<Counter> {
        let mut registry = CommandRegistry::new();
        registry
            .register("increment", |counter: &mut Counter, _: Params| {
                let read = counter.value;
                thread::yield_now();
                counter.value = read + 1;
                Ok(counter.value)
            })
            .register("mark", |counter: &mut Counter, params: Params| {
                let label = params
                    .get("label")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                counter.order.push(label.clone());
                Ok(label)
            })
            .register("fail", |_: &mut Counter, _: Params| -> Result<(), HandlerError> {
                Err(HandlerError::failed("handler exploded"))
            })
            .register("panic", |_: &mut Counter, _: Params| -> Result<(), HandlerError> {
                panic!("boom")
            });
        Router::new(registry, Arc::new(FeatureFlags::new()))
    }

    fn mark(label: &str) -> Command {
        Command::new("mark", json!({"label": label}).as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_execute_round_trip() {
        let (scheduler, handle) = Scheduler::new(Counter::default(), router());
        let worker = scheduler.spawn().unwrap();

        let response = handle.execute(Command::named("increment")).await;
        assert_eq!(response, Response::success(json!(1)));

        drop(handle);
        let state = tokio::task::spawn_blocking(move || worker.join().unwrap())
            .await
            .unwrap();
        assert_eq!(state.value, 1);
    }

    #[tokio::test]
    async fn test_unknown_command_then_valid_command() {
        let (scheduler, handle) = Scheduler::new(Counter::default(), router());
        let _worker = scheduler.spawn().unwrap();

        let response = handle.execute(Command::named("does_not_exist")).await;
        assert_eq!(
            response,
            Response::error("Unknown command type: does_not_exist")
        );

        let response = handle.execute(Command::named("increment")).await;
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_failures_do_not_halt_queue() {
        let (scheduler, handle) = Scheduler::new(Counter::default(), router());
        let _worker = scheduler.spawn().unwrap();

        let response = handle.execute(Command::named("fail")).await;
        assert_eq!(response, Response::error("handler exploded"));

        let response = handle.execute(Command::named("panic")).await;
        assert_eq!(response, Response::error("Handler panicked: boom"));

        let response = handle.execute(Command::named("increment")).await;
        assert_eq!(response, Response::success(json!(1)));
    }

    #[test]
    fn test_concurrent_submitters_never_lose_updates() {
        let (scheduler, handle) = Scheduler::new(Counter::default(), router());
        let worker = scheduler.spawn().unwrap();

        let submitters: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        handle.submit(Task::new(Command::named("increment"), |_| {}));
                    }
                })
            })
            .collect();
        for submitter in submitters {
            submitter.join().unwrap();
        }

        drop(handle);
        let state = worker.join().unwrap();
        assert_eq!(state.value, 2000);
    }

    #[test]
    fn test_fifo_order_and_single_reply() {
        let (mut scheduler, handle) = Scheduler::new(Counter::default(), router());
        let replies = Arc::new(std::sync::Mutex::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let replies = Arc::clone(&replies);
            handle.submit(Task::new(mark(label), move |response| {
                replies.lock().unwrap().push(response);
            }));
        }

        assert_eq!(scheduler.run_pending(), 3);
        assert_eq!(scheduler.run_pending(), 0);
        assert_eq!(scheduler.state().order, vec!["a", "b", "c"]);
        assert_eq!(scheduler.executed(), 3);
        assert_eq!(
            *replies.lock().unwrap(),
            vec![
                Response::success(json!("a")),
                Response::success(json!("b")),
                Response::success(json!("c")),
            ]
        );
    }

    #[test]
    fn test_queued_tasks_finish_after_handles_drop() {
        let (scheduler, handle) = Scheduler::new(Counter::default(), router());
        for _ in 0..5 {
            handle.submit(Task::new(Command::named("increment"), |_| {}));
        }
        drop(handle);

        let state = scheduler.run();
        assert_eq!(state.value, 5);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_replies_with_error() {
        let (scheduler, handle) = Scheduler::new(Counter::default(), router());
        drop(scheduler);
        assert!(handle.is_closed());

        let response = tokio::time::timeout(
            Duration::from_secs(1),
            handle.execute(Command::named("increment")),
        )
        .await
        .unwrap();
        assert_eq!(response, Response::error(NOT_RUNNING));
    }
}
