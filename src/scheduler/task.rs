//! Scheduled Tasks
//!
//! A [`Task`] pairs a command with the callback that delivers its response.
//! The callback is an `FnOnce`, so it can fire at most once; the scheduler
//! guarantees it fires at least once.

use crate::protocol::{Command, Response};
use std::fmt;
use tokio::sync::oneshot;

/// Callback that receives the response for one task.
pub type Reply = Box<dyn FnOnce(Response) + Send + 'static>;

/// A unit of work for the execution scheduler.
pub struct Task {
    command: Command,
    reply: Reply,
}

impl Task {
    /// Creates a task whose response is delivered to `reply`.
    pub fn new<F>(command: Command, reply: F) -> Self
    where
        F: FnOnce(Response) + Send + 'static,
    {
        Self {
            command,
            reply: Box::new(reply),
        }
    }

    /// Creates a task whose response is delivered on a oneshot channel.
    ///
    /// If the receiver has been dropped by the time the response is ready,
    /// the response is discarded.
    pub fn with_channel(command: Command) -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        let task = Self::new(command, move |response| {
            let _ = tx.send(response);
        });
        (task, rx)
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub(crate) fn into_parts(self) -> (Command, Reply) {
        (self.command, self.reply)
    }

    /// Answers the task without running it.
    pub(crate) fn reject(self, message: impl Into<String>) {
        (self.reply)(Response::error(message));
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("command", &self.command.name)
            .finish_non_exhaustive()
    }
}
