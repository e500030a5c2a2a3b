//! Command Router
//!
//! Maps a command name to its handler, consulting the feature flags to
//! decide which names are currently valid. The router caches the table built
//! for the last flag snapshot it saw and rebuilds only when the flags change.

use crate::commands::flags::{FeatureFlags, FlagSource};
use crate::commands::registry::{CommandRegistry, CommandTable};
use crate::protocol::{Command, Response};
use std::sync::Arc;
use tracing::{debug, trace};

/// Routes commands to handlers operating on host state `S`.
pub struct Router<S> {
    /// Every registered handler
    registry: Arc<CommandRegistry<S>>,
    /// The injected flag capability
    flags: Arc<dyn FlagSource>,
    /// The flags the cached table was built from
    table_flags: FeatureFlags,
    /// The cached table
    table: Arc<CommandTable<S>>,
}

impl<S: 'static> Router<S> {
    /// Creates a router over `registry`, gated by `flags`.
    pub fn new(registry: CommandRegistry<S>, flags: Arc<dyn FlagSource>) -> Self {
        let table_flags = flags.snapshot();
        let table = Arc::new(registry.build(&table_flags));
        Self {
            registry: Arc::new(registry),
            flags,
            table_flags,
            table,
        }
    }

    /// Returns the table for the current flags, rebuilding it if they changed.
    pub fn table(&mut self) -> Arc<CommandTable<S>> {
        let current = self.flags.snapshot();
        if current != self.table_flags {
            debug!(
                groups = ?current.enabled().collect::<Vec<_>>(),
                "Feature flags changed, rebuilding command table"
            );
            self.table = Arc::new(self.registry.build(&current));
            self.table_flags = current;
        }
        Arc::clone(&self.table)
    }

    /// Dispatches one command against the host state.
    ///
    /// Unknown commands and handler failures are returned as error
    /// responses; nothing escapes the router.
    pub fn dispatch(&mut self, state: &mut S, command: Command) -> Response {
        let table = self.table();
        trace!(command = %command.name, "Dispatching");
        table.dispatch(state, &command.name, command.params)
    }
}
