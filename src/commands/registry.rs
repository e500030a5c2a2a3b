//! Command Registry and Table
//!
//! Handlers are registered by name, either in the always-available core set
//! or in a named optional group. A [`CommandTable`] is the frozen lookup built
//! from the registry for one snapshot of the feature flags:
//!
//! ```text
//! CommandRegistry ──build(&FeatureFlags)──> CommandTable (read-only, shareable)
//! ```
//!
//! Building is a pure function of the registry and the flags, so the router
//! can cache a table and only rebuild it when the flags change.

use crate::commands::flags::FeatureFlags;
use crate::commands::params::HandlerError;
use crate::protocol::{Params, Response};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A registered command handler operating on host state `S`.
pub type Handler<S> = Arc<dyn Fn(&mut S, Params) -> Result<Value, HandlerError> + Send + Sync>;

struct Registration<S> {
    name: String,
    group: Option<String>,
    handler: Handler<S>,
}

/// All known handlers, core and optional.
pub struct CommandRegistry<S> {
    registrations: Vec<Registration<S>>,
}

impl<S: 'static> Default for CommandRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> CommandRegistry<S> {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Registers a handler that is always available.
    ///
    /// The handler's return value is converted to JSON and becomes the
    /// `result` of the success response.
    pub fn register<F, R>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut S, Params) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: Serialize,
    {
        self.push(name.into(), None, handler);
        self
    }

    /// Registers a handler that is available only while `group` is enabled.
    pub fn register_in<F, R>(
        &mut self,
        group: impl Into<String>,
        name: impl Into<String>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(&mut S, Params) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: Serialize,
    {
        self.push(name.into(), Some(group.into()), handler);
        self
    }

    fn push<F, R>(&mut self, name: String, group: Option<String>, handler: F)
    where
        F: Fn(&mut S, Params) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: Serialize,
    {
        let handler: Handler<S> = Arc::new(move |state: &mut S, params: Params| {
            let result = handler(state, params)?;
            serde_json::to_value(result)
                .map_err(|e| HandlerError::failed(format!("Failed to encode result: {}", e)))
        });
        self.registrations.push(Registration {
            name,
            group,
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Builds the lookup table for one snapshot of the feature flags.
    ///
    /// Core handlers are inserted first, then every enabled group in
    /// registration order. A later registration of the same name replaces an
    /// earlier one.
    pub fn build(&self, flags: &FeatureFlags) -> CommandTable<S> {
        let mut handlers = HashMap::with_capacity(self.registrations.len());

        let core = self.registrations.iter().filter(|r| r.group.is_none());
        let optional = self.registrations.iter().filter(|r| {
            r.group
                .as_deref()
                .map(|group| flags.is_enabled(group))
                .unwrap_or(false)
        });

        for registration in core.chain(optional) {
            handlers.insert(registration.name.clone(), Arc::clone(&registration.handler));
        }

        debug!(
            commands = handlers.len(),
            groups = ?flags.enabled().collect::<Vec<_>>(),
            "Built command table"
        );

        CommandTable { handlers }
    }
}

/// A frozen name-to-handler lookup.
pub struct CommandTable<S> {
    handlers: HashMap<String, Handler<S>>,
}

impl<S> CommandTable<S> {
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Sorted names of every command in the table.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Runs the named handler and wraps its outcome in a response.
    ///
    /// Never fails: unknown names and handler errors both become error
    /// responses.
    pub fn dispatch(&self, state: &mut S, name: &str, params: Params) -> Response {
        let handler = match self.handlers.get(name) {
            Some(handler) => handler,
            None => return Response::error(format!("Unknown command type: {}", name)),
        };

        match handler(state, params) {
            Ok(result) => Response::success(result),
            Err(e) => Response::error(e.to_string()),
        }
    }
}

impl<S> fmt::Debug for CommandTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTable")
            .field("commands", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> CommandRegistry<Vec<String>> {
        let mut registry = CommandRegistry::new();
        registry
            .register("echo_handler", |_: &mut Vec<String>, params: Params| {
                Ok(Value::Object(params))
            })
            .register("record", |log: &mut Vec<String>, _| {
                log.push("record".to_string());
                Ok(log.len())
            })
            .register("fail", |_: &mut Vec<String>, _| -> Result<(), HandlerError> {
                Err(HandlerError::failed("it broke"))
            })
            .register_in("assets", "search_assets", |_: &mut Vec<String>, _| {
                Ok(json!(["brick", "wood"]))
            });
        registry
    }

    #[test]
    fn test_build_without_flags_has_core_only() {
        let table = registry().build(&FeatureFlags::new());
        assert_eq!(table.names(), vec!["echo_handler", "fail", "record"]);
        assert!(!table.contains("search_assets"));
    }

    #[test]
    fn test_build_with_group_enabled() {
        let table = registry().build(&FeatureFlags::new().with("assets"));
        assert_eq!(table.len(), 4);
        assert!(table.contains("search_assets"));
    }

    #[test]
    fn test_dispatch_echo() {
        let table = registry().build(&FeatureFlags::new());
        let mut state = Vec::new();
        let params = json!({"x": 1}).as_object().cloned().unwrap();

        let response = table.dispatch(&mut state, "echo_handler", params);
        assert_eq!(response, Response::success(json!({"x": 1})));
    }

    #[test]
    fn test_dispatch_serializes_typed_results() {
        let table = registry().build(&FeatureFlags::new());
        let mut state = Vec::new();

        let response = table.dispatch(&mut state, "record", Params::new());
        assert_eq!(response, Response::success(json!(1)));
        assert_eq!(state, vec!["record".to_string()]);
    }

    #[test]
    fn test_dispatch_unknown_command() {
        let table = registry().build(&FeatureFlags::new());
        let response = table.dispatch(&mut Vec::new(), "does_not_exist", Params::new());
        assert_eq!(
            response,
            Response::error("Unknown command type: does_not_exist")
        );
    }

    #[test]
    fn test_dispatch_gated_command_is_unknown_when_disabled() {
        let table = registry().build(&FeatureFlags::new());
        let response = table.dispatch(&mut Vec::new(), "search_assets", Params::new());
        assert_eq!(response, Response::error("Unknown command type: search_assets"));
    }

    #[test]
    fn test_dispatch_handler_failure() {
        let table = registry().build(&FeatureFlags::new());
        let response = table.dispatch(&mut Vec::new(), "fail", Params::new());
        assert_eq!(response, Response::error("it broke"));
    }

    #[test]
    fn test_later_registration_overrides() {
        let mut registry = registry();
        registry.register_in("assets", "echo_handler", |_: &mut Vec<String>, _| Ok("shadowed"));

        let table = registry.build(&FeatureFlags::new());
        let response = table.dispatch(&mut Vec::new(), "echo_handler", Params::new());
        assert_eq!(response, Response::success(json!({})));

        let table = registry.build(&FeatureFlags::new().with("assets"));
        let response = table.dispatch(&mut Vec::new(), "echo_handler", Params::new());
        assert_eq!(response, Response::success(json!("shadowed")));
    }
}
