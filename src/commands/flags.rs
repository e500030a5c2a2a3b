//! Feature Flags
//!
//! Process-wide toggles that enable optional command groups. The bridge does
//! not own them; it reads a snapshot through the [`FlagSource`] capability at
//! dispatch time.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

/// A snapshot of the enabled optional command groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    enabled: BTreeSet<String>,
}

impl FeatureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns these flags with `group` enabled.
    pub fn with(mut self, group: impl Into<String>) -> Self {
        self.enabled.insert(group.into());
        self
    }

    pub fn set(&mut self, group: impl Into<String>, enabled: bool) {
        let group = group.into();
        if enabled {
            self.enabled.insert(group);
        } else {
            self.enabled.remove(&group);
        }
    }

    pub fn is_enabled(&self, group: &str) -> bool {
        self.enabled.contains(group)
    }

    /// Iterates over the enabled groups in sorted order.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(String::as_str)
    }
}

/// Read-only access to the current feature flags.
pub trait FlagSource: Send + Sync {
    fn snapshot(&self) -> FeatureFlags;
}

impl FlagSource for FeatureFlags {
    fn snapshot(&self) -> FeatureFlags {
        self.clone()
    }
}

/// Feature flags that can be toggled while the bridge is running.
///
/// Clones share the same underlying flags.
#[derive(Debug, Clone, Default)]
pub struct SharedFlags {
    inner: Arc<RwLock<FeatureFlags>>,
}

impl SharedFlags {
    pub fn new(flags: FeatureFlags) -> Self {
        Self {
            inner: Arc::new(RwLock::new(flags)),
        }
    }

    pub fn set(&self, group: impl Into<String>, enabled: bool) {
        // A poisoned lock still holds a consistent set; the writer only inserts or removes.
        let mut flags = self.inner.write().unwrap_or_else(|e| e.into_inner());
        flags.set(group, enabled);
    }

    pub fn is_enabled(&self, group: &str) -> bool {
        let flags = self.inner.read().unwrap_or_else(|e| e.into_inner());
        flags.is_enabled(group)
    }
}

impl FlagSource for SharedFlags {
    fn snapshot(&self) -> FeatureFlags {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
