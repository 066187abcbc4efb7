//! Process-wide configuration values read by the embedded runtime.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Names of the values published before launch.
pub mod keys {
    /// Runtime home directory.
    pub const HOME: &str = "runtime.home";
    /// Runtime base directory (same as home when embedded).
    pub const BASE: &str = "runtime.base";
    /// Runtime data directory.
    pub const DATA: &str = "runtime.data";
    /// Console history file.
    pub const HISTORY: &str = "runtime.history";
    /// Child instances directory.
    pub const INSTANCES: &str = "runtime.instances";
    /// Runtime configuration directory.
    pub const ETC: &str = "runtime.etc";
    /// Whether the runtime opens a console on stdin.
    pub const START_LOCAL_CONSOLE: &str = "runtime.startLocalConsole";
    /// Whether the runtime starts its remote shell.
    pub const START_REMOTE_SHELL: &str = "runtime.startRemoteShell";
    /// Whether the runtime takes its instance lock.
    pub const LOCK: &str = "runtime.lock";
    /// Directory watched for configuration drops.
    pub const FILEINSTALL_DIR: &str = "fileinstall.dir";
    /// Tells other components that an embedded runtime is already running.
    pub const EMBEDDED_MODE: &str = "embedded.runtime.mode";
    /// Location of the runtime's logging configuration.
    pub const LOG_CONFIGURATION: &str = "log.configuration";
    /// Expanded list of host packages exposed to the runtime.
    pub const SYSTEM_PACKAGES_EXTRA: &str = "framework.system.packages.extra";
    /// Id of the registered runtime instance.
    pub const INSTANCE_ID: &str = "runtime.instance.id";
    /// Port offset chosen for the runtime instance.
    pub const INSTANCE_OFFSET: &str = "runtime.instance.offset";
}

/// A concurrent string property registry.
///
/// The process-wide instance is [`SystemProperties::global`]; separate
/// instances can be created for tests or for hosts running several boots.
#[derive(Debug, Default)]
pub struct SystemProperties {
    values: DashMap<String, String>,
}

impl SystemProperties {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<SystemProperties>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Reads a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.value().clone())
    }

    /// Reads a boolean value (`true`, case-insensitive).
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// Sets a value, returning the previous one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        tracing::trace!(key = %key, value = %value, "Publishing property");
        self.values.insert(key, value)
    }

    /// Removes a value.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.remove(key).map(|(_, v)| v)
    }

    /// Returns true if the key is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a sorted copy of every value.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}
