//! Error types for isolaunch.
//!
//! The taxonomy separates fatal context-store failures from recoverable
//! launch and configuration failures. Each concern has its own enum; all of
//! them fold into [`IsolaunchError`].

use crate::context::StoreKind;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for isolaunch operations.
#[derive(Debug, Error)]
pub enum IsolaunchError {
    /// A thread context store operation failed.
    #[error("{0}")]
    Context(#[from] ContextError),

    /// The embedded runtime could not be launched.
    #[error("{0}")]
    Launch(#[from] LaunchError),

    /// Boot configuration could not be read or applied.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Port allocation failed.
    #[error("{0}")]
    Ports(#[from] PortError),

    /// A pooled task could not be joined.
    #[error("Pooled task failed: {0}")]
    Join(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IsolaunchError {
    /// Returns a stable code identifying the error class.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Context(e) => e.code(),
            Self::Launch(e) => e.code(),
            Self::Config(e) => e.code(),
            Self::Ports(e) => e.code(),
            Self::Join(_) => "POOLED_JOIN_FAILED",
            Self::Io(_) => "IO",
        }
    }

    /// Returns true if the host may keep running after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Context(_))
    }

    /// Converts to a dictionary representation for structured logs.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("recoverable".to_string(), serde_json::json!(self.is_recoverable()));
        map
    }
}

/// Failures of the per-thread context store.
///
/// Both variants are fatal: callers treat them as configuration failures
/// and never retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The storage could not be located when the capability was resolved.
    /// Cached for the lifetime of the process.
    #[error("Context store capability unavailable for {kind} tables: {reason}")]
    CapabilityUnavailable {
        /// The table kind whose probe failed.
        kind: StoreKind,
        /// Why the probe failed.
        reason: String,
    },

    /// A single capture or restore was rejected.
    #[error("Access denied to {kind} context table: {reason}")]
    AccessDenied {
        /// The table kind being accessed.
        kind: StoreKind,
        /// Why access was rejected.
        reason: String,
    },
}

impl ContextError {
    /// Creates a capability-unavailable error.
    #[must_use]
    pub fn capability_unavailable(kind: StoreKind, reason: impl Into<String>) -> Self {
        Self::CapabilityUnavailable {
            kind,
            reason: reason.into(),
        }
    }

    /// Creates an access-denied error.
    #[must_use]
    pub fn access_denied(kind: StoreKind, reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            kind,
            reason: reason.into(),
        }
    }

    /// Returns the table kind the error refers to.
    #[must_use]
    pub fn kind(&self) -> StoreKind {
        match self {
            Self::CapabilityUnavailable { kind, .. } | Self::AccessDenied { kind, .. } => *kind,
        }
    }

    /// Returns a stable code identifying the error class.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::CapabilityUnavailable { .. } => "CAPABILITY_UNAVAILABLE",
            Self::AccessDenied { .. } => "ACCESS_DENIED",
        }
    }
}

/// Failures while launching or stopping the embedded runtime.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The runtime factory or the launch call returned an error.
    #[error("Runtime launch failed: {reason}")]
    Failed {
        /// The reported failure.
        reason: String,
    },

    /// The launch call returned but left no running runtime behind.
    #[error("Runtime launch returned without a live handle")]
    NoLiveHandle,

    /// The launch panicked on the worker unit.
    #[error("Runtime launch panicked: {message}")]
    Panicked {
        /// The panic payload, if it was a string.
        message: String,
    },

    /// The worker unit could not be spawned.
    #[error("Could not spawn launch worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker unit could not set up its identity context.
    #[error("Launch worker context setup failed: {0}")]
    Context(#[from] ContextError),

    /// Destroying a running runtime failed.
    #[error("Runtime shutdown failed: {reason}")]
    ShutdownFailed {
        /// The reported failure.
        reason: String,
    },
}

impl LaunchError {
    /// Creates a launch failure from any displayable error.
    #[must_use]
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self::Failed {
            reason: reason.to_string(),
        }
    }

    /// Returns a stable code identifying the error class.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ShutdownFailed { .. } => "SHUTDOWN_FAILURE",
            Self::Context(e) => e.code(),
            _ => "LAUNCH_FAILURE",
        }
    }
}

/// Failures while reading boot configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The properties file was absent or unreadable; expansion is skipped.
    #[error("Config expansion skipped for {}: {reason}", path.display())]
    ExpansionSkipped {
        /// The properties file.
        path: PathBuf,
        /// Why it was skipped.
        reason: String,
    },

    /// A properties file line could not be parsed.
    #[error("Invalid properties syntax at line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },
}

impl ConfigError {
    /// Creates an expansion-skipped error.
    #[must_use]
    pub fn expansion_skipped(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ExpansionSkipped {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns a stable code identifying the error class.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ExpansionSkipped { .. } => "CONFIG_EXPANSION_SKIPPED",
            Self::Parse { .. } => "CONFIG_PARSE",
        }
    }
}

/// Failures while reading the port map or assigning ports.
#[derive(Debug, Error)]
pub enum PortError {
    /// The port-map file does not exist.
    #[error("Port map not found: {}", path.display())]
    MapNotFound {
        /// The expected location.
        path: PathBuf,
    },

    /// The port-map file could not be parsed.
    #[error("Invalid port map {}: {reason}", path.display())]
    InvalidMap {
        /// The port-map file.
        path: PathBuf,
        /// The parse failure.
        reason: String,
    },

    /// A port-map entry is inconsistent with the others.
    #[error("Invalid port entry '{id}': {reason}")]
    InvalidEntry {
        /// The entry id.
        id: String,
        /// What was wrong.
        reason: String,
    },

    /// No offset within the search limit had every port free.
    #[error("No free port block found within {search_limit} offsets")]
    Exhausted {
        /// The number of offsets tried.
        search_limit: u16,
    },
}

impl PortError {
    /// Returns a stable code identifying the error class.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MapNotFound { .. } | Self::InvalidMap { .. } => "PORT_MAP_INVALID",
            Self::InvalidEntry { .. } => "PORT_ENTRY_INVALID",
            Self::Exhausted { .. } => "PORTS_EXHAUSTED",
        }
    }
}
