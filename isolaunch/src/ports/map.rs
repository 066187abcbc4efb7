//! The port-map file.

use crate::errors::PortError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default number of instance offsets tried before giving up.
pub const DEFAULT_SEARCH_LIMIT: u16 = 100;

fn default_search_limit() -> u16 {
    DEFAULT_SEARCH_LIMIT
}

/// One port the runtime needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortEntry {
    /// Stable identifier.
    pub id: String,
    /// Property under which the assigned port is published.
    pub property: String,
    /// Port used at instance offset zero.
    pub start_port: u16,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PortEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(id: impl Into<String>, property: impl Into<String>, start_port: u16) -> Self {
        Self {
            id: id.into(),
            property: property.into(),
            start_port,
            description: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Port for the given instance offset, or `None` past `u16::MAX`.
    #[must_use]
    pub fn port_at(&self, offset: u16) -> Option<u16> {
        self.start_port.checked_add(offset)
    }
}

/// The set of ports an instance needs, read from `ports.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMap {
    /// Offsets tried before allocation fails.
    #[serde(default = "default_search_limit")]
    pub search_limit: u16,
    /// Required ports.
    #[serde(default)]
    pub ports: Vec<PortEntry>,
}

impl Default for PortMap {
    fn default() -> Self {
        Self {
            search_limit: DEFAULT_SEARCH_LIMIT,
            ports: Vec::new(),
        }
    }
}

impl PortMap {
    /// Creates a map from entries.
    #[must_use]
    pub fn new(ports: Vec<PortEntry>) -> Self {
        Self {
            ports,
            ..Self::default()
        }
    }

    /// Sets the search limit.
    #[must_use]
    pub fn with_search_limit(mut self, limit: u16) -> Self {
        self.search_limit = limit;
        self
    }

    /// Loads and validates a map file.
    pub fn load(path: &Path) -> Result<Self, PortError> {
        if !path.is_file() {
            return Err(PortError::MapNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| PortError::InvalidMap {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let map: Self = serde_json::from_str(&text).map_err(|e| PortError::InvalidMap {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        map.validate()?;
        Ok(map)
    }

    /// Rejects duplicate ids or properties.
    pub fn validate(&self) -> Result<(), PortError> {
        let mut ids = HashSet::new();
        let mut properties = HashSet::new();
        for entry in &self.ports {
            if !ids.insert(entry.id.as_str()) {
                return Err(PortError::InvalidEntry {
                    id: entry.id.clone(),
                    reason: "duplicate id".to_string(),
                });
            }
            if !properties.insert(entry.property.as_str()) {
                return Err(PortError::InvalidEntry {
                    id: entry.id.clone(),
                    reason: format!("property '{}' is already assigned", entry.property),
                });
            }
        }
        Ok(())
    }
}
