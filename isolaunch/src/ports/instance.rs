//! A single runtime instance and the properties it publishes.

use super::allocator::PortAssignment;
use crate::config::{keys, SystemProperties};
use crate::utils::generate_uuid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// An instance of the embedded runtime with its ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInstance {
    id: Uuid,
    root: PathBuf,
    assignment: PortAssignment,
    properties: BTreeMap<String, String>,
}

impl RuntimeInstance {
    /// Creates an instance rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, assignment: PortAssignment) -> Self {
        Self {
            id: generate_uuid(),
            root: root.into(),
            assignment,
            properties: BTreeMap::new(),
        }
    }

    /// Registers an extra property published on start.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Instance id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Instance root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Assigned ports.
    #[must_use]
    pub fn assignment(&self) -> &PortAssignment {
        &self.assignment
    }

    /// Extra registered properties.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Publishes the instance id, ports and extra properties.
    pub fn start(&self, system: &SystemProperties) {
        system.set(keys::INSTANCE_ID, self.id.to_string());
        self.assignment.publish(system);
        for (key, value) in &self.properties {
            system.set(key.clone(), value.clone());
        }
        tracing::info!(
            instance_id = %self.id,
            root = %self.root.display(),
            offset = self.assignment.offset,
            "Runtime instance started"
        );
    }
}
