//! The lifecycle contract a host uses to start and stop components.

use crate::utils::{generate_uuid, now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The host session a component is started under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Session id.
    pub id: Uuid,
    /// Session name.
    pub name: String,
    /// When the session was created.
    pub created_at: Timestamp,
    /// Free-form attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl SessionContext {
    /// Creates a session.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_uuid(),
            name: name.into(),
            created_at: now_utc(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A component the host starts at boot and stops at teardown.
pub trait SystemListener: Send + Sync {
    /// Starts the component. Returns false if it failed to start; the host
    /// keeps running either way.
    fn startup(&self, session: &SessionContext) -> bool;

    /// Stops the component. Never fails.
    fn shutdown(&self);
}
