//! Lifecycle states of the embedded runtime.

use crate::utils::{format_iso, now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the embedded runtime is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeState {
    /// Startup has not been requested.
    #[default]
    Unstarted,
    /// Directories, properties and ports are being prepared, or the launch is in flight.
    Starting,
    /// The launch left a live handle.
    Running,
    /// The launch failed; no handle is held.
    Failed,
    /// The runtime was shut down.
    Stopped,
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unstarted => write!(f, "unstarted"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl RuntimeState {
    /// Returns true if `next` may follow this state.
    ///
    /// A failed or stopped runtime may be started again.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unstarted | Self::Failed | Self::Stopped, Self::Starting)
                | (Self::Starting, Self::Running | Self::Failed)
                | (Self::Running, Self::Stopped)
        )
    }
}

/// A recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Previous state.
    pub from: RuntimeState,
    /// New state.
    pub to: RuntimeState,
    /// When the change happened.
    pub at: Timestamp,
}

/// The current state plus the history that led to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateMachine {
    state: RuntimeState,
    history: Vec<StateTransition>,
}

impl StateMachine {
    /// Creates a machine in [`RuntimeState::Unstarted`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// Every transition so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Moves to `next` if allowed. Returns false and leaves the state alone
    /// otherwise.
    pub fn transition(&mut self, next: RuntimeState) -> bool {
        let from = self.state;
        if !from.can_transition_to(next) {
            tracing::warn!(from = %from, to = %next, "Rejected runtime state transition");
            return false;
        }
        let at = now_utc();
        self.state = next;
        self.history.push(StateTransition { from, to: next, at });
        tracing::info!(from = %from, to = %next, at = %format_iso(&at), "Runtime state changed");
        true
    }
}
