//! The embedded runtime as seen by the launcher.
//!
//! The runtime itself is a black box. Implementations report failures with
//! `anyhow`; the launcher turns them into [`LaunchError`](crate::errors::LaunchError).

use crate::config::{RuntimeLayout, SystemProperties};
use crate::ports::RuntimeInstance;
use std::sync::Arc;

/// A handle to an embedded runtime.
#[cfg_attr(test, mockall::automock)]
pub trait SubRuntime: Send {
    /// Starts the runtime. Blocks until its own startup returns.
    fn launch(&mut self) -> anyhow::Result<()>;

    /// Returns true if the runtime is live.
    fn is_running(&self) -> bool;

    /// Stops the runtime.
    fn destroy(&mut self) -> anyhow::Result<()>;
}

/// Everything a factory needs to build a runtime handle.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Directories below the runtime home.
    pub layout: RuntimeLayout,
    /// The instance and its ports.
    pub instance: RuntimeInstance,
    /// The published process-wide properties.
    pub properties: Arc<SystemProperties>,
}

/// Builds runtime handles. Called on the launch worker, after its identity
/// has been replaced.
#[cfg_attr(test, mockall::automock)]
pub trait RuntimeFactory: Send + Sync {
    /// Creates an unlaunched handle.
    fn create(&self, request: &LaunchRequest) -> anyhow::Result<Box<dyn SubRuntime>>;
}

impl<F> RuntimeFactory for F
where
    F: Fn(&LaunchRequest) -> anyhow::Result<Box<dyn SubRuntime>> + Send + Sync,
{
    fn create(&self, request: &LaunchRequest) -> anyhow::Result<Box<dyn SubRuntime>> {
        self(request)
    }
}
