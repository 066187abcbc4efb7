//! Launching the runtime under a disposable identity.
//!
//! Whatever identity the caller holds must not reach code inside the
//! runtime. The launch runs with a freshly forged identity installed, so
//! anything in the runtime that consults the ambient identity is challenged.
//! The caller's own context is never modified.

use super::runtime::{LaunchRequest, RuntimeFactory, SubRuntime};
use crate::context::spawn::{Builder, Propagation};
use crate::context::{restore, ContextScope, StoreKind};
use crate::errors::{ContextError, IsolaunchError, LaunchError};
use crate::identity;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// How the launch is isolated from the calling thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// Launch on one dedicated worker thread spawned without inherited
    /// context, and block until it finishes.
    #[default]
    DedicatedThread,
    /// Launch on the calling thread inside a context scope that is restored
    /// afterwards.
    Scoped,
}

/// Runs the launch call with identity isolation.
#[derive(Debug, Clone)]
pub struct IsolatedLauncher {
    mode: LaunchMode,
    worker_name: String,
}

impl IsolatedLauncher {
    /// Creates a launcher.
    #[must_use]
    pub fn new(mode: LaunchMode, worker_name: impl Into<String>) -> Self {
        Self {
            mode,
            worker_name: worker_name.into(),
        }
    }

    /// The launch mode.
    #[must_use]
    pub fn mode(&self) -> LaunchMode {
        self.mode
    }

    /// Builds and launches a runtime. Blocks until the launch attempt has
    /// finished, successfully or not. There is no timeout.
    pub fn launch<F>(
        &self,
        factory: &F,
        request: &LaunchRequest,
    ) -> Result<Box<dyn SubRuntime>, LaunchError>
    where
        F: RuntimeFactory + ?Sized,
    {
        match self.mode {
            LaunchMode::DedicatedThread => self.launch_on_worker(factory, request),
            LaunchMode::Scoped => launch_scoped(factory, request),
        }
    }

    fn launch_on_worker<F>(
        &self,
        factory: &F,
        request: &LaunchRequest,
    ) -> Result<Box<dyn SubRuntime>, LaunchError>
    where
        F: RuntimeFactory + ?Sized,
    {
        std::thread::scope(|scope| -> Result<Box<dyn SubRuntime>, LaunchError> {
            // The worker starts with empty tables, then poisons its own
            // identity before anything else runs on it.
            let worker = Builder::new()
                .name(self.worker_name.clone())
                .propagation(Propagation::Isolated)
                .spawn_scoped(scope, || launch_poisoned(factory, request))
                .map_err(|e| match e {
                    IsolaunchError::Io(io) => LaunchError::Spawn(io),
                    IsolaunchError::Context(c) => LaunchError::Context(c),
                    other => LaunchError::failed(other),
                })?;

            tracing::debug!(worker = %self.worker_name, "Waiting for launch worker");
            worker.join().unwrap_or_else(|payload| {
                Err(LaunchError::Panicked {
                    message: panic_message(payload.as_ref()),
                })
            })
        })
    }
}

fn launch_scoped<F>(
    factory: &F,
    request: &LaunchRequest,
) -> Result<Box<dyn SubRuntime>, LaunchError>
where
    F: RuntimeFactory + ?Sized,
{
    let scope = ContextScope::enter()?;
    restore(StoreKind::Inheritable, None)?;

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| launch_poisoned(factory, request)))
        .unwrap_or_else(|payload| {
            Err(LaunchError::Panicked {
                message: panic_message(payload.as_ref()),
            })
        });

    settle_scoped(outcome, scope.exit())
}

/// Combines the launch outcome with the result of restoring the caller's
/// context. A runtime launched under a context that could not be restored is
/// destroyed rather than handed back.
fn settle_scoped(
    outcome: Result<Box<dyn SubRuntime>, LaunchError>,
    restored: Result<(), ContextError>,
) -> Result<Box<dyn SubRuntime>, LaunchError> {
    let Err(e) = restored else {
        return outcome;
    };
    tracing::error!(error = %e, "Failed to restore caller context after scoped launch");
    if let Ok(mut runtime) = outcome {
        if let Err(destroy_err) = runtime.destroy() {
            tracing::error!(error = %format!("{destroy_err:#}"), "Error destroying orphaned runtime");
        }
    }
    Err(LaunchError::Context(e))
}

fn launch_poisoned<F>(
    factory: &F,
    request: &LaunchRequest,
) -> Result<Box<dyn SubRuntime>, LaunchError>
where
    F: RuntimeFactory + ?Sized,
{
    let forged = identity::poison()?;
    tracing::info!(
        principal = %forged.principal,
        instance_id = %request.instance.id(),
        "Launching embedded runtime"
    );

    let mut runtime = factory
        .create(request)
        .map_err(|e| LaunchError::failed(format!("{e:#}")))?;
    runtime
        .launch()
        .map_err(|e| LaunchError::failed(format!("{e:#}")))?;

    if runtime.is_running() {
        Ok(runtime)
    } else {
        Err(LaunchError::NoLiveHandle)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
