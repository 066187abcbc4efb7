//! Recording runtimes and probes for testing.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::identity::{self, Authentication};
use crate::launch::{LaunchRequest, RuntimeFactory, SubRuntime};
use crate::ports::PortProbe;

/// What a [`RecordingRuntime`] does when launched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LaunchBehavior {
    /// Launch succeeds and the runtime reports running.
    #[default]
    Succeed,
    /// Launch returns an error.
    Fail(String),
    /// Launch panics.
    Panic(String),
    /// Launch returns normally but the runtime reports not running.
    NotRunning,
}

/// What one launch attempt observed on the thread it ran on.
#[derive(Debug, Clone)]
pub struct LaunchObservation {
    /// The identity installed when the handle was created.
    pub identity: Option<Arc<Authentication>>,
    /// Name of the launching thread.
    pub thread_name: Option<String>,
    /// Instance id from the request.
    pub instance_id: uuid::Uuid,
}

#[derive(Debug, Default)]
struct Log {
    observations: Vec<LaunchObservation>,
    launches: usize,
    destroys: usize,
}

/// A runtime handle that records calls into a shared log.
#[derive(Debug)]
pub struct RecordingRuntime {
    behavior: LaunchBehavior,
    destroy_error: Option<String>,
    running: bool,
    log: Arc<Mutex<Log>>,
}

impl SubRuntime for RecordingRuntime {
    fn launch(&mut self) -> anyhow::Result<()> {
        self.log.lock().launches += 1;
        match &self.behavior {
            LaunchBehavior::Succeed => {
                self.running = true;
                Ok(())
            }
            LaunchBehavior::Fail(reason) => Err(anyhow::anyhow!("{reason}")),
            LaunchBehavior::Panic(message) => panic!("{message}"),
            LaunchBehavior::NotRunning => Ok(()),
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn destroy(&mut self) -> anyhow::Result<()> {
        self.log.lock().destroys += 1;
        self.running = false;
        match &self.destroy_error {
            Some(reason) => Err(anyhow::anyhow!("{reason}")),
            None => Ok(()),
        }
    }
}

/// A factory that hands out [`RecordingRuntime`]s and records the identity
/// and thread each one was created on.
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    behavior: Arc<Mutex<LaunchBehavior>>,
    destroy_error: Arc<Mutex<Option<String>>>,
    log: Arc<Mutex<Log>>,
}

impl RecordingFactory {
    /// Creates a factory whose runtimes launch successfully.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory with the given launch behavior.
    #[must_use]
    pub fn with_behavior(behavior: LaunchBehavior) -> Self {
        let factory = Self::new();
        factory.set_behavior(behavior);
        factory
    }

    /// Changes the behavior of runtimes created from now on.
    pub fn set_behavior(&self, behavior: LaunchBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Makes `destroy` fail on runtimes created from now on.
    pub fn fail_destroy(&self, reason: impl Into<String>) {
        *self.destroy_error.lock() = Some(reason.into());
    }

    /// Every observation so far, oldest first.
    #[must_use]
    pub fn observations(&self) -> Vec<LaunchObservation> {
        self.log.lock().observations.clone()
    }

    /// Number of launch calls.
    #[must_use]
    pub fn launch_count(&self) -> usize {
        self.log.lock().launches
    }

    /// Number of destroy calls.
    #[must_use]
    pub fn destroy_count(&self) -> usize {
        self.log.lock().destroys
    }
}

impl RuntimeFactory for RecordingFactory {
    fn create(&self, request: &LaunchRequest) -> anyhow::Result<Box<dyn SubRuntime>> {
        let observation = LaunchObservation {
            identity: identity::current()?,
            thread_name: std::thread::current().name().map(str::to_string),
            instance_id: request.instance.id(),
        };
        self.log.lock().observations.push(observation);

        Ok(Box::new(RecordingRuntime {
            behavior: self.behavior.lock().clone(),
            destroy_error: self.destroy_error.lock().clone(),
            running: false,
            log: Arc::clone(&self.log),
        }))
    }
}

/// A probe that reports a fixed set of ports as busy.
#[derive(Debug, Clone, Default)]
pub struct FixedProbe {
    busy: HashSet<u16>,
}

impl FixedProbe {
    /// Creates a probe where every port is free.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks ports as busy.
    #[must_use]
    pub fn with_busy(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.busy.extend(ports);
        self
    }
}

impl PortProbe for FixedProbe {
    fn is_free(&self, port: u16) -> bool {
        !self.busy.contains(&port)
    }
}
