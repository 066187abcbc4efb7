//! Starting and stopping the embedded runtime.
//!
//! Startup resolves the runtime home, publishes the properties the runtime
//! reads at its own startup, expands the package-exposure list, allocates
//! ports, and finally launches the runtime through an [`IsolatedLauncher`].
//! Every failure is logged and reported as `false`; the host keeps running.

use super::isolated::IsolatedLauncher;
use super::listener::{SessionContext, SystemListener};
use super::runtime::{LaunchRequest, RuntimeFactory, SubRuntime};
use super::state::{RuntimeState, StateMachine};
use crate::config::{
    keys, resolve_runtime_home, BootConfig, PropertiesFile, RuntimeLayout, SystemPackageExpander,
    SystemProperties,
};
use crate::errors::{ConfigError, IsolaunchError, LaunchError};
use crate::ports::{PortAllocator, PortMap, PortProbe, RuntimeInstance, TcpProbe};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

#[derive(Default)]
struct BootInner {
    handle: Option<Box<dyn SubRuntime>>,
    machine: StateMachine,
    stop_requested: bool,
}

/// Hosts one embedded runtime for the lifetime of the process.
pub struct EmbeddedRuntimeBoot {
    config: BootConfig,
    properties: Arc<SystemProperties>,
    factory: Arc<dyn RuntimeFactory>,
    probe: Arc<dyn PortProbe>,
    expander: SystemPackageExpander,
    inner: Mutex<BootInner>,
}

impl std::fmt::Debug for EmbeddedRuntimeBoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedRuntimeBoot")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl EmbeddedRuntimeBoot {
    /// Creates a boot that publishes into the process-wide properties and
    /// probes ports on the loopback interface.
    #[must_use]
    pub fn new(config: BootConfig, factory: Arc<dyn RuntimeFactory>) -> Self {
        Self {
            config,
            properties: SystemProperties::global(),
            factory,
            probe: Arc::new(TcpProbe::new()),
            expander: SystemPackageExpander::new(),
            inner: Mutex::new(BootInner::default()),
        }
    }

    /// Publishes into `properties` instead of the process-wide registry.
    #[must_use]
    pub fn with_properties(mut self, properties: Arc<SystemProperties>) -> Self {
        self.properties = properties;
        self
    }

    /// Uses a different port probe.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn PortProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// The boot configuration.
    #[must_use]
    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    /// The properties this boot publishes into.
    #[must_use]
    pub fn properties(&self) -> &Arc<SystemProperties> {
        &self.properties
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RuntimeState {
        self.inner.lock().machine.state()
    }

    /// Returns true if a live runtime handle is held.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.lock().handle.is_some()
    }

    /// A copy of the lifecycle state machine, including its history.
    #[must_use]
    pub fn state_machine(&self) -> StateMachine {
        self.inner.lock().machine.clone()
    }

    /// Runs the whole startup sequence. Returns true iff a live handle
    /// exists afterwards.
    ///
    /// The lock is held only to record state changes, so `state()` and
    /// `stop()` answer from other threads while the launch is in flight.
    pub fn start(&self) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.handle.is_some() {
                tracing::info!("Embedded runtime already running");
                return true;
            }
            if !inner.machine.transition(RuntimeState::Starting) {
                return false;
            }
            inner.stop_requested = false;
        }

        let outcome = self.prepare().and_then(|request| self.launch(&request));

        let mut inner = self.inner.lock();
        match outcome {
            Ok(runtime) if inner.stop_requested => {
                inner.stop_requested = false;
                inner.machine.transition(RuntimeState::Running);
                drop(inner);
                tracing::info!("Stop was requested during launch; destroying new runtime");
                self.destroy(runtime);
                false
            }
            Ok(runtime) => {
                inner.handle = Some(runtime);
                inner.machine.transition(RuntimeState::Running);
                true
            }
            Err(e) => {
                tracing::error!(code = e.code(), error = %e, "Error starting embedded runtime");
                inner.stop_requested = false;
                inner.handle = None;
                inner.machine.transition(RuntimeState::Failed);
                false
            }
        }
    }

    /// Destroys the running runtime, if any. Never fails and never waits for
    /// an in-flight launch; a stop during startup is applied once the launch
    /// returns.
    pub fn stop(&self) {
        let runtime = {
            let mut inner = self.inner.lock();
            if inner.machine.state() == RuntimeState::Starting {
                tracing::info!("Launch in flight; runtime will be stopped when it returns");
                inner.stop_requested = true;
                return;
            }
            match inner.handle.take() {
                Some(runtime) => runtime,
                None => {
                    tracing::debug!(state = %inner.machine.state(), "No embedded runtime to stop");
                    return;
                }
            }
        };
        self.destroy(runtime);
    }

    /// Calls `destroy` outside the lock and records `Stopped` either way.
    fn destroy(&self, mut runtime: Box<dyn SubRuntime>) {
        if let Err(e) = runtime.destroy() {
            let err = LaunchError::ShutdownFailed {
                reason: format!("{e:#}"),
            };
            tracing::error!(code = err.code(), error = %err, "Error stopping embedded runtime");
        }
        self.inner.lock().machine.transition(RuntimeState::Stopped);
    }

    /// Resolves directories, publishes properties and allocates ports.
    fn prepare(&self) -> Result<LaunchRequest, IsolaunchError> {
        let alternate = self.config.resolve_alternate_root();
        let home = resolve_runtime_home(
            &self.config.solution_root,
            &self.config.runtime_dir,
            alternate.as_deref(),
        );
        tracing::info!(home = %home.path.display(), source = ?home.source, "Resolved runtime home");

        let layout = home.layout();
        self.publish_properties(&layout);
        self.expand_system_packages(&self.config.properties_path(&layout.home));

        let map = PortMap::load(&self.config.port_map_path(&layout.home))?;
        let assignment = PortAllocator::new(self.probe.as_ref()).allocate(&map)?;
        let instance = RuntimeInstance::new(&layout.home, assignment);
        instance.start(&self.properties);

        Ok(LaunchRequest {
            layout,
            instance,
            properties: Arc::clone(&self.properties),
        })
    }

    fn launch(&self, request: &LaunchRequest) -> Result<Box<dyn SubRuntime>, IsolaunchError> {
        let launcher = IsolatedLauncher::new(self.config.launch_mode, self.config.worker_name.clone());
        Ok(launcher.launch(self.factory.as_ref(), request)?)
    }

    fn publish_properties(&self, layout: &RuntimeLayout) {
        let props = &self.properties;
        layout.publish(props);
        props.set(
            keys::START_LOCAL_CONSOLE,
            self.config.start_local_console.to_string(),
        );
        props.set(
            keys::START_REMOTE_SHELL,
            self.config.start_remote_shell.to_string(),
        );
        props.set(keys::LOCK, "false");
        // Other components check this before starting a runtime of their own.
        props.set(keys::EMBEDDED_MODE, "true");
        props.set(
            keys::LOG_CONFIGURATION,
            self.config.log_config_path().display().to_string(),
        );
    }

    /// Publishes the expanded package list. Skips with a log line if the
    /// properties file is missing or cannot be read.
    fn expand_system_packages(&self, path: &Path) {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "No properties file in runtime distribution");
            return;
        }

        let file = match PropertiesFile::load(path) {
            Ok(file) => file,
            Err(e) => {
                let err = match e {
                    ConfigError::Parse { line, message } => ConfigError::expansion_skipped(
                        path,
                        format!("line {line}: {message}"),
                    ),
                    other => other,
                };
                tracing::error!(code = err.code(), error = %err, "Could not expand system packages");
                return;
            }
        };

        let expanded = self.expander.expand(&file, &self.properties);
        match expanded.get(self.expander.base_key()) {
            Some(value) if !value.trim().is_empty() => {
                self.properties.set(self.expander.base_key(), value);
                tracing::debug!(key = self.expander.base_key(), "Published expanded package list");
            }
            _ => {
                tracing::debug!(key = self.expander.base_key(), "Expanded package list is empty");
            }
        }
    }
}

impl SystemListener for EmbeddedRuntimeBoot {
    fn startup(&self, session: &SessionContext) -> bool {
        tracing::info!(session_id = %session.id, session = %session.name, "Starting embedded runtime");
        self.start()
    }

    fn shutdown(&self) {
        self.stop();
    }
}
