//! Boot configuration for the embedded runtime.

use crate::launch::LaunchMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default runtime directory, relative to the solution root.
pub const DEFAULT_RUNTIME_DIR: &str = "system/runtime";

/// Default environment variable naming the alternate application root.
pub const DEFAULT_APP_ROOT_ENV: &str = "OSX_APP_ROOT_DIR";

/// Environment variable overriding the solution root in [`BootConfig::from_env`].
pub const SOLUTION_ROOT_ENV: &str = "ISOLAUNCH_SOLUTION_ROOT";

/// Where to find the runtime and how to start it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootConfig {
    /// Root of the host installation.
    pub solution_root: PathBuf,
    /// Runtime directory relative to the solution root (and the alternate root).
    pub runtime_dir: PathBuf,
    /// Environment variable holding the alternate application root.
    pub app_root_env: String,
    /// Alternate application root; takes precedence over the environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_root: Option<String>,
    /// Properties file relative to the runtime home.
    pub properties_file: PathBuf,
    /// Port-map file relative to the runtime home.
    pub port_map_file: PathBuf,
    /// Logging configuration relative to the solution root.
    pub log_config_file: PathBuf,
    /// Whether the runtime opens a console on stdin.
    pub start_local_console: bool,
    /// Whether the runtime starts its remote shell.
    pub start_remote_shell: bool,
    /// How the launch is isolated from the caller.
    pub launch_mode: LaunchMode,
    /// Name of the launch worker thread.
    pub worker_name: String,
}

impl BootConfig {
    /// Creates a configuration with defaults for the given solution root.
    #[must_use]
    pub fn new(solution_root: impl Into<PathBuf>) -> Self {
        Self {
            solution_root: solution_root.into(),
            runtime_dir: PathBuf::from(DEFAULT_RUNTIME_DIR),
            app_root_env: DEFAULT_APP_ROOT_ENV.to_string(),
            alternate_root: None,
            properties_file: PathBuf::from("etc/custom.properties"),
            port_map_file: PathBuf::from("etc/ports.json"),
            log_config_file: PathBuf::from("system/runtime/logging.toml"),
            start_local_console: false,
            start_remote_shell: true,
            launch_mode: LaunchMode::default(),
            worker_name: "sub-runtime-launcher".to_string(),
        }
    }

    /// Reads the solution root from `ISOLAUNCH_SOLUTION_ROOT`, defaulting to
    /// the current directory.
    #[must_use]
    pub fn from_env() -> Self {
        let root = std::env::var_os(SOLUTION_ROOT_ENV)
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(root)
    }

    /// Sets the runtime directory.
    #[must_use]
    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = dir.into();
        self
    }

    /// Sets the alternate-root environment variable name.
    #[must_use]
    pub fn with_app_root_env(mut self, name: impl Into<String>) -> Self {
        self.app_root_env = name.into();
        self
    }

    /// Sets the alternate application root explicitly.
    #[must_use]
    pub fn with_alternate_root(mut self, root: impl Into<String>) -> Self {
        self.alternate_root = Some(root.into());
        self
    }

    /// Sets the properties file.
    #[must_use]
    pub fn with_properties_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.properties_file = path.into();
        self
    }

    /// Sets the port-map file.
    #[must_use]
    pub fn with_port_map_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.port_map_file = path.into();
        self
    }

    /// Sets the console and remote shell flags.
    #[must_use]
    pub fn with_consoles(mut self, local_console: bool, remote_shell: bool) -> Self {
        self.start_local_console = local_console;
        self.start_remote_shell = remote_shell;
        self
    }

    /// Sets the launch mode.
    #[must_use]
    pub fn with_launch_mode(mut self, mode: LaunchMode) -> Self {
        self.launch_mode = mode;
        self
    }

    /// The alternate application root: the explicit value if set, else the
    /// environment variable.
    #[must_use]
    pub fn resolve_alternate_root(&self) -> Option<String> {
        self.alternate_root
            .clone()
            .or_else(|| std::env::var(&self.app_root_env).ok())
    }

    /// Absolute path of the logging configuration.
    #[must_use]
    pub fn log_config_path(&self) -> PathBuf {
        self.solution_root.join(&self.log_config_file)
    }

    /// Absolute path of the properties file under `home`.
    #[must_use]
    pub fn properties_path(&self, home: &Path) -> PathBuf {
        home.join(&self.properties_file)
    }

    /// Absolute path of the port-map file under `home`.
    #[must_use]
    pub fn port_map_path(&self, home: &Path) -> PathBuf {
        home.join(&self.port_map_file)
    }
}
