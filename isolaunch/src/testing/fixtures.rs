//! On-disk runtime distributions for testing.

use std::io;
use std::path::{Path, PathBuf};

use crate::config::{BootConfig, DEFAULT_RUNTIME_DIR};
use crate::ports::{PortEntry, PortMap};

/// Lays out a runtime distribution below a solution root.
#[derive(Debug, Clone)]
pub struct RuntimeFixture {
    solution_root: PathBuf,
    home: PathBuf,
}

impl RuntimeFixture {
    /// Creates `<solution_root>/system/runtime/etc`.
    pub fn create(solution_root: &Path) -> io::Result<Self> {
        let home = solution_root.join(DEFAULT_RUNTIME_DIR);
        std::fs::create_dir_all(home.join("etc"))?;
        Ok(Self {
            solution_root: solution_root.to_path_buf(),
            home,
        })
    }

    /// The solution root.
    #[must_use]
    pub fn solution_root(&self) -> &Path {
        &self.solution_root
    }

    /// The runtime home.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Writes `etc/ports.json`.
    pub fn write_port_map(&self, map: &PortMap) -> io::Result<()> {
        let json = serde_json::to_string_pretty(map)?;
        std::fs::write(self.home.join("etc/ports.json"), json)
    }

    /// Writes a port map with one entry per `(id, start_port)` pair, each
    /// published as `runtime.<id>.port`.
    pub fn write_ports(&self, ports: &[(&str, u16)]) -> io::Result<()> {
        let entries = ports
            .iter()
            .map(|(id, start)| PortEntry::new(*id, format!("runtime.{id}.port"), *start))
            .collect();
        self.write_port_map(&PortMap::new(entries))
    }

    /// Writes `etc/custom.properties`.
    pub fn write_properties(&self, text: &str) -> io::Result<()> {
        std::fs::write(self.home.join("etc/custom.properties"), text)
    }

    /// A boot configuration for this layout that ignores the environment.
    #[must_use]
    pub fn boot_config(&self) -> BootConfig {
        BootConfig::new(&self.solution_root).with_app_root_env("ISOLAUNCH_FIXTURE_UNSET")
    }
}
