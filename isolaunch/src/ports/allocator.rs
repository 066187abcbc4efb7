//! Picking an instance offset where every required port is free.

use super::map::PortMap;
use super::probe::PortProbe;
use crate::config::{keys, SystemProperties};
use crate::errors::PortError;
use serde::{Deserialize, Serialize};

/// A port handed to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedPort {
    /// Entry id from the port map.
    pub id: String,
    /// Property the port is published under.
    pub property: String,
    /// The port.
    pub port: u16,
}

/// The outcome of allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAssignment {
    /// Offset added to every start port.
    pub offset: u16,
    /// Assigned ports in port-map order.
    pub ports: Vec<AssignedPort>,
}

impl PortAssignment {
    /// Looks up the port assigned to an entry id.
    #[must_use]
    pub fn port(&self, id: &str) -> Option<u16> {
        self.ports.iter().find(|p| p.id == id).map(|p| p.port)
    }

    /// Publishes every port plus the offset.
    pub fn publish(&self, properties: &SystemProperties) {
        for assigned in &self.ports {
            properties.set(assigned.property.clone(), assigned.port.to_string());
        }
        properties.set(keys::INSTANCE_OFFSET, self.offset.to_string());
    }
}

/// Allocates port blocks against a probe.
pub struct PortAllocator<'a> {
    probe: &'a dyn PortProbe,
}

impl<'a> PortAllocator<'a> {
    /// Creates an allocator.
    #[must_use]
    pub fn new(probe: &'a dyn PortProbe) -> Self {
        Self { probe }
    }

    /// Returns the smallest offset below the search limit at which every
    /// port in `map` is free.
    pub fn allocate(&self, map: &PortMap) -> Result<PortAssignment, PortError> {
        map.validate()?;

        'offsets: for offset in 0..map.search_limit {
            let mut ports = Vec::with_capacity(map.ports.len());
            for entry in &map.ports {
                let port = entry.port_at(offset).ok_or_else(|| PortError::InvalidEntry {
                    id: entry.id.clone(),
                    reason: format!("start port {} + offset {offset} overflows", entry.start_port),
                })?;
                if !self.probe.is_free(port) {
                    tracing::debug!(id = %entry.id, port, offset, "Port busy, trying next offset");
                    continue 'offsets;
                }
                ports.push(AssignedPort {
                    id: entry.id.clone(),
                    property: entry.property.clone(),
                    port,
                });
            }

            tracing::info!(offset, ports = ports.len(), "Allocated runtime ports");
            return Ok(PortAssignment { offset, ports });
        }

        Err(PortError::Exhausted {
            search_limit: map.search_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::map::PortEntry;
    use crate::ports::probe::MockPortProbe;
    use pretty_assertions::assert_eq;

    fn two_port_map() -> PortMap {
        PortMap::new(vec![
            PortEntry::new("ssh", "runtime.ssh.port", 8101),
            PortEntry::new("rmi", "runtime.rmi.port", 11098),
        ])
    }

    #[test]
    fn test_offset_zero_when_all_free() {
        let mut probe = MockPortProbe::new();
        probe.expect_is_free().returning(|_| true);

        let assignment = PortAllocator::new(&probe).allocate(&two_port_map()).unwrap();
        assert_eq!(assignment.offset, 0);
        assert_eq!(assignment.port("ssh"), Some(8101));
        assert_eq!(assignment.port("rmi"), Some(11098));
    }

    #[test]
    fn test_skips_offsets_with_any_busy_port() {
        let mut probe = MockPortProbe::new();
        probe
            .expect_is_free()
            .returning(|port| !matches!(port, 8101 | 11099));

        let assignment = PortAllocator::new(&probe).allocate(&two_port_map()).unwrap();
        assert_eq!(assignment.offset, 2);
        assert_eq!(assignment.port("ssh"), Some(8103));
        assert_eq!(assignment.port("rmi"), Some(11100));
    }

    #[test]
    fn test_exhausted() {
        let mut probe = MockPortProbe::new();
        probe.expect_is_free().returning(|_| false);

        let err = PortAllocator::new(&probe)
            .allocate(&two_port_map().with_search_limit(3))
            .unwrap_err();
        assert!(matches!(err, PortError::Exhausted { search_limit: 3 }));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut probe = MockPortProbe::new();
        probe.expect_is_free().returning(|port| port != u16::MAX);

        let map = PortMap::new(vec![PortEntry::new("top", "top.port", u16::MAX)]);
        let err = PortAllocator::new(&probe).allocate(&map).unwrap_err();
        assert_eq!(err.code(), "PORT_ENTRY_INVALID");
    }

    #[test]
    fn test_empty_map_needs_no_probe() {
        let probe = MockPortProbe::new();
        let assignment = PortAllocator::new(&probe).allocate(&PortMap::default()).unwrap();
        assert_eq!(assignment, PortAssignment::default());
    }

    #[test]
    fn test_publish() {
        let assignment = PortAssignment {
            offset: 1,
            ports: vec![AssignedPort {
                id: "ssh".to_string(),
                property: "runtime.ssh.port".to_string(),
                port: 8102,
            }],
        };
        let props = SystemProperties::new();
        assignment.publish(&props);

        assert_eq!(props.get("runtime.ssh.port").unwrap(), "8102");
        assert_eq!(props.get(keys::INSTANCE_OFFSET).unwrap(), "1");
    }
}
