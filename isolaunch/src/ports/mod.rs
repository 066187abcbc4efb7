//! Port map loading and instance port allocation.
//!
//! The runtime needs a block of ports. Each entry in the map has a start
//! port; instance `k` uses `start_port + k` for every entry, and the first
//! `k` at which all of them are free wins.

mod allocator;
mod instance;
mod map;
mod probe;

pub use allocator::{AssignedPort, PortAllocator, PortAssignment};
pub use instance::RuntimeInstance;
pub use map::{PortEntry, PortMap, DEFAULT_SEARCH_LIMIT};
pub use probe::{PortProbe, TcpProbe};

#[cfg(test)]
pub use probe::MockPortProbe;
