//! Port availability checks.

use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};

/// Decides whether a port can be handed to the runtime.
#[cfg_attr(test, mockall::automock)]
pub trait PortProbe: Send + Sync {
    /// Returns true if `port` is free.
    fn is_free(&self, port: u16) -> bool;
}

/// Probes by binding a TCP listener on the loopback interface.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    address: Ipv4Addr,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            address: Ipv4Addr::LOCALHOST,
        }
    }
}

impl TcpProbe {
    /// Creates a loopback probe.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Probes a different interface.
    #[must_use]
    pub fn with_address(mut self, address: Ipv4Addr) -> Self {
        self.address = address;
        self
    }
}

impl PortProbe for TcpProbe {
    fn is_free(&self, port: u16) -> bool {
        TcpListener::bind(SocketAddrV4::new(self.address, port)).is_ok()
    }
}
