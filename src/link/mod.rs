//! Link layer gateway.
//!
//! This module defines the `LinkLayer` trait, the only seam through which
//! the engines touch the network, and a pnet-based implementation. Tests
//! drive the engines through an in-memory link instead.

pub mod codec;
mod pnet_link;

#[cfg(test)]
pub(crate) mod mock;

pub use pnet_link::PnetLink;

use std::net::Ipv4Addr;
use std::time::Duration;

use macaddr::MacAddr6;

use crate::error::LinkError;

/// Raw Ethernet access on one named interface.
///
/// Implementations must be shareable between the poisoning worker (which
/// only sends) and the capture path (which mostly receives).
pub trait LinkLayer: Send + Sync {
    /// Name of the interface being used.
    fn interface_name(&self) -> &str;

    /// Hardware address of the operator's interface.
    fn hardware_address(&self) -> MacAddr6;

    /// IPv4 address of the operator's interface.
    fn protocol_address(&self) -> Ipv4Addr;

    /// Transmit a single raw Ethernet frame.
    fn send(&self, frame: &[u8]) -> Result<(), LinkError>;

    /// Block until a frame accepted by `filter` arrives or `timeout`
    /// elapses. Returns `Ok(None)` on timeout.
    fn receive(
        &self,
        filter: &dyn Fn(&[u8]) -> bool,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, LinkError>;
}
