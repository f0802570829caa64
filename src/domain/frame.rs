//! ARP frame domain model.
//!
//! Describes the logical content of an Ethernet+ARP frame, independent of
//! wire encoding (see `link::codec`).

use std::fmt;
use std::net::Ipv4Addr;

use macaddr::MacAddr6;

/// ARP operation codes as defined in RFC 826.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOperation {
    Request,
    Reply,
}

impl ArpOperation {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Request),
            2 => Some(Self::Reply),
            _ => None,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Request => 1,
            Self::Reply => 2,
        }
    }
}

impl fmt::Display for ArpOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "REQUEST"),
            Self::Reply => write!(f, "REPLY"),
        }
    }
}

/// A single Ethernet frame carrying an IPv4-over-Ethernet ARP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpFrame {
    pub operation: ArpOperation,
    /// Ethernet source address
    pub ether_source: MacAddr6,
    /// Ethernet destination address
    pub ether_destination: MacAddr6,
    /// ARP sender hardware address (`hwsrc`)
    pub sender_hw: MacAddr6,
    /// ARP sender protocol address (`psrc`)
    pub sender_ip: Ipv4Addr,
    /// ARP target hardware address (`hwdst`)
    pub target_hw: MacAddr6,
    /// ARP target protocol address (`pdst`)
    pub target_ip: Ipv4Addr,
}

impl ArpFrame {
    /// Broadcast "who has `target_ip`" request from our own interface.
    pub fn request(own_mac: MacAddr6, own_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            operation: ArpOperation::Request,
            ether_source: own_mac,
            ether_destination: MacAddr6::broadcast(),
            sender_hw: own_mac,
            sender_ip: own_ip,
            target_hw: MacAddr6::nil(),
            target_ip,
        }
    }

    /// Unicast reply asserting `sender_ip is-at sender_hw` to the host at
    /// `target_ip`/`target_hw`, emitted from `ether_source`.
    pub fn reply(
        ether_source: MacAddr6,
        sender_hw: MacAddr6,
        sender_ip: Ipv4Addr,
        target_hw: MacAddr6,
        target_ip: Ipv4Addr,
    ) -> Self {
        Self {
            operation: ArpOperation::Reply,
            ether_source,
            ether_destination: target_hw,
            sender_hw,
            sender_ip,
            target_hw,
            target_ip,
        }
    }

    pub fn is_reply_from(&self, address: Ipv4Addr) -> bool {
        self.operation == ArpOperation::Reply && self.sender_ip == address
    }
}

impl fmt::Display for ArpFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            ArpOperation::Request => write!(
                f,
                "who-has {} tell {} ({})",
                self.target_ip, self.sender_ip, self.sender_hw
            ),
            ArpOperation::Reply => write!(
                f,
                "{} is-at {} -> {} ({})",
                self.sender_ip, self.sender_hw, self.target_ip, self.target_hw
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_broadcast() {
        let mac = MacAddr6::new(0x02, 0, 0, 0, 0, 0x01);
        let frame = ArpFrame::request(
            mac,
            Ipv4Addr::new(10, 0, 0, 5),
            Ipv4Addr::new(10, 0, 0, 1),
        );

        assert_eq!(frame.operation, ArpOperation::Request);
        assert_eq!(frame.ether_destination, MacAddr6::broadcast());
        assert!(frame.target_hw.is_nil());
        assert_eq!(frame.sender_hw, mac);
    }

    #[test]
    fn reply_is_unicast_to_target() {
        let ours = MacAddr6::new(0x02, 0, 0, 0, 0, 0x01);
        let theirs = MacAddr6::new(0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa);
        let frame = ArpFrame::reply(
            ours,
            ours,
            Ipv4Addr::new(10, 0, 0, 2),
            theirs,
            Ipv4Addr::new(10, 0, 0, 1),
        );

        assert_eq!(frame.ether_destination, theirs);
        assert!(frame.is_reply_from(Ipv4Addr::new(10, 0, 0, 2)));
        assert!(!frame.is_reply_from(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn operation_codes() {
        assert_eq!(ArpOperation::Request.code(), 1);
        assert_eq!(ArpOperation::Reply.code(), 2);
        assert_eq!(ArpOperation::from_u16(2), Some(ArpOperation::Reply));
        assert_eq!(ArpOperation::from_u16(3), None);
    }
}
