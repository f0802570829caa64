//! Domain events for intercepted traffic.

use std::fmt;
use std::net::Ipv4Addr;

/// Transport header identified in a captured IPv4 packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp { source_port: u16, destination_port: u16 },
    Udp { source_port: u16, destination_port: u16 },
    Icmp,
    /// Any other IP protocol number
    Other(u8),
}

impl Transport {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tcp { .. } => "TCP",
            Self::Udp { .. } => "UDP",
            Self::Icmp => "ICMP",
            Self::Other(_) => "IP",
        }
    }

    fn ports(&self) -> Option<(u16, u16)> {
        match *self {
            Self::Tcp {
                source_port,
                destination_port,
            }
            | Self::Udp {
                source_port,
                destination_port,
            } => Some((source_port, destination_port)),
            _ => None,
        }
    }
}

/// Read-only view of one packet observed between the target and the
/// rest of the network. Lives only for the duration of a report call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub transport: Transport,
    /// Length of the whole Ethernet frame in bytes
    pub length: usize,
}

impl CapturedFrame {
    pub fn new(source: Ipv4Addr, destination: Ipv4Addr, transport: Transport, length: usize) -> Self {
        Self {
            source,
            destination,
            transport,
            length,
        }
    }

    pub fn involves(&self, host: Ipv4Addr) -> bool {
        self.source == host || self.destination == host
    }
}

impl fmt::Display for CapturedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.transport, self.transport.ports()) {
            (_, Some((sport, dport))) => write!(
                f,
                "{}:{} -> {}:{} {}",
                self.source,
                sport,
                self.destination,
                dport,
                self.transport.name()
            ),
            (Transport::Other(proto), None) => write!(
                f,
                "{} -> {} proto {}",
                self.source, self.destination, proto
            ),
            _ => write!(
                f,
                "{} -> {} {}",
                self.source,
                self.destination,
                self.transport.name()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(transport: Transport) -> CapturedFrame {
        CapturedFrame::new(
            Ipv4Addr::new(192, 168, 1, 2),
            Ipv4Addr::new(1, 1, 1, 1),
            transport,
            74,
        )
    }

    #[test]
    fn display_tcp_with_ports() {
        let f = frame(Transport::Tcp {
            source_port: 51000,
            destination_port: 443,
        });
        assert_eq!(f.to_string(), "192.168.1.2:51000 -> 1.1.1.1:443 TCP");
    }

    #[test]
    fn display_icmp() {
        assert_eq!(frame(Transport::Icmp).to_string(), "192.168.1.2 -> 1.1.1.1 ICMP");
    }

    #[test]
    fn display_other_protocol() {
        assert_eq!(
            frame(Transport::Other(47)).to_string(),
            "192.168.1.2 -> 1.1.1.1 proto 47"
        );
    }

    #[test]
    fn involves_either_end() {
        let f = frame(Transport::Icmp);
        assert!(f.involves(Ipv4Addr::new(192, 168, 1, 2)));
        assert!(f.involves(Ipv4Addr::new(1, 1, 1, 1)));
        assert!(!f.involves(Ipv4Addr::new(192, 168, 1, 1)));
    }
}
