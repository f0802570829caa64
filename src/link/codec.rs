//! Wire encoding for the frames we send and the frames we inspect.

use std::net::Ipv4Addr;

use macaddr::MacAddr6;
use pnet::packet::arp::{ArpHardwareTypes, ArpOperation as WireOperation, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::icmp::IcmpPacket;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::{MutablePacket, Packet};
use pnet::util::MacAddr;

use crate::domain::{ArpFrame, ArpOperation, CapturedFrame, Transport};

const ETHERNET_HEADER_LEN: usize = 14;
const ARP_PACKET_LEN: usize = 28;

/// Size of an Ethernet frame carrying an IPv4 ARP packet (no padding).
pub const ARP_FRAME_LEN: usize = ETHERNET_HEADER_LEN + ARP_PACKET_LEN;

fn to_pnet(mac: MacAddr6) -> MacAddr {
    let b = mac.into_array();
    MacAddr::new(b[0], b[1], b[2], b[3], b[4], b[5])
}

fn from_pnet(mac: MacAddr) -> MacAddr6 {
    MacAddr6::from(mac.octets())
}

/// Encode an ARP frame into its 42-byte wire form.
pub fn encode_arp(frame: &ArpFrame) -> Vec<u8> {
    let mut buffer = vec![0u8; ARP_FRAME_LEN];
    {
        // Buffer sizes are fixed above, so the constructors cannot fail.
        let Some(mut ethernet) = MutableEthernetPacket::new(&mut buffer) else {
            return buffer;
        };
        ethernet.set_destination(to_pnet(frame.ether_destination));
        ethernet.set_source(to_pnet(frame.ether_source));
        ethernet.set_ethertype(EtherTypes::Arp);

        let Some(mut arp) = MutableArpPacket::new(ethernet.payload_mut()) else {
            return buffer;
        };
        arp.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp.set_protocol_type(EtherTypes::Ipv4);
        arp.set_hw_addr_len(6);
        arp.set_proto_addr_len(4);
        arp.set_operation(WireOperation::new(frame.operation.code()));
        arp.set_sender_hw_addr(to_pnet(frame.sender_hw));
        arp.set_sender_proto_addr(frame.sender_ip);
        arp.set_target_hw_addr(to_pnet(frame.target_hw));
        arp.set_target_proto_addr(frame.target_ip);
    }
    buffer
}

/// Decode an Ethernet frame if it carries an IPv4-over-Ethernet ARP packet.
pub fn decode_arp(data: &[u8]) -> Option<ArpFrame> {
    let ethernet = EthernetPacket::new(data)?;
    if ethernet.get_ethertype() != EtherTypes::Arp {
        return None;
    }

    let arp = ArpPacket::new(ethernet.payload())?;
    if arp.get_hardware_type() != ArpHardwareTypes::Ethernet
        || arp.get_protocol_type() != EtherTypes::Ipv4
    {
        return None;
    }

    let operation = ArpOperation::from_u16(arp.get_operation().0)?;

    Some(ArpFrame {
        operation,
        ether_source: from_pnet(ethernet.get_source()),
        ether_destination: from_pnet(ethernet.get_destination()),
        sender_hw: from_pnet(arp.get_sender_hw_addr()),
        sender_ip: arp.get_sender_proto_addr(),
        target_hw: from_pnet(arp.get_target_hw_addr()),
        target_ip: arp.get_target_proto_addr(),
    })
}

/// Cheap pre-filter: is this an IPv4 frame to or from `host`?
///
/// Equivalent to the BPF expression `ip host <host>`.
pub fn involves_host(data: &[u8], host: Ipv4Addr) -> bool {
    let Some(ethernet) = EthernetPacket::new(data) else {
        return false;
    };
    if ethernet.get_ethertype() != EtherTypes::Ipv4 {
        return false;
    }
    Ipv4Packet::new(ethernet.payload())
        .map(|ip| ip.get_source() == host || ip.get_destination() == host)
        .unwrap_or(false)
}

/// Extract addresses and the transport header from an IPv4 frame.
///
/// Payloads are not inspected.
pub fn decode_ipv4(data: &[u8]) -> Option<CapturedFrame> {
    let ethernet = EthernetPacket::new(data)?;
    if ethernet.get_ethertype() != EtherTypes::Ipv4 {
        return None;
    }

    let ipv4 = Ipv4Packet::new(ethernet.payload())?;
    let protocol = ipv4.get_next_level_protocol();

    let transport = match protocol {
        IpNextHeaderProtocols::Tcp => TcpPacket::new(ipv4.payload())
            .map(|tcp| Transport::Tcp {
                source_port: tcp.get_source(),
                destination_port: tcp.get_destination(),
            })
            .unwrap_or(Transport::Other(protocol.0)),
        IpNextHeaderProtocols::Udp => UdpPacket::new(ipv4.payload())
            .map(|udp| Transport::Udp {
                source_port: udp.get_source(),
                destination_port: udp.get_destination(),
            })
            .unwrap_or(Transport::Other(protocol.0)),
        IpNextHeaderProtocols::Icmp => IcmpPacket::new(ipv4.payload())
            .map(|_| Transport::Icmp)
            .unwrap_or(Transport::Other(protocol.0)),
        other => Transport::Other(other.0),
    };

    Some(CapturedFrame::new(
        ipv4.get_source(),
        ipv4.get_destination(),
        transport,
        data.len(),
    ))
}
