//! pnet-based link implementation.

use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use macaddr::MacAddr6;
use pnet::datalink::{self, Channel, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};
use tracing::debug;

use super::LinkLayer;
use crate::error::{LinkError, ValidationError};

/// Read timeout on the datalink channel. Bounds how long a single
/// `receive` call can overrun its own timeout.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Raw Ethernet link using a pnet datalink channel.
pub struct PnetLink {
    interface: NetworkInterface,
    hardware_address: MacAddr6,
    protocol_address: Ipv4Addr,
    tx: Mutex<Box<dyn DataLinkSender>>,
    rx: Mutex<Box<dyn DataLinkReceiver>>,
}

impl PnetLink {
    /// Open a channel on `interface_name`.
    ///
    /// Fails before anything is sent if the interface is missing, down,
    /// lacks a hardware or IPv4 address, or if we lack the privilege to
    /// open a raw channel.
    pub fn open(interface_name: &str) -> Result<Self, ValidationError> {
        let interface = datalink::interfaces()
            .into_iter()
            .find(|iface| iface.name == interface_name)
            .ok_or_else(|| ValidationError::InterfaceNotFound(interface_name.to_string()))?;

        if !interface.is_up() {
            return Err(ValidationError::InterfaceDown(interface.name));
        }

        let hardware_address = interface
            .mac
            .map(|mac| MacAddr6::from(mac.octets()))
            .filter(|mac| !mac.is_nil())
            .ok_or_else(|| ValidationError::NoHardwareAddress(interface.name.clone()))?;

        let protocol_address = interface
            .ips
            .iter()
            .find_map(|net| match net.ip() {
                IpAddr::V4(ip) => Some(ip),
                IpAddr::V6(_) => None,
            })
            .ok_or_else(|| ValidationError::NoIpv4Address(interface.name.clone()))?;

        let config = Config {
            read_timeout: Some(READ_TIMEOUT),
            ..Config::default()
        };

        let (tx, rx) = match datalink::channel(&interface, config) {
            Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
            Ok(_) => {
                return Err(ValidationError::ChannelCreation {
                    interface: interface.name,
                    reason: "unsupported channel type".to_string(),
                })
            }
            Err(e) => {
                if e.kind() == io::ErrorKind::PermissionDenied {
                    return Err(ValidationError::InsufficientPermissions(interface.name));
                }
                let msg = e.to_string();
                if msg.contains("permission") || msg.contains("Operation not permitted") {
                    return Err(ValidationError::InsufficientPermissions(interface.name));
                }
                return Err(ValidationError::ChannelCreation {
                    interface: interface.name,
                    reason: msg,
                });
            }
        };

        debug!(
            "Opened {} ({} / {})",
            interface.name, hardware_address, protocol_address
        );

        Ok(Self {
            interface,
            hardware_address,
            protocol_address,
            tx: Mutex::new(tx),
            rx: Mutex::new(rx),
        })
    }

    /// List all available network interfaces.
    pub fn list_interfaces() -> Vec<String> {
        datalink::interfaces()
            .into_iter()
            .map(|iface| {
                let status = if iface.is_up() { "UP" } else { "DOWN" };
                let mac = iface
                    .mac
                    .map(|mac| mac.to_string())
                    .unwrap_or_else(|| "no MAC".to_string());
                let ips: Vec<_> = iface.ips.iter().map(|ip| ip.to_string()).collect();
                format!(
                    "{}: {} {} [{}]",
                    iface.name,
                    status,
                    mac,
                    if ips.is_empty() {
                        "no IP".to_string()
                    } else {
                        ips.join(", ")
                    }
                )
            })
            .collect()
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_poll_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

impl LinkLayer for PnetLink {
    fn interface_name(&self) -> &str {
        &self.interface.name
    }

    fn hardware_address(&self) -> MacAddr6 {
        self.hardware_address
    }

    fn protocol_address(&self) -> Ipv4Addr {
        self.protocol_address
    }

    fn send(&self, frame: &[u8]) -> Result<(), LinkError> {
        let mut tx = lock(&self.tx);
        match tx.send_to(frame, None) {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(LinkError::classify("send", &self.interface.name, e)),
            None => Err(LinkError::classify(
                "send",
                &self.interface.name,
                io::Error::new(io::ErrorKind::WouldBlock, "no send buffer available"),
            )),
        }
    }

    fn receive(
        &self,
        filter: &dyn Fn(&[u8]) -> bool,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, LinkError> {
        let deadline = Instant::now() + timeout;
        let mut rx = lock(&self.rx);

        loop {
            match rx.next() {
                Ok(frame) => {
                    if filter(frame) {
                        return Ok(Some(frame.to_vec()));
                    }
                    // Not ours, keep listening
                }
                Err(e) if is_poll_timeout(&e) => {}
                Err(e) => return Err(LinkError::classify("receive", &self.interface.name, e)),
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }
}
