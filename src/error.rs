use std::io;
use std::net::Ipv4Addr;

use thiserror::Error;

/// Pre-flight failures. Nothing has been sent when one of these is raised,
/// so no restoration is needed.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    #[error("Interface '{0}' is down")]
    InterfaceDown(String),

    #[error("Interface '{0}' has no hardware address")]
    NoHardwareAddress(String),

    #[error("Interface '{0}' has no IPv4 address")]
    NoIpv4Address(String),

    #[error("Insufficient permissions to open '{0}'. Try running as root or with CAP_NET_RAW.")]
    InsufficientPermissions(String),

    #[error("Failed to create datalink channel on '{interface}': {reason}")]
    ChannelCreation { interface: String, reason: String },
}

/// A send or receive failure on the raw link.
///
/// `Fatal` means the link itself is gone (interface down, network
/// unreachable); callers must stop instead of retrying.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("{op} failed on {interface}: {source}")]
    Transient {
        op: &'static str,
        interface: String,
        #[source]
        source: io::Error,
    },

    #[error("network unreachable during {op} on {interface}: {source}")]
    Fatal {
        op: &'static str,
        interface: String,
        #[source]
        source: io::Error,
    },
}

impl LinkError {
    /// Build an error for `op`, classifying `source` by its errno.
    pub fn classify(op: &'static str, interface: &str, source: io::Error) -> Self {
        let interface = interface.to_string();
        if is_link_down(&source) {
            LinkError::Fatal {
                op,
                interface,
                source,
            }
        } else {
            LinkError::Transient {
                op,
                interface,
                source,
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::Fatal { .. })
    }
}

#[cfg(target_os = "linux")]
fn is_link_down(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::ENETDOWN) | Some(libc::ENETUNREACH) | Some(libc::ENODEV) | Some(libc::ENXIO)
    )
}

#[cfg(not(target_os = "linux"))]
fn is_link_down(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::AddrNotAvailable
    )
}

/// Hardware address resolution failures. Terminal at startup.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No ARP reply from {address} after {attempts} attempts")]
    NotFound { address: Ipv4Addr, attempts: u32 },

    #[error("Stop requested while resolving {address}")]
    Interrupted { address: Ipv4Addr },

    #[error("Link failure while resolving {address}: {source}")]
    Link {
        address: Ipv4Addr,
        #[source]
        source: LinkError,
    },
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}
