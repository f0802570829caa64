//! arpwedge - ARP man-in-the-middle on a local Ethernet segment.
//!
//! Resolves a target and its gateway, poisons both ARP caches so their
//! traffic flows through this host, reports the intercepted IPv4 frames,
//! and restores the original mappings when the run ends.

pub mod capture;
pub mod config;
pub mod domain;
pub mod error;
pub mod link;
pub mod poison;
pub mod reporter;
pub mod resolver;
pub mod restore;
pub mod session;
pub mod shutdown;

pub use config::{Config, Overrides};
pub use error::{ConfigError, LinkError, ResolveError, ValidationError};
pub use link::{LinkLayer, PnetLink};
pub use reporter::{ConsoleReporter, EventReporter};
pub use session::{Session, SessionConfig, SessionReport};
pub use shutdown::Shutdown;
