//! Reporting module for intercepted traffic.
//!
//! This module defines the `EventReporter` trait and provides a console
//! implementation.

mod console_reporter;

pub use console_reporter::ConsoleReporter;

use std::net::Ipv4Addr;

use crate::domain::CapturedFrame;

/// Receives each captured frame as it is observed.
///
/// Implementations only report; filtering happens in the capture engine.
pub trait EventReporter: Send + Sync {
    /// Report a captured frame.
    fn report(&self, frame: &CapturedFrame);

    /// Called when capture starts.
    fn on_start(&self, interface: &str, target: Ipv4Addr);

    /// Called when capture stops, with the number of frames reported.
    fn on_stop(&self, frames: u64);
}
