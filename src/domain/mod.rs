//! Domain models for ARP interception.
//!
//! This module contains the core types shared by the engines. They are
//! independent of the raw socket layer so they can be exercised in tests
//! without touching the network.

mod binding;
mod events;
mod frame;
mod state;

pub use binding::{BindingLedger, HostBinding};
pub use events::{CapturedFrame, Transport};
pub use frame::{ArpFrame, ArpOperation};
pub use state::{RunState, RunStateCell, StopReason};
