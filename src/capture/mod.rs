//! Capture engine.
//!
//! Observes IP traffic to and from the target and hands each frame to an
//! `EventReporter` until the frame quota is reached or a stop is requested.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::domain::StopReason;
use crate::link::codec::{decode_ipv4, involves_host};
use crate::link::LinkLayer;
use crate::reporter::EventReporter;
use crate::shutdown::Shutdown;

/// Default number of frames to capture before stopping.
pub const DEFAULT_QUOTA: u64 = 1000;

/// Upper bound on a single blocking receive. Stop requests are noticed
/// within this long.
pub const DEFAULT_POLL: Duration = Duration::from_millis(250);

/// Outcome of a capture run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    /// Matching frames reported
    pub frames: u64,
    /// Why capture ended
    pub ended_by: StopReason,
}

pub struct CaptureEngine<L: LinkLayer + ?Sized> {
    link: Arc<L>,
    target: Ipv4Addr,
    quota: u64,
    poll: Duration,
}

impl<L: LinkLayer + ?Sized> CaptureEngine<L> {
    pub fn new(link: Arc<L>, target: Ipv4Addr, quota: u64) -> Self {
        Self {
            link,
            target,
            quota,
            poll: DEFAULT_POLL,
        }
    }

    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Capture until the quota is reached or `shutdown` is requested.
    ///
    /// Reaching the quota, or a fatal receive error, requests the shutdown
    /// so the poisoning worker stops as well.
    pub fn run<R: EventReporter + ?Sized>(&self, shutdown: &Shutdown, reporter: &R) -> CaptureReport {
        let target = self.target;
        let filter = move |data: &[u8]| involves_host(data, target);
        let mut frames = 0u64;

        reporter.on_start(self.link.interface_name(), target);
        info!("Capturing {} frames to/from {}", self.quota, target);

        while frames < self.quota && !shutdown.is_requested() {
            match self.link.receive(&filter, self.poll) {
                Ok(Some(data)) => {
                    if let Some(captured) = decode_ipv4(&data) {
                        frames += 1;
                        reporter.report(&captured);
                    }
                }
                Ok(None) => {}
                Err(e) if e.is_fatal() => {
                    error!("Capture on {} failed: {}", self.link.interface_name(), e);
                    shutdown.request(StopReason::FatalNetwork(e.to_string()));
                    break;
                }
                Err(e) => warn!("Capture on {}: {}", self.link.interface_name(), e),
            }
        }

        if frames >= self.quota {
            shutdown.request(StopReason::QuotaReached);
        }

        reporter.on_stop(frames);

        let ended_by = shutdown.reason().unwrap_or(StopReason::QuotaReached);
        info!("Capture finished after {} frames ({})", frames, ended_by);

        CaptureReport { frames, ended_by }
    }
}
