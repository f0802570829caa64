//! Hardware address resolution by ARP request.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use macaddr::MacAddr6;
use tracing::{debug, info, warn};

use crate::domain::{ArpFrame, BindingLedger, HostBinding};
use crate::error::{LinkError, ResolveError};
use crate::link::codec::{decode_arp, encode_arp};
use crate::link::LinkLayer;
use crate::shutdown::Shutdown;

/// Number of requests sent before giving up on a host.
pub const DEFAULT_ATTEMPTS: u32 = 3;
/// How long to wait for a reply to each request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
/// Longest single receive while waiting for a reply, so a stop request is
/// noticed well before the reply timeout runs out.
const STOP_POLL: Duration = Duration::from_millis(250);

/// Resolves IPv4 addresses to hardware addresses on the local segment.
pub struct AddressResolver<'a, L: LinkLayer + ?Sized> {
    link: &'a L,
    attempts: u32,
    timeout: Duration,
    shutdown: Option<&'a Shutdown>,
}

impl<'a, L: LinkLayer + ?Sized> AddressResolver<'a, L> {
    pub fn new(link: &'a L) -> Self {
        Self {
            link,
            attempts: DEFAULT_ATTEMPTS,
            timeout: DEFAULT_TIMEOUT,
            shutdown: None,
        }
    }

    /// Set the number of requests sent per host (at least one).
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Set the per-request reply timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Abandon resolution once `shutdown` is requested.
    pub fn with_shutdown(mut self, shutdown: &'a Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn stop_requested(&self) -> bool {
        self.shutdown.is_some_and(Shutdown::is_requested)
    }

    /// Broadcast a request for `address` and wait for its reply.
    ///
    /// The hardware address is taken from the reply's ARP sender field.
    /// Transient send or receive failures use up an attempt; fatal ones
    /// abort immediately, as does a stop request.
    pub fn resolve(&self, address: Ipv4Addr) -> Result<MacAddr6, ResolveError> {
        let request = encode_arp(&ArpFrame::request(
            self.link.hardware_address(),
            self.link.protocol_address(),
            address,
        ));
        let is_answer = |data: &[u8]| {
            decode_arp(data)
                .map(|frame| frame.is_reply_from(address))
                .unwrap_or(false)
        };

        for attempt in 1..=self.attempts {
            if self.stop_requested() {
                return Err(ResolveError::Interrupted { address });
            }
            debug!("who-has {} (attempt {}/{})", address, attempt, self.attempts);

            if let Err(e) = self.link.send(&request) {
                if e.is_fatal() {
                    return Err(ResolveError::Link { address, source: e });
                }
                warn!("ARP request for {} not sent: {}", address, e);
                continue;
            }

            match self.await_reply(&is_answer) {
                Ok(Some(data)) => {
                    if let Some(reply) = decode_arp(&data) {
                        return Ok(reply.sender_hw);
                    }
                }
                Ok(None) => {}
                Err(e) if e.is_fatal() => {
                    return Err(ResolveError::Link { address, source: e });
                }
                Err(e) => warn!("Waiting for ARP reply from {} failed: {}", address, e),
            }
        }

        if self.stop_requested() {
            return Err(ResolveError::Interrupted { address });
        }
        Err(ResolveError::NotFound {
            address,
            attempts: self.attempts,
        })
    }

    /// Wait up to the reply timeout in short slices, giving up early on a
    /// stop request.
    fn await_reply(&self, is_answer: &dyn Fn(&[u8]) -> bool) -> Result<Option<Vec<u8>>, LinkError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let now = Instant::now();
            if now >= deadline || self.stop_requested() {
                return Ok(None);
            }
            if let Some(data) = self.link.receive(is_answer, (deadline - now).min(STOP_POLL))? {
                return Ok(Some(data));
            }
        }
    }

    /// Resolve both hosts into a complete ledger. Nothing is recorded
    /// unless both resolutions succeed.
    pub fn resolve_bindings(
        &self,
        target: Ipv4Addr,
        gateway: Ipv4Addr,
    ) -> Result<BindingLedger, ResolveError> {
        let gateway_mac = self.resolve(gateway)?;
        info!("Gateway {} is at {}", gateway, gateway_mac);

        let target_mac = self.resolve(target)?;
        info!("Target {} is at {}", target, target_mac);

        Ok(BindingLedger::new(
            HostBinding::new(target, target_mac),
            HostBinding::new(gateway, gateway_mac),
        ))
    }
}
