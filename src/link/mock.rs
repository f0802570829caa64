//! In-memory link for driving the engines in tests.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use macaddr::MacAddr6;

use super::codec::{decode_arp, encode_arp};
use super::LinkLayer;
use crate::domain::{ArpFrame, ArpOperation};
use crate::error::LinkError;

pub const OPERATOR_MAC: MacAddr6 = MacAddr6::new(0x02, 0x00, 0x00, 0x00, 0x00, 0x01);

pub fn operator_ip() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 1, 50)
}

/// Records every sent frame, answers ARP requests for known hosts and
/// hands out queued inbound frames.
pub struct MockLink {
    hosts: HashMap<Ipv4Addr, MacAddr6>,
    sent: Mutex<Vec<Vec<u8>>>,
    inbound: Mutex<VecDeque<Vec<u8>>>,
    /// Sends succeed this many times, then fail fatally.
    fatal_after: Mutex<Option<usize>>,
    /// Sends fail transiently this many times before succeeding.
    transient_failures: Mutex<usize>,
    fatal_receive: Mutex<bool>,
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            hosts: HashMap::new(),
            sent: Mutex::new(Vec::new()),
            inbound: Mutex::new(VecDeque::new()),
            fatal_after: Mutex::new(None),
            transient_failures: Mutex::new(0),
            fatal_receive: Mutex::new(false),
        }
    }

    /// Answer ARP requests for `ip` with `mac`.
    pub fn with_host(mut self, ip: Ipv4Addr, mac: MacAddr6) -> Self {
        self.hosts.insert(ip, mac);
        self
    }

    pub fn with_inbound(self, frames: impl IntoIterator<Item = Vec<u8>>) -> Self {
        self.inbound.lock().unwrap().extend(frames);
        self
    }

    pub fn fail_fatally_after(self, successful_sends: usize) -> Self {
        *self.fatal_after.lock().unwrap() = Some(successful_sends);
        self
    }

    pub fn fail_transiently(self, times: usize) -> Self {
        *self.transient_failures.lock().unwrap() = times;
        self
    }

    pub fn fail_receive_fatally(self) -> Self {
        *self.fatal_receive.lock().unwrap() = true;
        self
    }

    /// All frames sent so far, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    /// Sent frames that decode as ARP, in order.
    pub fn sent_arp(&self) -> Vec<ArpFrame> {
        self.sent().iter().filter_map(|f| decode_arp(f)).collect()
    }

    pub fn sent_replies(&self) -> Vec<ArpFrame> {
        self.sent_arp()
            .into_iter()
            .filter(|f| f.operation == ArpOperation::Reply)
            .collect()
    }
}

impl LinkLayer for MockLink {
    fn interface_name(&self) -> &str {
        "mock0"
    }

    fn hardware_address(&self) -> MacAddr6 {
        OPERATOR_MAC
    }

    fn protocol_address(&self) -> Ipv4Addr {
        operator_ip()
    }

    fn send(&self, frame: &[u8]) -> Result<(), LinkError> {
        {
            let mut transient = self.transient_failures.lock().unwrap();
            if *transient > 0 {
                *transient -= 1;
                return Err(LinkError::classify(
                    "send",
                    "mock0",
                    io::Error::new(io::ErrorKind::WouldBlock, "buffer full"),
                ));
            }
        }

        {
            let mut fatal_after = self.fatal_after.lock().unwrap();
            match fatal_after.as_mut() {
                Some(0) => {
                    return Err(LinkError::Fatal {
                        op: "send",
                        interface: "mock0".to_string(),
                        source: io::Error::other("network is down"),
                    })
                }
                Some(remaining) => *remaining -= 1,
                None => {}
            }
        }

        self.sent.lock().unwrap().push(frame.to_vec());

        if let Some(request) = decode_arp(frame) {
            if request.operation == ArpOperation::Request {
                if let Some(mac) = self.hosts.get(&request.target_ip) {
                    let reply = ArpFrame::reply(
                        *mac,
                        *mac,
                        request.target_ip,
                        request.sender_hw,
                        request.sender_ip,
                    );
                    self.inbound.lock().unwrap().push_back(encode_arp(&reply));
                }
            }
        }

        Ok(())
    }

    fn receive(
        &self,
        filter: &dyn Fn(&[u8]) -> bool,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, LinkError> {
        if *self.fatal_receive.lock().unwrap() {
            return Err(LinkError::Fatal {
                op: "receive",
                interface: "mock0".to_string(),
                source: io::Error::other("network is down"),
            });
        }

        let deadline = Instant::now() + timeout;
        loop {
            {
                // Unmatched frames stay queued for later receivers.
                let mut inbound = self.inbound.lock().unwrap();
                if let Some(index) = inbound.iter().position(|frame| filter(frame)) {
                    return Ok(inbound.remove(index));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep((deadline - now).min(Duration::from_millis(5)));
        }
    }
}
