//! Session orchestration.
//!
//! Owns the shared context (link, ledger, run state, shutdown token) and
//! drives one run: resolve, poison and capture concurrently, then restore
//! exactly once no matter how the run ended.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info};

use crate::capture::{self, CaptureEngine};
use crate::domain::{BindingLedger, RunState, RunStateCell, StopReason};
use crate::error::ResolveError;
use crate::link::LinkLayer;
use crate::poison::{self, PoisonHandle, PoisonReport, PoisoningEngine};
use crate::reporter::EventReporter;
use crate::resolver::{self, AddressResolver};
use crate::restore::{RestorationCoordinator, RestoreOutcome};
use crate::shutdown::Shutdown;

/// Parameters for one interception run.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub target: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub packet_count: u64,
    pub poison_interval: Duration,
    pub resolve_attempts: u32,
    pub resolve_timeout: Duration,
    pub capture_poll: Duration,
}

impl SessionConfig {
    pub fn new(target: Ipv4Addr, gateway: Ipv4Addr) -> Self {
        Self {
            target,
            gateway,
            packet_count: capture::DEFAULT_QUOTA,
            poison_interval: poison::DEFAULT_INTERVAL,
            resolve_attempts: resolver::DEFAULT_ATTEMPTS,
            resolve_timeout: resolver::DEFAULT_TIMEOUT,
            capture_poll: capture::DEFAULT_POLL,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub reason: StopReason,
    pub frames_captured: u64,
    pub poison: PoisonReport,
    pub restoration: RestoreOutcome,
}

pub struct Session<L: LinkLayer + ?Sized> {
    link: Arc<L>,
    config: SessionConfig,
    shutdown: Shutdown,
    state: Arc<RunStateCell>,
}

impl<L: LinkLayer + ?Sized + 'static> Session<L> {
    pub fn new(link: Arc<L>, config: SessionConfig) -> Self {
        Self {
            link,
            config,
            shutdown: Shutdown::new(),
            state: Arc::new(RunStateCell::new()),
        }
    }

    /// Token for requesting a stop from outside, e.g. an interrupt handler.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn state(&self) -> RunState {
        self.state.get()
    }

    /// Run to completion.
    ///
    /// Resolution failure, including a stop requested before both hosts
    /// are resolved, is returned as an error before anything but ARP
    /// requests has been sent. Every other way a run can end, a panic on
    /// the capture path included, goes through the restoration coordinator
    /// exactly once.
    pub fn run<R: EventReporter + ?Sized>(&self, reporter: &R) -> Result<SessionReport, ResolveError> {
        info!(
            "Resolving MAC addresses on {} (target {}, gateway {})",
            self.link.interface_name(),
            self.config.target,
            self.config.gateway
        );

        let ledger = AddressResolver::new(self.link.as_ref())
            .with_attempts(self.config.resolve_attempts)
            .with_timeout(self.config.resolve_timeout)
            .with_shutdown(&self.shutdown)
            .resolve_bindings(self.config.target, self.config.gateway)
            .map_err(|e| {
                match &e {
                    ResolveError::Interrupted { .. } => info!("{}, nothing to restore", e),
                    _ => error!("Failed to resolve required MAC addresses: {}", e),
                }
                e
            })?;
        let ledger = Arc::new(ledger);

        let coordinator = RestorationCoordinator::new(
            Arc::clone(&self.link),
            Arc::clone(&ledger),
            Arc::clone(&self.state),
        );

        let (frames_captured, poison) = if self.shutdown.is_requested() {
            info!("Stop requested during resolution, skipping interception");
            (0, PoisonReport::default())
        } else {
            self.state.advance(RunState::PoisoningAndCapturing);
            self.intercept(ledger, &coordinator, reporter)
        };

        let restoration = coordinator.restore();
        let reason = self.shutdown.reason().unwrap_or(StopReason::Interrupted);

        if reason.is_error() {
            error!("Stopped on {}; ARP tables restored best-effort", reason);
        } else {
            info!("Stopped ({}); ARP tables restored", reason);
        }

        Ok(SessionReport {
            reason,
            frames_captured,
            poison,
            restoration,
        })
    }

    /// Poison on a worker thread while capturing on this one. Returns only
    /// after the worker has acknowledged the stop.
    fn intercept<R: EventReporter + ?Sized>(
        &self,
        ledger: Arc<BindingLedger>,
        coordinator: &RestorationCoordinator<L>,
        reporter: &R,
    ) -> (u64, PoisonReport) {
        let worker = PoisoningEngine::new(Arc::clone(&self.link), ledger, self.config.poison_interval)
            .spawn(self.shutdown.clone());

        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                error!("Failed to start poisoning worker: {}", e);
                self.shutdown
                    .request(StopReason::FatalNetwork(format!("poisoning worker: {e}")));
                return (0, PoisonReport::default());
            }
        };

        let mut guard = UnwindGuard {
            shutdown: &self.shutdown,
            worker: Some(worker),
            coordinator,
        };

        let capture = CaptureEngine::new(
            Arc::clone(&self.link),
            self.config.target,
            self.config.packet_count,
        )
        .with_poll(self.config.capture_poll)
        .run(&self.shutdown, reporter);

        // No-op when capture already recorded the reason.
        self.shutdown.request(capture.ended_by);
        let poison = guard.worker.take().map(PoisonHandle::join).unwrap_or_default();

        (capture.frames, poison)
    }
}

/// Stops the poisoning worker and restores if the capture path unwinds.
/// On a normal return the worker has already been taken and joined, and
/// restoration is left to `Session::run`.
struct UnwindGuard<'a, L: LinkLayer + ?Sized> {
    shutdown: &'a Shutdown,
    worker: Option<PoisonHandle>,
    coordinator: &'a RestorationCoordinator<L>,
}

impl<L: LinkLayer + ?Sized> Drop for UnwindGuard<'_, L> {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }
        error!("Capture path panicked, stopping poisoning and restoring");
        self.shutdown
            .request(StopReason::FatalNetwork("capture path panicked".to_string()));
        if let Some(worker) = self.worker.take() {
            worker.join();
        }
        self.coordinator.restore();
    }
}
