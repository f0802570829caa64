//! Restoration coordinator: puts the original ARP mappings back.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{BindingLedger, RunStateCell};
use crate::link::codec::encode_arp;
use crate::link::LinkLayer;

/// What a call to `restore` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Another call already claimed the restoration.
    AlreadyHandled,
    /// No complete bindings exist, so nothing was sent.
    NoBindings,
    /// Corrective frames were sent, best effort.
    Attempted { sent: usize, failed: usize },
}

/// Single entry point for reverting the poisoned mappings.
///
/// The caller must have stopped the poisoning worker before calling
/// `restore`, otherwise it could re-poison right after the corrective
/// frames go out.
pub struct RestorationCoordinator<L: LinkLayer + ?Sized> {
    link: Arc<L>,
    ledger: Arc<BindingLedger>,
    state: Arc<RunStateCell>,
}

impl<L: LinkLayer + ?Sized> RestorationCoordinator<L> {
    pub fn new(link: Arc<L>, ledger: Arc<BindingLedger>, state: Arc<RunStateCell>) -> Self {
        Self {
            link,
            ledger,
            state,
        }
    }

    /// Send one corrective reply per direction. Only the first call has
    /// any effect; later calls return `AlreadyHandled`.
    pub fn restore(&self) -> RestoreOutcome {
        if !self.state.begin_restoring() {
            return RestoreOutcome::AlreadyHandled;
        }

        let outcome = match self.ledger.corrective_replies(self.link.hardware_address()) {
            None => {
                info!("No bindings recorded, nothing to restore");
                RestoreOutcome::NoBindings
            }
            Some(frames) => {
                info!("Restoring network state...");
                let (mut sent, mut failed) = (0, 0);
                for frame in &frames {
                    match self.link.send(&encode_arp(frame)) {
                        Ok(()) => {
                            sent += 1;
                            info!("Restored {}: {}", frame.target_ip, frame);
                        }
                        Err(e) => {
                            failed += 1;
                            warn!("Could not restore ARP entry on {}: {}", frame.target_ip, e);
                        }
                    }
                }
                RestoreOutcome::Attempted { sent, failed }
            }
        };

        self.state.finish();
        outcome
    }
}
