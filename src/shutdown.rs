//! Cancellation token shared by the engines and the interrupt handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::domain::StopReason;

/// Cloneable stop request.
///
/// Any context may request a stop; the first reason recorded wins. Reads
/// of the flag are lock-free, and `wait_timeout` wakes as soon as a stop
/// is requested.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    reason: Mutex<Option<StopReason>>,
    wake: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Returns true if this call recorded the reason.
    pub fn request(&self, reason: StopReason) -> bool {
        let mut slot = self.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.wake.notify_all();
        true
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.lock().clone()
    }

    /// Sleep for up to `timeout`, returning early if a stop is requested.
    /// Returns true if a stop has been requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let slot = self.lock();
        let (slot, _) = self
            .inner
            .wake
            .wait_timeout_while(slot, timeout, |reason| reason.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        slot.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<StopReason>> {
        self.inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
