//! Process lifecycle state and stop reasons.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one interception run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Starting,
    PoisoningAndCapturing,
    Restoring,
    Stopped,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::PoisoningAndCapturing,
            2 => Self::Restoring,
            _ => Self::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::PoisoningAndCapturing => 1,
            Self::Restoring => 2,
            Self::Stopped => 3,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::PoisoningAndCapturing => write!(f, "poisoning and capturing"),
            Self::Restoring => write!(f, "restoring"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Atomic holder for `RunState`.
///
/// Transitions only move forward. `begin_restoring` is the single guard
/// that lets exactly one caller drive `Restoring -> Stopped`.
#[derive(Debug, Default)]
pub struct RunStateCell(AtomicU8);

impl RunStateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(RunState::Starting.as_u8()))
    }

    pub fn get(&self) -> RunState {
        RunState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move forward to `to`. Returns false if the state is already at or
    /// past `to`.
    pub fn advance(&self, to: RunState) -> bool {
        let target = to.as_u8();
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < target).then_some(target)
            })
            .is_ok()
    }

    /// Claim the restoration. Succeeds for exactly one caller, from any
    /// state before `Restoring`.
    pub fn begin_restoring(&self) -> bool {
        self.advance(RunState::Restoring)
    }

    pub fn finish(&self) {
        self.0.store(RunState::Stopped.as_u8(), Ordering::SeqCst);
    }
}

/// Why a run is ending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The capture quota was reached.
    QuotaReached,
    /// The operator interrupted the process.
    Interrupted,
    /// The link went away during poisoning or capture.
    FatalNetwork(String),
}

impl StopReason {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::FatalNetwork(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuotaReached => write!(f, "capture quota reached"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::FatalNetwork(detail) => write!(f, "fatal network error: {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn starts_in_starting() {
        assert_eq!(RunStateCell::new().get(), RunState::Starting);
    }

    #[test]
    fn advance_is_monotonic() {
        let cell = RunStateCell::new();
        assert!(cell.advance(RunState::PoisoningAndCapturing));
        assert!(!cell.advance(RunState::PoisoningAndCapturing));
        assert!(!cell.advance(RunState::Starting));
        assert_eq!(cell.get(), RunState::PoisoningAndCapturing);
    }

    #[test]
    fn restoring_can_be_forced_from_starting() {
        let cell = RunStateCell::new();
        assert!(cell.begin_restoring());
        assert_eq!(cell.get(), RunState::Restoring);
    }

    #[test]
    fn begin_restoring_succeeds_once() {
        let cell = RunStateCell::new();
        cell.advance(RunState::PoisoningAndCapturing);
        assert!(cell.begin_restoring());
        assert!(!cell.begin_restoring());
        cell.finish();
        assert!(!cell.begin_restoring());
        assert_eq!(cell.get(), RunState::Stopped);
    }

    #[test]
    fn begin_restoring_races_have_one_winner() {
        let cell = Arc::new(RunStateCell::new());
        cell.advance(RunState::PoisoningAndCapturing);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || cell.begin_restoring())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn only_fatal_network_is_an_error() {
        assert!(StopReason::FatalNetwork("eth0 down".into()).is_error());
        assert!(!StopReason::Interrupted.is_error());
        assert!(!StopReason::QuotaReached.is_error());
    }
}
