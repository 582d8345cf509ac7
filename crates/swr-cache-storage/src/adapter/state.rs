use parking_lot::RwLock;
use std::fmt;

/// Store readiness as seen by the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Disabled by configuration
    Disabled,
    /// Not yet confirmed reachable; calls go through
    Connecting,
    /// Last call or ping succeeded
    Ready,
    /// A call failed and pings are running; calls short-circuit
    Degraded,
    /// Pings exhausted; waits for an explicit reconnect
    Down,
}

impl StoreState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreState::Disabled => "disabled",
            StoreState::Connecting => "connecting",
            StoreState::Ready => "ready",
            StoreState::Degraded => "degraded",
            StoreState::Down => "down",
        }
    }

    /// Whether calls should reach the store
    pub fn accepts_calls(&self) -> bool {
        matches!(self, StoreState::Connecting | StoreState::Ready)
    }
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared readiness cell
#[derive(Debug)]
pub(crate) struct Readiness {
    state: RwLock<StoreState>,
}

impl Readiness {
    pub(crate) fn new(enabled: bool) -> Self {
        let initial = if enabled {
            StoreState::Connecting
        } else {
            StoreState::Disabled
        };
        Self {
            state: RwLock::new(initial),
        }
    }

    pub(crate) fn get(&self) -> StoreState {
        *self.state.read()
    }

    /// Record a successful call; returns the previous state when it changed
    pub(crate) fn report_success(&self) -> Option<StoreState> {
        if self.get() == StoreState::Ready {
            return None;
        }
        let mut state = self.state.write();
        match *state {
            StoreState::Disabled | StoreState::Ready => None,
            previous => {
                *state = StoreState::Ready;
                Some(previous)
            }
        }
    }

    /// Record a failed call; returns true when this failure degraded a
    /// store that was accepting calls
    pub(crate) fn report_failure(&self) -> bool {
        let mut state = self.state.write();
        if state.accepts_calls() {
            *state = StoreState::Degraded;
            true
        } else {
            false
        }
    }

    /// Pings exhausted; a store that recovered meanwhile stays ready
    pub(crate) fn mark_down(&self) -> bool {
        let mut state = self.state.write();
        if matches!(*state, StoreState::Connecting | StoreState::Degraded) {
            *state = StoreState::Down;
            true
        } else {
            false
        }
    }
}
