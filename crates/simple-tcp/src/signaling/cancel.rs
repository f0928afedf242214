//! One-shot cancellation signal shared between the dispatcher and the pinger.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct State {
    cancelled: Mutex<bool>,
    fired: Condvar,
}

impl State {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.cancelled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fires at most once; any number of clones may observe it.
#[derive(Debug, Clone, Default)]
pub(crate) struct CancellationToken {
    state: Arc<State>,
}

impl CancellationToken {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Returns `false` when it had already fired.
    pub(crate) fn cancel(&self) -> bool {
        let mut cancelled = self.state.lock();
        if *cancelled {
            return false;
        }
        *cancelled = true;
        self.state.fired.notify_all();
        true
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        *self.state.lock()
    }

    /// Blocks for up to `timeout`, returning early once the signal fires.
    ///
    /// Returns whether the signal has fired.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.state.lock();
        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            cancelled = self
                .state
                .fired
                .wait_timeout(cancelled, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        *cancelled
    }
}
