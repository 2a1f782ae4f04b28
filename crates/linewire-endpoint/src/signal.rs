use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// One-shot event marking the end of an endpoint's decode loop.
///
/// The signal starts open and transitions to fired exactly once; it never
/// re-opens. Clones observe the same event.
#[derive(Debug, Clone, Default)]
pub struct LifecycleSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl LifecycleSignal {
    /// Create an open signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal, waking every waiter.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn fire(&self) -> bool {
        let mut fired = self.lock();
        if *fired {
            return false;
        }
        *fired = true;
        self.inner.cond.notify_all();
        true
    }

    /// Whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        *self.lock()
    }

    /// Block until the signal fires.
    pub fn wait(&self) {
        let mut fired = self.lock();
        while !*fired {
            fired = self
                .inner
                .cond
                .wait(fired)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Block until the signal fires or `timeout` elapses.
    ///
    /// Returns whether the signal has fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut fired = self.lock();
        while !*fired {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .cond
                .wait_timeout(fired, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            fired = guard;
        }
        true
    }

    // A poisoned flag is still a valid bool.
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.inner
            .fired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
