//! Store readiness gating.
//!
//! Every request waits on the completion of the most recent store
//! (re)initialization. Initialization is lazy and memoized: the first waiter
//! triggers it, concurrent waiters join the same in-flight run, and a reset
//! discards the memoized run so the next waiter starts a fresh one.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

type InitFuture = Shared<BoxFuture<'static, ()>>;

/// Serializes requests behind store (re)initialization.
#[derive(Default)]
pub struct ReadinessGate {
    in_flight: Mutex<Option<InitFuture>>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The readiness signal. `init` is invoked at most once per reset cycle,
    /// by whichever waiter arrives first; every waiter observes the same
    /// in-flight initialization.
    pub fn ready<F>(&self, init: F) -> InitFuture
    where
        F: FnOnce() -> BoxFuture<'static, ()>,
    {
        let mut slot = self.in_flight.lock();
        slot.get_or_insert_with(|| init().shared()).clone()
    }

    /// Transition back to not-ready; the next `ready` call reinitializes.
    pub fn invalidate(&self) {
        *self.in_flight.lock() = None;
    }
}
