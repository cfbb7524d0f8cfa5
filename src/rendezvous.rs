//! Single-slot rendezvous between one blocked waiter and its signallers
//!
//! A `Rendezvous<T>` pairs mutex-guarded state with a wake signal.
//! Signallers mutate the state under the lock and then wake the waiter.
//! The waiter evaluates a `take` closure against the state every time it
//! wakes and returns as soon as the closure yields a value.
//!
//! The guarded state is the source of truth. The wake signal is only a
//! hint to re-check, so:
//! - a signal sent before anyone waits is never lost, because the waiter
//!   checks the state after arming its notification;
//! - a waiter that times out leaves the state untouched, so a later
//!   `wait` observes anything delivered in the meantime.

#[cfg(test)]
mod proptests;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

pub struct Rendezvous<T> {
    slot: Mutex<T>,
    wake: Notify,
}

impl<T> Rendezvous<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: Mutex::new(value),
            wake: Notify::new(),
        }
    }

    // Every critical section leaves the slot consistent, so a panic
    // elsewhere never invalidates the guarded state.
    fn lock(&self) -> MutexGuard<'_, T> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read or mutate the slot without waking anyone
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }

    /// Mutate the slot and wake one waiter if the mutation succeeded.
    ///
    /// # Errors
    ///
    /// Returns whatever error `f` returns. The waiter is not woken in that case.
    pub fn signal<R, E>(&self, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E> {
        let result = f(&mut self.lock());
        if result.is_ok() {
            self.wake.notify_one();
        }
        result
    }

    /// Mutate the slot and wake every waiter currently parked on it.
    ///
    /// Used for transitions every waiter has to see, such as termination.
    pub fn signal_all<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut self.lock());
        self.wake.notify_waiters();
        // Also leave a permit behind for a waiter that is between
        // checking the slot and parking.
        self.wake.notify_one();
        result
    }

    /// Block until `take` yields a value or `timeout` elapses.
    ///
    /// `take` runs under the slot lock. It is the only place where the
    /// slot's value is consumed. A `None` timeout waits indefinitely.
    /// Returns `None` on timeout and leaves the slot as it was.
    pub async fn wait<R>(
        &self,
        timeout: Option<Duration>,
        mut take: impl FnMut(&mut T) -> Option<R>,
    ) -> Option<R> {
        // A bound too large to represent is the same as no bound
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        loop {
            let notified = self.wake.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a signal landing
            // between the check and the await still wakes us.
            notified.as_mut().enable();

            let taken = {
                let mut slot = self.lock();
                take(&mut slot)
            };
            if taken.is_some() {
                return taken;
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return None;
                    }
                }
                None => notified.await,
            }
        }
    }
}

impl<T: Default> Default for Rendezvous<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
