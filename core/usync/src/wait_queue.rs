// SPDX-License-Identifier: Apache-2.0

//! Named queues of blocked tasks.
//!
//! A [`WaitQueue`] is the blocking substrate beneath every sleeping
//! primitive: semaphores, blocking mutexes and condition variables all put
//! tasks to sleep on one. Sleeping takes the protecting [`SpinMutex`] as an
//! explicit argument and is atomic with respect to concurrent wakes on the
//! same queue: the task is registered as a waiter before the guard is
//! released, so a wake issued after the release cannot be missed.
//!
//! Wakeups carry no fairness guarantee. A task that starts sleeping after
//! another may be woken first, and a task that never sleeps may consume the
//! state change a wake advertised (barging).

use core::sync::atomic::{AtomicUsize, Ordering};

use event_listener::{Event, Listener};

use crate::{SpinMutex, SpinMutexGuard};

/// A named collection of blocked tasks.
pub struct WaitQueue {
    name: &'static str,
    event: Event,
    waiters: AtomicUsize,
}

impl WaitQueue {
    /// Creates an empty wait queue with the given diagnostic name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            event: Event::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    /// The queue's diagnostic name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Releases `guard`, blocks the calling task until woken, then
    /// reacquires `mutex` and returns the new guard.
    ///
    /// `guard` must have been obtained from `mutex`; the caller holds it
    /// while publishing whatever condition it is about to sleep on, so the
    /// release-and-sleep transition races with no wake. May not be called
    /// from a context that cannot block.
    pub fn sleep<'a, T: ?Sized>(
        &self,
        mutex: &'a SpinMutex<T>,
        guard: SpinMutexGuard<'a, T>,
    ) -> SpinMutexGuard<'a, T> {
        // Register as a waiter before dropping the guard: a wake that
        // happens after the guard is released is then guaranteed to see us.
        let listener = self.event.listen();
        self.waiters.fetch_add(1, Ordering::Relaxed);
        drop(guard);
        listener.wait();
        self.waiters.fetch_sub(1, Ordering::Relaxed);
        mutex.lock()
    }

    /// Wakes one waiter, if any. The caller must hold the mutex guarding
    /// this queue. Returns whether a waiter was woken.
    pub fn wake_one(&self) -> bool {
        self.event.notify(1) > 0
    }

    /// Wakes all current waiters. The caller must hold the mutex guarding
    /// this queue. Returns how many were woken.
    pub fn wake_all(&self) -> usize {
        self.event.notify(usize::MAX)
    }

    /// Number of tasks currently blocked on this queue. Diagnostic only;
    /// the value may be stale as soon as it is read.
    pub fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }
}

impl Drop for WaitQueue {
    fn drop(&mut self) {
        // Tearing down a queue some task is still blocked on would leave
        // that task asleep forever; this is a caller bug.
        assert_eq!(
            self.waiter_count(),
            0,
            "wait queue '{}' destroyed with tasks still blocked on it",
            self.name
        );
    }
}
