// SPDX-License-Identifier: Apache-2.0

//! Condition variables used with the blocking [`Mutex`].
//!
//! A [`Condvar`] stores no reference to any lock; which [`Mutex`] pairs
//! with which condvar is a caller convention. The operations do require
//! (and assert) that the caller holds *a* lock: waiting without one, or
//! signaling without one, is a race waiting to happen and is treated as a
//! fatal caller bug.
//!
//! The condvar's own spinlock is held across the unlock-the-mutex /
//! register-as-waiter transition in [`Condvar::wait`], and every notify
//! takes that same spinlock first. A signal sent after the mutex is
//! released therefore cannot slip in before the waiter is registered, so
//! no wakeup is lost. Signals with no waiter present are no-ops; nothing
//! is banked for a later waiter.

use lock_api::RawMutex as _;

use crate::{MutexGuard, SpinMutex, WaitQueue};

/// A condition variable.
pub struct Condvar {
    guard: SpinMutex<()>,
    queue: WaitQueue,
}

impl Condvar {
    /// Creates a condition variable with the given diagnostic name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            guard: SpinMutex::new(()),
            queue: WaitQueue::new(name),
        }
    }

    /// The condvar's diagnostic name.
    pub fn name(&self) -> &'static str {
        self.queue.name()
    }

    /// Releases the lock behind `guard`, blocks until notified, then
    /// reacquires the lock before returning.
    ///
    /// The calling task must hold the lock (it does, by construction of
    /// `guard`, unless the guard was smuggled from elsewhere, which the
    /// owner check catches). As with all condition variables, the woken
    /// task must re-test its predicate: wakeups may be consumed by barging
    /// tasks.
    pub fn wait<T: ?Sized>(&self, guard: &mut MutexGuard<'_, T>) {
        let mutex = lock_api::MutexGuard::mutex(guard);
        let raw = unsafe { mutex.raw() };
        assert!(
            raw.is_held_by_current(),
            "{} waits on condvar '{}' without holding the paired lock",
            utask::current_id_name(),
            self.name()
        );

        // Hold our spinlock across unlock-and-register so a notify issued
        // right after the unlock still finds us on the queue.
        let held = self.guard.lock();
        unsafe { raw.unlock() };
        let held = self.queue.sleep(&self.guard, held);
        drop(held);
        raw.lock();
    }

    /// Wakes one waiter, if any; otherwise does nothing.
    ///
    /// The caller must hold the lock paired with this condvar, witnessed
    /// by `guard`. Returns whether a waiter was woken.
    pub fn notify_one<T: ?Sized>(&self, guard: &MutexGuard<'_, T>) -> bool {
        self.check_paired(guard);
        let _held = self.guard.lock();
        self.queue.wake_one()
    }

    /// Wakes all current waiters. Returns how many were woken.
    ///
    /// The caller must hold the lock paired with this condvar, witnessed
    /// by `guard`.
    pub fn notify_all<T: ?Sized>(&self, guard: &MutexGuard<'_, T>) -> usize {
        self.check_paired(guard);
        let _held = self.guard.lock();
        self.queue.wake_all()
    }

    /// Number of tasks currently blocked in [`wait`](Condvar::wait).
    /// Diagnostic only.
    pub fn waiter_count(&self) -> usize {
        self.queue.waiter_count()
    }

    fn check_paired<T: ?Sized>(&self, guard: &MutexGuard<'_, T>) {
        let raw = unsafe { lock_api::MutexGuard::mutex(guard).raw() };
        assert!(
            raw.is_held_by_current(),
            "{} signals condvar '{}' without holding the paired lock",
            utask::current_id_name(),
            self.name()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;
    use crate::{Mutex, RawMutex};

    struct Shared {
        slots: Mutex<u32>,
        cv: Condvar,
        woken: AtomicUsize,
    }

    impl Shared {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Shared {
                slots: Mutex::const_new(RawMutex::with_name("slots"), 0),
                cv: Condvar::new(name),
                woken: AtomicUsize::new(0),
            })
        }

        fn consume_slot(&self) {
            let mut slots = self.slots.lock();
            while *slots == 0 {
                self.cv.wait(&mut slots);
            }
            *slots -= 1;
            // wait() must return with the lock re-held
            assert!(unsafe { lock_api::MutexGuard::mutex(&slots).raw() }.is_held_by_current());
            self.woken.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn wait_returns_with_the_lock_held() {
        let shared = Shared::new("relock");
        let waiter = {
            let shared = shared.clone();
            utask::spawn("cv-waiter", move || shared.consume_slot()).unwrap()
        };
        while shared.cv.waiter_count() == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        {
            let mut slots = shared.slots.lock();
            *slots += 1;
            shared.cv.notify_one(&slots);
        }
        waiter.join();
        assert_eq!(shared.woken.load(Ordering::SeqCst), 1);
        assert_eq!(*shared.slots.lock(), 0);
    }

    #[test]
    fn signal_wakes_exactly_one_then_broadcast_wakes_the_rest() {
        let shared = Shared::new("one-then-all");
        let mut handles = Vec::new();
        for i in 0..2 {
            let shared = shared.clone();
            handles.push(utask::spawn(&format!("cv-{i}"), move || shared.consume_slot()).unwrap());
        }
        while shared.cv.waiter_count() < 2 {
            std::thread::sleep(Duration::from_millis(1));
        }

        {
            let mut slots = shared.slots.lock();
            *slots += 1;
            assert!(shared.cv.notify_one(&slots));
        }
        // exactly one waiter consumes the slot and leaves the queue
        while shared.woken.load(Ordering::SeqCst) < 1 {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(shared.woken.load(Ordering::SeqCst), 1);
        while shared.cv.waiter_count() > 1 {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(shared.cv.waiter_count(), 1);

        {
            let mut slots = shared.slots.lock();
            *slots += 1;
            shared.cv.notify_all(&slots);
        }
        for h in handles {
            h.join();
        }
        assert_eq!(shared.woken.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn notify_with_no_waiters_banks_nothing() {
        let shared = Shared::new("no-credit");
        {
            let slots = shared.slots.lock();
            assert!(!shared.cv.notify_one(&slots));
            assert_eq!(shared.cv.notify_all(&slots), 0);
        }

        // A waiter arriving after those notifies must still block.
        let waiter = {
            let shared = shared.clone();
            utask::spawn("late-waiter", move || shared.consume_slot()).unwrap()
        };
        while shared.cv.waiter_count() == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(shared.woken.load(Ordering::SeqCst), 0);
        {
            let mut slots = shared.slots.lock();
            *slots += 1;
            shared.cv.notify_one(&slots);
        }
        waiter.join();
        assert_eq!(shared.woken.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_without_the_lock_is_fatal() {
        let m = Mutex::const_new(RawMutex::with_name("misuse"), ());
        let cv = Condvar::new("misuse-cv");
        let mut g = m.lock();
        unsafe { m.raw().unlock() };
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cv.wait(&mut g);
        }));
        assert!(res.is_err());
        // re-take the lock so the guard drops cleanly
        unsafe { m.raw() }.lock();
        drop(g);
    }
}
