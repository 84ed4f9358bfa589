// SPDX-License-Identifier: Apache-2.0

//! A counting semaphore.

use crate::{SpinMutex, WaitQueue};

/// A counting semaphore.
///
/// The count is always `initial + releases - acquires` and never negative:
/// [`acquire`](Semaphore::acquire) sleeps while the count is zero. A
/// semaphore created with a count of zero is the usual shape for event
/// signaling; one created with a positive count bounds concurrent access to
/// a resource.
///
/// There is no fairness guarantee: a release wakes one waiter, but a task
/// that was never asleep may take the permit first.
pub struct Semaphore {
    count: SpinMutex<usize>,
    queue: WaitQueue,
}

impl Semaphore {
    /// Creates a semaphore with the given name and initial permit count.
    pub const fn new(name: &'static str, permits: usize) -> Self {
        Self {
            count: SpinMutex::new(permits),
            queue: WaitQueue::new(name),
        }
    }

    /// The semaphore's diagnostic name.
    pub fn name(&self) -> &'static str {
        self.queue.name()
    }

    /// Acquires a permit, sleeping until one is available ("P").
    ///
    /// May not be called from a context that cannot block.
    pub fn acquire(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            count = self.queue.sleep(&self.count, count);
        }
        *count -= 1;
    }

    /// Tries to acquire a permit without blocking.
    ///
    /// Returns `true` if a permit was acquired.
    pub fn try_acquire(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Releases a permit and wakes one waiter, if any ("V").
    ///
    /// Releasing more permits than were ever acquired is allowed (that is
    /// how signaling works); overflowing the count is a caller bug.
    pub fn release(&self) {
        let mut count = self.count.lock();
        assert!(
            *count < usize::MAX,
            "semaphore '{}' count overflow",
            self.name()
        );
        *count += 1;
        // Wake under the guard so the woken task cannot observe the count
        // before this increment.
        self.queue.wake_one();
    }

    /// Returns the current number of available permits.
    pub fn available_permits(&self) -> usize {
        *self.count.lock()
    }

    /// Number of tasks currently blocked in [`acquire`](Semaphore::acquire).
    pub fn waiter_count(&self) -> usize {
        self.queue.waiter_count()
    }

    /// Acquires a permit and returns a guard that releases it on drop.
    pub fn acquire_guard(&self) -> SemaphoreGuard<'_> {
        self.acquire();
        SemaphoreGuard { sem: self }
    }
}

/// RAII guard for a semaphore permit.
pub struct SemaphoreGuard<'a> {
    sem: &'a Semaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.sem.release();
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;

    #[test]
    fn basic_acquire_release() {
        let sem = Semaphore::new("basic", 2);

        assert_eq!(sem.available_permits(), 2);
        sem.acquire();
        assert_eq!(sem.available_permits(), 1);
        sem.acquire();
        assert_eq!(sem.available_permits(), 0);
        sem.release();
        assert_eq!(sem.available_permits(), 1);
        sem.release();
        assert_eq!(sem.available_permits(), 2);
    }

    #[test]
    fn try_acquire_at_zero() {
        let sem = Semaphore::new("try", 1);
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        sem.release();
        assert!(sem.try_acquire());
        assert_eq!(sem.available_permits(), 0);
    }

    #[test]
    fn guard_releases_on_drop() {
        let sem = Semaphore::new("raii", 3);
        {
            let _g1 = sem.acquire_guard();
            assert_eq!(sem.available_permits(), 2);
            {
                let _g2 = sem.acquire_guard();
                assert_eq!(sem.available_permits(), 1);
            }
            assert_eq!(sem.available_permits(), 2);
        }
        assert_eq!(sem.available_permits(), 3);
    }

    #[test]
    fn release_beyond_initial_count() {
        let sem = Semaphore::new("over", 1);
        sem.release();
        sem.release();
        assert_eq!(sem.available_permits(), 3);
        for left in (0..3).rev() {
            assert!(sem.try_acquire());
            assert_eq!(sem.available_permits(), left);
        }
        assert!(!sem.try_acquire());
    }

    #[test]
    fn blocked_acquire_is_woken_by_release() {
        let sem = Arc::new(Semaphore::new("rendezvous", 0));

        let waiter = {
            let sem = sem.clone();
            utask::spawn("acquirer", move || sem.acquire()).unwrap()
        };

        // The waiter must actually park on the empty semaphore.
        while sem.waiter_count() == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(sem.available_permits(), 0);

        sem.release();
        waiter.join();
        // The woken acquire consumed the permit.
        assert_eq!(sem.available_permits(), 0);
    }

    #[test]
    fn signal_before_wait_is_banked() {
        let sem = Semaphore::new("banked", 0);
        sem.release();
        // The banked permit makes this acquire return immediately.
        sem.acquire();
        assert_eq!(sem.available_permits(), 0);
    }
}
