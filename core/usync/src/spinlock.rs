// SPDX-License-Identifier: Apache-2.0

//! A raw spinlock for short critical sections.
//!
//! This is the lowest-level mutual exclusion in the kernel: acquisition
//! busy-waits, so the lock must only guard a few instructions and must
//! never be held across anything that can block. The blocking primitives
//! in this crate all use it to guard their internal state.

use core::sync::atomic::{AtomicBool, Ordering};

/// A [`lock_api::RawMutex`] implementation that spins.
pub struct RawSpinLock {
    locked: AtomicBool,
}

impl RawSpinLock {
    /// Creates an unlocked spinlock.
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl lock_api::RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinLock::new();

    type GuardMarker = lock_api::GuardSend;

    #[inline(always)]
    fn lock(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // Read-only spin until the lock looks free, then retry the CAS.
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
    }

    #[inline(always)]
    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline(always)]
    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    #[inline(always)]
    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

/// A spinlock protecting a value of type `T`.
pub type SpinMutex<T> = lock_api::Mutex<RawSpinLock, T>;
/// RAII guard for [`SpinMutex`].
pub type SpinMutexGuard<'a, T> = lock_api::MutexGuard<'a, RawSpinLock, T>;

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn smoke() {
        let m = SpinMutex::new(());
        drop(m.lock());
        drop(m.lock());
    }

    #[test]
    fn try_lock_fails_while_held() {
        let m = SpinMutex::new(5);
        let g = m.lock();
        assert!(m.try_lock().is_none());
        drop(g);
        assert_eq!(*m.try_lock().unwrap(), 5);
    }

    #[test]
    fn concurrent_increments() {
        const NUM_THREADS: usize = 8;
        const NUM_ITERS: usize = 10_000;

        let counter = Arc::new(SpinMutex::new(0usize));
        let mut handles = Vec::new();
        for _ in 0..NUM_THREADS {
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..NUM_ITERS {
                    *counter.lock() += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*counter.lock(), NUM_THREADS * NUM_ITERS);
    }
}
