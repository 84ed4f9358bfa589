// SPDX-License-Identifier: Apache-2.0

//! A blocking mutual-exclusion lock with owner tracking.
//!
//! The lock is a binary [`Semaphore`] plus a record of which task holds it.
//! The owner record exists for diagnostics and misuse detection: releasing
//! a lock you do not hold, or acquiring one you already hold, is a caller
//! bug and halts the kernel rather than being reported as an error.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::Semaphore;

/// A [`lock_api::RawMutex`] implementation backed by a binary semaphore.
///
/// The owner field holds the raw [`utask::TaskId`] of the holding task, or
/// 0 when the lock is free. The owner is set exactly while the binary
/// semaphore's permit is held, so at most one task ever observes itself as
/// owner.
pub struct RawMutex {
    sem: Semaphore,
    owner_id: AtomicU64,
}

impl RawMutex {
    /// Creates an unlocked mutex.
    #[inline(always)]
    pub const fn new() -> Self {
        Self::with_name("mutex")
    }

    /// Creates an unlocked mutex with a diagnostic name.
    #[inline(always)]
    pub const fn with_name(name: &'static str) -> Self {
        Self {
            sem: Semaphore::new(name, 1),
            owner_id: AtomicU64::new(0),
        }
    }

    /// The mutex's diagnostic name.
    pub fn name(&self) -> &'static str {
        self.sem.name()
    }

    /// Returns `true` iff the calling task is the recorded owner.
    ///
    /// Never blocks. Used both for debugging and as the precondition check
    /// of the condition-variable operations.
    pub fn is_held_by_current(&self) -> bool {
        self.owner_id.load(Ordering::Relaxed) == utask::current_id().as_u64()
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl lock_api::RawMutex for RawMutex {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawMutex::new();

    // Ownership is recorded per task, so guards must not migrate.
    type GuardMarker = lock_api::GuardNoSend;

    fn lock(&self) {
        let current = utask::current_id().as_u64();
        assert_ne!(
            self.owner_id.load(Ordering::Relaxed),
            current,
            "{} tried to acquire mutex '{}' it already holds",
            utask::current_id_name(),
            self.name()
        );
        self.sem.acquire();
        self.owner_id.store(current, Ordering::Relaxed);
    }

    fn try_lock(&self) -> bool {
        if self.sem.try_acquire() {
            self.owner_id
                .store(utask::current_id().as_u64(), Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    unsafe fn unlock(&self) {
        let current = utask::current_id().as_u64();
        // Clear the owner only if it really is us; a violation must not
        // corrupt the owner record of the task legitimately holding it.
        if self
            .owner_id
            .compare_exchange(current, 0, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            panic!(
                "{} tried to release mutex '{}' it doesn't own",
                utask::current_id_name(),
                self.name()
            );
        }
        self.sem.release();
    }

    fn is_locked(&self) -> bool {
        // Derived from the permit, not the owner record: between the
        // acquire and the owner store the lock is already held.
        self.sem.available_permits() == 0
    }
}

/// An alias of [`lock_api::Mutex`] over [`RawMutex`].
pub type Mutex<T> = lock_api::Mutex<RawMutex, T>;
/// An alias of [`lock_api::MutexGuard`] over [`RawMutex`].
pub type MutexGuard<'a, T> = lock_api::MutexGuard<'a, RawMutex, T>;
