// SPDX-License-Identifier: Apache-2.0

//! Kernel synchronization primitives.
//!
//! This crate provides the blocking primitives the rest of the kernel is
//! built on, layered bottom-up:
//!
//! - [`SpinMutex`]: a raw spinlock for short critical sections. It is the
//!   only primitive here that never blocks, and it must never be held
//!   across a blocking wait.
//! - [`WaitQueue`]: a named queue of blocked tasks. Going to sleep
//!   atomically releases a caller-supplied [`SpinMutex`] guard; waking
//!   carries no ordering guarantee (a newly arriving task may barge ahead
//!   of a queued one).
//! - [`Semaphore`]: a counting semaphore built on a wait queue and a
//!   spinlock-guarded count.
//! - [`Mutex`]: a blocking mutual-exclusion lock with owner tracking,
//!   built on a binary [`Semaphore`]. Releasing a lock you do not hold is
//!   a fatal assertion, not an error code.
//! - [`Condvar`]: a condition variable used together with a caller-held
//!   [`Mutex`].
//!
//! # Examples
//!
//! ## Mutex
//! ```
//! use usync::Mutex;
//!
//! static DATA: Mutex<Vec<u8>> = Mutex::new(Vec::new());
//!
//! fn task() {
//!     let mut data = DATA.lock();
//!     data.push(42);
//! }
//! # task();
//! ```
//!
//! ## Semaphore as an event signal
//! ```
//! use usync::Semaphore;
//!
//! static READY: Semaphore = Semaphore::new("ready", 0);
//!
//! // some task: READY.acquire() blocks until another task signals
//! READY.release();
//! READY.acquire();
//! ```

mod condvar;
mod mutex;
mod semaphore;
mod spinlock;
mod wait_queue;

pub use self::{
    condvar::Condvar,
    mutex::{Mutex, MutexGuard, RawMutex},
    semaphore::{Semaphore, SemaphoreGuard},
    spinlock::{RawSpinLock, SpinMutex, SpinMutexGuard},
    wait_queue::WaitQueue,
};
