// SPDX-License-Identifier: Apache-2.0

//! Process lifecycle and the fork/exit/wait rendezvous.
//!
//! A [`Process`] is the unit of resource ownership: it has a pid and a
//! display name fixed at creation, an exclusively-owned address space, a
//! shared working-directory reference, and a count of attached tasks. A
//! process moves through three states:
//!
//! - **Running**: at least one task is attached.
//! - **Zombie**: the last task has exited; the exit status is recorded and
//!   the descriptor stays registered in the process table.
//! - **Reaped**: a wait call has consumed the status and removed the
//!   descriptor from the table. Terminal.
//!
//! The exiting task never frees its own descriptor; the table keeps the
//! long-lived reference until exactly one waiter reaps it. A zombie that is
//! never waited on therefore stays a zombie forever; there is no
//! reparenting or orphan reaping.
//!
//! The rendezvous between exit and wait is a per-process [`Semaphore`]
//! created with zero permits: exit publishes the status and releases it
//! once, wait acquires it. If exit runs first, the banked permit makes the
//! later wait return immediately; the status write is ordered before the
//! release, so the woken waiter always sees it.
//!
//! [`Semaphore`]: usync::Semaphore

#[macro_use]
extern crate log;

extern crate alloc;

mod addrspace;
mod api;
mod frame;
mod process;
pub mod table;

pub use self::{
    addrspace::{AddrSpace, MemSpace},
    api::{sys_exit, sys_fork, sys_getpid, sys_waitpid},
    frame::ExecFrame,
    process::{DirNode, Process, current},
};

/// A process identifier.
pub type Pid = u32;
