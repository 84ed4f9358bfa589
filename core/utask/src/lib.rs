// SPDX-License-Identifier: Apache-2.0

//! Kernel task identity and spawning.
//!
//! Every execution context in the kernel is a *task*: it has a unique
//! [`TaskId`] and a display name, both fixed at creation. The rest of the
//! kernel uses the task id as the identity for ownership tracking (who holds
//! a lock) and the name for diagnostics.
//!
//! On the hosted backend each task is carried by an OS thread. The mapping
//! is kept behind this crate's API so callers never touch the thread layer
//! directly:
//!
//! - [`spawn`] creates a named task. Spawn failure is reported as resource
//!   exhaustion ([`AxError::NoMemory`]), not a panic.
//! - [`exit`] terminates the calling task and never returns. It unwinds to
//!   the spawn trampoline with a private sentinel, so a task can terminate
//!   from arbitrarily deep in its call stack.
//! - [`current_id`] lazily assigns an id to contexts that were not created
//!   through [`spawn`] (the bootstrap thread, test harness threads), so
//!   identity queries are total.
//!
//! # Examples
//!
//! ```
//! let handle = utask::spawn("worker", || {
//!     // runs with its own task id
//! })
//! .unwrap();
//! handle.join();
//! ```

use std::{
    cell::OnceCell,
    panic,
    sync::{
        Once,
        atomic::{AtomicU64, Ordering},
    },
    thread,
};

use axerrno::{AxError, AxResult};
use log::{debug, warn};

/// A unique task identifier.
///
/// Ids are never reused for the lifetime of the kernel. `0` is reserved as
/// the "no task" sentinel for owner fields, so live ids start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

impl TaskId {
    fn alloc() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Converts the task id to a raw `u64`. Never 0 for a live task.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

struct TaskMeta {
    id: TaskId,
    name: String,
}

std::thread_local! {
    static CURRENT: OnceCell<TaskMeta> = const { OnceCell::new() };
}

fn with_current<R>(f: impl FnOnce(&TaskMeta) -> R) -> R {
    CURRENT.with(|cell| {
        f(cell.get_or_init(|| TaskMeta {
            id: TaskId::alloc(),
            name: thread::current().name().unwrap_or("task").into(),
        }))
    })
}

/// Returns the id of the calling task.
pub fn current_id() -> TaskId {
    with_current(|meta| meta.id)
}

/// Returns `"Task(id, \"name\")"` for the calling task, for diagnostics
/// and assertion messages.
pub fn current_id_name() -> String {
    with_current(|meta| format!("Task({}, \"{}\")", meta.id.as_u64(), meta.name))
}

/// Relinquishes the processor to let another runnable task execute.
pub fn yield_now() {
    thread::yield_now();
}

/// Unwind sentinel thrown by [`exit`] and caught by the spawn trampoline.
struct TaskExit;

fn install_exit_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let prev = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            // Task exit is an orderly teardown, not a panic worth reporting.
            if info.payload().downcast_ref::<TaskExit>().is_some() {
                return;
            }
            prev(info);
        }));
    });
}

/// Handle to a spawned task.
pub struct JoinHandle {
    inner: thread::JoinHandle<()>,
}

impl JoinHandle {
    /// Blocks until the task has terminated.
    ///
    /// # Panics
    ///
    /// Panics if the task aborted with an unhandled panic (a kernel bug in
    /// the task body, as opposed to an orderly [`exit`]).
    pub fn join(self) {
        if self.inner.join().is_err() {
            panic!("task aborted by panic");
        }
    }
}

/// Spawns a new task running `f`.
///
/// The task gets a fresh [`TaskId`] and the given display name. Failure to
/// obtain resources for the task is reported as [`AxError::NoMemory`]; no
/// task is created in that case.
pub fn spawn<F>(name: &str, f: F) -> AxResult<JoinHandle>
where
    F: FnOnce() + Send + 'static,
{
    install_exit_hook();
    let task_name = name.to_string();
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            CURRENT.with(|cell| {
                let _ = cell.set(TaskMeta {
                    id: TaskId::alloc(),
                    name: task_name,
                });
            });
            debug!("{} started", current_id_name());
            if let Err(payload) = panic::catch_unwind(panic::AssertUnwindSafe(f)) {
                if payload.downcast_ref::<TaskExit>().is_none() {
                    panic::resume_unwind(payload);
                }
                // Orderly exit(); the task simply ends here.
            }
        })
        .map(|inner| JoinHandle { inner })
        .map_err(|err| {
            warn!("failed to spawn task: {err}");
            AxError::NoMemory
        })
}

/// Terminates the calling task. Never returns.
///
/// Only valid on tasks created through [`spawn`]; the bootstrap thread has
/// no trampoline to unwind to.
pub fn exit() -> ! {
    debug!("{} exiting", current_id_name());
    panic::panic_any(TaskExit);
}
