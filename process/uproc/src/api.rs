// SPDX-License-Identifier: Apache-2.0

//! The process syscalls: fork, exit, waitpid, getpid.

use alloc::boxed::Box;

use axerrno::{AxError, AxResult};

use crate::{AddrSpace, ExecFrame, Pid, Process, current, table};

/// Forks the current process.
///
/// The child gets a fresh pid, an independent copy of the parent's address
/// space, and a shared reference to the parent's working directory. Its
/// first task starts in `enter` with a copy of `frame` whose syscall
/// return value has been rewritten to 0; the parent sees the child's pid
/// as the `Ok` value here. Any failure (pid exhaustion, address-space copy,
/// task spawn) leaves the parent untouched and creates no child.
pub fn sys_fork(
    frame: ExecFrame,
    enter: impl FnOnce(ExecFrame) + Send + 'static,
) -> AxResult<Pid> {
    let parent = current().ok_or(AxError::BadState)?;

    let child = Process::new_runnable(parent.name())?;
    let dup: Option<Box<dyn AddrSpace>> = parent
        .with_addr_space(|space| space.map(|s| s.try_clone()).transpose())?;
    child.set_addr_space(dup);

    let mut child_frame = frame;
    child_frame.set_syscall_return(0);

    let pid = child.pid();
    let trampoline_proc = child.clone();
    let spawned = utask::spawn(child.name(), move || {
        trampoline_proc
            .attach_current_thread()
            .unwrap_or_else(|e| panic!("fork child could not attach: {e:?}"));
        trampoline_proc.with_addr_space(|space| {
            if let Some(space) = space {
                space.activate();
            }
        });
        enter(child_frame);
        panic!("fork entry for pid {} returned", trampoline_proc.pid());
    });
    if let Err(e) = spawned {
        warn!("fork of pid {} failed to spawn: {e:?}", parent.pid());
        return Err(e);
    }
    // Register only once the child task exists. The trampoline never
    // consults the table, and a pid that was never spawned must never be
    // findable: a waiter that found it would block on a rendezvous permit
    // nobody will ever release.
    table::register(&child);

    debug!("pid {} forked pid {} ('{}')", parent.pid(), pid, child.name());
    Ok(pid)
}

/// Exits the current process with `status` and never returns.
///
/// The status is published before the rendezvous permit is released, so a
/// waiter can never observe the wakeup without the status. The zombie
/// descriptor stays in the table until someone waits for it.
pub fn sys_exit(status: i32) -> ! {
    let proc = match current() {
        Some(proc) => proc,
        None => panic!("{} exited with no process attached", utask::current_id_name()),
    };
    debug!("pid {} exiting, status {}", proc.pid(), status);
    proc.publish_exit_code(status);
    proc.with_addr_space(|space| {
        if let Some(space) = space {
            space.deactivate();
        }
    });
    proc.detach_current_thread();
    proc.signal_exit();
    utask::exit()
}

/// Waits for the process `pid` to exit and reaps it.
///
/// Returns the pid paired with the status it passed to [`sys_exit`].
/// Unknown (or already reaped) pids fail immediately with
/// [`AxError::NotFound`].
pub fn sys_waitpid(pid: Pid) -> AxResult<(Pid, i32)> {
    let proc = match table::find(pid) {
        Some(proc) => proc,
        None => {
            warn!("waitpid on unknown pid {pid}");
            return Err(AxError::NotFound);
        }
    };
    Ok((pid, proc.wait()))
}

/// The pid of the current process.
///
/// Calling this from a task with no process binding is a fatal bug; every
/// task that makes syscalls is attached to one.
pub fn sys_getpid() -> Pid {
    match current() {
        Some(proc) => proc.pid(),
        None => panic!("{} has no process attached", utask::current_id_name()),
    }
}
