// SPDX-License-Identifier: Apache-2.0

//! The process descriptor and the current-process binding.

use alloc::{
    boxed::Box,
    string::{String, ToString},
    sync::Arc,
};
use core::{
    cell::RefCell,
    mem,
    sync::atomic::{AtomicU32, Ordering},
};

use axerrno::{AxError, AxResult};
use usync::{Semaphore, SpinMutex};

use crate::{AddrSpace, Pid, table};

/// A working-directory node shared with the VFS layer.
///
/// The process layer only reference-counts it; naming semantics belong to
/// the filesystem.
pub struct DirNode {
    path: String,
}

impl DirNode {
    /// Creates a shared directory node.
    pub fn new(path: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { path: path.into() })
    }

    /// The node's path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

struct ProcessInner {
    threads: usize,
    exit_code: Option<i32>,
    addr_space: Option<Box<dyn AddrSpace>>,
    cwd: Option<Arc<DirNode>>,
}

/// A process descriptor.
///
/// The pid and name are fixed at creation and may be read without
/// synchronization; everything else lives behind the descriptor's spinlock.
/// The `exited` semaphore is the exit/wait rendezvous: released exactly
/// once by the exiting task, acquired by the (single) reaper.
pub struct Process {
    pid: Pid,
    name: String,
    exited: Semaphore,
    inner: SpinMutex<ProcessInner>,
}

static NEXT_PID: AtomicU32 = AtomicU32::new(1);

fn alloc_pid() -> AxResult<Pid> {
    let pid = NEXT_PID.fetch_add(1, Ordering::Relaxed);
    // 0 is the post-wraparound value; both ends mean the pid space is gone.
    if pid == 0 || pid == Pid::MAX {
        return Err(AxError::NoMemory);
    }
    Ok(pid)
}

std::thread_local! {
    static CURRENT: RefCell<Option<Arc<Process>>> = const { RefCell::new(None) };
}

/// Returns the process the calling task is attached to, if any.
///
/// The binding is per execution context and never blocks, so it is safe to
/// query from scheduler paths.
pub fn current() -> Option<Arc<Process>> {
    CURRENT.with(|cur| cur.borrow().clone())
}

impl Process {
    /// Creates a fresh runnable process with no tasks and no address space.
    ///
    /// The working directory is inherited (shared, not copied) from the
    /// calling task's process if it has one. The new process is *not*
    /// registered in the process table; fork registers it once the child
    /// task is actually running.
    pub fn new_runnable(name: &str) -> AxResult<Arc<Self>> {
        let pid = alloc_pid()?;
        let cwd = current().and_then(|proc| proc.cwd());
        Ok(Arc::new(Self {
            pid,
            name: name.to_string(),
            exited: Semaphore::new("proc-exited", 0),
            inner: SpinMutex::new(ProcessInner {
                threads: 0,
                exit_code: None,
                addr_space: None,
                cwd,
            }),
        }))
    }

    /// The process identifier.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// The display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared working-directory reference, if set.
    pub fn cwd(&self) -> Option<Arc<DirNode>> {
        self.inner.lock().cwd.clone()
    }

    /// Replaces the working-directory reference, returning the old one.
    pub fn set_cwd(&self, cwd: Option<Arc<DirNode>>) -> Option<Arc<DirNode>> {
        mem::replace(&mut self.inner.lock().cwd, cwd)
    }

    /// Attaches the calling task to this process.
    ///
    /// Fails with [`AxError::BadState`] if the task is already attached to
    /// a process (this one included).
    pub fn attach_current_thread(self: &Arc<Self>) -> AxResult {
        CURRENT.with(|cur| {
            let mut cur = cur.borrow_mut();
            if let Some(bound) = &*cur {
                warn!(
                    "{} is already attached to pid {}",
                    utask::current_id_name(),
                    bound.pid
                );
                return Err(AxError::BadState);
            }
            self.inner.lock().threads += 1;
            *cur = Some(self.clone());
            Ok(())
        })
    }

    /// Detaches the calling task from this process.
    ///
    /// Decrements the attached-task count and clears the binding. Never
    /// destroys the process; teardown is the reaper's job alone. Detaching
    /// a task that is not attached to this process is a fatal caller bug.
    pub fn detach_current_thread(&self) {
        CURRENT.with(|cur| {
            let mut cur = cur.borrow_mut();
            match cur.take() {
                Some(bound) if bound.pid == self.pid => {}
                _ => panic!(
                    "{} detached from pid {} it is not attached to",
                    utask::current_id_name(),
                    self.pid
                ),
            }
        });
        let mut inner = self.inner.lock();
        assert!(inner.threads > 0, "pid {} has no attached tasks", self.pid);
        inner.threads -= 1;
    }

    /// Number of tasks currently attached.
    pub fn thread_count(&self) -> usize {
        self.inner.lock().threads
    }

    /// Swaps the owned address space, returning the previous one.
    pub fn set_addr_space(&self, space: Option<Box<dyn AddrSpace>>) -> Option<Box<dyn AddrSpace>> {
        mem::replace(&mut self.inner.lock().addr_space, space)
    }

    /// Removes and returns the owned address space.
    pub fn take_addr_space(&self) -> Option<Box<dyn AddrSpace>> {
        self.inner.lock().addr_space.take()
    }

    /// Runs `f` with access to the owned address space.
    ///
    /// The descriptor's spinlock is held for the duration, so `f` must not
    /// block; that is what makes this safe to call while switching
    /// contexts.
    pub fn with_addr_space<R>(
        &self,
        f: impl FnOnce(Option<&mut (dyn AddrSpace + 'static)>) -> R,
    ) -> R {
        let mut inner = self.inner.lock();
        f(inner.addr_space.as_deref_mut())
    }

    /// The exit status, once [`sys_exit`](crate::sys_exit) has published it.
    pub fn exit_code(&self) -> Option<i32> {
        self.inner.lock().exit_code
    }

    pub(crate) fn publish_exit_code(&self, status: i32) {
        let mut inner = self.inner.lock();
        assert!(
            inner.exit_code.is_none(),
            "pid {} exited twice",
            self.pid
        );
        inner.exit_code = Some(status);
    }

    pub(crate) fn signal_exit(&self) {
        self.exited.release();
    }

    /// Blocks until this process has exited, then reaps it: the exit
    /// status is returned, the descriptor leaves the process table, and it
    /// is destroyed when the last reference drops.
    ///
    /// Exactly one task may wait for a given process. The status write in
    /// exit is ordered before the wakeup, so the value read here is always
    /// the one the process exited with; if the process exited before this
    /// call, the banked rendezvous permit makes it return immediately.
    pub fn wait(&self) -> i32 {
        self.exited.acquire();
        let status = match self.inner.lock().exit_code {
            Some(status) => status,
            None => panic!("pid {} signaled exit without publishing a status", self.pid),
        };
        table::remove(self.pid);
        debug!("reaped pid {} ('{}'), status {}", self.pid, self.name, status);
        status
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.threads != 0 {
            // Not fatal: a task binding that dies with its host thread
            // drops the last reference from thread-local storage.
            warn!(
                "pid {} destroyed with {} tasks still attached",
                self.pid, inner.threads
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pids_are_unique_and_nonzero() {
        let a = Process::new_runnable("a").unwrap();
        let b = Process::new_runnable("b").unwrap();
        assert_ne!(a.pid(), 0);
        assert_ne!(a.pid(), b.pid());
    }

    #[test]
    fn attach_and_detach_track_the_count() {
        let proc = Process::new_runnable("counted").unwrap();
        assert_eq!(proc.thread_count(), 0);
        proc.attach_current_thread().unwrap();
        assert_eq!(proc.thread_count(), 1);
        assert_eq!(current().unwrap().pid(), proc.pid());
        proc.detach_current_thread();
        assert_eq!(proc.thread_count(), 0);
        assert!(current().is_none());
    }

    #[test]
    fn double_attach_is_rejected() {
        let first = Process::new_runnable("first").unwrap();
        let second = Process::new_runnable("second").unwrap();
        first.attach_current_thread().unwrap();
        assert_eq!(second.attach_current_thread(), Err(AxError::BadState));
        // even re-attaching to the same process is a binding bug
        assert_eq!(first.attach_current_thread(), Err(AxError::BadState));
        assert_eq!(first.thread_count(), 1);
        assert_eq!(second.thread_count(), 0);
        first.detach_current_thread();
    }

    #[test]
    fn cwd_is_inherited_by_reference() {
        let parent = Process::new_runnable("parent").unwrap();
        parent.set_cwd(Some(DirNode::new("/home")));
        parent.attach_current_thread().unwrap();

        let child = Process::new_runnable("child").unwrap();
        let parent_cwd = parent.cwd().unwrap();
        let child_cwd = child.cwd().unwrap();
        assert!(Arc::ptr_eq(&parent_cwd, &child_cwd));
        assert_eq!(child_cwd.path(), "/home");

        parent.detach_current_thread();
    }

    #[test]
    fn address_space_is_swappable() {
        use crate::MemSpace;

        let proc = Process::new_runnable("vm").unwrap();
        assert!(proc.with_addr_space(|space| space.is_none()));

        let old = proc.set_addr_space(Some(Box::new(MemSpace::new(8))));
        assert!(old.is_none());
        proc.with_addr_space(|space| {
            let mem = space.unwrap().as_any_mut().downcast_mut::<MemSpace>().unwrap();
            mem.write_u8(0, 9).unwrap();
        });

        let taken = proc.take_addr_space().unwrap();
        assert_eq!(
            taken.as_any().downcast_ref::<MemSpace>().unwrap().read_u8(0).unwrap(),
            9
        );
        assert!(proc.with_addr_space(|space| space.is_none()));
    }
}
