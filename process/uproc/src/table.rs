// SPDX-License-Identifier: Apache-2.0

//! The global pid-to-process table.
//!
//! Holds a strong reference to every live (running or zombie) process, so a
//! descriptor stays findable until its reaper removes it.

use alloc::sync::Arc;

use hashbrown::HashMap;
use lazy_static::lazy_static;
use usync::SpinMutex;

use crate::{Pid, Process};

lazy_static! {
    static ref PROCESS_TABLE: SpinMutex<HashMap<Pid, Arc<Process>>> =
        SpinMutex::new(HashMap::new());
}

/// Forces the table into existence ahead of first use.
pub fn bootstrap() {
    lazy_static::initialize(&PROCESS_TABLE);
}

/// Looks up a process by pid.
pub fn find(pid: Pid) -> Option<Arc<Process>> {
    PROCESS_TABLE.lock().get(&pid).cloned()
}

/// Number of registered processes.
pub fn len() -> usize {
    PROCESS_TABLE.lock().len()
}

pub(crate) fn register(proc: &Arc<Process>) {
    let prev = PROCESS_TABLE.lock().insert(proc.pid(), proc.clone());
    assert!(prev.is_none(), "pid {} registered twice", proc.pid());
}

pub(crate) fn remove(pid: Pid) {
    let prev = PROCESS_TABLE.lock().remove(&pid);
    assert!(prev.is_some(), "pid {} reaped twice", pid);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_processes_are_findable_until_removed() {
        bootstrap();
        let proc = Process::new_runnable("tabled").unwrap();
        let pid = proc.pid();
        assert!(find(pid).is_none());

        register(&proc);
        let found = find(pid).unwrap();
        assert!(Arc::ptr_eq(&found, &proc));

        remove(pid);
        assert!(find(pid).is_none());
    }
}
