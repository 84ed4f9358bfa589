// SPDX-License-Identifier: Apache-2.0

//! Saved execution context.

/// A snapshot of a task's user-visible execution state.
///
/// Fixed-size and `Copy`: fork duplicates the parent's frame by value and
/// hands the copy to the child's entry trampoline, which overwrites the
/// syscall-return slot with 0 before the child resumes. The contents are
/// otherwise opaque to the process layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecFrame {
    /// Program counter.
    pub pc: usize,
    /// Stack pointer.
    pub sp: usize,
    /// General-purpose registers.
    pub gpr: [usize; 8],
    retval: usize,
}

impl ExecFrame {
    /// The value this frame will return from the in-flight syscall.
    pub fn syscall_return(&self) -> usize {
        self.retval
    }

    /// Overwrites the syscall-return slot.
    pub fn set_syscall_return(&mut self, value: usize) {
        self.retval = value;
    }
}
