// SPDX-License-Identifier: Apache-2.0

//! The address-space seam.
//!
//! Virtual-memory mechanics live outside this crate; a process only needs
//! an opaque object it exclusively owns, can swap, and can ask to
//! duplicate at fork time. [`MemSpace`] is the flat-buffer model space
//! used by kernels without an MMU model and by the tests; anything richer
//! implements [`AddrSpace`] elsewhere.

use alloc::{boxed::Box, vec, vec::Vec};
use core::any::Any;

use axerrno::{AxError, AxResult};

/// An address space owned by a process.
///
/// Destruction is `Drop`. Duplication may fail with
/// [`AxError::NoMemory`], and fork fails wholesale when it does.
pub trait AddrSpace: Send {
    /// Duplicates this space into an independently owned copy.
    fn try_clone(&self) -> AxResult<Box<dyn AddrSpace>>;

    /// Called when a task running in this space gains the processor.
    /// MMU-backed spaces load their translation state here.
    fn activate(&mut self) {}

    /// Called when the processor switches away from this space.
    fn deactivate(&mut self) {}

    /// Downcast support for collaborators that know the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A flat byte-buffer address space.
pub struct MemSpace {
    data: Vec<u8>,
}

impl MemSpace {
    /// Creates a zero-filled space of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    /// Size of the space in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the space has zero bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reads the byte at `addr`.
    pub fn read_u8(&self, addr: usize) -> AxResult<u8> {
        self.data.get(addr).copied().ok_or(AxError::BadAddress)
    }

    /// Writes the byte at `addr`.
    pub fn write_u8(&mut self, addr: usize, value: u8) -> AxResult {
        match self.data.get_mut(addr) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(AxError::BadAddress),
        }
    }
}

impl AddrSpace for MemSpace {
    fn try_clone(&self) -> AxResult<Box<dyn AddrSpace>> {
        Ok(Box::new(MemSpace {
            data: self.data.clone(),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
