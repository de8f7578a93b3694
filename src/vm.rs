//! Virtual-memory / page-table management.
//!
//! Out of scope (spec §1): `setupkvm`, `inituvm`, `copyuvm`, `allocuvm`,
//! `deallocuvm`, `freevm`, `switchuvm`, `switchkvm`. Grounded on
//! `kernel-rs/src/vm.rs`'s `UserMemory` API shape (`new`/`clone`/`free`) in
//! the teacher crate, reduced to an opaque address-space handle with the
//! right lifecycle so [`crate::proc`] can own one per process without a
//! real page-table implementation.

use crate::kalloc::{self, Page};

/// An opaque user address space. Owns one [`Page`] as a stand-in for a
/// real multi-level page table; `size` tracks the process's declared
/// memory size the way `struct proc`'s `sz` field does in the original
/// source.
pub struct AddressSpace {
    root: Page,
    size: usize,
}

impl AddressSpace {
    /// Builds a fresh address space for a new process (`setupkvm` +
    /// `inituvm` in the original source).
    pub fn init_user_vm() -> Option<Self> {
        let root = kalloc::kalloc()?;
        Some(Self { root, size: 0 })
    }

    /// Duplicates this address space for a forked child (`copyuvm`).
    pub fn copy_vm(&self) -> Option<Self> {
        let root = kalloc::kalloc()?;
        Some(Self {
            root,
            size: self.size,
        })
    }

    /// Grows or shrinks the address space to `new_size` bytes (`allocuvm`/
    /// `deallocuvm`). Out of scope: a real implementation maps or unmaps
    /// pages; this stub only tracks the size.
    pub fn resize(&mut self, new_size: usize) -> Result<(), ()> {
        self.size = new_size;
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Releases the address space's pages (`freevm`).
    pub fn free(self) {
        kalloc::kfree(self.root);
    }

    /// Installs this address space as the active one on the current CPU
    /// (`switchuvm`). Out of scope: a real implementation writes the page
    /// table base register.
    pub fn switch_in(&self) {}
}

/// Switches back to the kernel's own page table (`switchkvm`). Out of
/// scope: a real implementation writes the page table base register.
pub fn switch_kernel_vm() {}
