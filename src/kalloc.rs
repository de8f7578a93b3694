//! Physical page allocator.
//!
//! Out of scope (spec §1): the real allocator tracks physical RAM pages.
//! This stub is grounded on `kernel-rs/src/kalloc.rs`'s `Kmem` free-list
//! allocator in the teacher crate, reduced to exactly what this core
//! needs — a page-sized allocation for each process's kernel stack and
//! trap-frame page — backed by a static arena instead of real physical
//! memory.

use crate::lock::Spinlock;

pub const PGSIZE: usize = 4096;

const ARENA_PAGES: usize = 256;

struct Kmem {
    free_list: [bool; ARENA_PAGES],
}

impl Kmem {
    const fn new() -> Self {
        Self {
            free_list: [true; ARENA_PAGES],
        }
    }

    fn alloc(&mut self) -> Option<usize> {
        let idx = self.free_list.iter().position(|&free| free)?;
        self.free_list[idx] = false;
        Some(idx)
    }

    fn free(&mut self, page: usize) {
        assert!(!self.free_list[page], "kfree: double free");
        self.free_list[page] = true;
    }
}

static KMEM: Spinlock<Kmem> = Spinlock::new("kmem", Kmem::new());

/// A page of kernel memory, identified by arena index rather than a real
/// physical address since there is no real physical memory backing it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Page(usize);

impl Page {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Allocates one page, or `None` if the arena is exhausted.
pub fn kalloc() -> Option<Page> {
    KMEM.lock().alloc().map(Page)
}

/// Returns a page to the allocator.
pub fn kfree(page: Page) {
    KMEM.lock().free(page.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_free_round_trip_reuses_pages() {
        let p = kalloc().expect("arena should have free pages");
        kfree(p);
        let p2 = kalloc().expect("freed page should be reusable");
        assert_eq!(p, p2);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn double_free_panics() {
        let p = kalloc().expect("arena should have free pages");
        kfree(p);
        kfree(p);
    }
}
