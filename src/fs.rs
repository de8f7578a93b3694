//! File and inode layer.
//!
//! Out of scope (spec §1): `filedup`, `fileclose`, `idup`, `iput`, `namei`,
//! `begin_op`, `end_op`. Grounded on `kernel-rs/src/file.rs`'s `RcFile`
//! (an index into a fixed-capacity `FileTable`) and `kernel-rs/src/fs.rs`'s
//! `RcInode` in the teacher crate, reduced to what `exit`'s file/cwd
//! teardown and `fork`'s file-table duplication need. Since this crate has
//! no global allocator, reference counts live in a static fixed-capacity
//! pool rather than a heap-allocated `Rc`, the same way the teacher keeps
//! its `FileTable`/`Itable` as static arrays.

use crate::lock::Spinlock;

const NFILE: usize = 128;
const NINODE: usize = 64;

struct RefPool<const N: usize> {
    refs: [usize; N],
}

impl<const N: usize> RefPool<N> {
    const fn new() -> Self {
        Self { refs: [0; N] }
    }

    fn alloc(&mut self) -> usize {
        let slot = self
            .refs
            .iter()
            .position(|&r| r == 0)
            .expect("pool exhausted");
        self.refs[slot] = 1;
        slot
    }

    fn dup(&mut self, slot: usize) {
        self.refs[slot] += 1;
    }

    /// Returns `true` if this was the last reference.
    fn release(&mut self, slot: usize) -> bool {
        self.refs[slot] -= 1;
        let freed = self.refs[slot] == 0;
        freed
    }
}

static FILE_POOL: Spinlock<RefPool<NFILE>> = Spinlock::new("ftable", RefPool::new());
static INODE_POOL: Spinlock<RefPool<NINODE>> = Spinlock::new("itable", RefPool::new());

/// A reference-counted open file, identified by its slot in the file pool.
pub struct RcFile(usize);

impl RcFile {
    pub fn open() -> Self {
        Self(FILE_POOL.lock().alloc())
    }

    /// `filedup`: bumps the reference count and returns a new handle to
    /// the same underlying file.
    pub fn dup(&self) -> Self {
        FILE_POOL.lock().dup(self.0);
        Self(self.0)
    }

    /// `fileclose`: drops one reference, releasing the underlying file
    /// once the last handle is closed.
    pub fn close(self) {
        FILE_POOL.lock().release(self.0);
    }
}

/// A reference-counted inode, e.g. a process's current working directory.
pub struct RcInode(usize);

impl RcInode {
    /// `namei("/")`: resolves a path to an inode. Out of scope: a real
    /// implementation walks the directory tree; this stub always
    /// succeeds with a fresh handle.
    pub fn namei(_path: &str) -> Option<Self> {
        Some(Self(INODE_POOL.lock().alloc()))
    }

    /// `idup`.
    pub fn dup(&self) -> Self {
        INODE_POOL.lock().dup(self.0);
        Self(self.0)
    }

    /// `iput`.
    pub fn put(self) {
        INODE_POOL.lock().release(self.0);
    }
}

/// `begin_op`/`end_op`: brackets a filesystem transaction. Out of scope: a
/// real implementation batches writes into the on-disk log (see
/// `kernel-rs/src/log.rs`). `end_op` is modeled as this guard's `Drop`.
pub struct Transaction;

pub fn begin_op() -> Transaction {
    Transaction
}

impl Drop for Transaction {
    fn drop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_dup_and_close_share_refcount() {
        let f1 = RcFile::open();
        let f2 = f1.dup();
        f1.close();
        f2.close();
    }

    #[test]
    fn namei_root_succeeds() {
        let inode = RcInode::namei("/").expect("namei(/) should succeed");
        inode.put();
    }
}
