//! Mutual-exclusion spin lock, plus the nestable interrupt-disable
//! discipline (`push_off`/`pop_off`) that replaces a single global table
//! lock in the hot paths of this core.
//!
//! Grounded on `kernel-rs/src/lock/spinlock.rs`'s `RawSpinlock` +
//! `push_off`/`pop_off` pair in the teacher crate. The per-process `state`
//! word itself is *not* protected by one of these locks (spec §4.1 requires
//! lock-free CAS there); this lock exists for the handful of fields that
//! genuinely need mutual exclusion across CPUs — the parent-link table
//! (`wait_lock`) and the kernel allocator.

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::arch;
use crate::proc::current_cpu_id;

/// A lock word: `0` means unlocked, otherwise it holds `1 + cpu_id` of the
/// holder (offset by one so cpu 0 can be distinguished from "unlocked").
pub struct RawSpinlock {
    name: &'static str,
    holder: AtomicUsize,
}

impl RawSpinlock {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            holder: AtomicUsize::new(0),
        }
    }

    fn holding(&self) -> bool {
        self.holder.load(Ordering::Relaxed) == current_cpu_id() + 1
    }

    pub fn acquire(&self) {
        // Disable interrupts first to avoid deadlocking with an interrupt
        // handler that wants the same lock on this CPU.
        unsafe { push_off() };
        assert!(!self.holding(), "acquire {}", self.name);

        let me = current_cpu_id() + 1;
        while self
            .holder
            .compare_exchange_weak(0, me, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spin_loop();
        }
    }

    pub fn release(&self) {
        assert!(self.holding(), "release {}", self.name);
        self.holder.store(0, Ordering::Release);
        unsafe { pop_off() };
    }

    /// Acquires the lock and returns a guard that releases it on drop, for
    /// locks (like `wait_lock`) that don't own the data they protect.
    pub fn lock_guard(&self) -> RawSpinlockGuard<'_> {
        self.acquire();
        RawSpinlockGuard { lock: self }
    }
}

pub struct RawSpinlockGuard<'s> {
    lock: &'s RawSpinlock,
}

impl Drop for RawSpinlockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// A spin lock that owns the data it protects.
pub struct Spinlock<T> {
    lock: RawSpinlock,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Sync for Spinlock<T> {}

pub struct SpinlockGuard<'s, T> {
    lock: &'s Spinlock<T>,
}

impl<T> Spinlock<T> {
    pub const fn new(name: &'static str, data: T) -> Self {
        Self {
            lock: RawSpinlock::new(name),
            data: UnsafeCell::new(data),
        }
    }

    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        self.lock.acquire();
        SpinlockGuard { lock: self }
    }

    /// Returns a raw pointer to the protected data without locking.
    ///
    /// # Safety
    /// The caller must already hold the lock, or must otherwise have
    /// exclusive access (e.g. during single-threaded initialization).
    pub unsafe fn get_mut_unchecked(&self) -> &mut T {
        unsafe { &mut *self.data.get() }
    }
}

impl<T> Deref for SpinlockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// `push_off`/`pop_off` are like `cli`/`sti` except that they nest: it
/// takes two `pop_off`s to undo two `push_off`s. If interrupts were already
/// off before the first `push_off`, `pop_off` leaves them off.
///
/// # Safety
/// Must be paired with a matching `pop_off` on the same CPU.
pub unsafe fn push_off() {
    let old = arch::intr_get();
    unsafe { arch::cli() };

    let cpu = crate::proc::current_cpu();
    if cpu.noff() == 0 {
        cpu.set_interrupt_enabled(old);
    }
    cpu.inc_noff();
}

/// # Safety
/// Must be paired with a previous `push_off` on the same CPU.
pub unsafe fn pop_off() {
    let cpu = crate::proc::current_cpu();
    assert!(!arch::intr_get(), "pop_off - interruptible");
    assert!(cpu.noff() >= 1, "pop_off");

    cpu.dec_noff();
    if cpu.noff() == 0 && cpu.interrupt_enabled() {
        unsafe { arch::sti() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutual_exclusion_state_is_consistent() {
        crate::proc::test_support::reset_for_test();
        let lock = Spinlock::new("test", 0u32);
        {
            let mut guard = lock.lock();
            *guard += 1;
        }
        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    #[should_panic(expected = "acquire")]
    fn double_acquire_on_same_cpu_panics() {
        crate::proc::test_support::reset_for_test();
        let lock = Spinlock::new("test", 0u32);
        let _g1 = lock.lock();
        let _g2 = lock.lock();
    }
}
