//! Sleep/wakeup rendezvous (spec §4.5).
//!
//! Grounded on `kernel-rs/src/proc/wait_channel.rs`'s `WaitChannel` type for
//! the public shape, and on `examples/original_source/proc.c`'s `sleep`/
//! `wakeup1` for the actual protocol: a sleeper records the address of
//! whatever it's waiting on in `p->chan` (an arbitrary `void*` — only its
//! identity matters, never its pointee), stakes `Running -> NEG_SLEEPING`,
//! and hands off to the scheduler. A waker scans the table for a matching
//! `chan` and a `Sleeping`-or-`NEG_SLEEPING` state, busy-waits out any
//! `NEG_SLEEPING` twin it finds (the sleeper is mid-transition, not done
//! yet), then CASes it onward to `Runnable`.
//!
//! `wait()`'s parent/child rendezvous (`curproc->chan = curproc`) reuses
//! this same protocol keyed on a process's own table slot address rather
//! than a dedicated [`WaitChannel`], exactly as the original does.

use super::{current_proc, sched, Proc, Procstate, TABLE};
use crate::lock::push_off;

/// A rendezvous point processes can sleep on and be woken from. Grounded
/// on the teacher's `WaitChannel`: deliberately non-zero-sized, so two
/// channels never alias the same address and spuriously wake each other's
/// sleepers.
pub struct WaitChannel {
    _padding: u8,
}

impl WaitChannel {
    pub const fn new() -> Self {
        Self { _padding: 0 }
    }

    fn addr(&self) -> usize {
        self as *const Self as usize
    }

    /// Atomically gives up the CPU and sleeps on this channel. Returns
    /// once another CPU calls [`WaitChannel::wakeup`] on the same channel.
    pub fn sleep(&self) {
        sleep_on(self.addr());
    }

    /// Wakes every process sleeping on this channel.
    pub fn wakeup(&self) {
        wakeup_on(self.addr());
    }
}

impl Default for WaitChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleeps the current process on an arbitrary channel address. Shared by
/// [`WaitChannel::sleep`] and `wait()`'s self-channel rendezvous.
fn sleep_on(chan: usize) {
    unsafe { push_off() };
    let p = current_proc().expect("sleep: no current proc");
    p.set_chan(chan);
    p.state.stake(Procstate::Running, Procstate::Sleeping);
    sched(Procstate::Sleeping);
    p.set_chan(0);
    unsafe { crate::lock::pop_off() };
}

/// `wait()`'s child-exit rendezvous: the parent sleeps with its channel
/// set to its own slot's address (`curproc->chan = curproc` in the
/// original), so `reparent`/`exit` only need the parent's table index to
/// wake it.
pub(super) fn sleep_current_on(parent_idx: usize) {
    sleep_on(proc_addr(parent_idx));
}

/// Wakes whatever is sleeping on `TABLE.procs[idx]`'s own address (spec
/// §4.4's parent wakeup from `exit`/`reparent`).
pub(super) fn wakeup_one(idx: usize) {
    wakeup_on(proc_addr(idx));
}

fn proc_addr(idx: usize) -> usize {
    &TABLE.procs[idx] as *const Proc as usize
}

fn wakeup_on(chan: usize) {
    unsafe { push_off() };
    let me = current_cpu_proc_addr();
    for p in TABLE.procs.iter() {
        if (p as *const Proc as usize) == me {
            continue;
        }
        if p.chan_addr() != chan {
            continue;
        }
        // Busy-wait out any in-flight sleep transition: the sleeper has
        // staked `Running -> NEG_SLEEPING` but hasn't finalized yet.
        while p.state.is_staked_for(Procstate::Sleeping) {
            core::hint::spin_loop();
        }
        if p.state.cas(Procstate::Sleeping, Procstate::Runnable) {
            p.set_chan(0);
        }
    }
    unsafe { crate::lock::pop_off() };
}

fn current_cpu_proc_addr() -> usize {
    current_proc().map_or(0, |p| p as *const Proc as usize)
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;

    #[test]
    fn wakeup_moves_a_sleeper_to_runnable() {
        test_support::reset_for_test();
        super::super::userinit();
        test_support::set_current(0);
        TABLE.procs[0]
            .state
            .cas(Procstate::Runnable, Procstate::Running);

        static CHANNEL: WaitChannel = WaitChannel::new();
        CHANNEL.sleep();
        assert_eq!(TABLE.procs[0].state(), Procstate::Sleeping);

        CHANNEL.wakeup();
        assert_eq!(TABLE.procs[0].state(), Procstate::Runnable);
    }

    #[test]
    fn wakeup_on_a_different_channel_does_not_wake() {
        test_support::reset_for_test();
        super::super::userinit();
        test_support::set_current(0);
        TABLE.procs[0]
            .state
            .cas(Procstate::Runnable, Procstate::Running);

        static A: WaitChannel = WaitChannel::new();
        static B: WaitChannel = WaitChannel::new();
        A.sleep();
        B.wakeup();
        assert_eq!(TABLE.procs[0].state(), Procstate::Sleeping);
    }
}
