//! Process table, per-CPU scheduler, and the fork/exit/wait lifecycle.
//!
//! Grounded on `kernel-rs/src/proc.rs`/`kernel-rs/src/proc/*` in the teacher
//! crate for the overall shape (a fixed `[Proc; NPROC]` table built with
//! `array_macro::array!`, a `Cpu` struct per hart, `push_off`/`pop_off`
//! interrupt nesting, a `WaitChannel` rendezvous type) and on
//! `examples/original_source/proc.c` for the actual state-machine algorithm
//! this crate implements: CAS-driven transitions, staked through
//! negative-twin transients for the three hand-offs to the scheduler,
//! instead of a per-process spinlock (see [`state`] and `DESIGN.md`).

pub mod signal;
pub mod state;
pub mod wait_channel;

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicIsize, AtomicU32, AtomicUsize, Ordering};

use array_macro::array;

use crate::arch;
use crate::fs::{RcFile, RcInode};
use crate::kalloc::{self, Page};
use crate::lock::{push_off, RawSpinlock};
use crate::param::{MAXPROCNAME, NCPU, NOFILE, NPROC, SIG_NUM};
use crate::vm::AddressSpace;

pub use state::Procstate;
use state::StateCell;
pub use wait_channel::WaitChannel;

/// Saved callee-saved registers for a kernel context switch, handed to the
/// out-of-scope `swtch` routine named in spec §4.3. Field names follow
/// `examples/original_source/proc.c`'s `struct context` (`eip` plus the
/// callee-saved x86 registers); the teacher's own `Context` uses RISC-V
/// register names since `kaist-cp-rv6` targets RISC-V, but this core
/// models the x86 original.
#[derive(Copy, Clone, Default)]
#[repr(C)]
pub struct Context {
    pub edi: usize,
    pub esi: usize,
    pub ebx: usize,
    pub ebp: usize,
    pub eip: usize,
}

/// The user trap frame: the subset of saved user-mode register state that
/// the signal trampoline backs up and restores (spec §4.7). Shape follows
/// `struct trapframe` as used by `original_source/proc.c` (`esp`, `eip`,
/// `eax`, `cs`); the other segment/flag fields are carried so `userinit`
/// can set up a faithful initial user context.
#[derive(Copy, Clone, Default)]
#[repr(C)]
pub struct TrapFrame {
    pub edi: usize,
    pub esi: usize,
    pub ebx: usize,
    pub ebp: usize,
    pub eax: usize,
    pub es: usize,
    pub ds: usize,
    pub eip: usize,
    pub cs: usize,
    pub eflags: usize,
    pub esp: usize,
    pub ss: usize,
}

extern "C" {
    /// Out of scope (spec §1): switches the callee-saved registers in
    /// `*old` for those in `*new` and resumes at `new.eip`.
    #[cfg(not(any(test, feature = "test")))]
    fn swtch(old: *mut Context, new: *mut Context);
}

/// Host stand-in for `swtch` under test: there is no real second stack to
/// jump to, so a process's own `sched()` call finalizes its CAS transition
/// inline instead of relying on the scheduler loop regaining control after
/// an actual hardware context switch (see [`sched`]).
#[cfg(any(test, feature = "test"))]
unsafe fn swtch(_old: *mut Context, _new: *mut Context) {}

/// Per-CPU state: which process (if any) this CPU is running, the
/// scheduler's own context to switch back to, and the `push_off`/`pop_off`
/// nesting depth. Grounded on `kernel-rs/src/proc.rs`'s `Cpu` struct.
pub struct Cpu {
    proc_idx: AtomicIsize,
    noff: AtomicI32,
    interrupt_enabled: AtomicBool,
    scheduler_context: core::cell::UnsafeCell<Context>,
}

unsafe impl Sync for Cpu {}

impl Cpu {
    const fn new() -> Self {
        Self {
            proc_idx: AtomicIsize::new(-1),
            noff: AtomicI32::new(0),
            interrupt_enabled: AtomicBool::new(false),
            scheduler_context: core::cell::UnsafeCell::new(Context {
                edi: 0,
                esi: 0,
                ebx: 0,
                ebp: 0,
                eip: 0,
            }),
        }
    }

    pub fn noff(&self) -> i32 {
        self.noff.load(Ordering::Relaxed)
    }

    pub fn inc_noff(&self) {
        self.noff.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_noff(&self) {
        self.noff.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.interrupt_enabled.load(Ordering::Relaxed)
    }

    pub fn set_interrupt_enabled(&self, enabled: bool) {
        self.interrupt_enabled.store(enabled, Ordering::Relaxed);
    }

    fn proc_index(&self) -> Option<usize> {
        let idx = self.proc_idx.load(Ordering::Acquire);
        if idx < 0 {
            None
        } else {
            Some(idx as usize)
        }
    }

    fn set_proc_index(&self, idx: Option<usize>) {
        self.proc_idx
            .store(idx.map_or(-1, |i| i as isize), Ordering::Release);
    }

    /// # Safety
    /// Only the scheduler loop running on this CPU may call this.
    unsafe fn context_mut(&self) -> &mut Context {
        unsafe { &mut *self.scheduler_context.get() }
    }
}

static CPUS: [Cpu; NCPU] = array![_ => Cpu::new(); NCPU];

/// This CPU's id (spec §6 `cpuid()`), used to index [`CPUS`] and as the
/// lock-holder tag in [`crate::lock::RawSpinlock`].
pub fn current_cpu_id() -> usize {
    arch::lapicid()
}

/// This CPU's [`Cpu`] record (spec §6 `mycpu()`).
pub fn current_cpu() -> &'static Cpu {
    &CPUS[current_cpu_id()]
}

/// The process currently running on this CPU, if any (spec §6 `myproc()`).
pub fn current_proc() -> Option<&'static Proc> {
    unsafe { push_off() };
    let idx = current_cpu().proc_index();
    unsafe { crate::lock::pop_off() };
    idx.map(|i| &TABLE.procs[i])
}

fn current_proc_index() -> Option<usize> {
    current_cpu().proc_index()
}

/// A process's fields that are private to whoever currently owns the slot
/// (the scheduler while allocating/reaping, or the process itself while
/// running) rather than protected by the lock-free `state` word. Grounded
/// on `kernel-rs/src/proc.rs`'s `ProcData`, which documents the same
/// "no lock needed, only the owner touches this" invariant.
///
/// `pending_signals` is *not* here: `kill` posts a signal from whatever CPU
/// is running the poster, not the target's owner, so it cannot go through
/// `private_mut`'s owner-only contract. It lives on [`Proc`] instead, as an
/// `AtomicU32` (spec §5).
pub struct ProcPrivate {
    pub kstack: Option<Page>,
    pub context: Context,
    pub trapframe: TrapFrame,
    pub user_tf_backup: TrapFrame,
    pub signal_mask_backup: u32,
    pub signal_mask: u32,
    pub signal_handlers: [signal::Disposition; SIG_NUM],
    pub address_space: Option<AddressSpace>,
    pub ofile: [Option<RcFile>; NOFILE],
    pub cwd: Option<RcInode>,
    pub name: [u8; MAXPROCNAME],
    pub xstate: i32,
}

impl ProcPrivate {
    const fn zero() -> Self {
        Self {
            kstack: None,
            context: Context {
                edi: 0,
                esi: 0,
                ebx: 0,
                ebp: 0,
                eip: 0,
            },
            trapframe: ZERO_TRAPFRAME,
            user_tf_backup: ZERO_TRAPFRAME,
            signal_mask_backup: 0,
            signal_mask: 0,
            signal_handlers: [signal::Disposition::Default; SIG_NUM],
            address_space: None,
            ofile: array![_ => None; NOFILE],
            cwd: None,
            name: [0; MAXPROCNAME],
            xstate: 0,
        }
    }
}

const ZERO_TRAPFRAME: TrapFrame = TrapFrame {
    edi: 0,
    esi: 0,
    ebx: 0,
    ebp: 0,
    eax: 0,
    es: 0,
    ds: 0,
    eip: 0,
    cs: 0,
    eflags: 0,
    esp: 0,
    ss: 0,
};

/// One process-control-block slot. `state` is the single lock-free CAS
/// word (spec §4.1); `parent` is a process-table index rather than a raw
/// pointer, guarded by [`ProcTable::wait_lock`] whenever it is mutated
/// (fork/exit/reparent), per spec §3's redesign note on avoiding
/// pointer-extended lifetimes. `chan` is the address of the [`WaitChannel`]
/// a sleeping process is waiting on, `0` meaning none — only pointer
/// identity matters, never the pointee's type.
pub struct Proc {
    pid: AtomicI32,
    state: StateCell,
    killed: AtomicBool,
    parent: AtomicIsize,
    chan: AtomicUsize,
    /// Signal numbers posted to this process but not yet delivered. A
    /// plain `AtomicU32` rather than a `ProcPrivate` field: `kill` posts
    /// from the poster's CPU while `handle_sig` reads and clears bits from
    /// the target's own CPU, so the set/clear must be a real atomic
    /// read-modify-write, not a racing `&mut` through `private_mut` (spec
    /// §5, §8 invariant 5).
    pending_signals: AtomicU32,
    private: core::cell::UnsafeCell<ProcPrivate>,
}

unsafe impl Sync for Proc {}

impl Proc {
    const fn zero() -> Self {
        Self {
            pid: AtomicI32::new(0),
            state: StateCell::new(Procstate::Unused),
            killed: AtomicBool::new(false),
            parent: AtomicIsize::new(-1),
            chan: AtomicUsize::new(0),
            pending_signals: AtomicU32::new(0),
            private: core::cell::UnsafeCell::new(ProcPrivate::zero()),
        }
    }

    pub fn pid(&self) -> i32 {
        self.pid.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> Procstate {
        self.state.load()
    }

    pub fn killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    pub fn set_killed(&self, killed: bool) {
        self.killed.store(killed, Ordering::Release);
    }

    /// Atomically clears `killed`, returning whatever it held.
    fn take_killed(&self) -> bool {
        self.killed.swap(false, Ordering::AcqRel)
    }

    /// Posts `signum` as pending (spec §6 `kill`). Release-ordered so the
    /// delivery path's [`Proc::pending_signals`] acquire load is guaranteed
    /// to observe it.
    pub fn post_signal(&self, signum: u32) {
        self.pending_signals.fetch_or(1u32 << signum, Ordering::Release);
    }

    /// The current set of pending-but-undelivered signal numbers.
    pub fn pending_signals(&self) -> u32 {
        self.pending_signals.load(Ordering::Acquire)
    }

    /// Clears exactly the bits set in `mask` from the pending set.
    fn clear_pending_signals(&self, mask: u32) {
        self.pending_signals.fetch_and(!mask, Ordering::AcqRel);
    }

    /// # Safety
    /// Caller must be the slot's current owner (see [`ProcPrivate`]'s
    /// docs): the process itself while running, or the table code while
    /// the slot is `Unused`/`Embryo`/`Zombie` and no other CPU can be
    /// concurrently touching it.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn private_mut(&self) -> &mut ProcPrivate {
        unsafe { &mut *self.private.get() }
    }

    fn chan_addr(&self) -> usize {
        self.chan.load(Ordering::Acquire)
    }

    fn set_chan(&self, addr: usize) {
        self.chan.store(addr, Ordering::Release);
    }
}

/// The process system: the global process table, PID counter, and the
/// `wait_lock` ordering parent-link mutation ahead of any per-slot state
/// access. Grounded on `kernel-rs/src/proc.rs`'s `ProcessSystem`.
struct ProcTable {
    procs: [Proc; NPROC],
    next_pid: AtomicI32,
    wait_lock: RawSpinlock,
    initial_proc: AtomicIsize,
}

impl ProcTable {
    const fn zero() -> Self {
        Self {
            procs: array![_ => Proc::zero(); NPROC],
            next_pid: AtomicI32::new(1),
            wait_lock: RawSpinlock::new("wait_lock"),
            initial_proc: AtomicIsize::new(-1),
        }
    }

    fn alloc_pid(&self) -> i32 {
        self.next_pid.fetch_add(1, Ordering::Relaxed)
    }
}

static TABLE: ProcTable = ProcTable::zero();

/// Looks for an `Unused` slot, CASes it to `Embryo`, and initializes the
/// fields a fresh process needs: a pid, a kernel stack page, and a context
/// that will resume at `forkret` (spec §4.2 `allocproc`).
fn alloc_proc() -> Result<usize, ()> {
    let idx = TABLE
        .procs
        .iter()
        .position(|p| p.state.cas(Procstate::Unused, Procstate::Embryo))
        .ok_or(())?;
    let p = &TABLE.procs[idx];

    p.pid.store(TABLE.alloc_pid(), Ordering::Relaxed);
    p.killed.store(false, Ordering::Relaxed);
    p.parent.store(-1, Ordering::Relaxed);
    p.set_chan(0);
    p.pending_signals.store(0, Ordering::Relaxed);

    let kstack = match kalloc::kalloc() {
        Some(page) => page,
        None => {
            p.state.force(Procstate::Unused);
            return Err(());
        }
    };

    // Safety: the slot was just claimed via `Unused -> Embryo`; no other
    // CPU can be touching it yet.
    let private = unsafe { p.private_mut() };
    *private = ProcPrivate::zero();
    private.kstack = Some(kstack);
    private.context.eip = forkret as usize;

    Ok(idx)
}

/// Sets up the very first user process (spec §4.4 `userinit`).
pub fn userinit() {
    let idx = alloc_proc().expect("userinit: allocproc");
    TABLE.initial_proc.store(idx as isize, Ordering::Relaxed);
    let p = &TABLE.procs[idx];

    let private = unsafe { p.private_mut() };
    private.address_space = AddressSpace::init_user_vm();
    private.cwd = RcInode::namei("/");
    let name = b"initcode";
    private.name[..name.len()].copy_from_slice(name);

    p.state.force(Procstate::Runnable);
}

/// Creates a new process by copying the calling process (spec §4.4
/// `fork`). Inherits the parent's signal mask and handlers but never its
/// pending signals, and its open files via `RcFile::dup`.
pub fn fork() -> Result<i32, ()> {
    let parent = current_proc().ok_or(())?;
    let parent_idx = TABLE
        .procs
        .iter()
        .position(|p| core::ptr::eq(p, parent))
        .expect("fork: current proc not in table");

    let child_idx = alloc_proc()?;
    let child = &TABLE.procs[child_idx];

    let parent_priv = unsafe { parent.private_mut() };
    let child_priv = unsafe { child.private_mut() };

    // Guard the freshly allocated kernel stack so a failed address-space
    // copy below frees it automatically instead of leaking the page;
    // `into_inner` disarms the guard once the child is past the point
    // where it can still fail.
    let kstack = child_priv
        .kstack
        .take()
        .expect("alloc_proc always sets kstack");
    let kstack = scopeguard::guard(kstack, |k| kalloc::kfree(k));

    if let Some(space) = &parent_priv.address_space {
        match space.copy_vm() {
            Some(space) => child_priv.address_space = Some(space),
            None => {
                child.state.force(Procstate::Unused);
                return Err(());
            }
        }
    }
    child_priv.kstack = Some(scopeguard::ScopeGuard::into_inner(kstack));

    child_priv.signal_mask = 0;
    child.pending_signals.store(0, Ordering::Relaxed);
    child_priv.signal_handlers = parent_priv.signal_handlers;

    child_priv.trapframe = parent_priv.trapframe;
    child_priv.trapframe.eax = 0; // fork() returns 0 in the child

    for i in 0..NOFILE {
        child_priv.ofile[i] = parent_priv.ofile[i].as_ref().map(RcFile::dup);
    }
    child_priv.cwd = parent_priv.cwd.as_ref().map(RcInode::dup);
    child_priv.name = parent_priv.name;

    let pid = child.pid();

    {
        let _guard = TABLE.wait_lock.lock_guard();
        child.parent.store(parent_idx as isize, Ordering::Relaxed);
    }

    child.state.cas(Procstate::Embryo, Procstate::Runnable);
    Ok(pid)
}

/// Gives a process's children to the initial process once it exits (spec
/// §4.4 `reparent`). Caller must hold `wait_lock`.
fn reparent(idx: usize) {
    let initial = TABLE.initial_proc.load(Ordering::Relaxed);
    for p in TABLE.procs.iter() {
        if p.parent.load(Ordering::Relaxed) == idx as isize {
            p.parent.store(initial, Ordering::Relaxed);
            if p.state() == Procstate::Zombie && initial >= 0 {
                wait_channel::wakeup_one(initial as usize);
            }
        }
    }
}

/// Exits the current process (spec §4.4 `exit`): closes its files, drops
/// its cwd, frees its address space, reparents its children to init,
/// stakes the `Running -> Zombie` transition, and hands off to
/// [`sched`], which finalizes it and wakes a waiting parent.
pub fn exit_current(status: i32) {
    let idx = current_proc_index().expect("exit: no current proc");
    assert_ne!(
        TABLE.initial_proc.load(Ordering::Relaxed),
        idx as isize,
        "init exiting"
    );
    let p = &TABLE.procs[idx];
    let private = unsafe { p.private_mut() };

    for file in private.ofile.iter_mut() {
        if let Some(f) = file.take() {
            f.close();
        }
    }
    if let Some(cwd) = private.cwd.take() {
        let _op = crate::fs::begin_op();
        cwd.put();
    }
    if let Some(space) = private.address_space.take() {
        space.free();
    }
    private.xstate = status;

    unsafe { push_off() };
    {
        let _guard = TABLE.wait_lock.lock_guard();
        reparent(idx);
    }
    p.state.stake(Procstate::Running, Procstate::Zombie);
    sched(Procstate::Zombie);
    unsafe { crate::lock::pop_off() };
}

/// Waits for a child to exit, reaping it and returning its pid and exit
/// status (spec §4.4 `wait`). Returns `Err(())` if the caller has no
/// children.
pub fn wait() -> Result<(i32, i32), ()> {
    let idx = current_proc_index().ok_or(())?;
    loop {
        let mut have_kids = false;
        {
            let _guard = TABLE.wait_lock.lock_guard();
            for child in TABLE.procs.iter() {
                if child.parent.load(Ordering::Relaxed) != idx as isize {
                    continue;
                }
                have_kids = true;
                if child.state.cas(Procstate::Zombie, Procstate::Unused) {
                    let private = unsafe { child.private_mut() };
                    let pid = child.pid();
                    let xstate = private.xstate;
                    if let Some(stack) = private.kstack.take() {
                        kalloc::kfree(stack);
                    }
                    child.pid.store(0, Ordering::Relaxed);
                    child.parent.store(-1, Ordering::Relaxed);
                    child.killed.store(false, Ordering::Relaxed);
                    private.name = [0; MAXPROCNAME];
                    return Ok((pid, xstate));
                }
            }
        }

        if !have_kids || TABLE.procs[idx].killed() {
            return Err(());
        }

        // Wait for a child to exit (spec §4.5 `wait-sleep`).
        wait_channel::sleep_current_on(idx);
    }
}

/// Marks `pid` as having `signum` pending (spec §4.6/§6 `kill`). Returns
/// `Err(())` if no such process exists.
///
/// Posts via [`Proc::post_signal`]'s atomic OR rather than touching
/// `ProcPrivate` directly: the target process may be `Running` on another
/// CPU concurrently reading/clearing its own pending set in `handle_sig`,
/// so this cannot go through `private_mut`'s owner-only contract (spec §5).
pub fn kill(pid: i32, signum: u32) -> Result<(), ()> {
    let p = TABLE
        .procs
        .iter()
        .find(|p| p.pid() == pid && p.state() != Procstate::Unused)
        .ok_or(())?;
    p.post_signal(signum);
    Ok(())
}

/// Gives up the CPU for one scheduling round (spec §4.3 `yield`).
pub fn proc_yield() {
    unsafe { push_off() };
    let idx = current_proc_index().expect("yield: no current proc");
    let p = &TABLE.procs[idx];
    p.state.stake(Procstate::Running, Procstate::Runnable);
    sched(Procstate::Runnable);
    unsafe { crate::lock::pop_off() };
}

/// Hands off from a running process to the scheduler, having already
/// staked a `Running -> to.negative()` transition (spec §4.3 `sched`).
///
/// On real hardware this `swtch`es to the scheduler's own stack, and the
/// finalizing CAS below runs back on the scheduler's side of that jump,
/// once it is safely off this process's stack. This crate's test harness
/// has no second stack to jump to (see the `swtch` stub above), so the
/// finalization happens inline here instead — the same CAS sequence and
/// observable state transitions, without a real asynchronous hand-off.
fn sched(to: Procstate) {
    let idx = current_proc_index().expect("sched: no current proc");
    let p = &TABLE.procs[idx];
    assert_eq!(current_cpu().noff(), 1, "sched locks");
    assert!(!arch::intr_get(), "sched interruptible");

    let interrupt_enabled = current_cpu().interrupt_enabled();
    unsafe {
        swtch(
            &mut p.private_mut().context as *mut Context,
            current_cpu().context_mut() as *mut Context,
        );
    }
    current_cpu().set_interrupt_enabled(interrupt_enabled);
    current_cpu().set_proc_index(None);

    match to {
        Procstate::Sleeping => {
            if p.state.finalize(Procstate::Sleeping) && p.take_killed() {
                p.state.force(Procstate::Runnable);
            }
        }
        Procstate::Runnable => {
            p.state.finalize(Procstate::Runnable);
        }
        Procstate::Zombie => {
            if p.state.finalize(Procstate::Zombie) {
                let parent = p.parent.load(Ordering::Relaxed);
                if parent >= 0 {
                    wait_channel::wakeup_one(parent as usize);
                }
            }
        }
        _ => unreachable!("sched: unexpected target state"),
    }
}

/// Per-CPU scheduler loop (spec §4.3 `scheduler`): repeatedly scans the
/// table for a `Runnable` process and CASes it straight to `Running`. On
/// real hardware it then `swtch`es into the process and blocks there
/// until the process calls [`sched`]; in this crate's test harness that
/// hand-off is a no-op (see the `swtch` stub above), so driving a
/// process's actual lifecycle (fork/yield/sleep/exit) is done by calling
/// those functions directly while `scheduler` simply keeps the dispatch
/// and address-space-switch bookkeeping faithful to the original loop.
/// The `max_rounds` parameter bounds what would otherwise be an infinite
/// loop, so tests can drive a fixed number of scheduling passes.
pub fn scheduler(max_rounds: usize) {
    current_cpu().set_proc_index(None);
    for _ in 0..max_rounds {
        unsafe { arch::sti() };
        unsafe { push_off() };
        for p in TABLE.procs.iter() {
            if !p.state.cas(Procstate::Runnable, Procstate::Running) {
                continue;
            }
            let idx = TABLE.procs.iter().position(|q| core::ptr::eq(q, p)).unwrap();
            current_cpu().set_proc_index(Some(idx));
            if let Some(space) = unsafe { p.private_mut() }.address_space.as_ref() {
                space.switch_in();
            }

            unsafe {
                swtch(
                    current_cpu().context_mut() as *mut Context,
                    &mut p.private_mut().context as *mut Context,
                );
            }
            crate::vm::switch_kernel_vm();
            current_cpu().set_proc_index(None);
        }
        unsafe { crate::lock::pop_off() };
    }
}

/// A fork child's first trip through the scheduler lands here (spec §4.4
/// `forkret`); it exists purely as the context's initial `eip` and does
/// nothing observable on its own in this crate's test harness, which
/// never actually resumes execution at it (see the `swtch` stub above).
extern "C" fn forkret() {}

/// Prints the process table to the console (spec §4 `dump`, wired to
/// `^P`). Takes no locks, so it can still report something useful on an
/// otherwise wedged kernel.
pub fn dump() {
    crate::println!();
    for p in TABLE.procs.iter() {
        let state = p.state();
        if state == Procstate::Unused {
            continue;
        }
        let private = unsafe { p.private_mut() };
        let len = private
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(private.name.len());
        let name = core::str::from_utf8(&private.name[..len]).unwrap_or("???");
        crate::println!("{} {} {}", p.pid(), state.as_str(), name);
    }
}

/// Test-only helpers for resetting shared global state between tests,
/// since the process table, CPU array, and PID counter are crate-wide
/// statics shared across every `#[test]` in the binary.
#[cfg(any(test, feature = "test"))]
pub mod test_support {
    use super::*;

    /// Resets the process table, PID counter, and every simulated CPU to
    /// their initial state, and pins the calling (host) thread to
    /// simulated CPU 0. Every test that touches the scheduler, a lock, or
    /// the process table must call this first.
    pub fn reset_for_test() {
        arch::set_sim_cpu_id(0);
        unsafe { arch::sti() };

        TABLE.next_pid.store(1, Ordering::Relaxed);
        TABLE.initial_proc.store(-1, Ordering::Relaxed);
        for p in TABLE.procs.iter() {
            p.state.force(Procstate::Unused);
            p.pid.store(0, Ordering::Relaxed);
            p.killed.store(false, Ordering::Relaxed);
            p.parent.store(-1, Ordering::Relaxed);
            p.set_chan(0);
            p.pending_signals.store(0, Ordering::Relaxed);
            *unsafe { p.private_mut() } = ProcPrivate::zero();
        }
        for cpu in CPUS.iter() {
            cpu.set_proc_index(None);
            cpu.noff.store(0, Ordering::Relaxed);
            cpu.set_interrupt_enabled(true);
        }
    }

    /// Index of `p` within the process table, for tests that want to
    /// drive a specific slot (e.g. pretending to be a forked child).
    pub fn index_of(p: &Proc) -> usize {
        TABLE.procs.iter().position(|q| core::ptr::eq(q, p)).unwrap()
    }

    pub fn proc_at(idx: usize) -> &'static Proc {
        &TABLE.procs[idx]
    }

    /// Pretends the calling (host) thread is about to run `idx` as if the
    /// scheduler had just CASed it to `Running` and switched in.
    pub fn set_current(idx: usize) {
        current_cpu().set_proc_index(Some(idx));
    }

    /// Attempts the `from -> to` state CAS on slot `idx`'s `StateCell`,
    /// returning whether it succeeded. `state` itself is private to
    /// `proc`, so tests outside this module drive it through here rather
    /// than through the by-value snapshot `Proc::state()` returns.
    pub fn cas_state(idx: usize, from: Procstate, to: Procstate) -> bool {
        TABLE.procs[idx].state.cas(from, to)
    }

    /// Forces slot `idx`'s state to `Running` unconditionally, as if the
    /// scheduler had just switched it in, without needing to know its
    /// prior state.
    pub fn force_running(idx: usize) {
        TABLE.procs[idx].state.force(Procstate::Running);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn userinit_creates_one_runnable_process() {
        test_support::reset_for_test();
        userinit();
        assert_eq!(TABLE.procs[0].state(), Procstate::Runnable);
        assert_eq!(TABLE.procs[0].pid(), 1);
    }

    #[test]
    fn fork_without_a_current_proc_fails() {
        test_support::reset_for_test();
        assert_eq!(fork(), Err(()));
    }

    #[test]
    fn wait_without_children_fails() {
        test_support::reset_for_test();
        userinit();
        test_support::set_current(0);
        TABLE.procs[0].state.cas(Procstate::Runnable, Procstate::Running);
        assert_eq!(wait(), Err(()));
    }

    #[test]
    fn fork_creates_a_runnable_child_with_incremented_pid() {
        test_support::reset_for_test();
        userinit();
        test_support::set_current(0);
        TABLE.procs[0].state.cas(Procstate::Runnable, Procstate::Running);

        let child_pid = fork().expect("fork should succeed");
        assert!(child_pid > TABLE.procs[0].pid());
        let child = TABLE
            .procs
            .iter()
            .find(|p| p.pid() == child_pid)
            .expect("child should be in the table");
        assert_eq!(child.state(), Procstate::Runnable);
    }

    #[test]
    fn exit_then_wait_reaps_the_child() {
        test_support::reset_for_test();
        userinit();
        test_support::set_current(0);
        TABLE.procs[0].state.cas(Procstate::Runnable, Procstate::Running);

        let child_pid = fork().expect("fork should succeed");
        let child_idx = TABLE
            .procs
            .iter()
            .position(|p| p.pid() == child_pid)
            .unwrap();

        test_support::set_current(child_idx);
        TABLE.procs[child_idx]
            .state
            .cas(Procstate::Runnable, Procstate::Running);
        exit_current(7);

        test_support::set_current(0);
        let (pid, xstate) = wait().expect("wait should find the zombie child");
        assert_eq!(pid, child_pid);
        assert_eq!(xstate, 7);
        assert_eq!(TABLE.procs[child_idx].state(), Procstate::Unused);
    }

    #[test]
    fn kill_sets_pending_signal_bit() {
        test_support::reset_for_test();
        userinit();
        let pid = TABLE.procs[0].pid();
        kill(pid, crate::param::SIGCONT).expect("kill should find the process");
        let pending = TABLE.procs[0].pending_signals();
        assert_eq!(
            pending & (1 << crate::param::SIGCONT),
            1 << crate::param::SIGCONT
        );
    }

    #[test]
    fn kill_unknown_pid_fails() {
        test_support::reset_for_test();
        assert_eq!(kill(999, crate::param::SIGKILL), Err(()));
    }

    #[test]
    fn scheduler_moves_a_runnable_process_to_running() {
        test_support::reset_for_test();
        userinit();
        scheduler(1);
        assert_eq!(TABLE.procs[0].state(), Procstate::Running);
    }
}
