//! The narrow seam between this core and the CPU-control primitives named
//! in spec §6: `sti`/`cli`/`pushcli`/`popcli`/`readeflags`/`lapicid`.
//!
//! Grounded on `kernel-rs/src/arch/interface.rs`'s `InterruptManager`/`Arch`
//! traits in the teacher crate, cut down to the one concern this core needs.
//! Under `cfg(feature = "test")` (the same idiom the teacher uses in
//! `panic.rs`/`abort.rs` to swap implementations for host test builds) we
//! use a simulated, software-only interrupt-enable flag instead of real
//! privileged instructions, since unit tests run unprivileged on the host.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Disables interrupts on the calling CPU. Idempotent: calling it while
/// interrupts are already off is a no-op.
///
/// # Safety
/// Must only be called from kernel context on the CPU it affects.
#[cfg(not(any(test, feature = "test")))]
pub unsafe fn cli() {
    unsafe { core::arch::asm!("cli") };
}

/// Enables interrupts on the calling CPU.
///
/// # Safety
/// Must only be called from kernel context on the CPU it affects.
#[cfg(not(any(test, feature = "test")))]
pub unsafe fn sti() {
    unsafe { core::arch::asm!("sti") };
}

/// Reads the CPU's flags register; bit 9 (`IF`) reflects whether interrupts
/// are currently enabled.
#[cfg(not(any(test, feature = "test")))]
pub fn readeflags() -> usize {
    let flags: usize;
    unsafe { core::arch::asm!("pushfq; pop {}", out(reg) flags) };
    flags
}

/// This CPU's local APIC id, used to index `cpus[]`.
///
/// Reading the APIC is an external (out-of-scope) collaborator; this
/// crate only needs the id to come back stable and distinct per CPU, which
/// a real kernel gets from the memory-mapped APIC ID register.
#[cfg(not(any(test, feature = "test")))]
pub fn lapicid() -> usize {
    // Out of scope: a real implementation reads the memory-mapped local
    // APIC ID register. Left unimplemented since this crate never runs on
    // bare metal.
    0
}

const FL_IF: usize = 1 << 9;

/// Host-simulated interrupt-enable flag, standing in for `readeflags`'s
/// `IF` bit when there is no real CPU to ask.
#[cfg(any(test, feature = "test"))]
static SIM_INTERRUPTS_ENABLED: AtomicBool = AtomicBool::new(true);

#[cfg(any(test, feature = "test"))]
static SIM_CPU_ID: AtomicUsize = AtomicUsize::new(0);

/// Sets which simulated CPU the current (host) thread represents. Only
/// meaningful under `cfg(test)`/`feature = "test"`.
#[cfg(any(test, feature = "test"))]
pub fn set_sim_cpu_id(id: usize) {
    SIM_CPU_ID.store(id, Ordering::Relaxed);
}

/// # Safety
/// Must only be called from kernel context on the CPU it affects.
#[cfg(any(test, feature = "test"))]
pub unsafe fn cli() {
    SIM_INTERRUPTS_ENABLED.store(false, Ordering::SeqCst);
}

/// # Safety
/// Must only be called from kernel context on the CPU it affects.
#[cfg(any(test, feature = "test"))]
pub unsafe fn sti() {
    SIM_INTERRUPTS_ENABLED.store(true, Ordering::SeqCst);
}

#[cfg(any(test, feature = "test"))]
pub fn readeflags() -> usize {
    if SIM_INTERRUPTS_ENABLED.load(Ordering::SeqCst) {
        FL_IF
    } else {
        0
    }
}

#[cfg(any(test, feature = "test"))]
pub fn lapicid() -> usize {
    SIM_CPU_ID.load(Ordering::Relaxed)
}

/// Are device interrupts currently enabled on this CPU?
pub fn intr_get() -> bool {
    readeflags() & FL_IF != 0
}

/// Generic single-word compare-and-swap, named after the `cas(addr,
/// expected, new)` collaborator in spec §6. The process state machine
/// (§4.1) builds directly on `core::sync::atomic` compare-exchange instead
/// of calling through this generic form, but the primitive is exposed here
/// for any other lock-light word this core needs (e.g. the pid counter).
pub fn cas(addr: &core::sync::atomic::AtomicI32, expected: i32, new: i32) -> bool {
    addr.compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_sti_round_trip() {
        unsafe { sti() };
        assert!(intr_get());
        unsafe { cli() };
        assert!(!intr_get());
        unsafe { sti() };
        assert!(intr_get());
    }

    #[test]
    fn cas_succeeds_only_on_match() {
        let word = core::sync::atomic::AtomicI32::new(5);
        assert!(!cas(&word, 4, 6));
        assert!(cas(&word, 5, 6));
        assert_eq!(word.load(Ordering::Relaxed), 6);
    }
}
