//! Signal subsystem: pending bits, per-signal disposition, and the
//! user-mode trampoline hand-off (spec §4.6/§4.7).
//!
//! Grounded directly on `examples/original_source/proc.c`'s `handle_sig`,
//! `signal`, `sigprocmask`, `sigret`, `sigkill`, `sigstop`, `sigcont`, and
//! `use_custom_handler`. Three places where the original is ambiguous or
//! visibly broken are called out below and resolved explicitly (see
//! `DESIGN.md` for the full list matching spec §9's Open Questions).

use crate::param::{SIGCONT, SIGKILL, SIGSTOP};

use super::{current_proc, proc_yield, Proc, Procstate};

/// What happens to a process when a given signal number is pending.
/// `sighandler_t` in the original is a bare function pointer, with the
/// two special values `SIG_DFL` (0) and `SIG_IGN` (1); modeled here as an
/// enum instead of a raw `usize` so the kernel-default/ignore/user-handler
/// cases can't be confused with each other.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Disposition {
    /// `SIG_DFL`: the kernel's built-in behavior for this signal number.
    Default,
    /// `SIG_IGN`: drop the signal silently.
    Ignore,
    /// A user-installed handler, at this code address.
    Handler(usize),
}

/// `signal(signum, handler)`: installs a new disposition for `signum` on
/// the calling process, returning whatever was installed before.
///
/// The original's `return *tmp;` dereferences `tmp` as if it were a
/// pointer to a handler rather than the handler value itself — `tmp` is
/// already `p->signalHandlers[signum]`, so dereferencing it reads through
/// whatever address the *previous* handler happened to be, not the
/// previous disposition. Resolved here (spec §9) by returning the previous
/// disposition directly, since nothing can usefully depend on that bug.
pub fn signal(signum: u32, handler: Disposition) -> Option<Disposition> {
    let p = current_proc()?;
    let private = unsafe { p.private_mut() };
    let idx = signum as usize;
    if idx >= private.signal_handlers.len() {
        return None;
    }
    let previous = private.signal_handlers[idx];
    private.signal_handlers[idx] = handler;
    Some(previous)
}

/// `sigprocmask(mask)`: installs a new signal mask, returning the previous
/// one.
pub fn sigprocmask(mask: u32) -> Option<u32> {
    let p = current_proc()?;
    let private = unsafe { p.private_mut() };
    let previous = private.signal_mask;
    private.signal_mask = mask;
    Some(previous)
}

/// `kill`'s SIGKILL default action: marks the process killed and, if it
/// was uninterruptibly sleeping, wakes it so it notices at its next
/// chance to check.
fn sigkill(p: &Proc) {
    p.set_killed(true);
    p.state.cas(Procstate::Sleeping, Procstate::Runnable);
}

/// `kill`'s SIGSTOP default action: spins, yielding the CPU, until
/// `SIGCONT` becomes pending on this same process.
fn sigstop() {
    let p = current_proc().expect("sigstop: no current proc");
    while p.pending_signals() & (1 << SIGCONT) == 0 {
        proc_yield();
    }
}

/// `kill`'s SIGCONT default action: clearing the pending bit is left to
/// `handle_sig`'s caller, which clears every dispatched signal's bit once
/// (see [`handle_sig`]'s docs on the original's redundant double-clear).
fn sigcont() {}

/// Rewrites the trap frame so returning to user mode lands in the user
/// handler for `signum` instead of where the process was interrupted,
/// backing up the interrupted frame so [`sigret`] can restore it.
///
/// The original computes `tf->esp` by subtracting the compiled size of a
/// `start_sigret`/`end_sigret` trampoline blob and memmove's those raw
/// bytes onto the user stack, so `sigret` is whatever code executes after
/// the handler returns. This crate has no literal user address space or
/// trampoline blob to copy (see `crate::vm`'s stub `AddressSpace`); the
/// observable contract — interrupted frame backed up, mask raised while
/// the handler runs, `eip` redirected to the handler, `signum` threaded
/// through — is preserved without modeling the byte-for-byte stack
/// layout (spec §9).
fn invoke_handler(p: &Proc, signum: u32, handler_addr: usize) {
    let private = unsafe { p.private_mut() };
    private.user_tf_backup = private.trapframe;
    private.trapframe.eip = handler_addr;
    private.trapframe.eax = signum as usize;
}

/// `sigret()`: restores the trap frame and signal mask saved by
/// [`invoke_handler`], then re-runs [`handle_sig`] so a signal that
/// arrived while the handler was running gets a chance to be delivered
/// immediately, matching the original.
pub fn sigret() {
    let Some(p) = current_proc() else { return };
    let private = unsafe { p.private_mut() };
    private.trapframe = private.user_tf_backup;
    private.signal_mask = private.signal_mask_backup;
    handle_sig();
}

/// Delivers pending, unmasked signals to the current process (spec §4.6
/// `handle_sig`), called at the user-mode return boundary (spec §4.7).
/// For each signal number `0..SIG_NUM` that is both pending and not in
/// the current mask: raises the mask to all-ones for the duration of
/// dispatch (so a second signal can't re-enter the handler installation
/// below), runs the kernel default action or installs the user handler,
/// then restores the mask.
///
/// The original clears `pendingSignals`'s bit for every `i` in `0..32`
/// unconditionally, even when `i` was masked and never dispatched —
/// silently dropping a masked-but-pending signal with no way to receive
/// it once unmasked. Resolved here (spec §9) by clearing a signal's
/// pending bit only when it was actually dispatched this call.
///
/// Unlike `kill`'s atomic OR, the read-then-clear here doesn't need to
/// race anything: `handle_sig` only ever runs on the process's own CPU,
/// as itself, so the acquire load below and the clears inside the loop
/// can't be reordered around a concurrent poster by anything other than
/// the ordering `Proc::pending_signals`/`Proc::post_signal` already give.
pub fn handle_sig() {
    let Some(p) = current_proc() else { return };
    let pending_snapshot = p.pending_signals();
    let private = unsafe { p.private_mut() };
    if pending_snapshot == 0 || private.signal_mask == u32::MAX {
        return;
    }

    for i in 0..crate::param::SIG_NUM as u32 {
        let private = unsafe { p.private_mut() };
        let mask_backup = private.signal_mask;
        if (mask_backup & (1 << i)) != 0 || (pending_snapshot & (1 << i)) == 0 {
            continue;
        }

        private.signal_mask = u32::MAX;
        match private.signal_handlers[i as usize] {
            Disposition::Default => match i {
                SIGKILL => sigkill(p),
                SIGSTOP => sigstop(),
                SIGCONT => sigcont(),
                _ => sigkill(p),
            },
            Disposition::Ignore => {}
            Disposition::Handler(addr) => invoke_handler(p, i, addr),
        }

        let private = unsafe { p.private_mut() };
        private.signal_mask = mask_backup;
        p.clear_pending_signals(1 << i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::{test_support, userinit};

    #[test]
    fn signal_installs_and_returns_previous_disposition() {
        test_support::reset_for_test();
        userinit();
        test_support::set_current(0);

        let previous = signal(5, Disposition::Handler(0x1000)).unwrap();
        assert_eq!(previous, Disposition::Default);
        let previous = signal(5, Disposition::Ignore).unwrap();
        assert_eq!(previous, Disposition::Handler(0x1000));
    }

    #[test]
    fn sigprocmask_swaps_masks() {
        test_support::reset_for_test();
        userinit();
        test_support::set_current(0);

        let previous = sigprocmask(0b101).unwrap();
        assert_eq!(previous, 0);
        let previous = sigprocmask(0b010).unwrap();
        assert_eq!(previous, 0b101);
    }

    #[test]
    fn handle_sig_runs_default_sigkill() {
        test_support::reset_for_test();
        userinit();
        test_support::set_current(0);
        let p = test_support::proc_at(0);

        p.post_signal(SIGKILL);
        handle_sig();
        assert!(p.killed());
    }

    #[test]
    fn handle_sig_invokes_a_custom_handler_and_backs_up_the_frame() {
        test_support::reset_for_test();
        userinit();
        test_support::set_current(0);
        let p = test_support::proc_at(0);

        unsafe { p.private_mut() }.trapframe.eip = 0x4000;
        signal(3, Disposition::Handler(0x9000)).unwrap();
        p.post_signal(3);
        handle_sig();

        let private = unsafe { p.private_mut() };
        assert_eq!(private.trapframe.eip, 0x9000);
        assert_eq!(private.user_tf_backup.eip, 0x4000);
        assert_eq!(p.pending_signals() & (1 << 3), 0);
    }

    #[test]
    fn handle_sig_skips_masked_signals_and_keeps_them_pending() {
        test_support::reset_for_test();
        userinit();
        test_support::set_current(0);
        let p = test_support::proc_at(0);

        sigprocmask(1 << 3);
        p.post_signal(3);
        handle_sig();
        assert_ne!(p.pending_signals() & (1 << 3), 0);
    }

    #[test]
    fn sigret_restores_backed_up_frame_and_mask() {
        test_support::reset_for_test();
        userinit();
        test_support::set_current(0);
        let p = test_support::proc_at(0);

        unsafe { p.private_mut() }.trapframe.eip = 0x4000;
        unsafe { p.private_mut() }.signal_mask = 0b1;
        signal(3, Disposition::Handler(0x9000)).unwrap();
        p.post_signal(3);
        handle_sig();
        assert_eq!(unsafe { p.private_mut() }.trapframe.eip, 0x9000);

        sigret();
        let private = unsafe { p.private_mut() };
        assert_eq!(private.trapframe.eip, 0x4000);
        assert_eq!(private.signal_mask, 0b1);
    }
}
