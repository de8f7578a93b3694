//! The public system-call surface (spec §6), wired onto [`crate::proc`].
//!
//! Argument/return marshaling through trap-frame registers is out of scope
//! (spec §1 names the trap/interrupt vector as an external collaborator),
//! so each function here takes its arguments as plain Rust values rather
//! than reading them out of a trap frame, the way `kernel-rs/src/sysproc.rs`
//! reads them via `argint`/`argaddr` in the teacher crate. What's kept from
//! the teacher is the one-function-per-syscall shape and the `-1`-on-error
//! convention for calls that report failure as a return value rather than
//! a panic.

use crate::proc::signal::Disposition;
use crate::proc::{self, Procstate};

/// `fork()`: child PID to the parent, or `-1` on error. (The child itself
/// observes `0` via its trap frame's `eax`, set by [`proc::fork`].)
pub fn sys_fork() -> i32 {
    proc::fork().unwrap_or(-1)
}

/// `exit()`: never returns.
pub fn sys_exit(status: i32) -> ! {
    proc::exit_current(status);
    unreachable!("exit_current does not return")
}

/// `wait()`: PID of a reaped child, or `-1` if the caller has no children.
pub fn sys_wait() -> i32 {
    proc::wait().map_or(-1, |(pid, _xstate)| pid)
}

/// `kill(pid, signum)`: `0` if the PCB was found, `-1` otherwise.
pub fn sys_kill(pid: i32, signum: u32) -> i32 {
    if signum as usize >= crate::param::SIG_NUM {
        return -1;
    }
    proc::kill(pid, signum).map_or(-1, |()| 0)
}

/// `signal(signum, handler)`: returns the previous disposition, or
/// `Disposition::Default` if there was no current process or `signum` was
/// out of range (the original has no error return here; this is the
/// closest faithful stand-in for "nothing to report").
pub fn sys_signal(signum: u32, handler: Disposition) -> Disposition {
    proc::signal::signal(signum, handler).unwrap_or(Disposition::Default)
}

/// `sigprocmask(mask)`: returns the previous mask.
pub fn sys_sigprocmask(mask: u32) -> u32 {
    proc::signal::sigprocmask(mask).unwrap_or(0)
}

/// `sigret()`: resumes the context interrupted signal delivery saved.
pub fn sys_sigret() {
    proc::signal::sigret();
}

/// `yield()`: cooperative preemption from the timer path.
pub fn sys_yield() {
    proc::proc_yield();
}

/// `sleep(chan)`: blocks the calling process until woken on `chan`. Timed
/// sleep (the external clock-tick hook `spec.md` §6 alludes to) is out of
/// scope; this exposes the channel-rendezvous primitive the clock
/// collaborator would otherwise drive.
pub fn sys_sleep(chan: &proc::WaitChannel) {
    chan.sleep();
}

/// Dispatches on a kill-check at the user-mode return boundary (spec §4.7):
/// runs pending signal delivery, then reports whether the process should
/// be torn down because it was killed. Callers at the trap-return path
/// (out of scope here) are expected to call this once per return to user
/// mode and act on a `true` result by calling [`sys_exit`].
pub fn check_pending_signals_and_killed() -> bool {
    proc::signal::handle_sig();
    proc::current_proc().is_some_and(|p| p.killed() && p.state() != Procstate::Zombie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::test_support;

    #[test]
    fn fork_without_current_proc_returns_negative_one() {
        test_support::reset_for_test();
        assert_eq!(sys_fork(), -1);
    }

    #[test]
    fn wait_without_children_returns_negative_one() {
        test_support::reset_for_test();
        proc::userinit();
        test_support::set_current(0);
        assert_eq!(sys_wait(), -1);
    }

    #[test]
    fn kill_out_of_range_signum_returns_negative_one() {
        test_support::reset_for_test();
        proc::userinit();
        let pid = test_support::proc_at(0).pid();
        assert_eq!(sys_kill(pid, 999), -1);
    }

    #[test]
    fn kill_unknown_pid_returns_negative_one() {
        test_support::reset_for_test();
        assert_eq!(sys_kill(999, crate::param::SIGKILL), -1);
    }

    #[test]
    fn signal_round_trips_through_sys_layer() {
        test_support::reset_for_test();
        proc::userinit();
        test_support::set_current(0);
        let previous = sys_signal(5, Disposition::Handler(0x2000));
        assert_eq!(previous, Disposition::Default);
    }
}
