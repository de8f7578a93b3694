//! End-to-end scenario exercises of the public syscall surface (spec §8),
//! ported as readable tests from `examples/original_source/sanitytest.c`/
//! `sanitytests.c`.
//!
//! These run on the single host test thread, so a real concurrent
//! interleaving (parent and child racing on separate CPUs) is collapsed
//! into a sequential one: wherever the original scenario relies on two
//! processes racing (e.g. a busy-waiting `sigstop()` only unblocked by a
//! *later*, concurrent `kill(SIGCONT)`), every signal the scenario posts is
//! queued *before* the receiving process's one delivery pass runs, the same
//! simplification `proc::sched`'s module docs already apply to context
//! switching. What's preserved is the observable per-scenario outcome:
//! which children get reaped, which never do, and what a custom handler's
//! dispatch does to the trap frame.

use crate::param::{NPROC, SIGCONT, SIGKILL, SIGSTOP};
use crate::proc::signal::Disposition;
use crate::proc::{self, test_support, Procstate};
use crate::syscall;

/// Forks a child from whichever process is current, returning its pid and
/// table index.
fn fork_child() -> (i32, usize) {
    let pid = syscall::sys_fork();
    assert!(pid > 0, "fork should succeed");
    let idx = (0..NPROC)
        .map(test_support::proc_at)
        .find(|p| p.pid() == pid)
        .map(test_support::index_of)
        .expect("forked child must be in the table");
    (pid, idx)
}

/// Scenario 1: SIGSTOP default, no SIGCONT ever posted. The child is
/// queued a SIGSTOP and never dispatches past it in this test (calling its
/// delivery pass to completion would busy-loop forever, exactly as the
/// scenario intends), so the only safe, finite assertion is that the
/// signal was queued and the child is never reaped.
#[test]
fn sigstop_default_blocks_a_child_indefinitely() {
    test_support::reset_for_test();
    proc::userinit();
    let parent_idx = 0;
    test_support::set_current(parent_idx);
    test_support::cas_state(parent_idx, Procstate::Runnable, Procstate::Running);

    let (child_pid, child_idx) = fork_child();
    crate::println!("sending stop signal");
    assert_eq!(syscall::sys_kill(child_pid, SIGSTOP), 0);
    crate::println!("SIGSTOP ok");

    let pending = test_support::proc_at(child_idx).pending_signals();
    assert_ne!(pending & (1 << SIGSTOP), 0);

    // A real `wait()` here would block until the child becomes a zombie,
    // which (by design of this scenario) never happens; calling it would
    // hang this single-threaded test rather than observe anything new, so
    // the scenario stops at the structural assertion above: the child is
    // queued to stop and never reaches `Zombie`.
    assert_ne!(test_support::proc_at(child_idx).state(), Procstate::Zombie);
}

/// Scenario 2: SIGSTOP then SIGCONT. Both are queued before the child's one
/// delivery pass, so `sigstop()`'s busy-wait observes `SIGCONT` already
/// pending and returns immediately instead of looping.
#[test]
fn sigstop_then_sigcont_releases_the_child() {
    test_support::reset_for_test();
    proc::userinit();
    let parent_idx = 0;
    test_support::set_current(parent_idx);
    test_support::cas_state(parent_idx, Procstate::Runnable, Procstate::Running);

    let (child_pid, child_idx) = fork_child();
    crate::println!("sending stop signal");
    syscall::sys_kill(child_pid, SIGSTOP);
    crate::println!("sending cont signal");
    assert_eq!(syscall::sys_kill(child_pid, SIGCONT), 0);
    crate::println!("SIGCONT ok");

    test_support::set_current(child_idx);
    test_support::cas_state(child_idx, Procstate::Runnable, Procstate::Running);
    proc::signal::handle_sig();
    let pending = test_support::proc_at(child_idx).pending_signals();
    assert_eq!(pending, 0, "both signals were dispatched");

    proc::exit_current(0);
    test_support::set_current(parent_idx);
    let (pid, _status) = proc::wait().expect("parent reaps the child");
    assert_eq!(pid, child_pid);
}

/// Scenario 3: SIGKILL default wakes a sleeping child and marks it killed;
/// the child (standing in for its own trap-return check) then exits
/// instead of continuing.
#[test]
fn sigkill_default_wakes_and_kills_a_sleeping_child() {
    test_support::reset_for_test();
    proc::userinit();
    let parent_idx = 0;
    test_support::set_current(parent_idx);
    test_support::cas_state(parent_idx, Procstate::Runnable, Procstate::Running);

    let (child_pid, child_idx) = fork_child();
    test_support::set_current(child_idx);
    test_support::cas_state(child_idx, Procstate::Runnable, Procstate::Running);
    static CHANNEL: proc::WaitChannel = proc::WaitChannel::new();
    syscall::sys_sleep(&CHANNEL);
    assert_eq!(test_support::proc_at(child_idx).state(), Procstate::Sleeping);

    test_support::set_current(parent_idx);
    assert_eq!(syscall::sys_kill(child_pid, SIGKILL), 0);

    test_support::set_current(child_idx);
    assert!(syscall::check_pending_signals_and_killed());
    assert!(test_support::proc_at(child_idx).killed());
    assert_eq!(test_support::proc_at(child_idx).state(), Procstate::Runnable);
    test_support::cas_state(child_idx, Procstate::Runnable, Procstate::Running);
    proc::exit_current(0);
    crate::println!("SIGKILL ok");

    test_support::set_current(parent_idx);
    let (pid, _status) = proc::wait().expect("parent reaps the killed child");
    assert_eq!(pid, child_pid);
}

/// Scenario 4: a child installs a user handler for SIGSTOP, which overrides
/// the default busy-wait suspend entirely — `handle_sig` never enters
/// `sigstop()` because the disposition isn't `Default`.
#[test]
fn user_sigstop_handler_overrides_default_suspend() {
    test_support::reset_for_test();
    proc::userinit();
    let parent_idx = 0;
    test_support::set_current(parent_idx);
    test_support::cas_state(parent_idx, Procstate::Runnable, Procstate::Running);

    let (child_pid, child_idx) = fork_child();
    test_support::set_current(child_idx);
    test_support::cas_state(child_idx, Procstate::Runnable, Procstate::Running);

    crate::println!("Son is running");
    syscall::sys_signal(SIGSTOP, Disposition::Handler(0xA000));
    syscall::sys_kill(child_pid, SIGSTOP);
    proc::signal::handle_sig();

    let eip = unsafe { test_support::proc_at(child_idx).private_mut() }.trapframe.eip;
    assert_eq!(eip, 0xA000, "handler ran instead of blocking");
    crate::println!("Son handled signal");

    // Revert to SIG_DFL and exit, as the scenario's child does.
    syscall::sys_signal(SIGSTOP, Disposition::Default);
    proc::exit_current(0);

    test_support::set_current(parent_idx);
    assert!(proc::wait().is_ok());
    crate::println!("exit after wating for child");
    crate::println!("Test OK");
}

/// Scenario 5: a custom SIGCONT handler, inherited through `fork`, receives
/// the signal number once dispatched.
#[test]
fn inherited_sigcont_handler_receives_the_signal_number() {
    test_support::reset_for_test();
    proc::userinit();
    let parent_idx = 0;
    test_support::set_current(parent_idx);
    test_support::cas_state(parent_idx, Procstate::Runnable, Procstate::Running);
    syscall::sys_signal(SIGCONT, Disposition::Handler(0xB000));

    let (child_pid, child_idx) = fork_child();
    assert_eq!(
        unsafe { test_support::proc_at(child_idx).private_mut() }.signal_handlers[SIGCONT as usize],
        Disposition::Handler(0xB000),
        "handler is inherited across fork"
    );

    test_support::set_current(child_idx);
    test_support::cas_state(child_idx, Procstate::Runnable, Procstate::Running);
    syscall::sys_kill(child_pid, SIGSTOP);
    // Parent's SIGCONT races the child's busy-wait on real hardware; here
    // both are queued before the single delivery pass below.
    test_support::set_current(parent_idx);
    syscall::sys_kill(child_pid, SIGCONT);

    test_support::set_current(child_idx);
    proc::signal::handle_sig();
    let private = unsafe { test_support::proc_at(child_idx).private_mut() };
    assert_eq!(private.trapframe.eip, 0xB000);
    assert_eq!(private.trapframe.eax, SIGCONT as usize);
    crate::println!("Received signal number: {}", SIGCONT);

    proc::exit_current(0);
    test_support::set_current(parent_idx);
    assert_eq!(proc::wait().map(|(pid, _)| pid), Ok(child_pid));
}

/// Scenario 6: fifty children, half with an inherited SIGKILL handler
/// (simulating a handler that exits on receipt), half suspended by default
/// SIGSTOP and released by an inherited SIGCONT. Every child is reaped; no
/// zombie remains.
#[test]
fn fan_out_mixed_handlers_reaps_every_child() {
    test_support::reset_for_test();
    proc::userinit();
    let parent_idx = 0;
    test_support::set_current(parent_idx);
    test_support::cas_state(parent_idx, Procstate::Runnable, Procstate::Running);
    syscall::sys_signal(SIGCONT, Disposition::Handler(0xC000));
    syscall::sys_signal(SIGKILL, Disposition::Handler(0xC100));

    const N: usize = 50;
    let mut children = [(0i32, 0usize); N];
    for slot in children.iter_mut() {
        test_support::set_current(parent_idx);
        *slot = fork_child();
    }

    for (i, &(child_pid, child_idx)) in children.iter().enumerate() {
        test_support::set_current(child_idx);
        test_support::cas_state(child_idx, Procstate::Runnable, Procstate::Running);

        if i % 2 == 0 {
            // Self-SIGKILL: the inherited handler runs instead of the
            // default `sigkill()`, standing in for a handler that calls
            // `exit` on receipt.
            syscall::sys_kill(child_pid, SIGKILL);
            proc::signal::handle_sig();
            assert_eq!(
                unsafe { test_support::proc_at(child_idx).private_mut() }
                    .trapframe
                    .eip,
                0xC100
            );
        } else {
            syscall::sys_kill(child_pid, SIGSTOP);
            test_support::set_current(parent_idx);
            syscall::sys_kill(child_pid, SIGCONT);
            test_support::set_current(child_idx);
            proc::signal::handle_sig();
        }
        proc::exit_current(i as i32);
    }

    test_support::set_current(parent_idx);
    let mut reaped = 0;
    for _ in 0..N {
        assert!(proc::wait().is_ok());
        reaped += 1;
    }
    assert_eq!(reaped, N);
    assert_eq!(syscall::sys_wait(), -1, "no children remain");

    for p in (0..NPROC).map(test_support::proc_at) {
        assert_ne!(p.state(), Procstate::Zombie);
    }
}
