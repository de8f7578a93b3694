//! The lock-free process state machine.
//!
//! Grounded on `examples/original_source/proc.c`'s `cas(&p->state, ...)`
//! calls and its `NEG_SLEEPING`/`NEG_RUNNABLE`/`NEG_ZOMBIE` naming
//! convention. Most transitions (`Unused` -> `Embryo`, `Embryo` ->
//! `Runnable`, `Runnable` -> `Running`, `Zombie` -> `Unused`) are a single
//! CAS between two stable states, same as the original's plain
//! `cas(&p->state, A, B)`.
//!
//! Three transitions are different: a running process giving up the CPU
//! (to sleep, to yield, or to exit) first *stakes* a claim on where it's
//! headed by CASing straight from `Running` to the literal negation of
//! its destination — a transient "someone is in the middle of becoming
//! this" marker — and only the scheduler, once it has safely regained
//! control, *finalizes* the twin into the real stable state. A third
//! party that observes the twin (e.g. `wakeup` scanning for a sleeper)
//! knows a transition is in flight and must wait it out rather than act on
//! stale state. This three-state dance is the one place this crate's
//! design departs from the teacher crate's own `Spinlock<ProcInfo>`
//! per-process lock (see `DESIGN.md`): the state word here is a single
//! `AtomicI8`, not data behind a mutex.

use core::sync::atomic::{AtomicI8, Ordering};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(i8)]
pub enum Procstate {
    Unused = 0,
    Embryo = 1,
    Runnable = 2,
    Running = 3,
    Sleeping = 4,
    Zombie = 5,
}

impl Procstate {
    /// The transient "someone is becoming this" twin: the literal
    /// negation of the stable encoding.
    const fn negative(self) -> i8 {
        -(self as i8)
    }

    fn from_raw(raw: i8) -> Option<Self> {
        match raw {
            0 => Some(Self::Unused),
            1 => Some(Self::Embryo),
            2 => Some(Self::Runnable),
            3 => Some(Self::Running),
            4 => Some(Self::Sleeping),
            5 => Some(Self::Zombie),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unused => "unused",
            Self::Embryo => "embryo",
            Self::Runnable => "runnable",
            Self::Running => "running",
            Self::Sleeping => "sleeping",
            Self::Zombie => "zombie",
        }
    }
}

/// A process's state word: a single atomic byte, CAS'd directly between
/// stable states for ordinary transitions, or through a negative twin for
/// the three transitions that hand off from a running process to the
/// scheduler (see module docs).
pub struct StateCell(AtomicI8);

impl StateCell {
    pub const fn new(initial: Procstate) -> Self {
        Self(AtomicI8::new(initial as i8))
    }

    /// The stable state, spinning past any in-flight twin. Transients are
    /// held only for the handful of instructions between staking a claim
    /// and finalizing it, so a short spin (never a park) is the right
    /// tool here, the same way the original's `cas` retry loops spin.
    pub fn load(&self) -> Procstate {
        loop {
            let raw = self.0.load(Ordering::Acquire);
            if let Some(state) = Procstate::from_raw(raw) {
                return state;
            }
            core::hint::spin_loop();
        }
    }

    /// Is the word currently holding `to`'s negative twin?
    pub fn is_staked_for(&self, to: Procstate) -> bool {
        self.0.load(Ordering::Acquire) == to.negative()
    }

    /// A plain CAS between two stable states.
    pub fn cas(&self, from: Procstate, to: Procstate) -> bool {
        self.0
            .compare_exchange(from as i8, to as i8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Stakes a claim to transition from `from` (always `Running` in
    /// practice) to `to`: CASes the stable state to `to`'s negative twin.
    /// Returns `true` if this caller won the race.
    pub fn stake(&self, from: Procstate, to: Procstate) -> bool {
        self.0
            .compare_exchange(
                from as i8,
                to.negative(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Finalizes a transition previously staked with [`stake`], moving
    /// from `to`'s negative twin to the stable state `to` itself. Returns
    /// `true` if there was a staked transition to finalize.
    pub fn finalize(&self, to: Procstate) -> bool {
        self.0
            .compare_exchange(
                to.negative(),
                to as i8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Unconditionally forces the stable state, for initialization paths
    /// (allocating a fresh slot, test resets, or the killed-while-sleeping
    /// override in spec §4.6) where no concurrent observer can be racing
    /// the store.
    pub fn force(&self, to: Procstate) {
        self.0.store(to as i8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cas_moves_stable_to_stable() {
        let cell = StateCell::new(Procstate::Runnable);
        assert!(cell.cas(Procstate::Runnable, Procstate::Running));
        assert_eq!(cell.load(), Procstate::Running);
    }

    #[test]
    fn cas_fails_on_wrong_expected_state() {
        let cell = StateCell::new(Procstate::Sleeping);
        assert!(!cell.cas(Procstate::Runnable, Procstate::Running));
        assert_eq!(cell.load(), Procstate::Sleeping);
    }

    #[test]
    fn stake_then_finalize_round_trips_through_the_twin() {
        let cell = StateCell::new(Procstate::Running);
        assert!(cell.stake(Procstate::Running, Procstate::Sleeping));
        assert!(cell.is_staked_for(Procstate::Sleeping));
        assert!(cell.finalize(Procstate::Sleeping));
        assert_eq!(cell.load(), Procstate::Sleeping);
    }

    #[test]
    fn second_stake_loses_the_race() {
        let cell = StateCell::new(Procstate::Running);
        assert!(cell.stake(Procstate::Running, Procstate::Runnable));
        assert!(!cell.stake(Procstate::Running, Procstate::Sleeping));
        cell.finalize(Procstate::Runnable);
        assert_eq!(cell.load(), Procstate::Runnable);
    }

    #[test]
    fn finalize_without_a_matching_stake_fails() {
        let cell = StateCell::new(Procstate::Running);
        assert!(!cell.finalize(Procstate::Sleeping));
        assert_eq!(cell.load(), Procstate::Running);
    }
}
