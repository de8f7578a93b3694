//! Locking primitives used for the handful of fields this core protects
//! with mutual exclusion rather than lock-free CAS (see module docs on
//! [`spinlock`]).

mod spinlock;

pub use spinlock::{pop_off, push_off, RawSpinlock, RawSpinlockGuard, Spinlock, SpinlockGuard};
