//! Fixed, compile-time kernel configuration.
//!
//! A fixed-capacity teaching kernel has no use for a runtime config file:
//! the process table, CPU count, and per-process resource limits are all
//! baked-in constants, the same way `kernel-rs/src/param.rs` does it in the
//! teacher crate.

/// Maximum number of processes the process table can hold.
pub const NPROC: usize = 64;

/// Maximum number of CPUs a kernel instance schedules across.
pub const NCPU: usize = 8;

/// Open files per process.
pub const NOFILE: usize = 16;

/// Maximum length of a process's debug name, including the NUL terminator.
pub const MAXPROCNAME: usize = 16;

/// Device number of the file system root disk (see [`crate::fs`]).
pub const ROOTDEV: u32 = 1;

/// Number of distinct signal numbers; signals are a 32-bit bitset, so
/// `pendingSignals`/`signalMask` cover exactly this many signal numbers.
pub const SIG_NUM: usize = 32;

/// Kernel-default-terminate-the-process signal. Unknown signal numbers with
/// `SIG_DFL` disposition are treated the same way.
pub const SIGKILL: u32 = 9;

/// Kernel-default-suspend-until-SIGCONT signal.
pub const SIGSTOP: u32 = 17;

/// Kernel-default-resume signal.
pub const SIGCONT: u32 = 19;

static_assertions::const_assert!(SIG_NUM <= 32);
static_assertions::const_assert!((SIGKILL as usize) < SIG_NUM);
static_assertions::const_assert!((SIGSTOP as usize) < SIG_NUM);
static_assertions::const_assert!((SIGCONT as usize) < SIG_NUM);
