//! Panic as kernel abort.
//!
//! A programming-contract violation (spec §7) — a broken invariant like
//! `sched running` or `freeproc not zombie` — is not recoverable, so it
//! aborts the kernel rather than returning an error. Grounded on
//! `kernel-rs/src/main.rs`'s `panic_handler` in the teacher crate, which
//! prints the panic message to the console and halts. Only compiled
//! outside `cfg(test)` so `cargo test` uses the host's own panic runtime.

#[cfg(not(test))]
#[panic_handler]
fn panic_handler(info: &core::panic::PanicInfo<'_>) -> ! {
    crate::println!("kernel panic: {}", info);
    loop {
        core::hint::spin_loop();
    }
}
