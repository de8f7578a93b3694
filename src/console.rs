//! Minimal console sink for kernel diagnostics.
//!
//! Real console I/O (line discipline, UART driver) is out of this core's
//! scope; this module only provides the `core::fmt::Write` seam that
//! `print!`/`println!` need, grounded on `kernel-rs/src/printer.rs`'s
//! `Printer` in the teacher crate. Bytes are handed to [`sink::putc`],
//! which in a full kernel would forward to the UART.
use core::fmt::{self, Write};
use spin::Mutex;

/// Where console bytes ultimately go. Swappable so tests can capture
/// output instead of writing to a real device.
pub mod sink {
    use core::sync::atomic::{AtomicUsize, Ordering};

    static BYTES_WRITTEN: AtomicUsize = AtomicUsize::new(0);

    /// Writes one byte to the console device.
    ///
    /// Out of scope: a real implementation forwards to a UART driver.
    /// This counts bytes so tests can assert something was printed
    /// without depending on a real device.
    pub fn putc(_c: u8) {
        BYTES_WRITTEN.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_written() -> usize {
        BYTES_WRITTEN.load(Ordering::Relaxed)
    }
}

pub struct Printer;

impl Write for Printer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            sink::putc(b);
        }
        Ok(())
    }
}

static PRINTER: Mutex<Printer> = Mutex::new(Printer);

#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    let _ = PRINTER.lock().write_fmt(args);
}

/// Prints to the console using [`Printer`].
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::console::_print(core::format_args!($($arg)*))
    };
}

/// Prints to the console using [`Printer`], with a trailing newline.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", core::format_args!($($arg)*)));
}
