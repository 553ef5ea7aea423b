//! The serial console: a 16550 UART at the standard PC COM1 port.
//!
//! Grounded on the original implementation's serial driver: one port,
//! opened fresh on every write inside `without_interrupts` so a print
//! from an interrupt handler can never deadlock against one already in
//! progress on the main path.

use core::fmt::{self, Write};

use uart_16550::SerialPort;
use x86_64::instructions::interrupts;

const COM1: u16 = 0x3F8;

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    interrupts::without_interrupts(|| {
        let mut port = unsafe { SerialPort::new(COM1) };
        port.write_fmt(args).ok();
    });
}

#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => ($crate::serial::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => ($crate::serial_print!("{}\n", format_args!($($arg)*)));
}
