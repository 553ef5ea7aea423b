//! Bare-metal test support: the QEMU debug-exit device and the panic
//! handler a bare-metal test binary installs.
//!
//! Unit tests themselves run under the host `cargo test` harness (see
//! the host/bare-metal allocator split in `lib.rs`), so this module
//! only needs to cover what a bare-metal boot still needs: a way to
//! signal QEMU to exit with a pass/fail code, and a panic handler that
//! reports failure the same way before exiting.

use core::panic::PanicInfo;

use crate::serial_println;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    Success = 0x10,
    Failed = 0x11,
}

/// Exit QEMU with `exit_code` by writing to its isa-debug-exit device.
pub fn exit_qemu(exit_code: QemuExitCode) -> ! {
    use x86_64::instructions::port::Port;

    // SAFETY: port 0xf4 is the QEMU debug-exit device configured for this
    // kernel's QEMU invocation; writing to it halts the VM immediately.
    unsafe {
        let mut port = Port::new(0xf4);
        port.write(exit_code as u32);
    }
    loop {
        core::hint::spin_loop();
    }
}

pub fn test_panic_handler(info: &PanicInfo) -> ! {
    serial_println!("[failed]\n");
    serial_println!("Error: {}\n", info);
    exit_qemu(QemuExitCode::Failed);
}
