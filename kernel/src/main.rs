#![no_std]
#![no_main]

use core::panic::PanicInfo;

use veridian_kernel::{fs, mm, process, test_framework};

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    veridian_kernel::println!("[KERNEL PANIC] {}", info);
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_framework::test_panic_handler(info)
}

#[no_mangle]
pub extern "C" fn _start() -> ! {
    veridian_kernel::println!("veridian-kernel v{}", env!("CARGO_PKG_VERSION"));

    fs::init();
    mm::init();
    process::init();

    veridian_kernel::println!("[BOOT] memory subsystem ready");

    loop {
        core::hint::spin_loop();
    }
}
