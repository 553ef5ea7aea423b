//! Kernel library: user-space memory management (supplemental page
//! tables, frame table eviction, swap, page faults), the filesystem
//! the swap store and `open`/`read`/`write` sit on top of, the process
//! table, and the syscall bridge between them.

#![no_std]
#![cfg_attr(target_os = "none", no_main)]
#![cfg_attr(target_os = "none", feature(alloc_error_handler))]

extern crate alloc;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
use linked_list_allocator::LockedHeap;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

// Host target (`cargo test`): delegate to the system allocator so unit
// tests can use `Vec`/`String`/`Box` normally.
#[cfg(not(target_os = "none"))]
extern crate std;
#[cfg(not(target_os = "none"))]
#[global_allocator]
static SYSTEM_ALLOCATOR: std::alloc::System = std::alloc::System;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub fn get_allocator() -> &'static LockedHeap {
    &ALLOCATOR
}

#[macro_use]
pub mod print;

pub mod error;
pub mod fs;
pub mod mm;
pub mod process;
pub mod raii;
pub mod serial;
pub mod sync;
pub mod syscall;
pub mod test_framework;

/// Heap allocation error handler. Allocation failure in a no_std kernel
/// is unrecoverable, so this panics rather than returning.
#[cfg(target_os = "none")]
#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    panic!("allocation error: {:?}", layout);
}
