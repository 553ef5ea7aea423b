//! RAII guards for kernel resources.
//!
//! Grounded on the original's `FrameGuard`/`MappedRegion`: a thin struct
//! holding just enough to reverse an acquisition, with the reversal
//! done unconditionally in `Drop` so it runs on every exit path,
//! including an early `?` return or a panic unwind.

use crate::{
    mm::{frame_table, VirtAddr},
    process::pcb::Process,
};

/// Pins the page(s) backing one address for the lifetime of the guard.
/// Used by the syscall bridge around any single in-kernel access to a
/// user pointer.
pub struct PinGuard<'a> {
    proc: &'a Process,
    uaddr: VirtAddr,
}

impl<'a> PinGuard<'a> {
    pub fn new(proc: &'a Process, uaddr: VirtAddr) -> Result<Self, crate::error::KernelError> {
        frame_table::pin_addr(proc, uaddr)?;
        Ok(Self { proc, uaddr })
    }
}

impl Drop for PinGuard<'_> {
    fn drop(&mut self) {
        frame_table::unpin_addr(self.proc, self.uaddr);
    }
}

/// Pins every page spanned by a `len`-byte buffer for the lifetime of
/// the guard. Used around syscall buffer arguments (`read`/`write`)
/// that may require disk I/O while the pages stay resident.
pub struct BufferPinGuard<'a> {
    proc: &'a Process,
    uaddr: VirtAddr,
    len: usize,
}

impl<'a> BufferPinGuard<'a> {
    pub fn new(proc: &'a Process, uaddr: VirtAddr, len: usize) -> Result<Self, crate::error::KernelError> {
        frame_table::pin_buffer(proc, uaddr, len)?;
        Ok(Self { proc, uaddr, len })
    }
}

impl Drop for BufferPinGuard<'_> {
    fn drop(&mut self) {
        frame_table::unpin_buffer(self.proc, self.uaddr, self.len);
    }
}

/// Pins every page spanned by a NUL-terminated string for the lifetime
/// of the guard, used around syscall string arguments (`open`,
/// `create`, `remove`, `exec`).
pub struct StringPinGuard<'a> {
    proc: &'a Process,
    uaddr: VirtAddr,
    pub len: usize,
}

impl<'a> StringPinGuard<'a> {
    pub fn new(proc: &'a Process, uaddr: VirtAddr) -> Result<Self, crate::error::KernelError> {
        let len = frame_table::pin_string(proc, uaddr)?;
        Ok(Self { proc, uaddr, len })
    }
}

impl Drop for StringPinGuard<'_> {
    fn drop(&mut self) {
        frame_table::unpin_buffer(self.proc, self.uaddr, self.len.max(1));
    }
}
