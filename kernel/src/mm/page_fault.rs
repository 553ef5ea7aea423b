//! Page fault resolution and the stack-growth policy.
//!
//! Grounded on the original implementation's `page_fault` handler in
//! `userprog/exception.c`: look the faulting address up in the SPT
//! first, then consider growing the stack, and only give up and kill
//! the process if neither applies. The architecture trap handler is
//! expected to have already distinguished a user-mode fault from a
//! kernel-mode one before calling in here -- a fault while executing
//! kernel code is always fatal and is not this module's concern.

use super::{page_down, spt, VirtAddr, PAGE_SIZE, PHYS_BASE};
use crate::{error::KernelError, process::pcb::Process};

/// Stack growth is permitted only within this many bytes below
/// `PHYS_BASE`, matching the fixed 8 MiB user stack reservation.
const STACK_RESERVATION: usize = 8 * 1024 * 1024;

/// `PUSHA` can fault on a write up to 32 bytes below the stack pointer;
/// a fault further below than that is never a legitimate stack access.
const MAX_FAULT_BELOW_ESP: usize = 32;

/// Resolve a page fault at `fault_addr` for `proc`, whose stack pointer
/// at the time of the fault was `esp`. On success the faulting page is
/// now resident. On failure the process has already been terminated
/// with exit status -1 and the error is returned for the trap handler
/// to unwind with.
pub fn handle_page_fault(proc: &Process, fault_addr: VirtAddr, esp: VirtAddr) -> Result<(), KernelError> {
    if fault_addr >= PHYS_BASE {
        return kill(proc, fault_addr);
    }

    if spt::load(proc, fault_addr) {
        return Ok(());
    }

    if is_stack_growth(fault_addr, esp) {
        let upage = page_down(fault_addr);
        if spt::add_zero(proc, upage).is_ok() {
            return Ok(());
        }
    }

    kill(proc, fault_addr)
}

/// Whether a fault at `fault_addr`, with the faulting instruction's
/// stack pointer at `esp`, should be treated as the stack growing
/// downward rather than a genuine segfault.
fn is_stack_growth(fault_addr: VirtAddr, esp: VirtAddr) -> bool {
    if fault_addr >= PHYS_BASE || fault_addr < PHYS_BASE.saturating_sub(STACK_RESERVATION) {
        return false;
    }
    match esp.checked_sub(fault_addr) {
        Some(below) => below <= MAX_FAULT_BELOW_ESP,
        // fault_addr >= esp: within or above the current stack top, legitimate.
        None => true,
    }
}

fn kill(proc: &Process, fault_addr: VirtAddr) -> Result<(), KernelError> {
    crate::println!(
        "[PAGE_FAULT] process {} terminated: bad address {:#x}",
        proc.pid.0,
        fault_addr
    );
    crate::process::exit::exit_process(proc.pid, -1);
    Err(KernelError::BadUserPointer { addr: fault_addr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::pcb::ProcessId;
    use alloc::string::String;

    fn test_process(pid: u64) -> Process {
        Process::new(ProcessId(pid), None, String::from("t"))
    }

    #[test]
    fn stack_growth_32_bytes_below_esp_succeeds() {
        let proc = test_process(51001);
        let esp = PHYS_BASE - 0x1000 + 0xfff;
        let fault = esp - 32;
        assert!(handle_page_fault(&proc, fault, esp).is_ok());
        assert!(proc.spt.get(page_down(fault)).is_some());
    }

    #[test]
    fn fault_33_bytes_below_esp_kills_process() {
        let proc = test_process(51002);
        let esp = PHYS_BASE - 0x1000 + 0xfff;
        let fault = esp - 33;
        assert!(handle_page_fault(&proc, fault, esp).is_err());
    }

    #[test]
    fn fault_far_below_stack_reservation_kills_process() {
        let proc = test_process(51003);
        let fault = PHYS_BASE - STACK_RESERVATION - PAGE_SIZE;
        let esp = PHYS_BASE - 0x1000;
        assert!(handle_page_fault(&proc, fault, esp).is_err());
    }

    #[test]
    fn fault_on_registered_page_loads_it() {
        let proc = test_process(51004);
        spt::add_zero_lazily(&proc, 0x4000).unwrap();
        assert!(handle_page_fault(&proc, 0x4010, PHYS_BASE - 0x1000).is_ok());
        assert!(proc.spt.get(0x4000).unwrap().frame.is_some());
    }

    #[test]
    fn fault_at_or_above_phys_base_kills_process() {
        let proc = test_process(51005);
        assert!(handle_page_fault(&proc, PHYS_BASE, PHYS_BASE - 0x1000).is_err());
    }
}
