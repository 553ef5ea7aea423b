//! `halt`, `exit`, `exec`, `wait`.
//!
//! Grounded on the original implementation's `sys_halt`/`sys_exit` in
//! `userprog/syscall.c`. `exec`'s ELF loader and `wait`'s blocking
//! semantics are both out of scope -- `wait` here reaps an
//! already-exited child rather than blocking for one, matching the
//! non-blocking `process::exit::wait_process` it calls into.

use crate::{
    error::KernelError,
    process::{exit, pcb::Process, pcb::ProcessId},
    syscall::read_user_string,
    test_framework::{exit_qemu, QemuExitCode},
};

pub fn sys_halt() -> Result<isize, KernelError> {
    exit_qemu(QemuExitCode::Success);
}

pub fn sys_exit(proc: &Process, status: i32) -> Result<isize, KernelError> {
    crate::println!("{}: exit({})", proc.name, status);
    exit::exit_process(proc.pid, status);
    Ok(status as isize)
}

/// ELF loading is out of scope here; this validates and reads the
/// command-line string the way a real `exec` would before handing off
/// to a loader, then reports load failure.
pub fn sys_exec(proc: &Process, cmdline_uaddr: usize) -> Result<isize, KernelError> {
    let _cmdline = read_user_string(proc, cmdline_uaddr)?;
    Ok(-1)
}

pub fn sys_wait(proc: &Process, pid: usize) -> Result<isize, KernelError> {
    match exit::wait_process(proc.pid, Some(ProcessId(pid as u64))) {
        Ok((_, code)) => Ok(code as isize),
        Err(_) => Ok(-1),
    }
}
