//! The syscall bridge: translates a trap from user mode into a call
//! into the filesystem/memory/process subsystems, validating every
//! user pointer against the caller's SPT first.
//!
//! Grounded on the original implementation's `syscall_handler` in
//! `userprog/syscall.c`: read a syscall number and up to three
//! arguments, validate any pointer argument with `kill_on_bad_uaddr`,
//! pin buffer/string arguments before taking `fs_lock`, dispatch, then
//! unpin. Argument marshalling off the raw user stack and ELF-backed
//! `exec` are out of scope here -- callers already hand in typed
//! arguments the way a trap entry stub would after reading them off
//! the user stack.

pub mod filesystem;
pub mod memory;
pub mod process;

use alloc::string::String;

use crate::{
    error::KernelError,
    mm::{frame_table, VirtAddr},
    process::pcb::Process,
};

/// A syscall's return value is always a single machine word; errors the
/// kernel detects itself (bad pointer, permission violation, unknown
/// syscall) surface as -1 and the calling process is terminated, per
/// the user ABI.
pub type SyscallReturn = isize;

/// Syscall numbers, in the order the original Pintos ABI assigns them
/// (its `TELL` is unused here and its slot is not reserved).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Syscall {
    Halt = 0,
    Exit = 1,
    Exec = 2,
    Wait = 3,
    Create = 4,
    Remove = 5,
    Open = 6,
    Filesize = 7,
    Read = 8,
    Write = 9,
    Seek = 10,
    Close = 11,
    Mmap = 12,
    Munmap = 13,
}

impl TryFrom<usize> for Syscall {
    type Error = ();

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Syscall::Halt,
            1 => Syscall::Exit,
            2 => Syscall::Exec,
            3 => Syscall::Wait,
            4 => Syscall::Create,
            5 => Syscall::Remove,
            6 => Syscall::Open,
            7 => Syscall::Filesize,
            8 => Syscall::Read,
            9 => Syscall::Write,
            10 => Syscall::Seek,
            11 => Syscall::Close,
            12 => Syscall::Mmap,
            13 => Syscall::Munmap,
            _ => return Err(()),
        })
    }
}

/// Dispatch one syscall on behalf of `proc`. Pointer-bearing arguments
/// are passed as raw user addresses; each handler validates and pins
/// what it needs before touching the filesystem or memory subsystem.
pub fn dispatch(proc: &Process, code: usize, a0: usize, a1: usize, a2: usize) -> SyscallReturn {
    let syscall = match Syscall::try_from(code) {
        Ok(s) => s,
        Err(()) => return kill(proc, "unknown syscall"),
    };

    let result = match syscall {
        Syscall::Halt => process::sys_halt(),
        Syscall::Exit => process::sys_exit(proc, a0 as i32),
        Syscall::Exec => process::sys_exec(proc, a0),
        Syscall::Wait => process::sys_wait(proc, a0),
        Syscall::Create => filesystem::sys_create(proc, a0, a1),
        Syscall::Remove => filesystem::sys_remove(proc, a0),
        Syscall::Open => filesystem::sys_open(proc, a0),
        Syscall::Filesize => filesystem::sys_filesize(proc, a0),
        Syscall::Read => filesystem::sys_read(proc, a0, a1, a2),
        Syscall::Write => filesystem::sys_write(proc, a0, a1, a2),
        Syscall::Seek => filesystem::sys_seek(proc, a0, a1),
        Syscall::Close => filesystem::sys_close(proc, a0),
        Syscall::Mmap => memory::sys_mmap(proc, a0, a1),
        Syscall::Munmap => memory::sys_munmap(proc, a0),
    };

    match result {
        Ok(value) => value,
        Err(KernelError::BadUserPointer { addr }) => {
            crate::println!("[SYSCALL] process {} killed: bad pointer {:#x}", proc.pid.0, addr);
            crate::process::exit::exit_process(proc.pid, -1);
            -1
        }
        Err(_) => -1,
    }
}

fn kill(proc: &Process, why: &str) -> SyscallReturn {
    crate::println!("[SYSCALL] process {} killed: {}", proc.pid.0, why);
    crate::process::exit::exit_process(proc.pid, -1);
    -1
}

/// Pin the string argument at `uaddr`, copy it into an owned `String`,
/// and unpin before returning. Used for every path/cmdline argument.
pub(crate) fn read_user_string(proc: &Process, uaddr: VirtAddr) -> Result<String, KernelError> {
    let len = frame_table::pin_string(proc, uaddr)?;
    let mut bytes = alloc::vec![0u8; len];
    let result = frame_table::copy_from_user(proc, uaddr, &mut bytes);
    frame_table::unpin_buffer(proc, uaddr, len.max(1));
    result?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_syscall_kills_process() {
        use crate::process::pcb::ProcessId;
        use alloc::string::String as AllocString;
        let proc = Process::new(ProcessId(61001), None, AllocString::from("t"));
        assert_eq!(dispatch(&proc, 999, 0, 0, 0), -1);
        assert_eq!(proc.get_state(), crate::process::pcb::ProcessState::Zombie);
    }
}
