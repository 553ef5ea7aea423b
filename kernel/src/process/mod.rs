//! Process management.
//!
//! Scheduling proper is out of scope here: there is no run queue and no
//! preemption. What remains is the part the memory subsystem and the
//! syscall bridge actually depend on -- a process table, PID allocation,
//! and a notion of "the process the syscall bridge is currently acting
//! on behalf of", tracked explicitly rather than pulled from a
//! scheduler's current-task pointer.

use core::sync::atomic::{AtomicU64, Ordering};

use alloc::string::String;

use spin::Mutex;

pub mod exit;
pub mod pcb;
pub mod table;

pub use pcb::{Process, ProcessId, ProcessState};

static NEXT_PID: AtomicU64 = AtomicU64::new(1);
static CURRENT: Mutex<Option<ProcessId>> = Mutex::new(None);

pub fn alloc_pid() -> ProcessId {
    ProcessId(NEXT_PID.fetch_add(1, Ordering::Relaxed))
}

pub fn init() {
    crate::println!("[PROCESS] initializing process management");
    table::init();

    let pid = alloc_pid();
    let proc = Process::new(pid, None, String::from("init"));
    table::add_process(proc).expect("failed to register init process");
    set_current(Some(pid));
    crate::println!("[PROCESS] created init process with pid {}", pid.0);
}

/// Set which process the syscall bridge is currently running on behalf
/// of. Called on syscall entry/exit in place of a scheduler context
/// switch.
pub fn set_current(pid: Option<ProcessId>) {
    *CURRENT.lock() = pid;
}

pub fn current_pid() -> Option<ProcessId> {
    *CURRENT.lock()
}

pub fn current_process() -> Option<&'static Process> {
    current_pid().and_then(table::get_process)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_tracks_set_current() {
        let pid = alloc_pid();
        table::add_process(Process::new(pid, None, String::from("t"))).unwrap();
        set_current(Some(pid));
        assert_eq!(current_process().unwrap().pid, pid);
        set_current(None);
        table::remove_process(pid);
    }
}
