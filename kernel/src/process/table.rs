//! Global process table.
//!
//! Grounded on the original's process table: a PID-indexed map behind a
//! lock, with `get_process` returning a `'static` reference by casting
//! past the lock. That cast is sound here for the same reason the
//! original relies on it: entries are heap-boxed and never moved or
//! freed while a caller might be holding a reference.

use alloc::{boxed::Box, collections::BTreeMap, vec::Vec};

use spin::Mutex;

use super::pcb::{Process, ProcessId, ProcessState};
use crate::error::KernelError;

struct ProcessTable {
    entries: Mutex<BTreeMap<ProcessId, Box<Process>>>,
    count: core::sync::atomic::AtomicUsize,
}

impl ProcessTable {
    const fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            count: core::sync::atomic::AtomicUsize::new(0),
        }
    }

    fn add_process(&self, process: Process) -> Result<ProcessId, KernelError> {
        let pid = process.pid;
        let mut entries = self.entries.lock();
        if entries.contains_key(&pid) {
            return Err(KernelError::AlreadyExists {
                resource: "process",
                id: pid.0,
            });
        }
        entries.insert(pid, Box::new(process));
        self.count.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
        Ok(pid)
    }

    fn remove_process(&self, pid: ProcessId) -> Option<Box<Process>> {
        let mut entries = self.entries.lock();
        let removed = entries.remove(&pid);
        if removed.is_some() {
            self.count.fetch_sub(1, core::sync::atomic::Ordering::Relaxed);
        }
        removed
    }

    fn get_process(&self, pid: ProcessId) -> Option<&'static Process> {
        let entries = self.entries.lock();
        entries.get(&pid).map(|boxed| {
            // SAFETY: the Process lives in a heap Box inside a BTreeMap
            // behind a Mutex, giving it a stable address. Extending the
            // borrow past the lock guard is sound because processes are
            // never moved or dropped while a caller might hold this
            // reference -- removal only happens via `remove_process`,
            // which callers are required to sequence after releasing
            // any such references.
            unsafe { &*(boxed.as_ref() as *const Process) }
        })
    }

    fn exists(&self, pid: ProcessId) -> bool {
        self.entries.lock().contains_key(&pid)
    }

    fn find_children(&self, parent_pid: ProcessId) -> Vec<ProcessId> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, p)| p.parent == Some(parent_pid))
            .map(|(pid, _)| *pid)
            .collect()
    }

    fn find_by_state(&self, state: ProcessState) -> Vec<ProcessId> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, p)| p.get_state() == state)
            .map(|(pid, _)| *pid)
            .collect()
    }

    fn count(&self) -> usize {
        self.count.load(core::sync::atomic::Ordering::Relaxed)
    }
}

static PROCESS_TABLE: ProcessTable = ProcessTable::new();

pub fn init() {
    crate::println!("[PROCESS] process table initialized");
}

pub fn get_process(pid: ProcessId) -> Option<&'static Process> {
    PROCESS_TABLE.get_process(pid)
}

pub fn add_process(process: Process) -> Result<ProcessId, KernelError> {
    PROCESS_TABLE.add_process(process)
}

pub fn remove_process(pid: ProcessId) -> Option<Box<Process>> {
    PROCESS_TABLE.remove_process(pid)
}

pub fn process_exists(pid: ProcessId) -> bool {
    PROCESS_TABLE.exists(pid)
}

pub fn find_children(parent_pid: ProcessId) -> Vec<ProcessId> {
    PROCESS_TABLE.find_children(parent_pid)
}

pub fn find_by_state(state: ProcessState) -> Vec<ProcessId> {
    PROCESS_TABLE.find_by_state(state)
}

pub fn process_count() -> usize {
    PROCESS_TABLE.count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    #[test]
    fn add_get_remove_round_trip() {
        let pid = ProcessId(9001);
        add_process(Process::new(pid, None, String::from("t"))).unwrap();
        assert!(process_exists(pid));
        assert_eq!(get_process(pid).unwrap().pid, pid);
        remove_process(pid);
        assert!(!process_exists(pid));
    }

    #[test]
    fn find_children_filters_by_parent() {
        let parent = ProcessId(9002);
        let child = ProcessId(9003);
        add_process(Process::new(parent, None, String::from("p"))).unwrap();
        add_process(Process::new(child, Some(parent), String::from("c"))).unwrap();
        assert_eq!(find_children(parent), alloc::vec![child]);
        remove_process(parent);
        remove_process(child);
    }
}
