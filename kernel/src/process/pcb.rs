//! Process Control Block (PCB).
//!
//! Holds everything the memory subsystem and the syscall bridge need per
//! process: its simulated address space, its supplemental page table,
//! its open-file table, and its mmap regions. Scheduling state is
//! deliberately thin -- there is no run queue here, only enough state
//! for `wait`/`exit` bookkeeping.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use alloc::{string::String, vec::Vec};

use spin::Mutex;

use crate::{
    fs::file::FileTable,
    mm::{address_space::SimAddressSpace, spt::{MmapRegion, Spt}},
};

/// Process ID type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u64);

impl core::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running = 0,
    /// Exited, exit code recorded, waiting for a parent `wait` call.
    Zombie = 1,
    /// Reaped; only reachable transiently before removal from the table.
    Dead = 2,
}

/// Process Control Block.
pub struct Process {
    pub pid: ProcessId,
    pub parent: Option<ProcessId>,
    pub name: String,

    state: AtomicU32,
    exit_code: AtomicU32,

    pub address_space: SimAddressSpace,
    pub spt: Spt,
    pub files: Mutex<FileTable>,
    pub mmaps: Mutex<Vec<MmapRegion>>,
    pub children: Mutex<Vec<ProcessId>>,

    next_mapid: AtomicU64,
}

impl Process {
    pub fn new(pid: ProcessId, parent: Option<ProcessId>, name: String) -> Self {
        Self {
            pid,
            parent,
            name,
            state: AtomicU32::new(ProcessState::Running as u32),
            exit_code: AtomicU32::new(0),
            address_space: SimAddressSpace::new(),
            spt: Spt::new(),
            files: Mutex::new(FileTable::new()),
            mmaps: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            next_mapid: AtomicU64::new(0),
        }
    }

    pub fn get_state(&self) -> ProcessState {
        match self.state.load(Ordering::Acquire) {
            0 => ProcessState::Running,
            1 => ProcessState::Zombie,
            _ => ProcessState::Dead,
        }
    }

    pub fn set_state(&self, state: ProcessState) {
        self.state.store(state as u32, Ordering::Release);
    }

    pub fn set_exit_code(&self, code: i32) {
        self.exit_code.store(code as u32, Ordering::Release);
    }

    pub fn get_exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::Acquire) as i32
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.get_state(), ProcessState::Running)
    }

    /// Allocate the next mapid for an `mmap` call on this process.
    pub fn alloc_mapid(&self) -> u32 {
        self.next_mapid.fetch_add(1, Ordering::Relaxed) as u32
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        crate::println!("[PROCESS] dropping process {}", self.pid.0);
    }
}
