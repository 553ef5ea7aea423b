//! Process exit, resource teardown, and parent-child wait.
//!
//! Grounded on the original implementation's `process_exit`: close every
//! open file, tear down every mmap region (which writes back dirty
//! pages before releasing them), then free the remaining supplemental
//! page table entries (frames and swap slots) and release the page
//! directory. Order matters -- mmap teardown must run before the bulk
//! SPT teardown, since `munmap` writes back through the normal
//! `destroy_entry` path and the order is only incidental past that
//! point.

use alloc::vec::Vec;

use super::{
    pcb::{Process, ProcessState},
    table, ProcessId,
};
use crate::{error::KernelError, mm::spt};

/// Tear down a process's resources and mark it a zombie for its parent
/// to reap. Does not remove it from the process table -- `wait_process`
/// does that once the exit code has been collected.
pub fn exit_process(pid: ProcessId, exit_code: i32) {
    let process = match table::get_process(pid) {
        Some(p) => p,
        None => return,
    };

    crate::println!("[PROCESS] process {} exiting with code {}", pid.0, exit_code);

    let mapids: Vec<u32> = process.mmaps.lock().iter().map(|r| r.mapid).collect();
    for mapid in mapids {
        let _ = spt::munmap(process, mapid);
    }

    spt::destroy_all(process);
    process.files.lock().close_all();

    process.set_exit_code(exit_code);
    process.set_state(ProcessState::Zombie);
}

/// Wait for a child to exit and reap it. `child` filters to a specific
/// PID; `None` reaps any zombie child. There is no blocking here --
/// without a scheduler a caller that needs to block polls this.
pub fn wait_process(parent_pid: ProcessId, child: Option<ProcessId>) -> Result<(ProcessId, i32), KernelError> {
    let parent = table::get_process(parent_pid).ok_or(KernelError::ProcessNotFound { pid: parent_pid.0 })?;
    let children = table::find_children(parent_pid);

    if children.is_empty() {
        return Err(KernelError::NotFound {
            resource: "child process",
            id: 0,
        });
    }
    if let Some(target) = child {
        if !children.contains(&target) {
            return Err(KernelError::ProcessNotFound { pid: target.0 });
        }
    }

    for child_pid in &children {
        if let Some(target) = child {
            if *child_pid != target {
                continue;
            }
        }
        if let Some(child_proc) = table::get_process(*child_pid) {
            if child_proc.get_state() == ProcessState::Zombie {
                let exit_code = child_proc.get_exit_code();
                parent.children.lock().retain(|&p| p != *child_pid);
                table::remove_process(*child_pid);
                crate::println!(
                    "[PROCESS] process {} reaped child {} (exit code {})",
                    parent_pid.0, child_pid.0, exit_code
                );
                return Ok((*child_pid, exit_code));
            }
        }
    }

    Err(KernelError::NotFound {
        resource: "zombie child",
        id: 0,
    })
}

/// Reparent a process's still-living children to `init_pid`, used so an
/// exiting process never leaves orphans with a dangling parent.
pub fn reparent_children(pid: ProcessId, init_pid: ProcessId) {
    let children: Vec<ProcessId> = match table::get_process(pid) {
        Some(p) => p.children.lock().clone(),
        None => return,
    };
    if let Some(init) = table::get_process(init_pid) {
        for child_pid in children {
            if let Some(child) = table::get_process(child_pid) {
                init.children.lock().push(child_pid);
                let _ = child;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    #[test]
    fn exit_marks_zombie_and_wait_reaps() {
        let parent = ProcessId(21001);
        let child = ProcessId(21002);
        table::add_process(Process::new(parent, None, String::from("p"))).unwrap();
        table::add_process(Process::new(child, Some(parent), String::from("c"))).unwrap();
        table::get_process(parent).unwrap().children.lock().push(child);

        exit_process(child, 7);
        assert_eq!(table::get_process(child).unwrap().get_state(), ProcessState::Zombie);

        let (reaped_pid, code) = wait_process(parent, Some(child)).unwrap();
        assert_eq!(reaped_pid, child);
        assert_eq!(code, 7);
        assert!(!table::process_exists(child));

        table::remove_process(parent);
    }

    #[test]
    fn wait_with_no_children_fails() {
        let pid = ProcessId(21003);
        table::add_process(Process::new(pid, None, String::from("lonely"))).unwrap();
        assert!(wait_process(pid, None).is_err());
        table::remove_process(pid);
    }
}
