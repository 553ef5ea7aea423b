//! `mmap`, `munmap`.
//!
//! Grounded on the original implementation's `sys_mmap`/`sys_munmap` in
//! `userprog/syscall.c`: reject a zero-length file, an unaligned
//! address, and a region that would overlap an already-registered
//! page, then register one SPT entry per page the way `add_mmap_lazily`
//! already does for the memory subsystem's own tests.

use crate::{
    error::KernelError,
    mm::{page_down, spt, VirtAddr},
    process::pcb::Process,
};

pub fn sys_mmap(proc: &Process, fd: usize, addr: VirtAddr) -> Result<isize, KernelError> {
    if addr == 0 || addr != page_down(addr) {
        return Ok(spt::MAP_FAILED as isize);
    }

    let file = match proc.files.lock().get(fd) {
        Some(f) => f,
        None => return Ok(spt::MAP_FAILED as isize),
    };

    let length = match file.size() {
        Ok(0) | Err(_) => return Ok(spt::MAP_FAILED as isize),
        Ok(n) => n,
    };

    match spt::add_mmap_lazily(proc, addr, file, length) {
        Ok(mapid) => Ok(mapid as isize),
        Err(_) => Ok(spt::MAP_FAILED as isize),
    }
}

pub fn sys_munmap(proc: &Process, mapid: usize) -> Result<isize, KernelError> {
    match spt::munmap(proc, mapid as u32) {
        Ok(()) => Ok(0),
        Err(_) => Ok(-1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::{file::{File, OpenFlags}, Filesystem},
        process::pcb::ProcessId,
    };
    use alloc::{string::String, sync::Arc};

    fn test_process(pid: u64) -> Process {
        Process::new(ProcessId(pid), None, String::from("t"))
    }

    fn opened_file(proc: &Process, contents: &[u8]) -> usize {
        let fs = crate::fs::ramfs::RamFs::new();
        let root = fs.root();
        let node = root.create("m", crate::fs::Permissions::default()).unwrap();
        node.write(0, contents).unwrap();
        let file = Arc::new(File::new(node, OpenFlags::read_write()));
        proc.files.lock().open(file)
    }

    #[test]
    fn mmap_then_munmap_round_trip() {
        let proc = test_process(81001);
        let fd = opened_file(&proc, b"mapped contents");
        let mapid = sys_mmap(&proc, fd, 0x4_0000).unwrap();
        assert!(mapid >= 0);
        assert!(proc.spt.get(0x4_0000).is_some());
        assert_eq!(sys_munmap(&proc, mapid as usize).unwrap(), 0);
        assert!(proc.spt.get(0x4_0000).is_none());
    }

    #[test]
    fn mmap_unaligned_addr_fails() {
        let proc = test_process(81002);
        let fd = opened_file(&proc, b"x");
        assert_eq!(sys_mmap(&proc, fd, 0x4_0001).unwrap(), spt::MAP_FAILED as isize);
    }

    #[test]
    fn mmap_bad_fd_fails() {
        let proc = test_process(81003);
        assert_eq!(sys_mmap(&proc, 99, 0x5_0000).unwrap(), spt::MAP_FAILED as isize);
    }

    #[test]
    fn munmap_unknown_mapid_fails() {
        let proc = test_process(81004);
        assert_eq!(sys_munmap(&proc, 42).unwrap(), -1);
    }
}
