//! `create`, `remove`, `open`, `filesize`, `read`, `write`, `seek`,
//! `close`.
//!
//! Grounded on the original implementation's filesystem syscalls in
//! `userprog/syscall.c`: pin the string/buffer argument before taking
//! `fs::FS_LOCK`, never the other way around, matching the ordering
//! documented on that lock. `read`'s destination buffer is additionally
//! checked against the caller's SPT so a write into a read-only
//! FILE-backed page is caught before it would silently corrupt a
//! mapped file instead of the process's own memory.

use alloc::sync::Arc;

use crate::{
    error::KernelError,
    fs::{
        self,
        file::{File, OpenFlags, SeekFrom, STDIN, STDOUT},
    },
    mm::{frame_table, user_validation, VirtAddr},
    process::pcb::Process,
    raii::{BufferPinGuard, StringPinGuard},
    syscall::read_user_string,
};

pub fn sys_create(proc: &Process, path_uaddr: usize, size: usize) -> Result<isize, KernelError> {
    let _guard = StringPinGuard::new(proc, path_uaddr)?;
    let path = read_user_string(proc, path_uaddr)?;
    let _fs_guard = fs::FS_LOCK.lock();
    match fs::write_file(&path, &alloc::vec![0u8; size]) {
        Ok(_) => Ok(1),
        Err(_) => Ok(0),
    }
}

pub fn sys_remove(proc: &Process, path_uaddr: usize) -> Result<isize, KernelError> {
    let _guard = StringPinGuard::new(proc, path_uaddr)?;
    let path = read_user_string(proc, path_uaddr)?;
    let _fs_guard = fs::FS_LOCK.lock();
    let vfs = fs::get_vfs().read();
    match vfs.unlink(&path) {
        Ok(()) => Ok(1),
        Err(_) => Ok(0),
    }
}

pub fn sys_open(proc: &Process, path_uaddr: usize) -> Result<isize, KernelError> {
    let _guard = StringPinGuard::new(proc, path_uaddr)?;
    let path = read_user_string(proc, path_uaddr)?;
    let node = {
        let _fs_guard = fs::FS_LOCK.lock();
        let vfs = fs::get_vfs().read();
        match vfs.open(&path, OpenFlags::read_write()) {
            Ok(node) => node,
            Err(_) => return Ok(-1),
        }
    };
    let file = Arc::new(File::new(node, OpenFlags::read_write()));
    let fd = proc.files.lock().open(file);
    Ok(fd as isize)
}

pub fn sys_filesize(proc: &Process, fd: usize) -> Result<isize, KernelError> {
    let file = match proc.files.lock().get(fd) {
        Some(f) => f,
        None => return Ok(-1),
    };
    let _fs_guard = fs::FS_LOCK.lock();
    match file.size() {
        Ok(size) => Ok(size as isize),
        Err(_) => Ok(-1),
    }
}

pub fn sys_read(proc: &Process, fd: usize, buf_uaddr: VirtAddr, count: usize) -> Result<isize, KernelError> {
    if count == 0 {
        return Ok(0);
    }
    user_validation::validate_writable_buffer(proc, buf_uaddr, count)?;
    let _guard = BufferPinGuard::new(proc, buf_uaddr, count)?;

    if fd == STDIN {
        return Ok(0);
    }
    if fd == STDOUT {
        return Ok(-1);
    }

    let file = match proc.files.lock().get(fd) {
        Some(f) => f,
        None => return Ok(-1),
    };

    let mut local = alloc::vec![0u8; count];
    let n = {
        let _fs_guard = fs::FS_LOCK.lock();
        match file.read(&mut local) {
            Ok(n) => n,
            Err(_) => return Ok(-1),
        }
    };
    frame_table::copy_to_user(proc, buf_uaddr, &local[..n])?;
    Ok(n as isize)
}

pub fn sys_write(proc: &Process, fd: usize, buf_uaddr: VirtAddr, count: usize) -> Result<isize, KernelError> {
    if count == 0 {
        return Ok(0);
    }
    user_validation::validate_user_buffer(proc, buf_uaddr, count)?;
    let _guard = BufferPinGuard::new(proc, buf_uaddr, count)?;

    let mut local = alloc::vec![0u8; count];
    frame_table::copy_from_user(proc, buf_uaddr, &mut local)?;

    if fd == STDOUT {
        if let Ok(s) = core::str::from_utf8(&local) {
            crate::print!("{}", s);
        }
        return Ok(count as isize);
    }
    if fd == STDIN {
        return Ok(-1);
    }

    let file = match proc.files.lock().get(fd) {
        Some(f) => f,
        None => return Ok(-1),
    };
    let _fs_guard = fs::FS_LOCK.lock();
    match file.write(&local) {
        Ok(n) => Ok(n as isize),
        Err(_) => Ok(-1),
    }
}

pub fn sys_seek(proc: &Process, fd: usize, position: usize) -> Result<isize, KernelError> {
    let file = match proc.files.lock().get(fd) {
        Some(f) => f,
        None => return Ok(-1),
    };
    let _fs_guard = fs::FS_LOCK.lock();
    match file.seek(SeekFrom::Start(position)) {
        Ok(pos) => Ok(pos as isize),
        Err(_) => Ok(-1),
    }
}

pub fn sys_close(proc: &Process, fd: usize) -> Result<isize, KernelError> {
    let _fs_guard = fs::FS_LOCK.lock();
    match proc.files.lock().close(fd) {
        Ok(()) => Ok(0),
        Err(_) => Ok(-1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fs::Filesystem, process::pcb::ProcessId};
    use alloc::string::String;

    fn test_process(pid: u64) -> Process {
        Process::new(ProcessId(pid), None, String::from("t"))
    }

    fn write_path_string(proc: &Process, uaddr: VirtAddr, path: &str) {
        crate::mm::spt::add_zero(proc, crate::mm::page_down(uaddr)).unwrap();
        frame_table::copy_to_user(proc, uaddr, path.as_bytes()).unwrap();
        frame_table::copy_to_user(proc, uaddr + path.len(), &[0u8]).unwrap();
    }

    #[test]
    fn create_then_open_then_write_then_read() {
        fs::init();
        let proc = test_process(71001);
        write_path_string(&proc, 0x6000, "/tmp/sc_test.txt");

        assert_eq!(sys_create(&proc, 0x6000, 16).unwrap(), 1);

        let fd = sys_open(&proc, 0x6000).unwrap();
        assert!(fd >= 2);

        crate::mm::spt::add_zero(&proc, 0x7000).unwrap();
        let payload = b"hello";
        frame_table::copy_to_user(&proc, 0x7000, payload).unwrap();
        assert_eq!(sys_write(&proc, fd as usize, 0x7000, payload.len()).unwrap(), 5);

        assert_eq!(sys_seek(&proc, fd as usize, 0).unwrap(), 0);

        crate::mm::spt::add_zero(&proc, 0x8000).unwrap();
        let n = sys_read(&proc, fd as usize, 0x8000, 5).unwrap();
        assert_eq!(n, 5);

        assert_eq!(sys_close(&proc, fd as usize).unwrap(), 0);
    }

    #[test]
    fn read_into_readonly_file_page_is_rejected() {
        fs::init();
        let proc = test_process(71002);
        let fsroot = crate::fs::ramfs::RamFs::new();
        let root = fsroot.root();
        let node = root.create("f", crate::fs::Permissions::default()).unwrap();
        let file = Arc::new(File::new(node, OpenFlags::read_only()));
        crate::mm::spt::add_file_lazily(&proc, 0x9000, file, 0, 10, false).unwrap();
        assert!(sys_read(&proc, 2, 0x9000, 4).is_err());
    }

    #[test]
    fn close_unknown_fd_returns_negative_one() {
        let proc = test_process(71003);
        assert_eq!(sys_close(&proc, 99).unwrap(), -1);
    }
}
