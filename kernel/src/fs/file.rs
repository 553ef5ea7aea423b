//! File descriptors and open-file objects.
//!
//! Grounded on the original implementation's `struct file`/`process_file`:
//! an open file is a VFS node plus a cursor, one cursor per `open` call
//! (not shared on `dup`-like reuse -- this kernel has no `dup`). File
//! descriptor numbers start at 2, reserving 0 and 1 for stdin/stdout as
//! the original does.

use alloc::{collections::BTreeMap, sync::Arc};

use spin::Mutex;

use super::VfsNode;
use crate::error::{FsError, KernelError};

pub type FileDescriptor = usize;

pub const STDIN: FileDescriptor = 0;
pub const STDOUT: FileDescriptor = 1;
const FIRST_FD: FileDescriptor = 2;

#[derive(Debug, Clone, Copy)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub create: bool,
    pub truncate: bool,
    pub exclusive: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self {
            read: true,
            write: false,
            append: false,
            create: false,
            truncate: false,
            exclusive: false,
        }
    }

    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            append: false,
            create: true,
            truncate: false,
            exclusive: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SeekFrom {
    Start(usize),
    Current(isize),
    End(isize),
}

/// An open file: a VFS node plus this open instance's cursor.
pub struct File {
    pub node: Arc<dyn VfsNode>,
    pub flags: OpenFlags,
    position: Mutex<usize>,
}

impl File {
    pub fn new(node: Arc<dyn VfsNode>, flags: OpenFlags) -> Self {
        Self {
            node,
            flags,
            position: Mutex::new(0),
        }
    }

    pub fn read(&self, buffer: &mut [u8]) -> Result<usize, KernelError> {
        if !self.flags.read {
            return Err(KernelError::PermissionDenied);
        }
        let mut pos = self.position.lock();
        let n = self.node.read(*pos, buffer)?;
        *pos += n;
        Ok(n)
    }

    pub fn write(&self, data: &[u8]) -> Result<usize, KernelError> {
        if !self.flags.write {
            return Err(KernelError::PermissionDenied);
        }
        let mut pos = self.position.lock();
        if self.flags.append {
            *pos = self.node.metadata()?.size;
        }
        let n = self.node.write(*pos, data)?;
        *pos += n;
        Ok(n)
    }

    /// Read at an explicit offset without touching the cursor. Used by
    /// the page loader for FILE/MMAP-backed pages.
    pub fn read_at(&self, offset: usize, buffer: &mut [u8]) -> Result<usize, KernelError> {
        Ok(self.node.read(offset, buffer)?)
    }

    /// Write at an explicit offset without touching the cursor. Used by
    /// eviction and `munmap` writeback.
    pub fn write_at(&self, offset: usize, data: &[u8]) -> Result<usize, KernelError> {
        Ok(self.node.write(offset, data)?)
    }

    pub fn seek(&self, from: SeekFrom) -> Result<usize, KernelError> {
        let mut pos = self.position.lock();
        let new_pos = match from {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(offset) => {
                if offset < 0 {
                    pos.checked_sub((-offset) as usize)
                        .ok_or(KernelError::InvalidArgument)?
                } else {
                    pos.checked_add(offset as usize)
                        .ok_or(KernelError::InvalidArgument)?
                }
            }
            SeekFrom::End(offset) => {
                let size = self.node.metadata()?.size;
                if offset < 0 {
                    size.checked_sub((-offset) as usize)
                        .ok_or(KernelError::InvalidArgument)?
                } else {
                    size.checked_add(offset as usize)
                        .ok_or(KernelError::InvalidArgument)?
                }
            }
        };
        *pos = new_pos;
        Ok(new_pos)
    }

    pub fn tell(&self) -> usize {
        *self.position.lock()
    }

    pub fn size(&self) -> Result<usize, KernelError> {
        Ok(self.node.metadata()?.size)
    }
}

/// Per-process open-file table.
pub struct FileTable {
    files: BTreeMap<FileDescriptor, Arc<File>>,
    next_fd: FileDescriptor,
}

impl FileTable {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            next_fd: FIRST_FD,
        }
    }

    pub fn open(&mut self, file: Arc<File>) -> FileDescriptor {
        let fd = self.next_fd;
        self.next_fd += 1;
        self.files.insert(fd, file);
        fd
    }

    pub fn get(&self, fd: FileDescriptor) -> Option<Arc<File>> {
        self.files.get(&fd).cloned()
    }

    pub fn close(&mut self, fd: FileDescriptor) -> Result<(), KernelError> {
        self.files
            .remove(&fd)
            .map(|_| ())
            .ok_or(KernelError::Fs(FsError::BadFileDescriptor))
    }

    pub fn close_all(&mut self) {
        self.files.clear();
    }

    pub fn count_open(&self) -> usize {
        self.files.len()
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::ramfs::RamFs;
    use crate::fs::{Filesystem, Permissions};

    fn ram_file() -> Arc<File> {
        let fs = RamFs::new();
        let root = fs.root();
        let node = root.create("f", Permissions::default()).unwrap();
        Arc::new(File::new(node, OpenFlags::read_write()))
    }

    #[test]
    fn fd_allocation_starts_at_two() {
        let mut table = FileTable::new();
        let fd = table.open(ram_file());
        assert_eq!(fd, FIRST_FD);
    }

    #[test]
    fn read_at_does_not_move_cursor() {
        let file = ram_file();
        file.write(b"hello world").unwrap();
        let mut buf = [0u8; 5];
        file.read_at(6, &mut buf).unwrap();
        assert_eq!(&buf, b"world");
        assert_eq!(file.tell(), 11);
    }

    #[test]
    fn close_removes_descriptor() {
        let mut table = FileTable::new();
        let fd = table.open(ram_file());
        table.close(fd).unwrap();
        assert!(table.get(fd).is_none());
        assert!(table.close(fd).is_err());
    }
}
