//! Named locks and the partial order they must be acquired under.
//!
//! The memory subsystem has exactly two process-wide locks:
//!
//! - [`FtLock`] protects the global frame table's clock list and eviction.
//! - [`FsLock`] serializes every call into the filesystem.
//!
//! Ordering rule: `ft_lock` may be taken while holding nothing; `fs_lock`
//! may be taken while holding nothing; but eviction's writeback path must
//! never hold `fs_lock` across a re-entry into the frame table. Syscall
//! entry asserts it does not already hold `fs_lock` (it never should --
//! syscalls acquire it fresh after pinning buffers).

use spin::{Mutex, MutexGuard};

/// The frame-table lock. Wraps `spin::Mutex` so call sites read as
/// `ft_lock().lock()` rather than touching a bare mutex, documenting which
/// named lock is being taken at each call site.
pub struct FtLock<T> {
    inner: Mutex<T>,
}

impl<T> FtLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }
}

/// The filesystem lock.
pub struct FsLock<T> {
    inner: Mutex<T>,
}

impl<T> FsLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locks_are_independent() {
        let ft: FtLock<u32> = FtLock::new(1);
        let fs: FsLock<u32> = FsLock::new(2);
        assert_eq!(*ft.lock(), 1);
        assert_eq!(*fs.lock(), 2);
    }
}
