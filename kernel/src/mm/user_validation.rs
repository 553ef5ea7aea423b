//! Validation of user-supplied addresses at the syscall boundary.
//!
//! Grounded on the original implementation's `kill_on_bad_uaddr`: a user
//! pointer is only trustworthy if it both lies below the user/kernel
//! split and is already described by the caller's SPT. A syntactically
//! in-range address with no SPT entry is still rejected -- it would
//! otherwise page-fault inside the kernel with no handler for it.

use super::{page_down, spt::PageKind, PHYS_BASE};
use crate::{error::KernelError, process::pcb::Process};

/// Check that `addr` lies in user space and has an SPT entry describing
/// it. Does not check permissions; callers that need write access check
/// `PageKind::is_writable` separately.
pub fn validate_user_addr(proc: &Process, addr: super::VirtAddr) -> Result<(), KernelError> {
    if addr >= PHYS_BASE {
        return Err(KernelError::BadUserPointer { addr });
    }
    if proc.spt.get(addr).is_none() {
        return Err(KernelError::BadUserPointer { addr });
    }
    Ok(())
}

/// Check every page spanned by a `len`-byte buffer starting at `addr`.
pub fn validate_user_buffer(proc: &Process, addr: super::VirtAddr, len: usize) -> Result<(), KernelError> {
    if len == 0 {
        return validate_user_addr(proc, addr);
    }
    let last = addr.checked_add(len - 1).ok_or(KernelError::BadUserPointer { addr })?;
    let mut page = page_down(addr);
    let last_page = page_down(last);
    loop {
        validate_user_addr(proc, page)?;
        if page == last_page {
            break;
        }
        page += super::PAGE_SIZE;
    }
    Ok(())
}

/// Check that a buffer argument is backed by a writable SPT entry, used
/// by `read` to reject a destination that lands in a read-only FILE
/// page before touching the filesystem.
pub fn validate_writable_buffer(proc: &Process, addr: super::VirtAddr, len: usize) -> Result<(), KernelError> {
    validate_user_buffer(proc, addr, len)?;
    let mut page = page_down(addr);
    let last_page = if len == 0 { page } else { page_down(addr + len - 1) };
    loop {
        if let Some(entry) = proc.spt.get(page) {
            if !entry_is_writable(&entry.kind) {
                return Err(KernelError::BadUserPointer { addr: page });
            }
        }
        if page == last_page {
            break;
        }
        page += super::PAGE_SIZE;
    }
    Ok(())
}

fn entry_is_writable(kind: &PageKind) -> bool {
    kind.is_writable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fs::Filesystem, mm::spt, process::pcb::ProcessId};
    use alloc::{string::String, sync::Arc};

    fn test_process() -> Process {
        Process::new(ProcessId(41001), None, String::from("t"))
    }

    #[test]
    fn unmapped_addr_is_rejected() {
        let proc = test_process();
        assert!(validate_user_addr(&proc, 0x1000).is_err());
    }

    #[test]
    fn kernel_addr_is_rejected() {
        let proc = test_process();
        spt::add_zero_lazily(&proc, PHYS_BASE - crate::mm::PAGE_SIZE).unwrap();
        assert!(validate_user_addr(&proc, PHYS_BASE).is_err());
    }

    #[test]
    fn registered_page_validates() {
        let proc = test_process();
        spt::add_zero_lazily(&proc, 0x2000).unwrap();
        assert!(validate_user_addr(&proc, 0x2000).is_ok());
        assert!(validate_user_addr(&proc, 0x2fff).is_ok());
    }

    #[test]
    fn buffer_spanning_unregistered_page_fails() {
        let proc = test_process();
        spt::add_zero_lazily(&proc, 0x3000).unwrap();
        // Spans into 0x4000, which has no entry.
        assert!(validate_user_buffer(&proc, 0x3ff0, 32).is_err());
    }

    #[test]
    fn writable_check_rejects_readonly_file_page() {
        let proc = test_process();
        let fs = crate::fs::ramfs::RamFs::new();
        let root = fs.root();
        let node = root.create("f", crate::fs::Permissions::default()).unwrap();
        let file = Arc::new(crate::fs::file::File::new(node, crate::fs::file::OpenFlags::read_only()));
        spt::add_file_lazily(&proc, 0x5000, file, 0, 10, false).unwrap();
        assert!(validate_writable_buffer(&proc, 0x5000, 4).is_err());
    }
}
