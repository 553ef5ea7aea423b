//! The page-directory/MMU contract, modeled as a trait.
//!
//! Real hardware page tables, TLB shootdown, and the access/dirty bits
//! they expose are out of scope for this subsystem -- they are an
//! external collaborator the core only needs through a narrow interface:
//! install/remove a mapping, and query/clear the accessed and dirty bits
//! the clock algorithm depends on. [`SimAddressSpace`] is a software
//! stand-in used both in tests and as the only implementation this crate
//! ships, since it has no real MMU driver underneath it.

use alloc::collections::BTreeMap;

use spin::Mutex;

use super::VirtAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pte {
    writable: bool,
    accessed: bool,
    dirty: bool,
}

/// What a process's page directory must expose to the memory subsystem.
pub trait AddressSpace: Send + Sync {
    fn map(&self, upage: VirtAddr, writable: bool);
    fn unmap(&self, upage: VirtAddr);
    fn is_mapped(&self, upage: VirtAddr) -> bool;
    fn is_accessed(&self, upage: VirtAddr) -> bool;
    fn clear_accessed(&self, upage: VirtAddr);
    fn is_dirty(&self, upage: VirtAddr) -> bool;
    fn clear_dirty(&self, upage: VirtAddr);
    /// Mark the page accessed and, if `write`, dirty. Called by the fault
    /// path and by syscall buffer writes that bypass a real MMU trap.
    fn touch(&self, upage: VirtAddr, write: bool);
    fn set_writable(&self, upage: VirtAddr, writable: bool);
}

/// Software simulation of a process's page directory.
pub struct SimAddressSpace {
    ptes: Mutex<BTreeMap<VirtAddr, Pte>>,
}

impl SimAddressSpace {
    pub const fn new() -> Self {
        Self {
            ptes: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for SimAddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace for SimAddressSpace {
    fn map(&self, upage: VirtAddr, writable: bool) {
        self.ptes.lock().insert(
            upage,
            Pte {
                writable,
                accessed: false,
                dirty: false,
            },
        );
    }

    fn unmap(&self, upage: VirtAddr) {
        self.ptes.lock().remove(&upage);
    }

    fn is_mapped(&self, upage: VirtAddr) -> bool {
        self.ptes.lock().contains_key(&upage)
    }

    fn is_accessed(&self, upage: VirtAddr) -> bool {
        self.ptes.lock().get(&upage).is_some_and(|p| p.accessed)
    }

    fn clear_accessed(&self, upage: VirtAddr) {
        if let Some(pte) = self.ptes.lock().get_mut(&upage) {
            pte.accessed = false;
        }
    }

    fn is_dirty(&self, upage: VirtAddr) -> bool {
        self.ptes.lock().get(&upage).is_some_and(|p| p.dirty)
    }

    fn clear_dirty(&self, upage: VirtAddr) {
        if let Some(pte) = self.ptes.lock().get_mut(&upage) {
            pte.dirty = false;
        }
    }

    fn touch(&self, upage: VirtAddr, write: bool) {
        if let Some(pte) = self.ptes.lock().get_mut(&upage) {
            pte.accessed = true;
            if write {
                pte.dirty = true;
            }
        }
    }

    fn set_writable(&self, upage: VirtAddr, writable: bool) {
        if let Some(pte) = self.ptes.lock().get_mut(&upage) {
            pte.writable = writable;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_touch_clear_round_trip() {
        let space = SimAddressSpace::new();
        space.map(0x1000, true);
        assert!(space.is_mapped(0x1000));
        assert!(!space.is_accessed(0x1000));
        space.touch(0x1000, true);
        assert!(space.is_accessed(0x1000));
        assert!(space.is_dirty(0x1000));
        space.clear_accessed(0x1000);
        space.clear_dirty(0x1000);
        assert!(!space.is_accessed(0x1000));
        assert!(!space.is_dirty(0x1000));
        space.unmap(0x1000);
        assert!(!space.is_mapped(0x1000));
    }
}
