//! Supplemental page table: per-process map from a user virtual page to
//! what that page should contain.
//!
//! Grounded on the original implementation's `vm/page.c`/`vm/page.h`:
//! a tagged `spte` carrying ZERO, FILE, or MMAP payload, looked up by
//! page-aligned address. The two back-pointer cycles the original has
//! (spte <-> fte, mmap region <-> its pages) are replaced here with
//! integer handles (`FrameId`, `upage` lists) per the arena redesign.

use alloc::{sync::Arc, vec::Vec};

use spin::Mutex;

use super::{frame_table, page_down, page_up, swap, VirtAddr, PAGE_SIZE};
use crate::{
    error::KernelError,
    fs::file::File,
    process::pcb::Process,
};

/// What kind of source backs a page, and that source's parameters.
///
/// File offsets are stored as a page count (`offset_pages`) rather than
/// a raw byte offset. The original implementation packed this into 16
/// bits, bounding representable files to ~256 MB; this implementation
/// widens it to `u32` (16 TB) since nothing else in the design depends
/// on the narrower width.
#[derive(Clone)]
pub enum PageKind {
    Zero,
    File {
        file: Arc<File>,
        offset_pages: u32,
        read_bytes: u16,
        writable: bool,
    },
    Mmap {
        mapid: u32,
        file: Arc<File>,
        offset_pages: u32,
        read_bytes: u16,
    },
}

impl PageKind {
    pub(crate) fn is_writable(&self) -> bool {
        match self {
            PageKind::Zero | PageKind::Mmap { .. } => true,
            PageKind::File { writable, .. } => *writable,
        }
    }
}

/// One descriptor per user virtual page ever registered.
#[derive(Clone)]
pub struct SptEntry {
    pub upage: VirtAddr,
    pub kind: PageKind,
    pub frame: Option<frame_table::FrameId>,
    pub swap_slot: Option<swap::SwapSlot>,
}

/// A memory-mapped file region: a mapid, its reopened file handle, and
/// the ordered list of pages it covers.
pub struct MmapRegion {
    pub mapid: u32,
    pub file: Arc<File>,
    pub pages: Vec<VirtAddr>,
}

/// Per-process supplemental page table.
pub struct Spt {
    entries: Mutex<alloc::collections::BTreeMap<VirtAddr, SptEntry>>,
}

impl Spt {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(alloc::collections::BTreeMap::new()),
        }
    }

    pub fn get(&self, uaddr: VirtAddr) -> Option<SptEntry> {
        self.entries.lock().get(&page_down(uaddr)).cloned()
    }

    /// Insert a new entry, failing if `upage` is already registered.
    fn insert_new(&self, entry: SptEntry) -> Result<(), KernelError> {
        let mut map = self.entries.lock();
        if map.contains_key(&entry.upage) {
            return Err(KernelError::AlreadyExists {
                resource: "spt entry",
                id: entry.upage as u64,
            });
        }
        map.insert(entry.upage, entry);
        Ok(())
    }

    fn is_registered(&self, upage: VirtAddr) -> bool {
        self.entries.lock().contains_key(&upage)
    }

    fn remove(&self, upage: VirtAddr) -> Option<SptEntry> {
        self.entries.lock().remove(&upage)
    }

    pub(super) fn set_frame(&self, upage: VirtAddr, frame: Option<frame_table::FrameId>) {
        if let Some(e) = self.entries.lock().get_mut(&upage) {
            e.frame = frame;
        }
    }

    pub(super) fn set_swap_slot(&self, upage: VirtAddr, slot: Option<swap::SwapSlot>) {
        if let Some(e) = self.entries.lock().get_mut(&upage) {
            e.swap_slot = slot;
        }
    }

    pub fn drain(&self) -> Vec<SptEntry> {
        self.entries.lock().values().cloned().collect()
    }
}

impl Default for Spt {
    fn default() -> Self {
        Self::new()
    }
}

/// Register a ZERO page without loading it.
pub fn add_zero_lazily(proc: &Process, upage: VirtAddr) -> Result<(), KernelError> {
    debug_assert_eq!(upage, page_down(upage));
    proc.spt.insert_new(SptEntry {
        upage,
        kind: PageKind::Zero,
        frame: None,
        swap_slot: None,
    })
}

/// Register and immediately load a ZERO page (used for the initial
/// stack page).
pub fn add_zero(proc: &Process, upage: VirtAddr) -> Result<(), KernelError> {
    add_zero_lazily(proc, upage)?;
    if !load(proc, upage) {
        return Err(KernelError::OutOfMemory);
    }
    Ok(())
}

/// Register a FILE-backed page, lazily.
pub fn add_file_lazily(
    proc: &Process,
    upage: VirtAddr,
    file: Arc<File>,
    offset_pages: u32,
    read_bytes: u16,
    writable: bool,
) -> Result<(), KernelError> {
    debug_assert_eq!(upage, page_down(upage));
    debug_assert!(read_bytes as usize <= PAGE_SIZE);
    proc.spt.insert_new(SptEntry {
        upage,
        kind: PageKind::File {
            file,
            offset_pages,
            read_bytes,
            writable,
        },
        frame: None,
        swap_slot: None,
    })
}

/// Sentinel mapid returned on mmap failure.
pub const MAP_FAILED: u32 = u32::MAX;

/// Register an mmap region covering `[upage_base, upage_base + length)`.
/// Fails atomically if any page in the range is already registered.
pub fn add_mmap_lazily(
    proc: &Process,
    upage_base: VirtAddr,
    file: Arc<File>,
    length: usize,
) -> Result<u32, KernelError> {
    debug_assert_eq!(upage_base, page_down(upage_base));
    if length == 0 {
        return Err(KernelError::InvalidArgument);
    }

    let page_count = page_up(length) / PAGE_SIZE;
    for i in 0..page_count {
        if proc.spt.is_registered(upage_base + i * PAGE_SIZE) {
            return Err(KernelError::AlreadyExists {
                resource: "spt entry",
                id: (upage_base + i * PAGE_SIZE) as u64,
            });
        }
    }

    let mapid = proc.alloc_mapid();
    let mut pages = Vec::with_capacity(page_count);
    for i in 0..page_count {
        let upage = upage_base + i * PAGE_SIZE;
        let remaining = length - i * PAGE_SIZE;
        let read_bytes = core::cmp::min(remaining, PAGE_SIZE) as u16;
        let entry = SptEntry {
            upage,
            kind: PageKind::Mmap {
                mapid,
                file: file.clone(),
                offset_pages: i as u32,
                read_bytes,
            },
            frame: None,
            swap_slot: None,
        };
        if let Err(e) = proc.spt.insert_new(entry) {
            // Undo every page registered so far in this region.
            for done in &pages {
                proc.spt.remove(*done);
            }
            return Err(e);
        }
        pages.push(upage);
    }

    proc.mmaps.lock().push(MmapRegion {
        mapid,
        file,
        pages,
    });
    Ok(mapid)
}

/// Resolve a faulting address: load the page it belongs to, if any SPT
/// entry describes it. Returns `false` if there is no entry at all
/// (the caller then considers stack growth).
pub fn load(proc: &Process, uaddr: VirtAddr) -> bool {
    let upage = page_down(uaddr);
    let entry = match proc.spt.get(upage) {
        Some(e) => e,
        None => return false,
    };

    if let Some(slot) = entry.swap_slot {
        let frame = frame_table::alloc(proc, upage, entry.kind.is_writable());
        frame_table::swap_in_frame(frame, slot);
        proc.spt.set_swap_slot(upage, None);
        proc.spt.set_frame(upage, Some(frame));
        frame_table::unpin(frame);
        return true;
    }

    if entry.frame.is_some() {
        // Already resident (e.g. re-fault racing with another thread).
        return true;
    }

    let frame = frame_table::alloc(proc, upage, entry.kind.is_writable());
    match &entry.kind {
        PageKind::Zero => {
            // Pool already hands out zeroed frames.
        }
        PageKind::File {
            file,
            offset_pages,
            read_bytes,
            ..
        }
        | PageKind::Mmap {
            file,
            offset_pages,
            read_bytes,
            ..
        } => {
            frame_table::load_from_file(
                frame,
                file,
                *offset_pages as usize * PAGE_SIZE,
                *read_bytes as usize,
            );
        }
    }
    proc.spt.set_frame(upage, Some(frame));
    frame_table::unpin(frame);
    true
}

/// Tear down an mmap region: write back dirty pages, release every SPT
/// entry, and forget the region.
pub fn munmap(proc: &Process, mapid: u32) -> Result<(), KernelError> {
    let region = {
        let mut regions = proc.mmaps.lock();
        let idx = regions
            .iter()
            .position(|r| r.mapid == mapid)
            .ok_or(KernelError::NotFound {
                resource: "mmap region",
                id: mapid as u64,
            })?;
        regions.remove(idx)
    };

    for upage in &region.pages {
        destroy_entry(proc, *upage);
    }
    Ok(())
}

/// Free the frame or swap slot (if any) backing one SPT entry and drop
/// the descriptor. Used by `munmap` and process teardown.
pub fn destroy_entry(proc: &Process, upage: VirtAddr) {
    let entry = match proc.spt.remove(upage) {
        Some(e) => e,
        None => return,
    };
    if let Some(frame) = entry.frame {
        frame_table::free(proc, frame, &entry.kind);
    } else if let Some(slot) = entry.swap_slot {
        swap::SWAP_STORE.free_slot(slot);
    }
}

/// Tear down every SPT entry owned by a process (process exit).
pub fn destroy_all(proc: &Process) {
    for entry in proc.spt.drain() {
        destroy_entry(proc, entry.upage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::pcb::{Process, ProcessId};

    fn test_process() -> Process {
        Process::new(ProcessId(1), None, alloc::string::String::from("test"))
    }

    #[test]
    fn zero_page_loads_as_zero() {
        let proc = test_process();
        add_zero_lazily(&proc, 0x1000).unwrap();
        assert!(load(&proc, 0x1000));
        let entry = proc.spt.get(0x1000).unwrap();
        assert!(entry.frame.is_some());
    }

    #[test]
    fn duplicate_registration_fails() {
        let proc = test_process();
        add_zero_lazily(&proc, 0x1000).unwrap();
        assert!(add_zero_lazily(&proc, 0x1000).is_err());
    }

    #[test]
    fn get_pages_down_to_alignment() {
        let proc = test_process();
        add_zero_lazily(&proc, 0x1000).unwrap();
        assert!(proc.spt.get(0x1fff).is_some());
    }
}
