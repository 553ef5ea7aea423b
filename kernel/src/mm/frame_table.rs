//! Frame table: the finite pool of physical user frames, second-chance
//! eviction, and pin/unpin.
//!
//! Grounded on the original implementation's `vm/frame.c`/`vm/frame.h`:
//! a FIFO frame list rotated into a circular clock by pushing scanned
//! entries to the back, `frame_pin_addr`/`unpin_addr` and the buffer/
//! string variants for syscall buffer pinning, and `evict()`'s dirty/
//! accessed dispatch. The intrusive list and the fte<->spte back-pointer
//! are replaced by an arena keyed on an opaque [`FrameId`] handle.

use alloc::{collections::BTreeMap, collections::VecDeque, sync::Arc};

use super::{
    address_space::AddressSpace, frame_allocator::FramePool, page_down, spt::PageKind, swap,
    FrameBuf, VirtAddr, PAGE_SIZE,
};
use crate::{error::KernelError, fs::file::File, process, process::pcb::{Process, ProcessId}, sync::FtLock};

/// Opaque handle into the global frame arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameId(u64);

struct FrameEntry {
    owner: ProcessId,
    upage: VirtAddr,
    data: FrameBuf,
    pinned: bool,
}

struct FrameTableState {
    arena: BTreeMap<FrameId, FrameEntry>,
    /// FIFO on insertion; scanning rotates entries to the back, turning
    /// this into a clock hand that sweeps once per full rotation.
    clock: VecDeque<FrameId>,
    next_id: u64,
}

impl FrameTableState {
    const fn new() -> Self {
        Self {
            arena: BTreeMap::new(),
            clock: VecDeque::new(),
            next_id: 0,
        }
    }
}

/// Number of user frames this kernel's simulated physical pool holds.
/// Deliberately small so tests can exercise eviction without allocating
/// hundreds of megabytes of host memory.
const NUM_USER_FRAMES: usize = 32;

static POOL: FramePool = FramePool::new(NUM_USER_FRAMES);
static FRAME_TABLE: FtLock<FrameTableState> = FtLock::new(FrameTableState::new());

pub fn init() {
    crate::println!("[FRAME] {} user frames available", POOL.capacity());
}

fn write_back_file(file: &Arc<File>, offset: usize, data: &[u8]) {
    let _guard = crate::fs::FS_LOCK.lock();
    file.write_at(offset, data).expect("writeback to file failed");
}

/// Allocate a frame for `upage` in `proc`, evicting as many times as
/// necessary. Returns a pinned frame; the caller unpins once any load
/// I/O is complete.
pub fn alloc(proc: &Process, upage: VirtAddr, writable: bool) -> FrameId {
    loop {
        if let Some(data) = POOL.try_alloc() {
            let id = {
                let mut state = FRAME_TABLE.lock();
                let id = FrameId(state.next_id);
                state.next_id += 1;
                state.arena.insert(
                    id,
                    FrameEntry {
                        owner: proc.pid,
                        upage,
                        data,
                        pinned: true,
                    },
                );
                state.clock.push_back(id);
                id
            };
            proc.address_space.map(upage, writable);
            return id;
        }
        let victim = evict();
        finalize_victim(victim);
    }
}

/// Run the second-chance scan and return the chosen victim's id. Does
/// not remove it from the arena -- `finalize_victim` does that, outside
/// `ft_lock`, since writeback needs `fs_lock`.
fn evict() -> FrameId {
    let mut rotations_without_progress = 0usize;
    loop {
        let id = {
            let mut state = FRAME_TABLE.lock();
            match state.clock.pop_front() {
                Some(id) => id,
                None => panic!("eviction scan found no frames at all"),
            }
        };

        let (owner, upage, pinned) = {
            let state = FRAME_TABLE.lock();
            let e = state.arena.get(&id).expect("clock entry missing from arena");
            (e.owner, e.upage, e.pinned)
        };

        if pinned {
            FRAME_TABLE.lock().clock.push_back(id);
            rotations_without_progress += 1;
            assert!(
                rotations_without_progress < NUM_USER_FRAMES * 64,
                "eviction made no progress after many rotations; a pin was never released"
            );
            continue;
        }

        let proc = process::table::get_process(owner).expect("evicting frame of dead process");

        if !proc.address_space.is_accessed(upage) {
            return id;
        }

        if proc.address_space.is_dirty(upage) {
            if let Some(entry) = proc.spt.get(upage) {
                match &entry.kind {
                    PageKind::File {
                        file,
                        offset_pages,
                        read_bytes,
                        writable,
                    } if *writable => {
                        let data = {
                            let state = FRAME_TABLE.lock();
                            state.arena.get(&id).unwrap().data.clone()
                        };
                        write_back_file(
                            file,
                            *offset_pages as usize * PAGE_SIZE,
                            &data[..*read_bytes as usize],
                        );
                    }
                    PageKind::Mmap {
                        file,
                        offset_pages,
                        read_bytes,
                        ..
                    } => {
                        let data = {
                            let state = FRAME_TABLE.lock();
                            state.arena.get(&id).unwrap().data.clone()
                        };
                        write_back_file(
                            file,
                            *offset_pages as usize * PAGE_SIZE,
                            &data[..*read_bytes as usize],
                        );
                    }
                    _ => {}
                }
            }
            proc.address_space.clear_dirty(upage);
        } else {
            proc.address_space.clear_accessed(upage);
        }

        FRAME_TABLE.lock().clock.push_back(id);
        rotations_without_progress += 1;
        assert!(
            rotations_without_progress < NUM_USER_FRAMES * 64,
            "eviction scan exceeded its rotation bound"
        );
    }
}

/// Remove the chosen victim from the arena and route it to swap or the
/// file, per its page kind, then unmap it and release the pool slot.
fn finalize_victim(id: FrameId) {
    let (owner, upage, data) = {
        let mut state = FRAME_TABLE.lock();
        let entry = state.arena.remove(&id).expect("victim missing from arena");
        (entry.owner, entry.upage, entry.data)
    };
    let proc = process::table::get_process(owner).expect("victim process missing");
    let kind = proc
        .spt
        .get(upage)
        .map(|e| e.kind)
        .expect("victim spt entry missing");

    match &kind {
        PageKind::Zero => {
            let slot = swap::SWAP_STORE.swap_out(&data);
            proc.spt.set_swap_slot(upage, Some(slot));
        }
        PageKind::File {
            writable, ..
        } => {
            if *writable && proc.address_space.is_dirty(upage) {
                let slot = swap::SWAP_STORE.swap_out(&data);
                proc.spt.set_swap_slot(upage, Some(slot));
            }
            // Clean (or non-writable) FILE pages are discardable: the
            // next fault re-reads them from the backing file.
        }
        PageKind::Mmap {
            file,
            offset_pages,
            read_bytes,
            ..
        } => {
            if proc.address_space.is_dirty(upage) {
                write_back_file(
                    file,
                    *offset_pages as usize * PAGE_SIZE,
                    &data[..*read_bytes as usize],
                );
            }
        }
    }

    proc.spt.set_frame(upage, None);
    proc.address_space.unmap(upage);
    POOL.free();
}

/// Read an evicted page back in from its swap slot.
pub fn swap_in_frame(id: FrameId, slot: swap::SwapSlot) {
    let mut state = FRAME_TABLE.lock();
    let entry = state.arena.get_mut(&id).expect("frame missing for swap-in");
    swap::SWAP_STORE.swap_in(slot, &mut entry.data);
}

/// Populate a freshly allocated frame from a file: zero the buffer,
/// then copy in `read_bytes` starting at `offset`. Zeroing first and
/// copying after matches the original's byte-for-byte order.
pub fn load_from_file(id: FrameId, file: &Arc<File>, offset: usize, read_bytes: usize) {
    let mut buf = [0u8; PAGE_SIZE];
    if read_bytes > 0 {
        let _guard = crate::fs::FS_LOCK.lock();
        let _ = file.read_at(offset, &mut buf[..read_bytes]);
    }
    let mut state = FRAME_TABLE.lock();
    let entry = state.arena.get_mut(&id).expect("frame missing for file load");
    entry.data.copy_from_slice(&buf);
}

/// Explicitly free a resident frame (munmap, process teardown). Writes
/// back dirty FILE/MMAP pages; ZERO pages are simply discarded -- the
/// caller is responsible for swap cleanup via the SPT entry's slot.
pub fn free(proc: &Process, id: FrameId, kind: &PageKind) {
    let (upage, data) = {
        let mut state = FRAME_TABLE.lock();
        let entry = state.arena.remove(&id).expect("free of unknown frame");
        state.clock.retain(|&x| x != id);
        (entry.upage, entry.data)
    };

    let dirty = proc.address_space.is_dirty(upage);
    match kind {
        PageKind::File {
            file,
            offset_pages,
            read_bytes,
            writable,
        } if *writable && dirty => {
            write_back_file(file, *offset_pages as usize * PAGE_SIZE, &data[..*read_bytes as usize]);
        }
        PageKind::Mmap {
            file,
            offset_pages,
            read_bytes,
            ..
        } if dirty => {
            write_back_file(file, *offset_pages as usize * PAGE_SIZE, &data[..*read_bytes as usize]);
        }
        _ => {}
    }

    proc.address_space.unmap(upage);
    POOL.free();
}

fn set_pinned(id: FrameId, pinned: bool) {
    let mut state = FRAME_TABLE.lock();
    if let Some(e) = state.arena.get_mut(&id) {
        e.pinned = pinned;
    }
}

pub fn unpin(id: FrameId) {
    set_pinned(id, false);
}

/// Fault the page containing `uaddr` in if needed, then pin its frame.
pub fn pin_addr(proc: &Process, uaddr: VirtAddr) -> Result<(), KernelError> {
    let upage = page_down(uaddr);
    if proc.spt.get(upage).is_none() {
        return Err(KernelError::BadUserPointer { addr: uaddr });
    }
    if !super::spt::load(proc, upage) {
        return Err(KernelError::OutOfMemory);
    }
    let frame = proc
        .spt
        .get(upage)
        .and_then(|e| e.frame)
        .expect("loaded page has no frame");
    set_pinned(frame, true);
    Ok(())
}

pub fn unpin_addr(proc: &Process, uaddr: VirtAddr) {
    let upage = page_down(uaddr);
    if let Some(frame) = proc.spt.get(upage).and_then(|e| e.frame) {
        set_pinned(frame, false);
    }
}

/// Pin every page a `len`-byte buffer starting at `uaddr` spans.
pub fn pin_buffer(proc: &Process, uaddr: VirtAddr, len: usize) -> Result<(), KernelError> {
    if len == 0 {
        return Ok(());
    }
    let first = page_down(uaddr);
    let last = page_down(uaddr + len - 1);
    let mut pinned_so_far = alloc::vec::Vec::new();
    let mut page = first;
    loop {
        if let Err(e) = pin_addr(proc, page) {
            for p in pinned_so_far {
                unpin_addr(proc, p);
            }
            return Err(e);
        }
        pinned_so_far.push(page);
        if page == last {
            break;
        }
        page += PAGE_SIZE;
    }
    Ok(())
}

pub fn unpin_buffer(proc: &Process, uaddr: VirtAddr, len: usize) {
    if len == 0 {
        return;
    }
    let first = page_down(uaddr);
    let last = page_down(uaddr + len - 1);
    let mut page = first;
    loop {
        unpin_addr(proc, page);
        if page == last {
            break;
        }
        page += PAGE_SIZE;
    }
}

/// Hard cap on how many bytes `pin_string` will scan looking for a NUL,
/// matching `PAGE_SIZE` -- an unterminated user string must not pin an
/// unbounded number of pages.
const MAX_STRING_SCAN: usize = PAGE_SIZE;

/// Pin every page spanned by the NUL-terminated string at `uaddr`.
/// Returns the string length excluding the terminator.
pub fn pin_string(proc: &Process, uaddr: VirtAddr) -> Result<usize, KernelError> {
    let mut pinned_pages = alloc::vec::Vec::new();
    let mut offset = 0usize;
    loop {
        let addr = uaddr + offset;
        let page = page_down(addr);
        if pinned_pages.last() != Some(&page) {
            if let Err(e) = pin_addr(proc, page) {
                for p in pinned_pages {
                    unpin_addr(proc, p);
                }
                return Err(e);
            }
            pinned_pages.push(page);
        }

        let mut byte = [0u8; 1];
        copy_from_user(proc, addr, &mut byte)?;
        if byte[0] == 0 {
            return Ok(offset);
        }

        offset += 1;
        if offset >= MAX_STRING_SCAN {
            for p in pinned_pages {
                unpin_addr(proc, p);
            }
            return Err(KernelError::InvalidArgument);
        }
    }
}

/// Copy bytes out of the (already pinned) user pages starting at `uaddr`.
pub fn copy_from_user(proc: &Process, uaddr: VirtAddr, dst: &mut [u8]) -> Result<(), KernelError> {
    copy_user(proc, uaddr, dst, false)
}

/// Copy bytes into the (already pinned) user pages starting at `uaddr`.
pub fn copy_to_user(proc: &Process, uaddr: VirtAddr, src: &[u8]) -> Result<(), KernelError> {
    let mut buf = alloc::vec![0u8; src.len()];
    buf.copy_from_slice(src);
    copy_user(proc, uaddr, &mut buf, true)
}

fn copy_user(proc: &Process, uaddr: VirtAddr, buf: &mut [u8], write: bool) -> Result<(), KernelError> {
    let mut done = 0usize;
    while done < buf.len() {
        let addr = uaddr + done;
        let upage = page_down(addr);
        let entry = proc
            .spt
            .get(upage)
            .ok_or(KernelError::BadUserPointer { addr })?;
        if write && !entry.kind.is_writable() {
            return Err(KernelError::PermissionDenied);
        }
        let frame = entry.frame.ok_or(KernelError::BadUserPointer { addr })?;
        let in_page_off = addr - upage;
        let chunk = core::cmp::min(PAGE_SIZE - in_page_off, buf.len() - done);

        {
            let mut state = FRAME_TABLE.lock();
            let fe = state.arena.get_mut(&frame).expect("frame missing for copy");
            if write {
                fe.data[in_page_off..in_page_off + chunk]
                    .copy_from_slice(&buf[done..done + chunk]);
            } else {
                buf[done..done + chunk]
                    .copy_from_slice(&fe.data[in_page_off..in_page_off + chunk]);
            }
        }
        proc.address_space.touch(upage, write);
        done += chunk;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::pcb::{Process, ProcessId};

    #[test]
    fn alloc_pins_frame_until_unpinned() {
        let proc = Process::new(ProcessId(1), None, alloc::string::String::from("t"));
        crate::mm::spt::add_zero_lazily(&proc, 0x1000).unwrap();
        let id = alloc(&proc, 0x1000, true);
        assert!(FRAME_TABLE.lock().arena.get(&id).unwrap().pinned);
        unpin(id);
        assert!(!FRAME_TABLE.lock().arena.get(&id).unwrap().pinned);
    }

    #[test]
    fn eviction_skips_pinned_frames() {
        let proc = Process::new(ProcessId(2), None, alloc::string::String::from("t"));
        // Fill the entire pool with pinned frames, then free one so
        // there's exactly one evictable candidate among many pinned ones.
        let mut ids = alloc::vec::Vec::new();
        for i in 0..NUM_USER_FRAMES {
            let upage = 0x1000 * (i as VirtAddr + 1);
            crate::mm::spt::add_zero_lazily(&proc, upage).unwrap();
            ids.push(alloc(&proc, upage, true));
        }
        // Unpin all but the first; allocate one more page, forcing eviction.
        for &id in &ids[1..] {
            unpin(id);
        }
        let upage = 0x1000 * (NUM_USER_FRAMES as VirtAddr + 1);
        crate::mm::spt::add_zero_lazily(&proc, upage).unwrap();
        let _new_id = alloc(&proc, upage, true);
        assert!(FRAME_TABLE.lock().arena.get(&ids[0]).is_some());
    }
}
