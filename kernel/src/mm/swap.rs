//! Swap store: a bitmap of fixed-size slots on a block device.
//!
//! Grounded on the original implementation's `vm/swap.c`: each slot is
//! `PAGE_SIZE / block_size` contiguous sectors (8 sectors of 512 B for a
//! 4096 B page), read and written in sector order. There is no on-disk
//! header; the in-memory bitmap is authoritative and is lost on restart.

use alloc::{boxed::Box, vec, vec::Vec};

use spin::Mutex;

use crate::fs::blockdev::BlockDevice;

use super::PAGE_SIZE;

const SECTOR_SIZE: usize = 512;
const SECTORS_PER_PAGE: usize = PAGE_SIZE / SECTOR_SIZE;

/// Index of a slot in the swap store. There is no sentinel value here --
/// "not swapped" is represented by `Option<SwapSlot>` at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SwapSlot(pub u32);

struct SwapStoreInner {
    device: Box<dyn BlockDevice>,
    /// One bit per slot; `Vec<u8>` bitmap, LSB-first within each byte.
    bitmap: Vec<u8>,
    slot_count: usize,
}

impl SwapStoreInner {
    fn is_used(&self, slot: SwapSlot) -> bool {
        let idx = slot.0 as usize;
        (self.bitmap[idx / 8] & (1 << (idx % 8))) != 0
    }

    fn set_used(&mut self, slot: SwapSlot, used: bool) {
        let idx = slot.0 as usize;
        if used {
            self.bitmap[idx / 8] |= 1 << (idx % 8);
        } else {
            self.bitmap[idx / 8] &= !(1 << (idx % 8));
        }
    }

    fn find_free(&self) -> Option<SwapSlot> {
        (0..self.slot_count)
            .map(|i| SwapSlot(i as u32))
            .find(|&slot| !self.is_used(slot))
    }
}

/// Global swap store. `None` until [`init`] binds a backing device.
pub struct SwapStore {
    inner: Mutex<Option<SwapStoreInner>>,
}

impl SwapStore {
    const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Bind to a block device. Fails if its size is not a whole number of
    /// `SECTORS_PER_PAGE`-sector slots.
    pub fn bind(&self, device: Box<dyn BlockDevice>) -> Result<(), &'static str> {
        if device.block_size() != SECTOR_SIZE {
            return Err("swap device sector size must be 512 bytes");
        }
        let sectors = device.block_count() as usize;
        let slot_count = sectors / SECTORS_PER_PAGE;
        if slot_count == 0 {
            return Err("swap device too small for a single slot");
        }
        let bitmap = vec![0u8; slot_count.div_ceil(8)];
        *self.inner.lock() = Some(SwapStoreInner {
            device,
            bitmap,
            slot_count,
        });
        Ok(())
    }

    /// Write a page out to a freshly allocated slot. Panics if the swap
    /// device is exhausted, matching the original implementation's
    /// `PANIC ("swap_write: swap full")`.
    pub fn swap_out(&self, kpage: &[u8; PAGE_SIZE]) -> SwapSlot {
        let mut guard = self.inner.lock();
        let store = guard.as_mut().expect("swap store not initialized");
        let slot = store.find_free().expect("swap space exhausted");
        store.set_used(slot, true);
        for sector in 0..SECTORS_PER_PAGE {
            let start = slot.0 as u64 * SECTORS_PER_PAGE as u64 + sector as u64;
            let chunk = &kpage[sector * SECTOR_SIZE..(sector + 1) * SECTOR_SIZE];
            store
                .device
                .write_blocks(start, chunk)
                .expect("swap device write failed");
        }
        slot
    }

    /// Read a page back in and free the slot. The slot is invalid for the
    /// caller after this returns.
    pub fn swap_in(&self, slot: SwapSlot, kpage: &mut [u8; PAGE_SIZE]) {
        let mut guard = self.inner.lock();
        let store = guard.as_mut().expect("swap store not initialized");
        debug_assert!(store.is_used(slot), "swap_in on a free slot");
        for sector in 0..SECTORS_PER_PAGE {
            let start = slot.0 as u64 * SECTORS_PER_PAGE as u64 + sector as u64;
            let chunk = &mut kpage[sector * SECTOR_SIZE..(sector + 1) * SECTOR_SIZE];
            store
                .device
                .read_blocks(start, chunk)
                .expect("swap device read failed");
        }
        store.set_used(slot, false);
    }

    /// Free a slot without reading it back. Used when tearing down a
    /// process whose pages are still swapped out.
    pub fn free_slot(&self, slot: SwapSlot) {
        let mut guard = self.inner.lock();
        let store = guard.as_mut().expect("swap store not initialized");
        store.set_used(slot, false);
    }

    /// Whether a slot is currently in use. Assertions only.
    pub fn test(&self, slot: SwapSlot) -> bool {
        let guard = self.inner.lock();
        guard.as_ref().expect("swap store not initialized").is_used(slot)
    }

    pub fn slot_count(&self) -> usize {
        let guard = self.inner.lock();
        guard.as_ref().map_or(0, |s| s.slot_count)
    }
}

pub static SWAP_STORE: SwapStore = SwapStore::new();

/// Initialize the swap store with a RAM-backed block device sized for the
/// kernel's configured swap capacity.
pub fn init() {
    use alloc::string::String;

    use crate::fs::blockdev::RamBlockDevice;

    const SWAP_SLOTS: u64 = 64;
    let device = RamBlockDevice::new(
        String::from("swap0"),
        SECTOR_SIZE,
        SWAP_SLOTS * SECTORS_PER_PAGE as u64,
    );
    SWAP_STORE
        .bind(Box::new(device))
        .expect("failed to initialize swap store");
    crate::println!("[SWAP] {} slots available", SWAP_STORE.slot_count());
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::*;
    use crate::fs::blockdev::RamBlockDevice;

    fn fresh_store(slots: u64) -> SwapStore {
        let store = SwapStore::new();
        let device = RamBlockDevice::new(
            String::from("test-swap"),
            SECTOR_SIZE,
            slots * SECTORS_PER_PAGE as u64,
        );
        store.bind(Box::new(device)).unwrap();
        store
    }

    #[test]
    fn round_trip_restores_bytes_and_frees_slot() {
        let store = fresh_store(4);
        let mut page = [0u8; PAGE_SIZE];
        for (i, b) in page.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let slot = store.swap_out(&page);
        assert!(store.test(slot));
        let mut back = [0u8; PAGE_SIZE];
        store.swap_in(slot, &mut back);
        assert_eq!(page, back);
        assert!(!store.test(slot));
    }

    #[test]
    fn free_slot_does_not_read() {
        let store = fresh_store(2);
        let page = [7u8; PAGE_SIZE];
        let slot = store.swap_out(&page);
        store.free_slot(slot);
        assert!(!store.test(slot));
    }

    #[test]
    #[should_panic(expected = "swap space exhausted")]
    fn exhaustion_panics() {
        let store = fresh_store(1);
        let page = [0u8; PAGE_SIZE];
        let _ = store.swap_out(&page);
        let _ = store.swap_out(&page);
    }
}
