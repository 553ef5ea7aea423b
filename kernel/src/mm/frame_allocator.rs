//! Stand-in for the raw physical page allocator (`palloc`).
//!
//! The real allocator is out of scope: this subsystem only needs a
//! source of fixed-size, zeroed frames with a bounded capacity, so that
//! exhaustion is reachable and drives the frame table into eviction.
//! [`FramePool`] provides exactly that, backed by the host/kernel heap
//! rather than real physical memory.

use core::sync::atomic::{AtomicUsize, Ordering};

use super::{zeroed_frame, FrameBuf};

/// Fixed-capacity pool of user frames.
pub struct FramePool {
    capacity: usize,
    used: AtomicUsize,
}

impl FramePool {
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: AtomicUsize::new(0),
        }
    }

    /// Try to obtain one zeroed frame. Returns `None` when the pool is at
    /// capacity; the caller (frame table) must evict and retry.
    pub fn try_alloc(&self) -> Option<FrameBuf> {
        loop {
            let current = self.used.load(Ordering::Relaxed);
            if current >= self.capacity {
                return None;
            }
            if self
                .used
                .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(zeroed_frame());
            }
        }
    }

    /// Release one frame's worth of capacity back to the pool. The frame
    /// buffer itself is simply dropped by the caller.
    pub fn free(&self) {
        self.used.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_at_capacity() {
        let pool = FramePool::new(2);
        let a = pool.try_alloc();
        let b = pool.try_alloc();
        assert!(a.is_some() && b.is_some());
        assert!(pool.try_alloc().is_none());
        pool.free();
        assert!(pool.try_alloc().is_some());
    }
}
