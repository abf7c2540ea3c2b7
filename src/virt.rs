//! Virtual-page allocator: a bitmap of VPN reservations plus the `vpn_pointer` allocation hint.
//!
//! Mirrors [`PhysicalStore`](crate::phys::PhysicalStore)'s frame bitmap but tracks virtual pages
//! independently of physical layout: a VPN's reservation here says nothing about which, or how
//! many, physical frames back it.

use crate::bitmap::Bitmap;

/// Virtual address space occupancy tracker.
pub struct VirtualAllocator {
    bitmap: Bitmap,
    vpn_pointer: u64,
}

impl VirtualAllocator {
    /// Creates an allocator with room for `vpn_count` virtual pages, all free, hint at 0.
    pub fn new(vpn_count: usize) -> VirtualAllocator {
        VirtualAllocator {
            bitmap: Bitmap::new(vpn_count),
            vpn_pointer: 0,
        }
    }

    /// Reserves `count` contiguous VPNs starting at or after the current hint, advancing nothing
    /// on success (the hint only ever moves backward, on `free`). Returns the first VPN of the
    /// run.
    pub fn reserve(&mut self, count: usize) -> Option<u64> {
        self.bitmap
            .allocate_run(self.vpn_pointer as usize, count)
            .map(|p| p as u64)
    }

    /// Returns `true` if every VPN in `[start, start + count)` is currently reserved.
    pub fn is_reserved_range(&self, start: u64, count: usize) -> bool {
        let start = start as usize;
        if start + count > self.bitmap.len() {
            return false;
        }
        (start..start + count).all(|vpn| !self.bitmap.is_free(vpn))
    }

    /// Clears `count` VPNs starting at `start` and rewinds the allocation hint if `start` is
    /// earlier than the current hint.
    pub fn release(&mut self, start: u64, count: usize) {
        for vpn in start..start + count as u64 {
            self.bitmap.clear(vpn as usize);
        }
        self.vpn_pointer = self.vpn_pointer.min(start);
    }

    pub fn vpn_count(&self) -> usize {
        self.bitmap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_then_release_rewinds_hint() {
        let mut va = VirtualAllocator::new(64);
        let a = va.reserve(4).unwrap();
        assert_eq!(a, 0);
        let b = va.reserve(4).unwrap();
        assert_eq!(b, 4);

        va.release(0, 4);
        let c = va.reserve(4).unwrap();
        assert_eq!(c, 0, "freeing the earliest run should rewind the hint");
    }

    #[test]
    fn is_reserved_range_detects_partial_reservation() {
        let mut va = VirtualAllocator::new(16);
        va.reserve(1);
        assert!(va.is_reserved_range(0, 1));
        assert!(!va.is_reserved_range(0, 2));
    }
}
