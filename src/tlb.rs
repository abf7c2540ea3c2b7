//! Software translation lookaside buffer.
//!
//! A fixed-size, fully associative cache of `(vpn, ppn)` pairs with a deliberately simple
//! replacement policy: fill the first empty slot, and once full, always evict slot 0. Tests must
//! not depend on anything stronger than "a hit is returned when present, a miss increments the
//! counter, and invalidation removes an entry"; a better policy (LRU, CLOCK) is out of scope.

const EMPTY: i64 = -1;

#[derive(Debug, Clone, Copy)]
struct Entry {
    vpn: i64,
    ppn: i64,
}

impl Entry {
    const fn empty() -> Entry {
        Entry {
            vpn: EMPTY,
            ppn: EMPTY,
        }
    }
}

/// Fixed-capacity software TLB plus hit/miss accounting (`translations`, `tlb_misses`).
#[derive(Debug, Clone)]
pub struct Tlb {
    entries: Vec<Entry>,
    translations: u64,
    misses: u64,
}

impl Tlb {
    /// Creates an empty TLB with the given capacity.
    pub fn new(capacity: usize) -> Tlb {
        Tlb {
            entries: vec![Entry::empty(); capacity],
            translations: 0,
            misses: 0,
        }
    }

    /// Looks up `vpn`, counting the call as a translation and, on a miss, incrementing the miss
    /// counter. Does *not* walk the page table itself; callers fall back to that on `None`.
    pub fn lookup(&mut self, vpn: i64) -> Option<i64> {
        self.translations += 1;
        for e in &self.entries {
            if e.vpn == vpn && e.ppn != EMPTY {
                return Some(e.ppn);
            }
        }
        self.misses += 1;
        None
    }

    /// Inserts `(vpn, ppn)` into the first empty slot, or overwrites slot 0 if the TLB is full.
    pub fn insert(&mut self, vpn: i64, ppn: i64) {
        if let Some(slot) = self.entries.iter_mut().find(|e| e.vpn == EMPTY) {
            slot.vpn = vpn;
            slot.ppn = ppn;
            return;
        }
        self.entries[0] = Entry { vpn, ppn };
    }

    /// Clears the first entry matching `vpn`, if any.
    pub fn invalidate(&mut self, vpn: i64) {
        if let Some(slot) = self.entries.iter_mut().find(|e| e.vpn == vpn) {
            slot.vpn = EMPTY;
        }
    }

    /// Total number of [`Tlb::lookup`] calls made so far.
    pub fn translations(&self) -> u64 {
        self.translations
    }

    /// Total number of misses recorded so far.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}
