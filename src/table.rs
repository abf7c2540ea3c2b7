//! Multi-level page-table walk: translation, lazy mapping, and unmapping.
//!
//! The directory always lives at physical page 0. Every other table is allocated lazily the
//! first time a walk needs to pass through it. A table's structure does not distinguish "points
//! to another table" from "points to a data page", level alone determines the interpretation; a
//! freshly mapped data page therefore starts out filled with the same `-1` sentinel pattern a
//! freshly mapped table does, until the caller writes real bytes into it.

use crate::addr::extract;
use crate::error::VmError;
use crate::geometry::Geometry;
use crate::phys::{PhysicalStore, EMPTY_PTE};
use crate::tlb::Tlb;

/// Physical page the directory is rooted at. Reserved for the lifetime of the `Vm`.
pub const DIRECTORY_PPN: u64 = 0;

/// Walks down to the leaf for `vpn` and returns the data PPN.
///
/// Callers must only call this for a VPN they have already verified is allocated; an unmapped
/// VPN is a contract violation, not a recoverable error.
pub fn translate(phys: &PhysicalStore, geom: &Geometry, vpn: u64) -> Option<u64> {
    let mut ppn = DIRECTORY_PPN;
    for level in (0..geom.levels).rev() {
        let bits = geom.level_bits(level);
        let index = extract(vpn, level * geom.table_bits, bits);
        let entry = phys.read_entry(ppn, index);
        log::trace!("translate: level={level} index={index} entry={entry}");
        if entry == EMPTY_PTE {
            return None;
        }
        ppn = entry as u64;
    }
    Some(ppn)
}

/// TLB-backed translation: checks the TLB first, falls back to a full walk and populates the
/// TLB on a hit-through. Every call counts as one translation for miss-rate accounting.
pub fn translate_cached(
    phys: &PhysicalStore,
    geom: &Geometry,
    tlb: &mut Tlb,
    vpn: u64,
) -> Option<u64> {
    if let Some(ppn) = tlb.lookup(vpn as i64) {
        return Some(ppn as u64);
    }
    let ppn = translate(phys, geom, vpn)?;
    tlb.insert(vpn as i64, ppn as i64);
    Some(ppn)
}

/// Walks down to the leaf for `vpn`, allocating any missing intermediate table (or the data page
/// itself, at level 0) along the way. `ppn_pointer` is the allocation hint, updated in place to
/// `ppn + 1` after every step.
///
/// Returns the data PPN on success, inserting `(vpn, ppn)` into the TLB.
pub fn map(
    phys: &mut PhysicalStore,
    geom: &Geometry,
    tlb: &mut Tlb,
    vpn: u64,
    ppn_pointer: &mut u64,
) -> Result<u64, VmError> {
    let mut ppn = DIRECTORY_PPN;
    let mut entry = EMPTY_PTE;
    for level in (0..geom.levels).rev() {
        let bits = geom.level_bits(level);
        let index = extract(vpn, level * geom.table_bits, bits);
        entry = phys.read_entry(ppn, index);
        if entry == EMPTY_PTE {
            let allocated = phys.alloc_frames(*ppn_pointer, geom.pages_per_table).ok_or_else(|| {
                log::warn!("not enough physical memory to back vpn={vpn} at level={level}");
                VmError::ExhaustedPhysical
            })?;
            phys.zero_table(allocated, geom.entries_per_table);
            phys.write_entry(ppn, index, allocated as i64);
            entry = allocated as i64;
            log::debug!("map: level={level} index={index} allocated ppn={allocated}");
        }
        *ppn_pointer = entry as u64 + 1;
        ppn = entry as u64;
    }
    tlb.insert(vpn as i64, entry);
    Ok(entry as u64)
}

/// Clears the leaf mapping for `vpn`: frees the data frame and invalidates the TLB entry. Does
/// not touch now-possibly-empty intermediate tables; call [`reclaim`] afterward.
///
/// A reserved VPN whose mapping never completed (a partial `alloc` left it orphaned) has an
/// `EMPTY_PTE` somewhere along the walk; unmap stops at that point and frees nothing, so a `free`
/// covering such a VPN still succeeds instead of chasing a sentinel as if it were a frame number.
pub fn unmap(phys: &mut PhysicalStore, geom: &Geometry, tlb: &mut Tlb, vpn: u64) {
    tlb.invalidate(vpn as i64);

    let mut ppn = DIRECTORY_PPN;
    let mut parent = DIRECTORY_PPN;
    let mut index = 0u64;
    for level in (0..geom.levels).rev() {
        let bits = geom.level_bits(level);
        index = extract(vpn, level * geom.table_bits, bits);
        let entry = phys.read_entry(ppn, index);
        if entry == EMPTY_PTE {
            log::debug!("unmap: vpn={vpn} was never fully mapped, nothing to free");
            return;
        }
        parent = ppn;
        ppn = entry as u64;
    }
    phys.free_frame(ppn);
    phys.write_entry(parent, index, EMPTY_PTE);
    log::debug!("unmap: vpn={vpn} freed ppn={ppn}");
}

/// Depth-first, post-order sweep from the directory that reclaims any intermediate table whose
/// entries are now all `-1`. The directory itself is never reclaimed.
pub fn reclaim(phys: &mut PhysicalStore, geom: &Geometry) {
    sweep(phys, geom, DIRECTORY_PPN, geom.levels);
}

/// `level` counts down from `geom.levels` (the directory) to `0`; the base case `level == 0`
/// returns `false` without touching `ppn`, because at that point `ppn` is a data-page PPN, not a
/// table, and must never be treated as one.
fn sweep(phys: &mut PhysicalStore, geom: &Geometry, ppn: u64, level: u32) -> bool {
    if level == 0 {
        return false;
    }
    let entries = if level == geom.levels {
        geom.entries_per_directory
    } else {
        geom.entries_per_table
    };

    let mut is_empty = true;
    for i in 0..entries {
        let child = phys.read_entry(ppn, i);
        if child == EMPTY_PTE {
            continue;
        }
        is_empty = false;
        if sweep(phys, geom, child as u64, level - 1) {
            phys.free_frame(child as u64);
            phys.write_entry(ppn, i, EMPTY_PTE);
            is_empty = true;
        }
    }
    is_empty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn store_and_geom(cfg: &Config) -> (PhysicalStore, Geometry) {
        let mut phys = PhysicalStore::new(cfg.page_size(), cfg.page_count(), cfg.entry_size());
        let geom = *cfg.geometry();
        phys.reserve_fixed(DIRECTORY_PPN, geom.pages_per_directory);
        phys.zero_table(DIRECTORY_PPN, geom.entries_per_directory);
        (phys, geom)
    }

    #[test]
    fn map_then_translate_round_trips() {
        let cfg = Config::new(4096, 32, 1 << 20, 8, 16).unwrap();
        let (mut phys, geom) = store_and_geom(&cfg);
        let mut tlb = Tlb::new(cfg.tlb_entries());
        let mut hint = 1u64;

        let ppn = map(&mut phys, &geom, &mut tlb, 0, &mut hint).unwrap();
        assert_eq!(translate(&phys, &geom, 0), Some(ppn));
        assert_eq!(tlb.lookup(0), Some(ppn as i64));
    }

    #[test]
    fn unmap_then_reclaim_empties_all_intermediate_tables() {
        let cfg = Config::new(4096, 32, 1 << 20, 8, 16).unwrap();
        let (mut phys, geom) = store_and_geom(&cfg);
        let mut tlb = Tlb::new(cfg.tlb_entries());
        let mut hint = 1u64;

        map(&mut phys, &geom, &mut tlb, 0, &mut hint).unwrap();
        let occupied_before = phys.page_count() - free_count(&phys);

        unmap(&mut phys, &geom, &mut tlb, 0);
        reclaim(&mut phys, &geom);

        let occupied_after = phys.page_count() - free_count(&phys);
        assert!(occupied_after < occupied_before);
        // Only the directory's own reserved frame(s) remain.
        assert_eq!(occupied_after, geom.pages_per_directory);
    }

    #[test]
    fn two_adjacent_mappings_never_alias() {
        let cfg = Config::new(4096, 32, 1 << 20, 8, 16).unwrap();
        let (mut phys, geom) = store_and_geom(&cfg);
        let mut tlb = Tlb::new(cfg.tlb_entries());
        let mut hint = 1u64;

        let p0 = map(&mut phys, &geom, &mut tlb, 0, &mut hint).unwrap();
        let p1 = map(&mut phys, &geom, &mut tlb, 1, &mut hint).unwrap();
        assert_ne!(p0, p1);
    }

    fn free_count(phys: &PhysicalStore) -> usize {
        (0..phys.page_count())
            .filter(|&p| !phys.is_frame_allocated(p as u64))
            .count()
    }
}
