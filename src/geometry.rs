//! Derivation of paging geometry from a page size, address-space width, and entry size.
//!
//! This is a pure computation: given the three configured quantities it works out how many
//! page-table levels are needed, how many bits of the virtual address each level consumes, and
//! how many physical pages a table of each kind occupies. Nothing here touches memory.

use crate::error::ConfigError;

/// Derived paging geometry for a particular `(page_size, address_space, entry_size)` triple.
///
/// All fields are pure functions of the inputs to [`Geometry::derive`]; constructing one never
/// allocates or touches the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Number of low bits of a virtual address spent on the in-page offset.
    pub offset_bits: u32,
    /// Number of bits spent on the VPN (`address_space - offset_bits`).
    pub vpn_bits: u32,
    /// Number of page-table levels, including the directory.
    pub levels: u32,
    /// Index width, in bits, of every level below the directory.
    pub table_bits: u32,
    /// Index width, in bits, of the directory (top) level.
    pub directory_bits: u32,
    /// Number of entries in a non-directory table (`2^table_bits`).
    pub entries_per_table: u64,
    /// Number of entries in the directory (`2^directory_bits`).
    pub entries_per_directory: u64,
    /// Physical pages consumed by a single non-directory table.
    pub pages_per_table: usize,
    /// Physical pages consumed by the directory.
    pub pages_per_directory: usize,
}

impl Geometry {
    /// Derives the paging geometry for the given page size, address-space width (in bits), and
    /// page-table entry size.
    ///
    /// `table_size`/`directory_size` are computed from each level's own entry count
    /// (`entries_per_table * entry_size` and `entries_per_directory * entry_size` respectively).
    /// Earlier drafts of this computation reused `entries_per_directory` for both, which only
    /// happens to be correct when the directory and the inner tables have the same index width.
    pub fn derive(
        page_size: usize,
        address_space: u32,
        entry_size: usize,
    ) -> Result<Geometry, ConfigError> {
        if !page_size.is_power_of_two() {
            return Err(ConfigError::PageSizeNotPowerOfTwo(page_size));
        }
        if !entry_size.is_power_of_two() {
            return Err(ConfigError::EntrySizeNotPowerOfTwo(entry_size));
        }
        // Need at least two entries per table, otherwise log2(page_size / entry_size) is zero
        // and the level count below divides by zero.
        if entry_size.saturating_mul(2) > page_size {
            return Err(ConfigError::EntryLargerThanPage {
                entry_size,
                page_size,
            });
        }

        let offset_bits = page_size.trailing_zeros();
        if address_space <= offset_bits {
            return Err(ConfigError::AddressSpaceTooNarrow {
                address_space,
                page_size,
            });
        }
        let vpn_bits = address_space - offset_bits;

        let entries_per_table_bits = (page_size / entry_size).trailing_zeros();
        let levels = vpn_bits.div_ceil(entries_per_table_bits);
        let table_bits = vpn_bits.div_ceil(levels);
        let directory_bits = vpn_bits - (levels - 1) * table_bits;
        debug_assert_eq!(directory_bits + (levels - 1) * table_bits, vpn_bits);

        let entries_per_table = 1u64 << table_bits;
        let entries_per_directory = 1u64 << directory_bits;
        let table_size = entries_per_table * entry_size as u64;
        let directory_size = entries_per_directory * entry_size as u64;
        let pages_per_table = ((table_size / page_size as u64) as usize).max(1);
        let pages_per_directory = ((directory_size / page_size as u64) as usize).max(1);

        Ok(Geometry {
            offset_bits,
            vpn_bits,
            levels,
            table_bits,
            directory_bits,
            entries_per_table,
            entries_per_directory,
            pages_per_table,
            pages_per_directory,
        })
    }

    /// Index width, in bits, of `level` (0 is the leaf level, `levels - 1` is the directory).
    pub fn level_bits(&self, level: u32) -> u32 {
        if level == self.levels - 1 {
            self.directory_bits
        } else {
            self.table_bits
        }
    }

    /// Number of entries at `level`.
    pub fn level_entries(&self, level: u32) -> u64 {
        if level == self.levels - 1 {
            self.entries_per_directory
        } else {
            self.entries_per_table
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> Geometry {
        Geometry::derive(4096, 32, 8).expect("example geometry must be valid")
    }

    #[test]
    fn example_geometry_matches_worked_scenarios() {
        let g = example();
        assert_eq!(g.offset_bits, 12);
        assert_eq!(g.vpn_bits, 20);
        assert_eq!(g.levels, 3);
        assert_eq!(g.table_bits, 7);
        assert_eq!(g.directory_bits, 6);
        assert_eq!(g.entries_per_table, 128);
        assert_eq!(g.entries_per_directory, 64);
        assert_eq!(g.pages_per_table, 1);
        assert_eq!(g.pages_per_directory, 1);
    }

    #[test]
    fn level_widths_sum_to_vpn_bits() {
        let g = example();
        let sum = g.directory_bits + (g.levels - 1) * g.table_bits;
        assert_eq!(sum, g.vpn_bits);
    }

    #[test]
    fn table_size_uses_table_entries_not_directory_entries() {
        // A geometry where entries_per_table != entries_per_directory makes the table/directory
        // size divergence observable: pages_per_table must reflect the table's own capacity.
        let g = Geometry::derive(256, 24, 4).expect("geometry must be valid");
        assert_ne!(g.entries_per_table, g.entries_per_directory);
        let table_size = g.entries_per_table * 4;
        let expected_pages_per_table = ((table_size / 256) as usize).max(1);
        assert_eq!(g.pages_per_table, expected_pages_per_table);
    }

    #[test]
    fn degenerate_single_level_is_permitted() {
        // page_size big enough relative to address_space that one level suffices.
        let g = Geometry::derive(4096, 16, 8).expect("geometry must be valid");
        assert_eq!(g.levels, 1);
        assert_eq!(g.directory_bits, g.vpn_bits);
    }

    #[test]
    fn rejects_non_power_of_two_page_size() {
        assert_eq!(
            Geometry::derive(4000, 32, 8),
            Err(ConfigError::PageSizeNotPowerOfTwo(4000))
        );
    }

    #[test]
    fn rejects_entry_size_not_smaller_than_page_size() {
        assert!(matches!(
            Geometry::derive(8, 32, 8),
            Err(ConfigError::EntryLargerThanPage { .. })
        ));
    }

    #[test]
    fn rejects_address_space_narrower_than_offset() {
        assert!(matches!(
            Geometry::derive(4096, 10, 8),
            Err(ConfigError::AddressSpaceTooNarrow { .. })
        ));
    }
}
