use proptest::prelude::*;
use vmem::Geometry;

proptest! {
    /// Every valid `(page_size, address_space, entry_size)` triple produces a geometry whose level
    /// widths sum exactly to `vpn_bits`, regardless of how many levels that works out to.
    #[test]
    fn level_widths_always_sum_to_vpn_bits(
        page_size_pow in 6u32..16,
        address_space in 16u32..48,
        entry_size_pow in 0u32..4,
    ) {
        let page_size = 1usize << page_size_pow;
        let entry_size = 1usize << entry_size_pow;
        if address_space <= page_size_pow || entry_size.saturating_mul(2) > page_size {
            return Ok(());
        }

        let geom = match Geometry::derive(page_size, address_space, entry_size) {
            Ok(g) => g,
            Err(_) => return Ok(()),
        };
        let sum = geom.directory_bits + (geom.levels - 1) * geom.table_bits;
        prop_assert_eq!(sum, geom.vpn_bits);
    }
}
