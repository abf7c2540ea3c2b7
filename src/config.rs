//! Validated configuration for a [`Vm`](crate::vm::Vm) instance.
//!
//! The original implementation this crate is modeled on fixed these quantities as compile-time
//! constants. Here they are constructor parameters so one process can host VMs of different
//! shapes (useful for tests that probe degenerate geometries), but a `Config::default()` is
//! provided that matches the worked example used throughout this crate's tests.

use crate::error::ConfigError;
use crate::geometry::Geometry;

/// Paging configuration: page size, address-space width, physical memory size, page-table entry
/// size, and TLB capacity, plus the [`Geometry`] derived from the first three.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    page_size: usize,
    address_space: u32,
    mem_size: usize,
    entry_size: usize,
    tlb_entries: usize,
    geometry: Geometry,
}

impl Config {
    /// Builds a validated configuration.
    ///
    /// `page_size`/`entry_size` must be powers of two, `entry_size` must leave room for at least
    /// two entries per page, `address_space` must be wide enough to hold the page offset, and
    /// `mem_size` must hold at least one page.
    pub fn new(
        page_size: usize,
        address_space: u32,
        mem_size: usize,
        entry_size: usize,
        tlb_entries: usize,
    ) -> Result<Config, ConfigError> {
        if !matches!(entry_size, 1 | 2 | 4 | 8) {
            return Err(ConfigError::UnsupportedEntrySize(entry_size));
        }
        let geometry = Geometry::derive(page_size, address_space, entry_size)?;
        if mem_size < page_size {
            return Err(ConfigError::MemTooSmall { page_size });
        }
        if tlb_entries == 0 {
            return Err(ConfigError::EmptyTlb);
        }

        Ok(Config {
            page_size,
            address_space,
            mem_size,
            entry_size,
            tlb_entries,
            geometry,
        })
    }

    /// Bytes per page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Width of a virtual address, in bits.
    pub fn address_space(&self) -> u32 {
        self.address_space
    }

    /// Total physical bytes backing this VM.
    pub fn mem_size(&self) -> usize {
        self.mem_size
    }

    /// Bytes per page-table entry.
    pub fn entry_size(&self) -> usize {
        self.entry_size
    }

    /// Fixed TLB capacity.
    pub fn tlb_entries(&self) -> usize {
        self.tlb_entries
    }

    /// Total number of physical page frames (`mem_size / page_size`).
    pub fn page_count(&self) -> usize {
        self.mem_size / self.page_size
    }

    /// The paging geometry derived from this configuration.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }
}

impl Default for Config {
    /// `page_size = 4096`, `address_space = 32`, `mem_size = 1 GiB`, `entry_size = 8`,
    /// `tlb_entries = 512`, the worked example used throughout this crate's tests.
    fn default() -> Config {
        Config::new(4096, 32, 1 << 30, 8, 512).expect("default configuration must be valid")
    }
}
