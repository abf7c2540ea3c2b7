//! Error types returned by the paging geometry and the VM API.

use thiserror::Error;

/// Invalid combination of configuration parameters passed to [`Config::new`].
///
/// [`Config::new`]: crate::config::Config::new
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("page_size must be a power of two, got {0}")]
    PageSizeNotPowerOfTwo(usize),
    #[error("entry_size must be a power of two, got {0}")]
    EntrySizeNotPowerOfTwo(usize),
    #[error("entry_size must be 1, 2, 4, or 8 bytes, got {0}")]
    UnsupportedEntrySize(usize),
    #[error("entry_size ({entry_size}) must not exceed page_size ({page_size})")]
    EntryLargerThanPage { entry_size: usize, page_size: usize },
    #[error("address_space must be wide enough to hold the page offset, got {address_space} bits for a {page_size} byte page")]
    AddressSpaceTooNarrow {
        address_space: u32,
        page_size: usize,
    },
    #[error("tlb_entries must be nonzero")]
    EmptyTlb,
    #[error("mem_size must be at least one page ({page_size} bytes)")]
    MemTooSmall { page_size: usize },
}

/// Errors surfaced by the public [`Vm`](crate::vm::Vm) API.
///
/// The exact wording of the diagnostic log lines this crate emits alongside these errors is not
/// part of the contract; only the variant and any data it carries is.
#[derive(Debug, Error)]
pub enum VmError {
    /// No contiguous run of virtual pages was available to satisfy an `alloc`.
    #[error("not enough contiguous virtual memory")]
    ExhaustedVirtual,
    /// No physical frame was available to back a data page or a new page-table level.
    #[error("not enough physical memory")]
    ExhaustedPhysical,
    /// A `free`/`read`/`write` spanned a VPN range that is not fully allocated.
    #[error("non-contiguous operation on unallocated memory")]
    NonContiguous,
    /// A zero byte count, or a buffer length disagreeing with the requested byte count.
    #[error("invalid arguments: {0}")]
    InvalidArguments(&'static str),
    /// A malformed paging geometry was supplied to [`Vm::new`](crate::vm::Vm::new).
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The internal mutex was poisoned by a panic while held.
    #[error("internal lock poisoned")]
    Poisoned,
}
