//! The client-facing VM API: `alloc`, `free`, `write`, `read`, and TLB accounting, composed from
//! the geometry, page table, bitmap allocators, and TLB under a single lock.

use std::sync::Mutex;

use crate::addr::{self, VirtAddr};
use crate::config::Config;
use crate::error::VmError;
use crate::geometry::Geometry;
use crate::phys::PhysicalStore;
use crate::table::{self, DIRECTORY_PPN};
use crate::tlb::Tlb;
use crate::virt::VirtualAllocator;

/// TLB hit/miss accounting, as reported by [`Vm::tlb_missrate`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TlbStats {
    pub translations: u64,
    pub tlb_misses: u64,
}

impl TlbStats {
    /// `misses / translations`, or `0.0` when nothing has been translated yet.
    pub fn miss_rate(&self) -> f64 {
        if self.translations == 0 {
            0.0
        } else {
            self.tlb_misses as f64 / self.translations as f64
        }
    }
}

/// The paging state created on the first `alloc`: the physical store, the directory (embedded in
/// the store at page 0), the virtual-page bitmap, and the TLB.
struct Inner {
    phys: PhysicalStore,
    virt: VirtualAllocator,
    tlb: Tlb,
    geom: Geometry,
    ppn_pointer: u64,
}

impl Inner {
    fn new(cfg: &Config) -> Inner {
        let geom = *cfg.geometry();
        let mut phys = PhysicalStore::new(cfg.page_size(), cfg.page_count(), cfg.entry_size());
        phys.reserve_fixed(DIRECTORY_PPN, geom.pages_per_directory);
        phys.zero_table(DIRECTORY_PPN, geom.entries_per_directory);

        Inner {
            phys,
            virt: VirtualAllocator::new(cfg.page_count()),
            tlb: Tlb::new(cfg.tlb_entries()),
            geom,
            ppn_pointer: geom.pages_per_directory as u64,
        }
    }

    fn decode_vpn(&self, addr: VirtAddr) -> Result<u64, VmError> {
        let raw = addr::unpack_vpn(self.geom.offset_bits, addr);
        if raw < 0 {
            return Err(VmError::NonContiguous);
        }
        Ok(raw as u64)
    }

    fn alloc(&mut self, cfg: &Config, n_bytes: usize) -> Result<VirtAddr, VmError> {
        let num_pages = n_bytes.div_ceil(cfg.page_size());
        let vpn_start = self.virt.reserve(num_pages).ok_or_else(|| {
            log::warn!("not enough contiguous virtual memory");
            VmError::ExhaustedVirtual
        })?;

        for i in 0..num_pages as u64 {
            table::map(
                &mut self.phys,
                &self.geom,
                &mut self.tlb,
                vpn_start + i,
                &mut self.ppn_pointer,
            )?;
        }

        Ok(addr::pack(self.geom.offset_bits, vpn_start + 1, 0))
    }

    fn free(&mut self, cfg: &Config, addr: VirtAddr, n_bytes: usize) -> Result<(), VmError> {
        let num_pages = n_bytes.div_ceil(cfg.page_size());
        if num_pages == 0 {
            return Ok(());
        }
        let vpn_start = self.decode_vpn(addr)?;
        if !self.virt.is_reserved_range(vpn_start, num_pages) {
            log::warn!("non-contiguous free");
            return Err(VmError::NonContiguous);
        }

        for i in 0..num_pages as u64 {
            table::unmap(&mut self.phys, &self.geom, &mut self.tlb, vpn_start + i);
        }
        self.virt.release(vpn_start, num_pages);
        table::reclaim(&mut self.phys, &self.geom);
        Ok(())
    }

    fn write(&mut self, cfg: &Config, addr: VirtAddr, src: &[u8]) -> Result<(), VmError> {
        if src.is_empty() {
            return Err(VmError::InvalidArguments("write requires a non-empty buffer"));
        }
        self.copy(cfg, addr, src.len(), |phys, ppn, page_off, chunk, off| {
            phys.copy_in(ppn, page_off, &src[off..off + chunk]);
        })
    }

    fn read(&mut self, cfg: &Config, addr: VirtAddr, dst: &mut [u8]) -> Result<(), VmError> {
        if dst.is_empty() {
            return Err(VmError::InvalidArguments("read requires a non-empty buffer"));
        }
        let len = dst.len();
        self.copy(cfg, addr, len, |phys, ppn, page_off, chunk, off| {
            phys.copy_out(ppn, page_off, &mut dst[off..off + chunk]);
        })
    }

    /// Shared walk for `read`/`write`: validates the spanned VPN range is allocated, then visits
    /// each page in order, handing the caller `(phys, ppn, in_page_offset, chunk_len,
    /// byte_offset_into_the_overall_copy)` so it can copy in either direction.
    fn copy(
        &mut self,
        cfg: &Config,
        addr: VirtAddr,
        n_bytes: usize,
        mut each_page: impl FnMut(&mut PhysicalStore, u64, usize, usize, usize),
    ) -> Result<(), VmError> {
        let vpn_start = self.decode_vpn(addr)?;
        let in_page_offset = addr::unpack_offset(self.geom.offset_bits, addr) as usize;
        let num_pages = (in_page_offset + n_bytes).div_ceil(cfg.page_size());
        if !self.virt.is_reserved_range(vpn_start, num_pages) {
            log::warn!("non-contiguous read/write");
            return Err(VmError::NonContiguous);
        }

        let mut remaining = n_bytes;
        let mut done = 0usize;
        let mut vpn = vpn_start;
        while remaining > 0 {
            let ppn = table::translate_cached(&self.phys, &self.geom, &mut self.tlb, vpn)
                .expect("vpn range was verified allocated above");
            let page_off = if vpn == vpn_start { in_page_offset } else { 0 };
            let chunk = (cfg.page_size() - page_off).min(remaining);
            each_page(&mut self.phys, ppn, page_off, chunk, done);
            remaining -= chunk;
            done += chunk;
            vpn += 1;
        }
        Ok(())
    }

    fn tlb_stats(&self) -> TlbStats {
        TlbStats {
            translations: self.tlb.translations(),
            tlb_misses: self.tlb.misses(),
        }
    }
}

/// A user-space virtual memory manager.
///
/// Construction is cheap: the physical store, directory, and TLB are created lazily on the first
/// [`Vm::alloc`]/[`Vm::free`]/[`Vm::read`]/[`Vm::write`] call. All four entry points take `&self`
/// and serialize through one internal mutex; there is exactly one lock for the whole `Vm`.
pub struct Vm {
    config: Config,
    inner: Mutex<Option<Inner>>,
}

impl Vm {
    /// Builds a manager for the given configuration. Allocates nothing yet.
    pub fn new(config: Config) -> Vm {
        Vm {
            config,
            inner: Mutex::new(None),
        }
    }

    /// The configuration this `Vm` was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R, VmError> {
        let mut guard = self.inner.lock().map_err(|_| VmError::Poisoned)?;
        let inner = guard.get_or_insert_with(|| Inner::new(&self.config));
        Ok(f(inner))
    }

    /// Reserves `ceil(n_bytes / page_size)` contiguous virtual pages and maps each to a physical
    /// frame. Returns the address of the first byte (offset zero).
    pub fn alloc(&self, n_bytes: usize) -> Result<VirtAddr, VmError> {
        self.with_inner(|inner| inner.alloc(&self.config, n_bytes))?
    }

    /// Inverse of [`Vm::alloc`]. Rejects if the covered VPN range is not fully allocated.
    pub fn free(&self, addr: VirtAddr, n_bytes: usize) -> Result<(), VmError> {
        self.with_inner(|inner| inner.free(&self.config, addr, n_bytes))?
    }

    /// Copies `src` into the virtual range starting at `addr`.
    pub fn write(&self, addr: VirtAddr, src: &[u8]) -> Result<(), VmError> {
        self.with_inner(|inner| inner.write(&self.config, addr, src))?
    }

    /// Copies bytes out of the virtual range starting at `addr` into `dst`.
    pub fn read(&self, addr: VirtAddr, dst: &mut [u8]) -> Result<(), VmError> {
        self.with_inner(|inner| inner.read(&self.config, addr, dst))?
    }

    /// Current TLB hit/miss accounting. Never fails: a poisoned lock is recovered for this
    /// read-only report, since stale-but-present counters are more useful than an error here.
    pub fn tlb_missrate(&self) -> TlbStats {
        let guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.as_ref().map(Inner::tlb_stats).unwrap_or_default()
    }

    /// Emits the current TLB accounting to the `log` facade at `info` level.
    pub fn log_tlb_missrate(&self) {
        let stats = self.tlb_missrate();
        log::info!(
            "translations={} tlb_misses={} miss_rate={:.6}",
            stats.translations,
            stats.tlb_misses,
            stats.miss_rate()
        );
    }
}
