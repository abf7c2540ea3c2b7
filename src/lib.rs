//! A user-space virtual memory manager: bitmap-backed physical and virtual page allocators, a
//! multi-level software page table, and a fixed-capacity TLB, all driven through a single
//! [`Vm`](vm::Vm) handle.
//!
//! ```no_run
//! use vmem::{Config, Vm};
//!
//! let vm = Vm::new(Config::default());
//! let addr = vm.alloc(4096 * 3).expect("alloc");
//! vm.write(addr, b"hello").expect("write");
//! let mut buf = [0u8; 5];
//! vm.read(addr, &mut buf).expect("read");
//! assert_eq!(&buf, b"hello");
//! vm.free(addr, 4096 * 3).expect("free");
//! ```

mod addr;
mod bitmap;
mod config;
mod error;
mod geometry;
mod phys;
mod table;
mod tlb;
mod virt;
mod vm;

pub use addr::VirtAddr;
pub use config::Config;
pub use error::{ConfigError, VmError};
pub use geometry::Geometry;
pub use vm::{TlbStats, Vm};
