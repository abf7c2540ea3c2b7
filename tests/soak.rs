mod common;

use common::{default_config, init_logger};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vmem::Vm;

#[test]
fn randomized_alloc_free_soak_keeps_tlb_stats_sane() {
    init_logger();
    let vm = Vm::new(default_config());
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let mut live: Vec<(vmem::VirtAddr, usize)> = Vec::new();

    for _ in 0..1000 {
        if live.is_empty() || rng.random_bool(0.6) {
            let n = rng.random_range(1..=16_384usize);
            if let Ok(addr) = vm.alloc(n) {
                live.push((addr, n));
            }
        } else {
            let idx = rng.random_range(0..live.len());
            let (addr, n) = live.swap_remove(idx);
            vm.free(addr, n).expect("a tracked allocation must always free cleanly");
        }
    }

    let stats = vm.tlb_missrate();
    assert!(stats.translations > 0, "a thousand-cycle soak should produce some translations");
    assert!(stats.miss_rate() <= 1.0);
}
