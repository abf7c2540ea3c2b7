#![allow(dead_code)]

use vmem::Config;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn default_config() -> Config {
    Config::default()
}
