//! Logging utilities
//!
//! The library only emits through the `log` facade. Binaries and tests pick
//! the sink by calling one of the initializers below.

pub use log::{debug, error, info, trace, warn};

/// Initialize logging with a default level filter, still honouring `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_with_filter(level: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

/// Initialize logging for unit tests (captured by the test harness)
pub fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
