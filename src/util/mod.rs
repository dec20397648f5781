//! Cross-cutting utility functions used by the record/file and pipeline layers.
//!
//! Submodules:
//! - [`cores`] — CPU core counting via [`std::thread::available_parallelism`],
//!   used to size the default compressor-thread count in the MT write pipeline.

pub mod cores;

pub use cores::count_cores;

// ── Sleep helpers ─────────────────────────────────────────────────────────────
// Used by the writer thread's disk-full backoff poll (one-second polls per
// the spec's backpressure rule).

/// Blocks the current thread for `secs` seconds.
pub fn sleep_secs(secs: u64) {
    std::thread::sleep(std::time::Duration::from_secs(secs));
}

/// Blocks the current thread for `millis` milliseconds.
pub fn sleep_millis(millis: u64) {
    std::thread::sleep(std::time::Duration::from_millis(millis));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_cores_at_least_one() {
        assert!(count_cores() >= 1);
    }
}
