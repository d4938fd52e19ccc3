//! # bq-dst
//!
//! Deterministic Simulation Testing for bounded blocking queues.
//!
//! Inspired by FoundationDB and TigerBeetle: randomness and faults are
//! driven by a seed, so a failing run can be replayed exactly.
//!
//! ## Harnesses
//!
//! - `fault_injection`: single-threaded `DstRunner` with faults injected at
//!   operation boundaries and `bq-core` invariants checked on demand
//! - `harness`: multi-threaded producer/consumer stress run with seeded
//!   jitter
//!
//! ## Usage
//!
//! ```rust
//! use bq_dst::{DeterministicRng, FaultConfig, FaultInjector};
//!
//! let seed = 12345;
//! let mut rng = DeterministicRng::new(seed);
//! let choice = rng.gen_range(0..10_u8);
//! assert!(choice < 10);
//!
//! let mut faults = FaultInjector::new(rng.fork(), FaultConfig::none());
//! assert!(!faults.should_fail());
//! ```
//!
//! ## Reproducibility
//!
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

pub mod fault;
pub mod fault_injection;
pub mod harness;
pub mod random;

pub use fault::{FaultConfig, FaultInjector, FaultStats};
pub use fault_injection::{
    run_dst_scenario, DstOp, DstResult, DstRunner, DstStats, DstTestableQueue, FaultPoint, FaultType,
};
pub use harness::{run_stress, HarnessConfig, HarnessError, HarnessResult};
pub use random::DeterministicRng;

/// Get DST seed from environment or generate random one.
///
/// Prints the seed to stderr for reproduction. Use `DST_SEED=<seed>` to reproduce.
///
/// # Panics
///
/// Panics if `DST_SEED` is set but is not a valid `u64`.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    match std::env::var("DST_SEED") {
        Ok(s) => {
            let seed: u64 = s.parse().expect("DST_SEED must be a valid u64");
            eprintln!("DST_SEED={} (from environment)", seed);
            seed
        }
        Err(_) => {
            // Zero is reserved: counterexamples treat it as "no seed".
            let seed = rand::random::<u64>().max(1);
            eprintln!("DST_SEED={} (randomly generated)", seed);
            seed
        }
    }
}

/// Iteration count from `DST_ITERATIONS`, or `default`.
#[must_use]
pub fn iterations_or(default: u64) -> u64 {
    std::env::var("DST_ITERATIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
