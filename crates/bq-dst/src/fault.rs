//! Probabilistic fault injection driven by a `DeterministicRng`.

use crate::random::DeterministicRng;

/// How often faults fire.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultConfig {
    /// Probability that a fault point fires.
    pub failure_probability: f64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            failure_probability: 0.05,
        }
    }
}

impl FaultConfig {
    /// No faults at all.
    #[must_use]
    pub fn none() -> Self {
        Self {
            failure_probability: 0.0,
        }
    }

    /// Frequent faults, for stress runs.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            failure_probability: 0.25,
        }
    }
}

/// Counters for injected faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub checks_count: u64,
    pub faults_count: u64,
}

/// Decides, deterministically, when faults fire.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: DeterministicRng,
    config: FaultConfig,
    stats: FaultStats,
}

impl FaultInjector {
    #[must_use]
    pub fn new(rng: DeterministicRng, config: FaultConfig) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&config.failure_probability),
            "failure_probability out of range"
        );
        Self {
            rng,
            config,
            stats: FaultStats::default(),
        }
    }

    pub fn should_fail(&mut self) -> bool {
        self.stats.checks_count += 1;
        let fail = self.rng.gen_bool(self.config.failure_probability);
        if fail {
            self.stats.faults_count += 1;
        }
        fail
    }

    #[must_use]
    pub fn stats(&self) -> FaultStats {
        self.stats
    }

    #[must_use]
    pub fn config(&self) -> &FaultConfig {
        &self.config
    }
}
