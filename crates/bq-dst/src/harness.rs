//! Multi-threaded stress harness for blocking queues.
//!
//! Spawns real producer and consumer threads against one queue, each with
//! its own seeded jitter, and checks that the multiset of consumed tags
//! equals the multiset of produced tags.
//!
//! Thread scheduling is up to the OS, so only the jitter is reproducible
//! from the seed; the invariants must hold for every schedule.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::fault_injection::DstTestableQueue;
use crate::random::DeterministicRng;

/// Upper bound on threads of either kind.
const THREADS_COUNT_MAX: usize = 64;

/// Upper bound on items moved in one run (K x M). Consumed tags are
/// collected in memory.
const ITEMS_TOTAL_MAX: u64 = 100_000_000;

/// Configuration for the stress harness.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarnessConfig {
    /// Producer threads (K).
    pub producers: usize,
    /// Consumer threads (K').
    pub consumers: usize,
    /// Items enqueued by each producer (M).
    pub items_per_producer: u64,
    /// Queue capacity.
    pub capacity: usize,
    /// Probability that a thread yields or sleeps between operations.
    pub jitter_probability: f64,
    /// Upper bound on an injected sleep, in microseconds.
    pub jitter_us_max: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            producers: 4,
            consumers: 4,
            items_per_producer: 1_000,
            capacity: 8,
            jitter_probability: 0.05,
            jitter_us_max: 50,
        }
    }
}

impl HarnessConfig {
    /// Configuration for quick testing.
    pub fn quick() -> Self {
        Self {
            producers: 2,
            consumers: 2,
            items_per_producer: 200,
            capacity: 2,
            jitter_probability: 0.1,
            jitter_us_max: 20,
        }
    }

    /// Configuration for stress testing.
    pub fn stress() -> Self {
        Self {
            producers: 8,
            consumers: 8,
            items_per_producer: 10_000,
            capacity: 4,
            jitter_probability: 0.02,
            jitter_us_max: 100,
        }
    }

    /// Apply `DST_PRODUCERS`, `DST_CONSUMERS`, `DST_ITEMS` and
    /// `DST_CAPACITY` overrides from the environment. The seed is passed to
    /// `run_stress` separately; read it with `get_or_generate_seed`.
    pub fn from_env(self) -> Result<Self, HarnessError> {
        Ok(Self {
            producers: env_override("DST_PRODUCERS", self.producers)?,
            consumers: env_override("DST_CONSUMERS", self.consumers)?,
            items_per_producer: env_override("DST_ITEMS", self.items_per_producer)?,
            capacity: env_override("DST_CAPACITY", self.capacity)?,
            ..self
        })
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.capacity == 0 {
            return Err(HarnessError::InvalidConfig("capacity must be positive".into()));
        }
        if self.producers == 0 || self.consumers == 0 {
            return Err(HarnessError::InvalidConfig(
                "need at least one producer and one consumer".into(),
            ));
        }
        if self.producers > THREADS_COUNT_MAX || self.consumers > THREADS_COUNT_MAX {
            return Err(HarnessError::InvalidConfig(format!(
                "at most {} producers and {} consumers",
                THREADS_COUNT_MAX, THREADS_COUNT_MAX
            )));
        }
        let total = (self.producers as u64).checked_mul(self.items_per_producer);
        if !total.is_some_and(|total| total <= ITEMS_TOTAL_MAX) {
            return Err(HarnessError::InvalidConfig(format!(
                "producers x items_per_producer must be at most {}",
                ITEMS_TOTAL_MAX
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_probability) {
            return Err(HarnessError::InvalidConfig(
                "jitter_probability must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }

    /// Total items moved through the queue (K x M). Saturates on configs
    /// that `validate` rejects.
    pub fn total_items(&self) -> u64 {
        (self.producers as u64).saturating_mul(self.items_per_producer)
    }
}

fn env_override<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, HarnessError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| HarnessError::InvalidEnv { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Harness errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HarnessError {
    #[error("invalid harness config: {0}")]
    InvalidConfig(String),

    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Result of a stress run.
#[derive(Debug, Clone, Serialize)]
pub struct HarnessResult {
    pub seed: u64,
    pub config: HarnessConfig,
    pub produced_count: u64,
    pub consumed_count: u64,
    /// Tags produced but never consumed.
    pub lost: Vec<u64>,
    /// Tags consumed more often than produced.
    pub duplicated: Vec<u64>,
    /// Largest `len()` any producer observed right after enqueueing.
    pub max_observed_len: usize,
    /// `len()` after every thread joined.
    pub final_len: usize,
    /// Blocking calls that reported an interrupt.
    pub interrupted_count: u64,
    pub elapsed_ms: u128,
}

impl HarnessResult {
    /// No loss, no duplication, capacity respected, queue drained.
    pub fn passed(&self) -> bool {
        self.lost.is_empty()
            && self.duplicated.is_empty()
            && self.produced_count == self.consumed_count
            && self.max_observed_len <= self.config.capacity
            && self.final_len == 0
            && self.interrupted_count == 0
    }

    pub fn format(&self) -> String {
        let status = if self.passed() { "PASS" } else { "FAIL" };
        let mut result = format!(
            "[{}] DST_SEED={} producers={} consumers={} produced={} consumed={} max_len={}/{} elapsed={}ms",
            status,
            self.seed,
            self.config.producers,
            self.config.consumers,
            self.produced_count,
            self.consumed_count,
            self.max_observed_len,
            self.config.capacity,
            self.elapsed_ms
        );
        if !self.lost.is_empty() {
            result.push_str(&format!("\n  VIOLATION: lost {:?}", self.lost));
        }
        if !self.duplicated.is_empty() {
            result.push_str(&format!("\n  VIOLATION: duplicated {:?}", self.duplicated));
        }
        result
    }
}

/// Tag for item `i` of producer `p`. Unique across the run.
fn tag(producer: usize, i: u64, items_per_producer: u64) -> u64 {
    producer as u64 * items_per_producer + i
}

fn maybe_jitter(rng: &mut DeterministicRng, config: &HarnessConfig) {
    if config.jitter_probability == 0.0 || !rng.gen_bool(config.jitter_probability) {
        return;
    }
    if config.jitter_us_max == 0 || rng.gen_bool(0.5) {
        std::thread::yield_now();
    } else {
        let us = rng.gen_range(1..=config.jitter_us_max);
        std::thread::sleep(Duration::from_micros(us));
    }
}

/// Run K producers and K' consumers over a fresh `Q`.
///
/// Consumers split the K x M takes between them, so every blocking call
/// eventually returns and the run terminates.
pub fn run_stress<Q: DstTestableQueue>(seed: u64, config: &HarnessConfig) -> Result<HarnessResult, HarnessError> {
    config.validate()?;

    let queue = Q::with_capacity(config.capacity);
    let mut root = DeterministicRng::new(seed);
    let total = config.total_items();

    let consumer_quotas: Vec<u64> = (0..config.consumers as u64)
        .map(|c| {
            let base = total / config.consumers as u64;
            let extra = u64::from(c < total % config.consumers as u64);
            base + extra
        })
        .collect();

    let producer_rngs: Vec<DeterministicRng> = (0..config.producers).map(|_| root.fork()).collect();
    let consumer_rngs: Vec<DeterministicRng> = (0..config.consumers).map(|_| root.fork()).collect();

    let max_observed_len = AtomicUsize::new(0);
    let interrupted = AtomicUsize::new(0);
    let collected: Mutex<Vec<u64>> = Mutex::new(Vec::with_capacity(total as usize));

    let start = Instant::now();

    std::thread::scope(|s| {
        for (p, mut rng) in producer_rngs.into_iter().enumerate() {
            let queue = &queue;
            let max_observed_len = &max_observed_len;
            let interrupted = &interrupted;
            s.spawn(move || {
                for i in 0..config.items_per_producer {
                    maybe_jitter(&mut rng, config);
                    if !queue.put(tag(p, i, config.items_per_producer)) {
                        interrupted.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    max_observed_len.fetch_max(queue.len(), Ordering::Relaxed);
                }
            });
        }

        for (quota, mut rng) in consumer_quotas.iter().copied().zip(consumer_rngs) {
            let queue = &queue;
            let collected = &collected;
            let interrupted = &interrupted;
            s.spawn(move || {
                let mut local = Vec::with_capacity(quota as usize);
                for _ in 0..quota {
                    maybe_jitter(&mut rng, config);
                    match queue.take() {
                        Some(item) => local.push(item),
                        None => {
                            interrupted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                collected
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .extend(local);
            });
        }
    });

    let elapsed_ms = start.elapsed().as_millis();
    let collected = collected
        .into_inner()
        .unwrap_or_else(std::sync::PoisonError::into_inner);

    let mut counts: HashMap<u64, i64> = HashMap::with_capacity(total as usize);
    for p in 0..config.producers {
        for i in 0..config.items_per_producer {
            *counts.entry(tag(p, i, config.items_per_producer)).or_default() += 1;
        }
    }
    for item in &collected {
        *counts.entry(*item).or_default() -= 1;
    }

    let mut lost: Vec<u64> = counts.iter().filter(|&(_, &c)| c > 0).map(|(&t, _)| t).collect();
    let mut duplicated: Vec<u64> = counts.iter().filter(|&(_, &c)| c < 0).map(|(&t, _)| t).collect();
    lost.sort_unstable();
    duplicated.sort_unstable();

    Ok(HarnessResult {
        seed,
        config: config.clone(),
        produced_count: total,
        consumed_count: collected.len() as u64,
        lost,
        duplicated,
        max_observed_len: max_observed_len.into_inner(),
        final_len: queue.len(),
        interrupted_count: interrupted.into_inner() as u64,
        elapsed_ms,
    })
}
