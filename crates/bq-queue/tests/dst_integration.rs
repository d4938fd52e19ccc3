//! DST integration tests for `BlockingQueue`.
//!
//! Runs the queue through the `bq-dst` runners with fault injection and
//! through the multi-threaded stress harness, checking the `bq-core`
//! queue invariants.

#![cfg(not(loom))]

use bq_dst::{
    get_or_generate_seed, iterations_or, run_dst_scenario, run_stress, DstOp, DstRunner,
    FaultConfig, HarnessConfig,
};
use bq_queue::BlockingQueue;

type Queue = BlockingQueue<u64>;

#[test]
fn test_scenario_fill_and_drain() {
    let seed = get_or_generate_seed();
    let mut ops: Vec<DstOp> = (1..=10).map(DstOp::Put).collect();
    ops.extend(std::iter::repeat(DstOp::Take).take(12));

    let result = run_dst_scenario::<Queue>(seed, 4, ops);
    assert!(result.passed, "{}", result.format());
}

#[test]
fn test_scenario_interleaved_random_ops() {
    let seed = get_or_generate_seed();
    let mut rng = bq_dst::DeterministicRng::new(seed);

    for round in 0..iterations_or(50) {
        let capacity = rng.gen_range(1..=6_usize);
        let ops: Vec<DstOp> = (0..200_u64)
            .map(|i| {
                if rng.gen_bool(0.55) {
                    DstOp::Put(round * 1_000 + i + 1)
                } else {
                    DstOp::Take
                }
            })
            .collect();

        let result = run_dst_scenario::<Queue>(seed.wrapping_add(round), capacity, ops);
        assert!(result.passed, "round {}: {}", round, result.format());
    }
}

#[test]
fn test_runner_without_faults_preserves_fifo() {
    let seed = get_or_generate_seed();
    let mut runner: DstRunner<Queue> = DstRunner::with_fault_config(seed, 3, FaultConfig::none());

    assert_eq!(runner.put(1), Ok(true));
    assert_eq!(runner.put(2), Ok(true));
    assert_eq!(runner.put(3), Ok(true));
    assert_eq!(runner.put(4), Ok(false), "fourth put must be rejected at capacity 3");
    assert_eq!(runner.take(), Ok(Some(1)));
    assert_eq!(runner.put(4), Ok(true));

    let contents = bq_dst::DstTestableQueue::contents(runner.queue());
    assert_eq!(contents, vec![2, 3, 4]);
    assert!(runner.invariants_hold());

    let stats = runner.stats();
    assert_eq!(stats.full_rejections, 1);
    assert_eq!(stats.faults_injected, 0);
}

#[test]
fn test_stress_quick() {
    let seed = get_or_generate_seed();
    let config = HarnessConfig::quick().from_env().unwrap();

    let result = run_stress::<Queue>(seed, &config).unwrap();
    println!("{}", result.format());
    assert!(result.passed(), "{}", result.format());
    assert_eq!(result.consumed_count, config.total_items());
}

#[test]
fn test_stress_capacity_one_many_producers() {
    let seed = get_or_generate_seed();
    let config = HarnessConfig {
        producers: 8,
        consumers: 2,
        items_per_producer: 250,
        capacity: 1,
        ..HarnessConfig::quick()
    };

    let result = run_stress::<Queue>(seed, &config).unwrap();
    assert!(result.passed(), "{}", result.format());
    assert!(result.max_observed_len <= 1);
}

#[test]
fn test_stress_more_consumers_than_producers() {
    let seed = get_or_generate_seed();
    let config = HarnessConfig {
        producers: 1,
        consumers: 6,
        items_per_producer: 600,
        capacity: 2,
        ..HarnessConfig::quick()
    };

    let result = run_stress::<Queue>(seed, &config).unwrap();
    assert!(result.passed(), "{}", result.format());
}
