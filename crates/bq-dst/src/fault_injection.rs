//! Fault injection for bounded queues.
//!
//! DST injects faults at OPERATION BOUNDARIES, never inside the queue's
//! critical section. The queue under test is unchanged; faults happen in
//! the runner.
//!
//! # What DST Tests (vs Loom and Stateright)
//!
//! | Concern | Tool | Level |
//! |---------|------|-------|
//! | Lost wake-ups, waiter races | Stateright, Loom | Interleaving |
//! | Interrupt before a wait | DST | Operation boundary |
//! | Caller dies after an operation | DST | Operation boundary |
//! | Full/empty edge cases | DST | Between operations |
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  DstRunner                                                   │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ FaultPoint  │───>│ Pure Queue  │───>│ FaultPoint  │     │
//! │  │ (pre-op)    │    │ put()/take()│    │ (post-op)   │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │        │                                      │              │
//! │        ▼                                      ▼              │
//! │  "Interrupted?"                   "Caller crashed?"         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use bq_core::{BoundedQueueProperties, BoundedQueuePropertyChecker, PropertyChecker, PropertyResult};

use crate::fault::{FaultConfig, FaultInjector};
use crate::random::DeterministicRng;

/// Fault injection points (between operations, not inside).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    BeforeOperation,
    AfterOperation,
}

/// Types of faults that can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    /// Caller interrupted before the operation; queue untouched.
    Interrupted,
    /// Caller "crashes" after the operation; the effect stands but the
    /// result never reaches the caller.
    ThreadCrash,
}

/// Minimal queue surface driven by the DST runner and the stress harness.
///
/// No DST knowledge in the implementation.
pub trait DstTestableQueue: Send + Sync {
    fn with_capacity(capacity: usize) -> Self
    where
        Self: Sized;

    /// Non-blocking enqueue; `false` when full.
    fn try_put(&self, item: u64) -> bool;

    /// Non-blocking dequeue; `None` when empty.
    fn try_take(&self) -> Option<u64>;

    /// Blocking enqueue; `false` only if the wait was interrupted.
    fn put(&self, item: u64) -> bool;

    /// Blocking dequeue; `None` only if the wait was interrupted.
    fn take(&self) -> Option<u64>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;

    /// Snapshot of stored items, head to tail.
    fn contents(&self) -> Vec<u64>;
}

/// DST test runner for bounded queues.
///
/// Wraps a pure queue and injects faults at operation boundaries,
/// recording produced and consumed items so the `bq-core` invariants can
/// be checked at any point.
pub struct DstRunner<Q> {
    queue: Q,
    rng: DeterministicRng,
    fault_injector: FaultInjector,
    seed: u64,
    produced: Vec<u64>,
    consumed: Vec<u64>,
    operations_count: u64,
    faults_injected: u64,
    abandoned_operations: u64,
    full_rejections: u64,
    empty_takes: u64,
}

impl<Q: DstTestableQueue> DstRunner<Q> {
    #[must_use]
    pub fn new(seed: u64, capacity: usize) -> Self {
        Self::with_fault_config(seed, capacity, FaultConfig::default())
    }

    #[must_use]
    pub fn with_fault_config(seed: u64, capacity: usize, config: FaultConfig) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        let rng = DeterministicRng::new(seed);
        let fault_injector = FaultInjector::new(DeterministicRng::new(seed.wrapping_add(1)), config);

        Self {
            queue: Q::with_capacity(capacity),
            rng,
            fault_injector,
            seed,
            produced: Vec::new(),
            consumed: Vec::new(),
            operations_count: 0,
            faults_injected: 0,
            abandoned_operations: 0,
            full_rejections: 0,
            empty_takes: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    /// Enqueue with fault injection at the boundaries.
    ///
    /// `Ok(false)` means the queue was full and nothing changed.
    pub fn put(&mut self, item: u64) -> Result<bool, FaultType> {
        if let Some(fault) = self.maybe_inject_fault(FaultPoint::BeforeOperation) {
            return Err(fault);
        }

        let accepted = self.queue.try_put(item);
        self.operations_count += 1;

        if accepted {
            self.produced.push(item);
        } else {
            self.full_rejections += 1;
        }

        if let Some(fault) = self.maybe_inject_fault(FaultPoint::AfterOperation) {
            // The item IS queued; only the caller's view is lost.
            return Err(fault);
        }

        Ok(accepted)
    }

    /// Dequeue with fault injection at the boundaries.
    pub fn take(&mut self) -> Result<Option<u64>, FaultType> {
        if let Some(fault) = self.maybe_inject_fault(FaultPoint::BeforeOperation) {
            return Err(fault);
        }

        let result = self.queue.try_take();
        self.operations_count += 1;

        match result {
            Some(item) => self.consumed.push(item),
            None => self.empty_takes += 1,
        }

        if let Some(fault) = self.maybe_inject_fault(FaultPoint::AfterOperation) {
            // Item left the queue but the caller never used it.
            return Err(fault);
        }

        Ok(result)
    }

    fn maybe_inject_fault(&mut self, point: FaultPoint) -> Option<FaultType> {
        if !self.fault_injector.should_fail() {
            return None;
        }
        self.faults_injected += 1;
        self.abandoned_operations += 1;
        // Interrupts only make sense before the call, crashes only after.
        Some(match point {
            FaultPoint::BeforeOperation => FaultType::Interrupted,
            FaultPoint::AfterOperation => FaultType::ThreadCrash,
        })
    }

    /// Check every `bq-core` queue invariant against the current state.
    pub fn check_invariants(&self) -> Vec<PropertyResult> {
        let checker = BoundedQueuePropertyChecker::new(self);
        let checker = if self.seed != 0 {
            checker.with_seed(self.seed)
        } else {
            checker
        };
        checker.check_all()
    }

    pub fn invariants_hold(&self) -> bool {
        self.check_invariants().iter().all(|r| r.holds)
    }

    pub fn stats(&self) -> DstStats {
        DstStats {
            seed: self.seed,
            operations_count: self.operations_count,
            faults_injected: self.faults_injected,
            abandoned_operations: self.abandoned_operations,
            full_rejections: self.full_rejections,
            empty_takes: self.empty_takes,
        }
    }
}

impl<Q: DstTestableQueue> BoundedQueueProperties for DstRunner<Q> {
    fn produced_items(&self) -> Vec<u64> {
        self.produced.clone()
    }

    fn consumed_items(&self) -> Vec<u64> {
        self.consumed.clone()
    }

    fn current_contents(&self) -> Vec<u64> {
        self.queue.contents()
    }

    fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// Statistics from a DST run.
#[derive(Debug, Clone)]
pub struct DstStats {
    pub seed: u64,
    pub operations_count: u64,
    pub faults_injected: u64,
    pub abandoned_operations: u64,
    pub full_rejections: u64,
    pub empty_takes: u64,
}

impl DstStats {
    pub fn format(&self) -> String {
        format!(
            "DST_SEED={} ops={} faults={} abandoned={} full={} empty={}",
            self.seed,
            self.operations_count,
            self.faults_injected,
            self.abandoned_operations,
            self.full_rejections,
            self.empty_takes
        )
    }
}

/// DST operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstOp {
    Put(u64),
    Take,
}

/// Result of `run_dst_scenario`.
#[derive(Debug)]
pub struct DstResult {
    pub passed: bool,
    /// Names and descriptions of violated invariants.
    pub violations: Vec<String>,
    pub stats: DstStats,
    pub fault_errors: Vec<String>,
}

impl DstResult {
    pub fn format(&self) -> String {
        let status = if self.passed { "PASS" } else { "FAIL" };
        let mut result = format!("[{}] {}", status, self.stats.format());
        for violation in &self.violations {
            result.push_str("\n  VIOLATION: ");
            result.push_str(violation);
        }
        result
    }
}

/// Run a DST scenario against a fresh queue of `capacity`.
///
/// Operations run with fault injection; invariants are checked at the end.
pub fn run_dst_scenario<Q: DstTestableQueue>(
    seed: u64,
    capacity: usize,
    operations: Vec<DstOp>,
) -> DstResult {
    let mut runner: DstRunner<Q> = DstRunner::new(seed, capacity);
    let mut errors = Vec::new();

    for op in operations {
        let result = match op {
            DstOp::Put(v) => runner.put(v).map(|_| ()),
            DstOp::Take => runner.take().map(|_| ()),
        };

        // Faults are part of the test, not failures.
        if let Err(fault) = result {
            errors.push(format!("{:?}", fault));
        }
    }

    let violations: Vec<String> = runner
        .check_invariants()
        .into_iter()
        .filter(|r| !r.holds)
        .map(|r| format!("{}: {}", r.name, r.violation.unwrap_or_default()))
        .collect();

    DstResult {
        passed: violations.is_empty(),
        violations,
        stats: runner.stats(),
        fault_errors: errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mutex-around-VecDeque queue for testing the runner itself.
    struct MockQueue {
        items: Mutex<VecDeque<u64>>,
        capacity: usize,
    }

    impl DstTestableQueue for MockQueue {
        fn with_capacity(capacity: usize) -> Self {
            Self {
                items: Mutex::new(VecDeque::new()),
                capacity,
            }
        }

        fn try_put(&self, item: u64) -> bool {
            let mut items = self.items.lock().unwrap();
            if items.len() >= self.capacity {
                return false;
            }
            items.push_back(item);
            true
        }

        fn try_take(&self) -> Option<u64> {
            self.items.lock().unwrap().pop_front()
        }

        fn put(&self, item: u64) -> bool {
            while !self.try_put(item) {
                std::thread::yield_now();
            }
            true
        }

        fn take(&self) -> Option<u64> {
            loop {
                if let Some(item) = self.try_take() {
                    return Some(item);
                }
                std::thread::yield_now();
            }
        }

        fn len(&self) -> usize {
            self.items.lock().unwrap().len()
        }

        fn capacity(&self) -> usize {
            self.capacity
        }

        fn contents(&self) -> Vec<u64> {
            self.items.lock().unwrap().iter().copied().collect()
        }
    }

    /// Overwrites the oldest item when full: loses items and breaks FIFO.
    struct OverwritingQueue(MockQueue);

    impl DstTestableQueue for OverwritingQueue {
        fn with_capacity(capacity: usize) -> Self {
            Self(MockQueue::with_capacity(capacity))
        }

        fn try_put(&self, item: u64) -> bool {
            let mut items = self.0.items.lock().unwrap();
            if items.len() >= self.0.capacity {
                items.pop_front();
            }
            items.push_back(item);
            true
        }

        fn try_take(&self) -> Option<u64> {
            self.0.try_take()
        }

        fn put(&self, item: u64) -> bool {
            self.try_put(item)
        }

        fn take(&self) -> Option<u64> {
            self.0.take()
        }

        fn len(&self) -> usize {
            self.0.len()
        }

        fn capacity(&self) -> usize {
            self.0.capacity()
        }

        fn contents(&self) -> Vec<u64> {
            self.0.contents()
        }
    }

    #[test]
    fn test_dst_runner_basic() {
        let mut runner: DstRunner<MockQueue> = DstRunner::new(12345, 2);

        // These might fail due to fault injection, and that's OK
        let _ = runner.put(1);
        let _ = runner.put(2);
        let _ = runner.take();

        assert!(runner.invariants_hold());
    }

    #[test]
    fn test_full_queue_rejects_without_faults() {
        let mut runner: DstRunner<MockQueue> =
            DstRunner::with_fault_config(1, 1, FaultConfig::none());

        assert_eq!(runner.put(10), Ok(true));
        assert_eq!(runner.put(11), Ok(false));
        assert_eq!(runner.take(), Ok(Some(10)));
        assert_eq!(runner.take(), Ok(None));
        assert_eq!(runner.stats().full_rejections, 1);
        assert_eq!(runner.stats().empty_takes, 1);
        assert!(runner.invariants_hold());
    }

    #[test]
    fn test_every_fault_abandons_the_call() {
        let config = FaultConfig {
            failure_probability: 1.0,
        };
        let mut runner: DstRunner<MockQueue> = DstRunner::with_fault_config(9, 2, config);

        // Interrupted before the operation: nothing reaches the queue.
        assert_eq!(runner.put(1), Err(FaultType::Interrupted));
        assert_eq!(runner.take(), Err(FaultType::Interrupted));
        assert!(runner.queue().is_empty());

        let stats = runner.stats();
        assert_eq!(stats.operations_count, 0);
        assert_eq!(stats.faults_injected, 2);
        assert_eq!(stats.abandoned_operations, stats.faults_injected);
        assert!(runner.invariants_hold());
    }

    #[test]
    fn test_dst_scenario() {
        let ops = vec![
            DstOp::Put(100),
            DstOp::Put(200),
            DstOp::Take,
            DstOp::Put(300),
            DstOp::Put(400),
            DstOp::Take,
        ];

        let result = run_dst_scenario::<MockQueue>(12345, 2, ops);
        assert!(result.passed, "DST failed: {}", result.format());
    }

    #[test]
    fn test_overwriting_queue_caught() {
        let ops = vec![DstOp::Put(1), DstOp::Put(2), DstOp::Put(3)];
        let mut runner: DstRunner<OverwritingQueue> =
            DstRunner::with_fault_config(5, 2, FaultConfig::none());
        for op in ops {
            if let DstOp::Put(v) = op {
                runner.put(v).unwrap();
            }
        }

        let failed: Vec<&str> = runner
            .check_invariants()
            .iter()
            .filter(|r| !r.holds)
            .map(|r| r.name)
            .collect();
        assert!(failed.contains(&"NoLostItems"), "failed: {:?}", failed);
    }

    #[test]
    fn test_determinism() {
        let ops = vec![DstOp::Put(1), DstOp::Put(2), DstOp::Take, DstOp::Take];

        let result1 = run_dst_scenario::<MockQueue>(42, 4, ops.clone());
        let result2 = run_dst_scenario::<MockQueue>(42, 4, ops);

        assert_eq!(result1.stats.faults_injected, result2.stats.faults_injected);
        assert_eq!(result1.fault_errors, result2.fault_errors);
    }
}
