//! Bounded blocking queue invariants.
//!
//! # Model Mapping
//!
//! | Property | Description |
//! |----------|-------------|
//! | NoLostItems | Every produced item is in the queue or was consumed |
//! | NoDuplicates | No item is consumed twice or stored twice |
//! | FifoOrder | Items are consumed in production order |
//! | BoundedCapacity | The queue never holds more than `capacity` items |
//!
//! Items are `u64` tags. Checkers assume tags are unique per run, which is
//! how every harness in this workspace produces them.

use std::collections::HashSet;

use crate::counterexample::{Counterexample, StateSnapshot};
use crate::property::{PropertyChecker, PropertyResult};

const MODEL: &str = "bounded_queue";

/// Observation surface of a bounded queue implementation.
pub trait BoundedQueueProperties {
    /// All items successfully enqueued, in enqueue order.
    fn produced_items(&self) -> Vec<u64>;

    /// All items dequeued, in dequeue order.
    fn consumed_items(&self) -> Vec<u64>;

    /// Items currently stored, head to tail.
    fn current_contents(&self) -> Vec<u64>;

    /// Fixed capacity of the queue.
    fn capacity(&self) -> usize;
}

/// Property checker for bounded queue implementations.
pub struct BoundedQueuePropertyChecker<'a, T: BoundedQueueProperties> {
    queue: &'a T,
    dst_seed: Option<u64>,
}

impl<'a, T: BoundedQueueProperties> BoundedQueuePropertyChecker<'a, T> {
    #[must_use]
    pub fn new(queue: &'a T) -> Self {
        Self {
            queue,
            dst_seed: None,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        debug_assert!(seed != 0, "DST seed should not be zero");
        self.dst_seed = Some(seed);
        self
    }

    fn counterexample(&self) -> Counterexample {
        match self.dst_seed {
            Some(seed) => Counterexample::with_seed(seed),
            None => Counterexample::new(),
        }
    }

    fn check_no_lost_items(&self) -> PropertyResult {
        let produced = self.queue.produced_items();
        let consumed: HashSet<u64> = self.queue.consumed_items().into_iter().collect();
        let contents: HashSet<u64> = self.queue.current_contents().into_iter().collect();

        for item in &produced {
            if !consumed.contains(item) && !contents.contains(item) {
                let mut ce = self.counterexample();
                ce.add_state(StateSnapshot {
                    step: 1,
                    description: format!("Item {} lost", item),
                    variables: vec![
                        ("produced".to_string(), format!("{:?}", produced)),
                        ("consumed".to_string(), format!("{:?}", consumed)),
                        ("contents".to_string(), format!("{:?}", contents)),
                    ],
                });
                return PropertyResult::fail(
                    "NoLostItems",
                    MODEL,
                    format!("Item {} was produced but is neither queued nor consumed", item),
                    Some(ce),
                );
            }
        }

        PropertyResult::pass("NoLostItems", MODEL)
    }

    fn check_no_duplicates(&self) -> PropertyResult {
        let mut seen = HashSet::new();
        let consumed = self.queue.consumed_items();
        let contents = self.queue.current_contents();

        for item in consumed.iter().chain(contents.iter()) {
            if !seen.insert(*item) {
                return PropertyResult::fail(
                    "NoDuplicates",
                    MODEL,
                    format!(
                        "Item {} observed twice (consumed={:?}, contents={:?})",
                        item, consumed, contents
                    ),
                    None,
                );
            }
        }

        PropertyResult::pass("NoDuplicates", MODEL)
    }

    /// Consumed items followed by current contents must equal the
    /// production sequence.
    fn check_fifo_order(&self) -> PropertyResult {
        let produced = self.queue.produced_items();
        let observed: Vec<u64> = self
            .queue
            .consumed_items()
            .into_iter()
            .chain(self.queue.current_contents())
            .collect();

        for (i, (got, want)) in observed.iter().zip(produced.iter()).enumerate() {
            if got != want {
                let mut ce = self.counterexample();
                ce.add_state(StateSnapshot {
                    step: 1,
                    description: format!("Position {} out of order", i),
                    variables: vec![
                        ("produced".to_string(), format!("{:?}", produced)),
                        ("observed".to_string(), format!("{:?}", observed)),
                    ],
                });
                return PropertyResult::fail(
                    "FifoOrder",
                    MODEL,
                    format!("Position {} holds {} but {} was produced there", i, got, want),
                    Some(ce),
                );
            }
        }

        PropertyResult::pass("FifoOrder", MODEL)
    }

    fn check_bounded_capacity(&self) -> PropertyResult {
        let len = self.queue.current_contents().len();
        let capacity = self.queue.capacity();

        if len > capacity {
            return PropertyResult::fail(
                "BoundedCapacity",
                MODEL,
                format!("Queue holds {} items but capacity is {}", len, capacity),
                None,
            );
        }

        PropertyResult::pass("BoundedCapacity", MODEL)
    }
}

impl<'a, T: BoundedQueueProperties> PropertyChecker for BoundedQueuePropertyChecker<'a, T> {
    fn check_all(&self) -> Vec<PropertyResult> {
        vec![
            self.check_no_lost_items(),
            self.check_no_duplicates(),
            self.check_fifo_order(),
            self.check_bounded_capacity(),
        ]
    }
}
