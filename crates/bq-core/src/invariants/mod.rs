//! Invariant traits for the bounded blocking queue.
//!
//! - `bounded_queue`: NoLostItems, NoDuplicates, FifoOrder, BoundedCapacity

pub mod bounded_queue;

pub use bounded_queue::{BoundedQueueProperties, BoundedQueuePropertyChecker};
