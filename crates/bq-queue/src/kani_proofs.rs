//! Kani proof harnesses for the blocking queue's ring arithmetic.
//!
//! # Running the proofs
//!
//! ```bash
//! # Run all proofs
//! cargo kani -p bq-queue
//!
//! # Run a specific proof
//! cargo kani -p bq-queue --harness proof_fifo_across_wraparound
//! ```
//!
//! # Note on concurrency
//!
//! Kani doesn't support actual concurrent execution. These proofs cover
//! the non-blocking paths sequentially; blocking and wake-ups are left to
//! loom and stateright.

#[cfg(kani)]
mod proofs {
    use crate::blocking_queue::BlockingQueue;

    /// The count never exceeds capacity, whatever the operation sequence.
    #[kani::proof]
    #[kani::unwind(8)]
    fn proof_bounded_capacity() {
        let capacity: usize = kani::any();
        kani::assume(capacity >= 1 && capacity <= 3);
        let queue = BlockingQueue::new(capacity).unwrap();

        let mut stored: usize = 0;
        for i in 0..6u64 {
            if kani::any::<bool>() {
                if queue.try_put(i).is_ok() {
                    stored += 1;
                }
            } else if queue.try_take().is_some() {
                stored -= 1;
            }
            kani::assert(queue.len() <= capacity, "len must never exceed capacity");
            kani::assert(queue.len() == stored, "len must match accepted minus taken");
        }
    }

    /// A full queue rejects and hands the item back untouched.
    #[kani::proof]
    #[kani::unwind(4)]
    fn proof_full_rejects() {
        let queue = BlockingQueue::new(2).unwrap();
        queue.try_put(1u64).unwrap();
        queue.try_put(2u64).unwrap();

        let value: u64 = kani::any();
        kani::assert(queue.try_put(value) == Err(value), "full queue must return the item");
        kani::assert(queue.len() == 2, "rejected put must not change len");
    }

    /// An empty queue yields nothing.
    #[kani::proof]
    fn proof_empty_take_returns_none() {
        let queue: BlockingQueue<u64> = BlockingQueue::new(1).unwrap();
        kani::assert(queue.try_take().is_none(), "take on empty queue must return None");
    }

    /// Order survives head and tail wrapping past the end of the slots.
    #[kani::proof]
    #[kani::unwind(6)]
    fn proof_fifo_across_wraparound() {
        let queue = BlockingQueue::new(2).unwrap();

        let v1: u64 = kani::any();
        let v2: u64 = kani::any();
        let v3: u64 = kani::any();

        queue.try_put(v1).unwrap();
        queue.try_put(v2).unwrap();
        kani::assert(queue.try_take() == Some(v1), "first in must be first out");

        // tail wraps to slot 0
        queue.try_put(v3).unwrap();
        kani::assert(queue.try_take() == Some(v2), "second item follows the first");
        kani::assert(queue.try_take() == Some(v3), "wrapped item comes out last");
        kani::assert(queue.is_empty(), "queue must drain");
    }
}

#[cfg(test)]
mod tests {
    // The proofs themselves run with cargo kani.
    #[test]
    fn test_proofs_module_exists() {}
}
