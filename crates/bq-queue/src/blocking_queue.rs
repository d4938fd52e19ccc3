//! Bounded blocking queue over a circular buffer.
//!
//! # Algorithm
//!
//! The classic two-condition design: one mutex guards the whole ring, and
//! two condition variables park threads by predicate class.
//!
//! ```text
//!            put / offer                         take / poll
//!                │                                   │
//!   full? ──> wait(not_full)             empty? ──> wait(not_empty)
//!                │                                   │
//!   slots[tail] = item                  item = slots[head].take()
//!   tail = (tail + 1) % cap             head = (head + 1) % cap
//!   count += 1                          count -= 1
//!   not_empty.notify_one()              not_full.notify_one()
//! ```
//!
//! # Invariants
//!
//! | Property | Verified By |
//! |----------|-------------|
//! | BoundedCapacity | stateright, DST, proptest |
//! | FifoOrder | stateright, DST, proptest |
//! | NoLostItems | stateright, DST, stress harness |
//! | NoLostWakeup | stateright, loom |
//!
//! Every wait sits in a loop that re-checks its predicate, so spurious
//! wake-ups and waiters racing for the same slot are harmless.
//!
//! # Interruption
//!
//! Each thread owns its interrupt flag (see [`crate::interrupt`]).
//! [`BlockingQueue::interrupt`] raises a thread's flag and wakes every
//! waiter; the flag is consumed by the thread's first wait that would
//! block, which then fails with the item (if any) handed back and the ring
//! untouched. The queue stores nothing per thread.

#[cfg(loom)]
use loom::sync::{Condvar, Mutex, MutexGuard};
#[cfg(not(loom))]
use std::sync::{Condvar, Mutex, MutexGuard};

use std::fmt;
use std::sync::PoisonError;
use std::time::{Duration, Instant};

use bq_dst::DstTestableQueue;
use tracing::{debug, trace};

use crate::error::{OfferError, PutError, QueueError};
use crate::interrupt::{self, InterruptHandle};

/// A fixed-capacity FIFO queue that blocks producers when full and
/// consumers when empty.
///
/// All operations take `&self`; share the queue with `Arc` or scoped
/// threads.
pub struct BlockingQueue<T> {
    ring: Mutex<Ring<T>>,
    /// Consumers park here while the ring is empty.
    not_empty: Condvar,
    /// Producers park here while the ring is full.
    not_full: Condvar,
    capacity: usize,
}

/// Everything the mutex guards.
struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    count: usize,
}

/// When a bounded wait gives up.
#[derive(Debug, Clone, Copy)]
enum Deadline {
    Never,
    At(Instant),
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        // A timeout too large for `Instant` never expires.
        Instant::now()
            .checked_add(timeout)
            .map_or(Deadline::Never, Deadline::At)
    }
}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    /// Store at `tail`, or hand the item back if there is no room.
    fn push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        debug_assert!(self.slots[self.tail].is_none(), "tail slot occupied");
        self.slots[self.tail] = Some(item);
        self.tail += 1;
        if self.tail == self.capacity() {
            self.tail = 0;
        }
        self.count += 1;
        Ok(())
    }

    /// Move the item at `head` out, leaving the slot empty.
    fn pop(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        debug_assert!(item.is_some(), "head slot empty with count > 0");
        self.head += 1;
        if self.head == self.capacity() {
            self.head = 0;
        }
        self.count -= 1;
        item
    }

    /// Live items, head to tail.
    fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.count).filter_map(move |i| self.slots[(self.head + i) % self.capacity()].as_ref())
    }
}

impl<T> BlockingQueue<T> {
    /// Create an empty queue holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// `QueueError::InvalidArgument` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::InvalidArgument(
                "capacity must be positive".to_string(),
            ));
        }
        debug!(capacity, "blocking queue created");
        Ok(Self {
            ring: Mutex::new(Ring::with_capacity(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Ring<T>> {
        // The ring is only mutated once an operation cannot fail, so a
        // panic elsewhere never leaves it half-updated.
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `item` at the tail, waiting as long as necessary for space.
    ///
    /// # Errors
    ///
    /// [`PutError`] carrying `item` back if the calling thread is
    /// interrupted while waiting. Nothing is inserted.
    pub fn put(&self, item: T) -> Result<(), PutError<T>> {
        self.enqueue(item, Deadline::Never).map_err(|e| PutError(e.into_inner()))
    }

    /// Insert `item` at the tail, waiting at most `timeout` for space.
    ///
    /// `Duration::ZERO` never blocks. A timeout is reported no earlier
    /// than `timeout` after the call started.
    ///
    /// # Errors
    ///
    /// `OfferError::Timeout` if no space appeared in time,
    /// `OfferError::Interrupted` if the wait was interrupted. Both return
    /// `item` and leave the queue unchanged.
    pub fn offer(&self, item: T, timeout: Duration) -> Result<(), OfferError<T>> {
        self.enqueue(item, Deadline::after(timeout))
    }

    /// Insert `item` only if there is space right now.
    ///
    /// # Errors
    ///
    /// Returns `item` if the queue is full.
    pub fn try_put(&self, item: T) -> Result<(), T> {
        let mut ring = self.lock();
        ring.push(item)?;
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the head item, waiting as long as necessary for one.
    ///
    /// # Errors
    ///
    /// `QueueError::Interrupted` if the calling thread is interrupted
    /// while waiting. Nothing is removed.
    pub fn take(&self) -> Result<T, QueueError> {
        match self.dequeue(Deadline::Never)? {
            Some(item) => Ok(item),
            // A deadline of `Never` cannot expire.
            None => Err(QueueError::Interrupted),
        }
    }

    /// Remove the head item, waiting at most `timeout` for one.
    ///
    /// `Ok(None)` means the timeout elapsed with the queue still empty;
    /// it is never confused with a stored value.
    ///
    /// # Errors
    ///
    /// `QueueError::Interrupted` if the wait was interrupted.
    pub fn poll(&self, timeout: Duration) -> Result<Option<T>, QueueError> {
        self.dequeue(Deadline::after(timeout))
    }

    /// Remove the head item only if one is available right now.
    pub fn try_take(&self) -> Option<T> {
        let mut ring = self.lock();
        let item = ring.pop()?;
        self.not_full.notify_one();
        Some(item)
    }

    fn enqueue(&self, item: T, deadline: Deadline) -> Result<(), OfferError<T>> {
        let mut ring = self.lock();
        let mut item = item;

        loop {
            match ring.push(item) {
                Ok(()) => {
                    self.not_empty.notify_one();
                    return Ok(());
                }
                Err(rejected) => item = rejected,
            }

            let remaining = match deadline {
                Deadline::Never => None,
                Deadline::At(at) => {
                    let remaining = at.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        trace!(capacity = self.capacity, "offer timed out");
                        return Err(OfferError::Timeout(item));
                    }
                    Some(remaining)
                }
            };

            if interrupt::clear_current() {
                debug!("enqueue interrupted");
                return Err(OfferError::Interrupted(item));
            }

            trace!(capacity = self.capacity, "queue full, waiting for space");
            ring = match remaining {
                None => self.not_full.wait(ring).unwrap_or_else(PoisonError::into_inner),
                Some(remaining) => {
                    self.not_full
                        .wait_timeout(ring, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    fn dequeue(&self, deadline: Deadline) -> Result<Option<T>, QueueError> {
        let mut ring = self.lock();

        loop {
            if let Some(item) = ring.pop() {
                self.not_full.notify_one();
                return Ok(Some(item));
            }

            let remaining = match deadline {
                Deadline::Never => None,
                Deadline::At(at) => {
                    let remaining = at.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        trace!("poll timed out");
                        return Ok(None);
                    }
                    Some(remaining)
                }
            };

            if interrupt::clear_current() {
                debug!("dequeue interrupted");
                return Err(QueueError::Interrupted);
            }

            trace!("queue empty, waiting for an item");
            ring = match remaining {
                None => self.not_empty.wait(ring).unwrap_or_else(PoisonError::into_inner),
                Some(remaining) => {
                    self.not_empty
                        .wait_timeout(ring, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Interrupt the target thread's current or next blocking wait.
    ///
    /// Wakes every waiter on this queue so the target notices; the others
    /// re-check their predicate and go back to sleep. A target blocked on a
    /// different queue sees the flag only when that queue wakes it.
    pub fn interrupt(&self, target: &InterruptHandle) {
        // Raised before locking: a waiter checks the flag under the lock,
        // so it either sees it or is already parked for the notify below.
        target.raise();
        let _ring = self.lock();
        debug!(thread = ?target.thread_id(), "interrupt requested");
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Number of items stored. Stale as soon as it returns.
    pub fn len(&self) -> usize {
        self.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.lock().count == 0
    }

    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    /// Free slots. Stale as soon as it returns.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.lock().count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clones of the stored items, head to tail.
    pub(crate) fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.lock().iter().cloned().collect()
    }
}

impl<T> fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ring = self.lock();
        f.debug_struct("BlockingQueue")
            .field("capacity", &self.capacity)
            .field("len", &ring.count)
            .field("head", &ring.head)
            .field("tail", &ring.tail)
            .finish_non_exhaustive()
    }
}

impl DstTestableQueue for BlockingQueue<u64> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    fn with_capacity(capacity: usize) -> Self {
        match Self::new(capacity) {
            Ok(queue) => queue,
            Err(e) => panic!("DST queue construction failed: {}", e),
        }
    }

    fn try_put(&self, item: u64) -> bool {
        BlockingQueue::try_put(self, item).is_ok()
    }

    fn try_take(&self) -> Option<u64> {
        BlockingQueue::try_take(self)
    }

    fn put(&self, item: u64) -> bool {
        BlockingQueue::put(self, item).is_ok()
    }

    fn take(&self) -> Option<u64> {
        BlockingQueue::take(self).ok()
    }

    fn len(&self) -> usize {
        BlockingQueue::len(self)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn contents(&self) -> Vec<u64> {
        self.snapshot()
    }
}



/// Loom tests - these exhaustively check interleavings.
///
/// ```bash
/// RUSTFLAGS="--cfg loom" cargo test -p bq-queue --lib --release loom_tests
/// ```
#[cfg(loom)]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;

    #[test]
    fn test_put_blocks_until_take() {
        loom::model(|| {
            let queue = Arc::new(BlockingQueue::new(1).unwrap());
            queue.put(1).unwrap();

            let q = Arc::clone(&queue);
            let producer = loom::thread::spawn(move || {
                q.put(2).unwrap();
            });

            assert_eq!(queue.take().unwrap(), 1);
            producer.join().unwrap();
            assert_eq!(queue.take().unwrap(), 2);
        });
    }

    #[test]
    fn test_two_consumers_one_producer() {
        loom::model(|| {
            let queue = Arc::new(BlockingQueue::new(1).unwrap());

            let consumers: Vec<_> = (0..2)
                .map(|_| {
                    let q = Arc::clone(&queue);
                    loom::thread::spawn(move || q.take().unwrap())
                })
                .collect();

            queue.put(1).unwrap();
            queue.put(2).unwrap();

            let mut got: Vec<u64> = consumers.into_iter().map(|h| h.join().unwrap()).collect();
            got.sort_unstable();
            assert_eq!(got, vec![1, 2], "lost wake-up or lost item");
        });
    }

    #[test]
    fn test_two_producers_full_queue() {
        loom::model(|| {
            let queue = Arc::new(BlockingQueue::new(1).unwrap());

            let producers: Vec<_> = (1..=2_u64)
                .map(|v| {
                    let q = Arc::clone(&queue);
                    loom::thread::spawn(move || q.put(v).unwrap())
                })
                .collect();

            let mut got = vec![queue.take().unwrap(), queue.take().unwrap()];
            for h in producers {
                h.join().unwrap();
            }
            got.sort_unstable();
            assert_eq!(got, vec![1, 2]);
            assert!(queue.is_empty());
        });
    }
}
