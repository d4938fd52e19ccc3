//! # bq-queue
//!
//! Fixed-capacity blocking FIFO queue for producer/consumer hand-off.
//!
//! The implementation:
//! - Guards one circular buffer with a single mutex
//! - Parks producers and consumers on separate condition variables
//! - Offers blocking (`put`/`take`), timed (`offer`/`poll`) and
//!   non-blocking (`try_put`/`try_take`) variants
//! - Supports per-thread interruption of blocked calls through
//!   [`InterruptHandle`]
//! - Implements `DstTestableQueue` so the `bq-dst` harnesses can drive it
//! - Has loom tests for thread interleavings (under `#[cfg(loom)]`)
//! - Has Kani proofs for the ring arithmetic (under `#[cfg(kani)]`)
//!
//! ```rust
//! use std::time::Duration;
//! use bq_queue::BlockingQueue;
//!
//! let queue = BlockingQueue::new(2).unwrap();
//! queue.put("a").unwrap();
//! queue.put("b").unwrap();
//! assert!(queue.offer("c", Duration::ZERO).unwrap_err().is_timeout());
//! assert_eq!(queue.take().unwrap(), "a");
//! assert_eq!(queue.poll(Duration::from_millis(10)).unwrap(), Some("b"));
//! assert_eq!(queue.poll(Duration::ZERO).unwrap(), None);
//! ```

pub mod blocking_queue;
pub mod error;
pub mod interrupt;
pub mod kani_proofs;

pub use blocking_queue::BlockingQueue;
pub use error::{OfferError, PutError, QueueError};
pub use interrupt::InterruptHandle;
