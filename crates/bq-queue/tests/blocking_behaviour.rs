//! Multi-threaded behaviour of `BlockingQueue`: blocking, timeouts,
//! interruption and hand-off under load.

#![cfg(not(loom))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use bq_queue::{interrupt, BlockingQueue, InterruptHandle, QueueError};

/// Long enough for a spawned thread to reach its wait.
const SETTLE: Duration = Duration::from_millis(50);

#[test]
fn test_put_blocks_until_space() {
    let queue = Arc::new(BlockingQueue::new(1).unwrap());
    queue.put(1_u64).unwrap();

    let returned = Arc::new(AtomicBool::new(false));
    let producer = {
        let queue = Arc::clone(&queue);
        let returned = Arc::clone(&returned);
        thread::spawn(move || {
            queue.put(2).unwrap();
            returned.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(SETTLE);
    assert!(!returned.load(Ordering::SeqCst), "put must block while full");
    assert_eq!(queue.len(), 1);

    assert_eq!(queue.take().unwrap(), 1);
    producer.join().unwrap();
    assert!(returned.load(Ordering::SeqCst));
    assert_eq!(queue.take().unwrap(), 2);
}

#[test]
fn test_take_blocks_until_item() {
    let queue: Arc<BlockingQueue<u64>> = Arc::new(BlockingQueue::new(2).unwrap());
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.take())
    };

    thread::sleep(SETTLE);
    assert!(!consumer.is_finished(), "take must block while empty");

    queue.put(42).unwrap();
    assert_eq!(consumer.join().unwrap(), Ok(42));
    assert!(queue.is_empty());
}

#[test]
fn test_offer_times_out_on_full_queue() {
    let queue = BlockingQueue::new(2).unwrap();
    queue.put(1_u64).unwrap();
    queue.put(2).unwrap();

    let timeout = Duration::from_millis(50);
    let start = Instant::now();
    let err = queue.offer(3, timeout).unwrap_err();
    let elapsed = start.elapsed();

    assert!(err.is_timeout());
    assert_eq!(err.into_inner(), 3);
    assert!(elapsed >= timeout, "timed out after {:?}, before {:?}", elapsed, timeout);
    assert_eq!(queue.len(), 2);
}

#[test]
fn test_poll_times_out_on_empty_queue() {
    let queue: BlockingQueue<u64> = BlockingQueue::new(2).unwrap();

    let timeout = Duration::from_millis(50);
    let start = Instant::now();
    assert_eq!(queue.poll(timeout), Ok(None));
    assert!(start.elapsed() >= timeout);
    assert!(queue.is_empty());
}

#[test]
fn test_offer_succeeds_when_space_frees_in_time() {
    let queue = Arc::new(BlockingQueue::new(1).unwrap());
    queue.put(1_u64).unwrap();

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            queue.take()
        })
    };

    queue.offer(2, Duration::from_secs(10)).unwrap();
    assert_eq!(consumer.join().unwrap(), Ok(1));
    assert_eq!(queue.take().unwrap(), 2);
}

#[test]
fn test_poll_succeeds_when_item_arrives_in_time() {
    let queue: Arc<BlockingQueue<u64>> = Arc::new(BlockingQueue::new(1).unwrap());

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            queue.put(7)
        })
    };

    assert_eq!(queue.poll(Duration::from_secs(10)), Ok(Some(7)));
    producer.join().unwrap().unwrap();
}

#[test]
fn test_interrupt_blocked_put_leaves_queue_unchanged() {
    let queue = Arc::new(BlockingQueue::new(1).unwrap());
    queue.put(String::from("first")).unwrap();

    let (tx, rx) = mpsc::channel();
    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            tx.send(InterruptHandle::current()).unwrap();
            queue.put(String::from("second"))
        })
    };

    let handle = rx.recv().unwrap();
    thread::sleep(SETTLE);
    queue.interrupt(&handle);

    let err = producer.join().unwrap().unwrap_err();
    assert_eq!(err.into_inner(), "second");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.take().unwrap(), "first");

    // A fresh call from the same kind of caller succeeds.
    queue.put(String::from("second")).unwrap();
    assert_eq!(queue.take().unwrap(), "second");
}

#[test]
fn test_interrupt_blocked_poll() {
    let queue: Arc<BlockingQueue<u64>> = Arc::new(BlockingQueue::new(1).unwrap());
    let (tx, rx) = mpsc::channel();
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            tx.send(InterruptHandle::current()).unwrap();
            queue.poll(Duration::from_secs(30))
        })
    };

    let handle = rx.recv().unwrap();
    thread::sleep(SETTLE);
    let start = Instant::now();
    queue.interrupt(&handle);

    assert_eq!(consumer.join().unwrap(), Err(QueueError::Interrupted));
    assert!(start.elapsed() < Duration::from_secs(30));
    assert!(queue.is_empty());
}

#[test]
fn test_interrupt_before_wait_is_observed() {
    let queue: BlockingQueue<u64> = BlockingQueue::new(1).unwrap();
    let me = InterruptHandle::current();
    queue.interrupt(&me);
    assert_eq!(queue.take(), Err(QueueError::Interrupted));
    assert!(!me.is_interrupted());
    assert!(!interrupt::clear_current());
}

#[test]
fn test_interrupt_is_seen_by_wait_on_another_queue() {
    let first: BlockingQueue<u64> = BlockingQueue::new(1).unwrap();
    let second: BlockingQueue<u64> = BlockingQueue::new(1).unwrap();

    // The flag belongs to the thread, not to the queue that raised it.
    first.interrupt(&InterruptHandle::current());
    assert_eq!(second.poll(Duration::from_secs(30)), Err(QueueError::Interrupted));
    assert_eq!(first.poll(Duration::from_millis(10)), Ok(None));
}

#[test]
fn test_interrupts_after_threads_exit_leave_queue_usable() {
    let queue = Arc::new(BlockingQueue::new(1).unwrap());

    let workers: Vec<_> = (0..64_u64)
        .map(|i| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                queue.put(i).unwrap();
                assert_eq!(queue.take(), Ok(i));
                InterruptHandle::current()
            })
        })
        .map(|h| h.join().unwrap())
        .collect();
    for handle in &workers {
        queue.interrupt(handle);
    }

    // Fresh threads start with no interrupt pending.
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.take())
    };
    thread::sleep(SETTLE);
    queue.put(5).unwrap();
    assert_eq!(consumer.join().unwrap(), Ok(5));
}

#[test]
fn test_many_producers_many_consumers_no_loss() {
    const PRODUCERS: u64 = 4;
    const CONSUMERS: u64 = 4;
    const ITEMS: u64 = 2_000;

    let queue = BlockingQueue::new(3).unwrap();
    let total = PRODUCERS * ITEMS;

    let consumed: Vec<u64> = thread::scope(|s| {
        for p in 0..PRODUCERS {
            let queue = &queue;
            s.spawn(move || {
                for i in 0..ITEMS {
                    queue.put(p * ITEMS + i).unwrap();
                }
            });
        }

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let queue = &queue;
                s.spawn(move || {
                    (0..total / CONSUMERS)
                        .map(|_| queue.take().unwrap())
                        .collect::<Vec<u64>>()
                })
            })
            .collect();

        consumers
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    assert_eq!(consumed.len() as u64, total);
    let mut counts: HashMap<u64, u32> = HashMap::new();
    for item in consumed {
        *counts.entry(item).or_default() += 1;
    }
    assert_eq!(counts.len() as u64, total, "items lost");
    assert!(counts.values().all(|&c| c == 1), "items duplicated");
    assert!(queue.is_empty());
}

#[test]
fn test_per_producer_order_preserved() {
    const ITEMS: u64 = 1_000;
    let queue = BlockingQueue::new(2).unwrap();

    let consumed: Vec<(u64, u64)> = thread::scope(|s| {
        for p in 0..2_u64 {
            let queue = &queue;
            s.spawn(move || {
                for i in 0..ITEMS {
                    queue.put((p, i)).unwrap();
                }
            });
        }
        (0..2 * ITEMS).map(|_| queue.take().unwrap()).collect()
    });

    // A single consumer sees each producer's items in enqueue order.
    for p in 0..2_u64 {
        let seen: Vec<u64> = consumed.iter().filter(|(q, _)| *q == p).map(|&(_, i)| i).collect();
        assert_eq!(seen, (0..ITEMS).collect::<Vec<_>>());
    }
}
