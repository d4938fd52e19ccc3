//! Per-thread interrupt flags.
//!
//! Rust threads carry no interrupt status, so each thread lazily gets a
//! shared flag in thread-local storage. An [`InterruptHandle`] is a second
//! reference to that flag: it lets another thread raise it, and it is the
//! only thing that outlives the thread. Queues keep no per-thread state.
//!
//! A raised flag is consumed by the owning thread's next wait that would
//! block, on any queue, or by [`clear_current`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

#[cfg(loom)]
loom::thread_local! {
    static CURRENT: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
}
#[cfg(not(loom))]
std::thread_local! {
    static CURRENT: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
}

/// Lets other threads interrupt the thread that created it.
///
/// Obtain one on the target thread with [`InterruptHandle::current`] and
/// pass it to [`BlockingQueue::interrupt`](crate::BlockingQueue::interrupt).
/// Handles are cheap to clone. Raising the flag of a thread that has
/// already exited has no effect and retains nothing.
#[derive(Clone)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
    thread: ThreadId,
}

impl InterruptHandle {
    /// Handle for the calling thread.
    pub fn current() -> Self {
        Self {
            flag: CURRENT.with(Arc::clone),
            thread: thread::current().id(),
        }
    }

    /// The thread this handle interrupts.
    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    /// Whether an interrupt is pending for the thread.
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub(crate) fn raise(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn holders(&self) -> usize {
        Arc::strong_count(&self.flag)
    }
}

impl fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("thread", &self.thread)
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

/// Drop the calling thread's pending interrupt, returning whether there
/// was one.
pub fn clear_current() -> bool {
    CURRENT.with(|flag| flag.swap(false, Ordering::SeqCst))
}
