//! Queue errors.
//!
//! Calls that move an item into the queue hand the item back on failure,
//! in the manner of `std::sync::mpsc::SendError`.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Errors raised by queue construction and by blocking dequeues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The wait was interrupted; the queue is unchanged.
    #[error("interrupted while waiting")]
    Interrupted,
}

/// An interrupted `put`. The item was not inserted and is returned here.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PutError<T>(pub T);

impl<T> PutError<T> {
    #[must_use]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutError").finish_non_exhaustive()
    }
}

impl<T> fmt::Display for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("interrupted while waiting for space")
    }
}

impl<T> StdError for PutError<T> {}

impl<T> From<PutError<T>> for QueueError {
    fn from(_: PutError<T>) -> Self {
        QueueError::Interrupted
    }
}

/// A failed `offer`. Either way the item was not inserted and is returned.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum OfferError<T> {
    /// No space became available before the deadline.
    Timeout(T),
    /// The wait was interrupted.
    Interrupted(T),
}

impl<T> OfferError<T> {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, OfferError::Timeout(_))
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, OfferError::Interrupted(_))
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            OfferError::Timeout(item) | OfferError::Interrupted(item) => item,
        }
    }
}

impl<T> fmt::Debug for OfferError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferError::Timeout(_) => f.write_str("Timeout(..)"),
            OfferError::Interrupted(_) => f.write_str("Interrupted(..)"),
        }
    }
}

impl<T> fmt::Display for OfferError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferError::Timeout(_) => f.write_str("timed out waiting for space"),
            OfferError::Interrupted(_) => f.write_str("interrupted while waiting for space"),
        }
    }
}

impl<T> StdError for OfferError<T> {}

impl<T> From<PutError<T>> for OfferError<T> {
    fn from(err: PutError<T>) -> Self {
        OfferError::Interrupted(err.0)
    }
}
