//! # bq-core
//!
//! Core types and invariants for the bounded blocking queue.
//!
//! This crate provides:
//! - `PropertyResult` and `PropertyChecker` for verifying invariants
//! - `Counterexample` for rendering failure paths
//! - `BoundedQueueProperties`, the observation surface a queue exposes
//!   so its invariants can be checked
//!
//! ## Model Traceability
//!
//! Every property carries the name of the model it comes from. The same
//! names are used by the stateright model in `bq-stateright`, so a failure
//! found at runtime can be matched against the exhaustive check.

pub mod counterexample;
pub mod invariants;
pub mod property;

pub use counterexample::{Counterexample, StateSnapshot, ThreadAction};
pub use invariants::{BoundedQueueProperties, BoundedQueuePropertyChecker};
pub use property::{PropertyChecker, PropertyResult};
