//! # bq-stateright
//!
//! Stateright model of the one-mutex, two-condition bounded queue.
//!
//! The model explores every interleaving of a few producers and consumers
//! over a small capacity, including every choice of which waiter a
//! `notify_one` wakes, and checks the queue invariants in each state.
//!
//! ## Usage
//!
//! 1. Model checking:
//!    ```ignore
//!    cargo test -p bq-stateright
//!    ```
//!
//! 2. Checking a configuration and reading the results:
//!    ```ignore
//!    use bq_stateright::{verify, QueueModel, SignalPolicy, VerifierConfig};
//!    let model = QueueModel::new(1, 2, 2, 2).with_policy(SignalPolicy::SingleCondition);
//!    let result = verify(&model, &VerifierConfig::default());
//!    println!("{}", result.format());
//!    ```
//!
//! ## Modules
//!
//! - `model`: the state machine and its properties
//! - `verifier`: runs the checker and converts discoveries into
//!   `bq-core` results with counterexamples

pub mod model;
pub mod verifier;

pub use model::{Condition, Pc, QueueAction, QueueModel, QueueState, Role, SignalPolicy, ThreadState};
pub use verifier::{replay, verify, VerificationResult, VerifierConfig};
