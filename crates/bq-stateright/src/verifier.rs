//! Runs the stateright checker over a `QueueModel` and reports each
//! property as a `bq-core` `PropertyResult`.
//!
//! Violations of `always` properties, and `sometimes` properties that were
//! never reached, come back as failures. Counterexamples are rebuilt by
//! replaying the discovered action path through the model.

use bq_core::{Counterexample, PropertyResult, StateSnapshot, ThreadAction};
use stateright::{Checker, Expectation, Model};

use crate::model::{Condition, Pc, QueueAction, QueueModel, QueueState};

/// Model name carried in every `PropertyResult`.
pub const MODEL: &str = "bounded_queue_algorithm";

/// Configuration for model checking.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Checker worker threads.
    pub threads: usize,
    /// Stop exploring below this depth, if set.
    pub target_max_depth: Option<usize>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            target_max_depth: None,
        }
    }
}

impl VerifierConfig {
    /// Parallel exploration for larger models.
    pub fn thorough() -> Self {
        Self {
            threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            target_max_depth: None,
        }
    }
}

/// Result of checking one model.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub unique_state_count: usize,
    pub results: Vec<PropertyResult>,
}

impl VerificationResult {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.holds)
    }

    pub fn result(&self, name: &str) -> Option<&PropertyResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn format(&self) -> String {
        let status = if self.passed() { "PASS" } else { "FAIL" };
        let mut output = format!("[{}] {} states", status, self.unique_state_count);
        for result in &self.results {
            output.push_str("\n  ");
            output.push_str(&result.to_string());
        }
        output
    }
}

/// Exhaustively check `model` and report every property.
pub fn verify(model: &QueueModel, config: &VerifierConfig) -> VerificationResult {
    let properties = model.properties();

    let mut builder = model.clone().checker().threads(config.threads.max(1));
    if let Some(depth) = config.target_max_depth {
        builder = builder.target_max_depth(depth);
    }
    let checker = builder.spawn_bfs().join();

    let results = properties
        .iter()
        .map(|property| {
            let discovery = checker.discovery(property.name);
            match (&property.expectation, discovery) {
                (Expectation::Always, Some(path)) | (Expectation::Eventually, Some(path)) => {
                    let actions = path.into_actions();
                    PropertyResult::fail(
                        property.name,
                        MODEL,
                        format!("violated after {} steps", actions.len()),
                        Some(replay(model, &actions, property.name)),
                    )
                }
                (Expectation::Sometimes, None) => {
                    PropertyResult::fail(property.name, MODEL, "never reached", None)
                }
                _ => PropertyResult::pass(property.name, MODEL),
            }
        })
        .collect();

    VerificationResult {
        unique_state_count: checker.unique_state_count(),
        results,
    }
}

/// Rebuild the state sequence for `actions` as a counterexample.
pub fn replay(model: &QueueModel, actions: &[QueueAction], property: &str) -> Counterexample {
    let mut ce = Counterexample::new().with_description(format!("{} violated", property));
    let Some(mut state) = model.init_states().into_iter().next() else {
        return ce;
    };
    ce.add_state(snapshot(0, "initial", &state));

    for (i, action) in actions.iter().enumerate() {
        let step = i as u64 + 1;
        let (thread, label) = describe(model, &state, action);
        let next = model.next_state(&state, action.clone());
        ce.add_action(ThreadAction {
            thread_id: thread as u64,
            step,
            action: label.clone(),
            success: next.is_some(),
        });
        match next {
            Some(next) => {
                state = next;
                ce.add_state(snapshot(step, &label, &state));
            }
            None => break,
        }
    }
    ce
}

fn describe(model: &QueueModel, state: &QueueState, action: &QueueAction) -> (usize, String) {
    let wake = |w: &Option<usize>| w.map(|w| format!(" notify(T{})", w)).unwrap_or_default();
    match action {
        QueueAction::Put { thread, wake: w } => {
            let item = state
                .threads
                .get(*thread)
                .and_then(|t| model.producers.get(*thread)?.get(t.progress))
                .map_or_else(|| "?".to_string(), ToString::to_string);
            (*thread, format!("put({}){}", item, wake(w)))
        }
        QueueAction::Take { thread, wake: w } => (*thread, format!("take(){}", wake(w))),
        QueueAction::Block { thread } => (*thread, "wait".to_string()),
        QueueAction::SpuriousWake { thread } => (*thread, "spurious_wake".to_string()),
    }
}

fn snapshot(step: u64, description: &str, state: &QueueState) -> StateSnapshot {
    let waiting = |condition: Condition| {
        let ids: Vec<String> = state.waiters(condition).map(|t| format!("T{}", t)).collect();
        format!("[{}]", ids.join(","))
    };
    let done = state.threads.iter().filter(|t| t.pc == Pc::Done).count();

    StateSnapshot {
        step,
        description: description.to_string(),
        variables: vec![
            ("buffer".to_string(), format!("{:?}", state.buffer)),
            ("not_empty".to_string(), waiting(Condition::NotEmpty)),
            ("not_full".to_string(), waiting(Condition::NotFull)),
            ("shared".to_string(), waiting(Condition::Shared)),
            ("done".to_string(), format!("{}/{}", done, state.threads.len())),
        ],
    }
}
