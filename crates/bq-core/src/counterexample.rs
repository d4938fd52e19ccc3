//! Counterexample representation and rendering.
//!
//! When a queue invariant is violated, a counterexample shows the
//! sequence of put/take steps that led to the failure.

use std::fmt;

/// A counterexample showing the failure path.
///
/// Holds state snapshots and the thread interleaving that led to an
/// invariant violation. Renders as a step-by-thread table.
#[derive(Debug, Clone, Default)]
pub struct Counterexample {
    /// Sequence of state snapshots
    pub states: Vec<StateSnapshot>,
    /// Thread interleaving that caused the failure
    pub interleaving: Vec<ThreadAction>,
    /// DST seed for reproduction (if applicable)
    pub dst_seed: Option<u64>,
    /// Human-readable description of the failure
    pub description: Option<String>,
}

/// Snapshot of queue state at a point in time.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Step number in the execution
    pub step: u64,
    /// Description of the state
    pub description: String,
    /// Variable values at this point
    pub variables: Vec<(String, String)>,
}

/// Action taken by a thread.
#[derive(Debug, Clone)]
pub struct ThreadAction {
    pub thread_id: u64,
    pub step: u64,
    /// e.g. `put(7)`, `take()`, `wait(not_full)`
    pub action: String,
    pub success: bool,
}

impl Counterexample {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counterexample with DST seed for reproduction.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        debug_assert!(seed != 0, "DST seed should not be zero");
        Self {
            dst_seed: Some(seed),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a state snapshot. Steps must be strictly increasing.
    pub fn add_state(&mut self, state: StateSnapshot) {
        debug_assert!(
            self.states.last().map_or(true, |last| state.step > last.step),
            "States must be added in order"
        );
        self.states.push(state);
    }

    pub fn add_action(&mut self, action: ThreadAction) {
        self.interleaving.push(action);
    }

    /// Render the counterexample as a thread diagram.
    ///
    /// ```text
    /// DST_SEED=12345
    ///
    /// Step | Thread 0 | Thread 1 | State
    /// -----|----------|----------|------
    ///    1 | put(1) |          | count=1
    ///    2 |          | take() | count=0
    /// ```
    #[must_use]
    pub fn render_diagram(&self) -> String {
        let mut output = String::new();

        if let Some(seed) = self.dst_seed {
            output.push_str(&format!("DST_SEED={}\n\n", seed));
        }

        if let Some(desc) = &self.description {
            output.push_str("Failure: ");
            output.push_str(desc);
            output.push_str("\n\n");
        }

        let mut threads: Vec<u64> = self.interleaving.iter().map(|a| a.thread_id).collect();
        threads.sort_unstable();
        threads.dedup();

        if threads.is_empty() {
            // Single-threaded failures only carry state snapshots.
            for state in &self.states {
                output.push_str(&format!("{:4} | {}\n", state.step, state.description));
                for (name, value) in &state.variables {
                    output.push_str(&format!("     |   {} = {}\n", name, value));
                }
            }
            if self.states.is_empty() {
                output.push_str("(no thread actions recorded)\n");
            }
            return output;
        }

        output.push_str("Step |");
        for tid in &threads {
            output.push_str(&format!(" Thread {} |", tid));
        }
        output.push_str(" State\n");

        output.push_str("-----|");
        for _ in &threads {
            output.push_str("----------|");
        }
        output.push_str("------\n");

        let max_step = self.interleaving.iter().map(|a| a.step).max().unwrap_or(0);

        for step in 1..=max_step {
            output.push_str(&format!("{:4} |", step));

            for tid in &threads {
                let action = self
                    .interleaving
                    .iter()
                    .find(|a| a.step == step && a.thread_id == *tid);

                match action {
                    Some(a) => {
                        let status = if a.success { "" } else { " [FAIL]" };
                        output.push_str(&format!(" {}{} |", a.action, status));
                    }
                    None => output.push_str("          |"),
                }
            }

            if let Some(state) = self.states.iter().find(|s| s.step == step) {
                output.push_str(&format!(" {}", state.description));
            }

            output.push('\n');
        }

        output
    }
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_diagram())
    }
}
