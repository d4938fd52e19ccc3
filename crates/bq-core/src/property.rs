//! Property results and the checker trait.

use std::fmt;

use crate::counterexample::Counterexample;

/// Outcome of checking one named invariant.
#[derive(Debug, Clone)]
pub struct PropertyResult {
    /// Property name, e.g. `FifoOrder`.
    pub name: &'static str,
    /// Model the property is traced to.
    pub model: &'static str,
    /// Whether the property held.
    pub holds: bool,
    /// Description of the violation, if any.
    pub violation: Option<String>,
    /// Failure path, when the checker could build one.
    pub counterexample: Option<Counterexample>,
}

impl PropertyResult {
    #[must_use]
    pub fn pass(name: &'static str, model: &'static str) -> Self {
        Self {
            name,
            model,
            holds: true,
            violation: None,
            counterexample: None,
        }
    }

    #[must_use]
    pub fn fail(
        name: &'static str,
        model: &'static str,
        violation: impl Into<String>,
        counterexample: Option<Counterexample>,
    ) -> Self {
        Self {
            name,
            model,
            holds: false,
            violation: Some(violation.into()),
            counterexample,
        }
    }
}

impl fmt::Display for PropertyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.holds {
            write!(f, "[PASS] {} ({})", self.name, self.model)
        } else {
            write!(
                f,
                "[FAIL] {} ({}): {}",
                self.name,
                self.model,
                self.violation.as_deref().unwrap_or("no description")
            )?;
            if let Some(ce) = &self.counterexample {
                write!(f, "\n{}", ce)?;
            }
            Ok(())
        }
    }
}

/// Something that can evaluate a set of invariants.
pub trait PropertyChecker {
    /// Check every property and return one result per property.
    fn check_all(&self) -> Vec<PropertyResult>;

    /// True when every property holds.
    fn all_hold(&self) -> bool {
        self.check_all().iter().all(|r| r.holds)
    }

    /// Only the violated properties.
    fn failures(&self) -> Vec<PropertyResult> {
        self.check_all().into_iter().filter(|r| !r.holds).collect()
    }
}
