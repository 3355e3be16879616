//! Ordered checkpoints for narrowing down where a run went wrong.
//!
//! Checkpoints are evaluated in registration order and evaluation stops at
//! the first failing predicate, so the first failure marks the boundary
//! between the part of the run that behaved and the part that did not.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

type Predicate = Box<dyn Fn() -> bool + Send + Sync>;

struct Checkpoint {
    name: String,
    predicate: Predicate,
    context: Option<Value>,
}

/// An ordered set of named predicates.
#[derive(Default)]
pub struct Checkpoints {
    entries: Vec<Checkpoint>,
}

impl fmt::Debug for Checkpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|c| &c.name))
            .finish()
    }
}

impl Checkpoints {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a checkpoint after the ones already registered.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        predicate: impl Fn() -> bool + Send + Sync + 'static,
        context: Option<Value>,
    ) -> &mut Self {
        self.entries.push(Checkpoint {
            name: name.into(),
            predicate: Box::new(predicate),
            context,
        });
        self
    }

    /// Number of registered checkpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluates checkpoints in order, stopping after the first failure.
    #[must_use]
    pub fn evaluate(&self) -> CheckpointSummary {
        let mut results = Vec::with_capacity(self.entries.len());
        let mut first_failure = None;
        for (index, checkpoint) in self.entries.iter().enumerate() {
            let passed = (checkpoint.predicate)();
            if passed {
                info!(checkpoint = %checkpoint.name, "checkpoint passed");
            } else {
                warn!(
                    checkpoint = %checkpoint.name,
                    context = ?checkpoint.context,
                    "checkpoint failed"
                );
                first_failure = Some(index);
            }
            results.push(CheckpointResult {
                name: checkpoint.name.clone(),
                passed,
                context: checkpoint.context.clone(),
            });
            if !passed {
                break;
            }
        }
        CheckpointSummary {
            results,
            first_failure,
            registered: self.entries.len(),
        }
    }
}

/// Result of one evaluated checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointResult {
    /// Checkpoint name.
    pub name: String,
    /// Whether the predicate held.
    pub passed: bool,
    /// Context registered with the checkpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

/// Ordered results of [`Checkpoints::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    /// Evaluated checkpoints, in registration order.
    pub results: Vec<CheckpointResult>,
    /// Index of the failing checkpoint in `results`.
    pub first_failure: Option<usize>,
    /// Number of checkpoints registered, including unevaluated ones.
    pub registered: usize,
}

impl CheckpointSummary {
    /// Returns `true` if every registered checkpoint passed.
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.first_failure.is_none()
    }

    /// The first failing checkpoint.
    #[must_use]
    pub fn first_failure(&self) -> Option<&CheckpointResult> {
        self.first_failure.and_then(|i| self.results.get(i))
    }
}

impl fmt::Display for CheckpointSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, result) in self.results.iter().enumerate() {
            let mark = if result.passed { "ok  " } else { "FAIL" };
            write!(f, "{:>2}. [{mark}] {}", i + 1, result.name)?;
            if self.first_failure == Some(i) {
                f.write_str("  <-- first failure")?;
            }
            writeln!(f)?;
        }
        let skipped = self.registered - self.results.len();
        if skipped > 0 {
            writeln!(f, "    ({skipped} not evaluated)")?;
        }
        Ok(())
    }
}
