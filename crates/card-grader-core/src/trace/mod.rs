//! Per-run diagnostics.
//!
//! A [`TraceContext`] is created for one run and records every analyzer call
//! made through [`TraceContext::record`]. It only observes: the values that
//! pass through it are returned unchanged.

mod checkpoints;

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, debug_span, Instrument};
use uuid::Uuid;

use crate::domain::Component;
use crate::error::Result;

pub use checkpoints::{CheckpointResult, CheckpointSummary, Checkpoints};

/// How a traced call ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallOutcome {
    /// The call returned a value.
    Ok,
    /// The call returned an error.
    Failed {
        /// Error message.
        error: String,
    },
}

/// One analyzer call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Causality id of the run the call belongs to.
    pub run_id: Uuid,
    /// Component analyzed.
    pub component: Component,
    /// Entry time, in milliseconds since the context was created.
    pub entered_ms: f64,
    /// Exit time, in milliseconds since the context was created.
    pub exited_ms: f64,
    /// Outcome.
    pub outcome: CallOutcome,
}

impl CallRecord {
    /// Time spent in the call, in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        self.exited_ms - self.entered_ms
    }
}

/// Everything recorded for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceReport {
    /// Causality id of the run.
    pub run_id: Uuid,
    /// Wall-clock start of the run (RFC 3339).
    pub started_at: String,
    /// Time from context creation to [`TraceContext::finish`], in milliseconds.
    pub total_ms: f64,
    /// Analyzer calls in completion order.
    pub calls: Vec<CallRecord>,
    /// Checkpoint results, if any were evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoints: Option<CheckpointSummary>,
}

/// Trace state for a single run.
#[derive(Debug)]
pub struct TraceContext {
    run_id: Uuid,
    started_at: OffsetDateTime,
    started: Instant,
    calls: Mutex<Vec<CallRecord>>,
}

impl TraceContext {
    /// Creates a context with a fresh causality id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4())
    }

    /// Creates a context for an existing causality id.
    #[must_use]
    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: OffsetDateTime::now_utc(),
            started: Instant::now(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Causality id of the run.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// Awaits `call`, recording its entry, exit and outcome for `component`.
    ///
    /// # Errors
    ///
    /// Returns whatever `call` returns.
    pub async fn record<T, F>(&self, component: Component, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let span = debug_span!("analyzer", run_id = %self.run_id, %component);
        let entered_ms = self.elapsed_ms();
        let result = call.instrument(span).await;
        let exited_ms = self.elapsed_ms();
        let outcome = match &result {
            Ok(_) => CallOutcome::Ok,
            Err(err) => CallOutcome::Failed {
                error: err.to_string(),
            },
        };
        debug!(
            %component,
            duration_ms = exited_ms - entered_ms,
            ?outcome,
            "analyzer call recorded"
        );
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CallRecord {
                run_id: self.run_id,
                component,
                entered_ms,
                exited_ms,
                outcome,
            });
        result
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Closes the context, attaching checkpoint results if given.
    #[must_use]
    pub fn finish(self, checkpoints: Option<CheckpointSummary>) -> TraceReport {
        let total_ms = self.elapsed_ms();
        let started_at = self
            .started_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.started_at.to_string());
        TraceReport {
            run_id: self.run_id,
            started_at,
            total_ms,
            calls: self
                .calls
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
            checkpoints,
        }
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}
