//! Error taxonomy for card analysis and grading.

use std::time::Duration;

use thiserror::Error;

use crate::domain::Component;

/// Errors produced by the preprocessor, analyzers and grading engine.
///
/// `ComponentAnalysis` and `AnalysisTimeout` are recoverable: the grading
/// engine substitutes a neutral score for a single failed component. Every
/// other variant is fatal for the run that raised it.
#[derive(Debug, Error)]
pub enum GradingError {
    /// Input could not be decoded, or is too small to grade.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Invalid weights, grade table, or grading standard.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single analyzer could not extract its feature.
    #[error("{component} analysis failed: {reason}")]
    ComponentAnalysis {
        /// The analyzer that failed.
        component: Component,
        /// Human-readable failure reason.
        reason: String,
    },

    /// A single analyzer exceeded its time budget.
    #[error("{component} analysis exceeded its {budget:?} time budget")]
    AnalysisTimeout {
        /// The analyzer that timed out.
        component: Component,
        /// The budget that was exceeded.
        budget: Duration,
    },

    /// Not enough evidence to grade the card.
    #[error("analysis failed: {0}")]
    Analysis(String),

    /// The run was cancelled by the caller.
    #[error("analysis cancelled")]
    Cancelled,
}

impl GradingError {
    /// Shorthand for a [`GradingError::ComponentAnalysis`] error.
    pub fn component(component: Component, reason: impl Into<String>) -> Self {
        Self::ComponentAnalysis {
            component,
            reason: reason.into(),
        }
    }

    /// Returns `true` if the grading engine can recover from this error by
    /// substituting a neutral component score.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ComponentAnalysis { .. } | Self::AnalysisTimeout { .. }
        )
    }
}

/// Alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GradingError>;
