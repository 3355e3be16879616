//! Analyzer trait shared by the four component analyzers.

use tokio_util::sync::CancellationToken;

use super::{Component, ComponentAnalysis, NormalizedImage};
use crate::error::Result;

/// A feature extractor that scores one component of a card.
///
/// Implementations are pure functions of the image: they hold only their
/// configuration and may run concurrently on the same image.
pub trait CardAnalyzer: Send + Sync {
    /// The component this analyzer scores.
    fn component(&self) -> Component;

    /// Scores the card.
    ///
    /// Long-running loops poll `cancel` and return
    /// [`GradingError::Cancelled`](crate::GradingError::Cancelled) once it is
    /// set.
    ///
    /// # Errors
    ///
    /// Returns [`GradingError::ComponentAnalysis`](crate::GradingError::ComponentAnalysis)
    /// if the feature cannot be extracted from this image.
    fn analyze(&self, image: &NormalizedImage, cancel: &CancellationToken)
        -> Result<ComponentAnalysis>;
}
