//! Port for writing graded cards.

use crate::domain::GradedCard;

/// Port for outputting graded cards.
pub trait ReportOutput: Send + Sync {
    /// Writes one graded card.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write(&self, card: &GradedCard) -> anyhow::Result<()>;

    /// Flushes any buffered output.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn flush(&self) -> anyhow::Result<()>;
}
