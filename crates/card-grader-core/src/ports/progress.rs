//! Progress reporting port for UI integration.

use crate::domain::GradedCard;

/// Events emitted while a batch of cards is graded.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Grading started for a card.
    Started {
        /// Path to the image.
        path: String,
        /// Index in the batch (0-based).
        index: usize,
        /// Total images in batch, if known.
        total: Option<usize>,
    },
    /// A card was graded.
    Completed {
        /// The graded card.
        card: Box<GradedCard>,
    },
    /// A card was skipped because it could not be loaded or graded.
    Skipped {
        /// Path to the image.
        path: String,
        /// Reason for skipping.
        reason: String,
    },
    /// All cards have been processed.
    Finished {
        /// Cards graded.
        processed: usize,
        /// Cards skipped.
        skipped: usize,
    },
}

/// Port for receiving progress events.
pub trait ProgressSink: Send + Sync {
    /// Called when a progress event occurs.
    fn on_event(&self, event: ProgressEvent);
}
