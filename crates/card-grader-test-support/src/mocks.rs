//! Mock implementations of core port traits.

use std::sync::{Arc, Mutex, PoisonError};

use card_grader_core::domain::{CardImage, GradedCard};
use card_grader_core::ports::{ImageSource, ProgressEvent, ProgressSink, ReportOutput};

/// Mock implementation of `ImageSource` for testing.
///
/// Yields pre-built cards, plus optional load failures, and tracks iteration.
pub struct MockImageSource {
    images: Vec<CardImage>,
    failures: Vec<String>,
    iteration_count: Arc<Mutex<usize>>,
}

impl MockImageSource {
    /// Creates a new mock source with the given images.
    #[must_use]
    pub fn new(images: Vec<CardImage>) -> Self {
        Self {
            images,
            failures: Vec::new(),
            iteration_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Adds load failures, yielded after the images.
    #[must_use]
    pub fn with_failures(mut self, failures: Vec<String>) -> Self {
        self.failures = failures;
        self
    }

    /// Creates an empty mock source.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(vec![])
    }

    /// Returns the number of times the source has been iterated.
    #[must_use]
    pub fn iteration_count(&self) -> usize {
        *self
            .iteration_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ImageSource for MockImageSource {
    fn images(&self) -> Box<dyn Iterator<Item = anyhow::Result<CardImage>> + Send + '_> {
        let count = Arc::clone(&self.iteration_count);
        if let Ok(mut c) = count.lock() {
            *c += 1;
        }
        let failures = self
            .failures
            .iter()
            .map(|reason| Err(anyhow::anyhow!("{reason}")));
        Box::new(self.images.iter().cloned().map(Ok).chain(failures))
    }

    fn count_hint(&self) -> Option<usize> {
        Some(self.images.len() + self.failures.len())
    }
}

/// Mock implementation of `ReportOutput` for testing.
///
/// Captures graded cards for later assertions.
pub struct MockReportOutput {
    cards: Arc<Mutex<Vec<GradedCard>>>,
    flush_count: Arc<Mutex<usize>>,
}

impl MockReportOutput {
    /// Creates a new mock output.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cards: Arc::new(Mutex::new(Vec::new())),
            flush_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Returns all captured cards.
    #[must_use]
    pub fn cards(&self) -> Vec<GradedCard> {
        self.cards
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of times `flush()` was called.
    #[must_use]
    pub fn flush_count(&self) -> usize {
        *self
            .flush_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockReportOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportOutput for MockReportOutput {
    fn write(&self, card: &GradedCard) -> anyhow::Result<()> {
        self.cards
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(card.clone());
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        if let Ok(mut c) = self.flush_count.lock() {
            *c += 1;
        }
        Ok(())
    }
}

/// Mock implementation of `ProgressSink` for testing.
///
/// Captures events for later assertions.
pub struct MockProgressSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl MockProgressSink {
    /// Creates a new mock progress sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns all captured events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of `Started` events.
    #[must_use]
    pub fn started_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Started { .. }))
            .count()
    }

    /// Returns the number of `Completed` events.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Completed { .. }))
            .count()
    }

    /// Returns the number of `Skipped` events.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Skipped { .. }))
            .count()
    }

    /// Returns whether a `Finished` event was received.
    #[must_use]
    pub fn has_finished(&self) -> bool {
        self.events()
            .iter()
            .any(|e| matches!(e, ProgressEvent::Finished { .. }))
    }

    /// Returns the final counts from the `Finished` event, if any.
    #[must_use]
    pub fn finished_counts(&self) -> Option<(usize, usize)> {
        self.events().iter().find_map(|e| match e {
            ProgressEvent::Finished { processed, skipped } => Some((*processed, *skipped)),
            _ => None,
        })
    }
}

impl Default for MockProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for MockProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
