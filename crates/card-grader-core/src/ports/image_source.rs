//! Where card images come from.

use crate::domain::CardImage;

/// Port for loading card images.
pub trait ImageSource: Send + Sync {
    /// Iterates the images of this source.
    ///
    /// # Errors
    ///
    /// Individual items are errors when a file cannot be read or decoded;
    /// callers skip them and continue.
    fn images(&self) -> Box<dyn Iterator<Item = anyhow::Result<CardImage>> + Send + '_>;

    /// Number of images, if known up front.
    fn count_hint(&self) -> Option<usize>;
}
