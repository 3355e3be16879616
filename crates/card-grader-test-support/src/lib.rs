//! Test support utilities for card-grader.
//!
//! Provides synthetic card images and mocks of the core ports.
//!
//! # Example
//!
//! ```
//! use card_grader_test_support::{MockImageSource, SyntheticCardBuilder};
//!
//! let perfect = SyntheticCardBuilder::perfect().build_card("synthetic://perfect");
//! let off_center = SyntheticCardBuilder::perfect()
//!     .off_center(28, 0)
//!     .build_card("synthetic://off-center");
//!
//! let source = MockImageSource::new(vec![perfect, off_center]);
//! ```

mod builders;
mod mocks;

pub use builders::SyntheticCardBuilder;
pub use mocks::{MockImageSource, MockProgressSink, MockReportOutput};
