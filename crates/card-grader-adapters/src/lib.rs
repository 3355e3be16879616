//! Card Grader Adapters - External adapters for card-grader.
//!
//! This crate provides adapters for:
//! - Filesystem image source
//! - Bundled and on-disk reference data (grade tables, standards)

pub mod fs;
pub mod reference;

pub use fs::FsImageSource;
pub use reference::{bundled_grade_table, load_grade_table, standards_dir, StandardRegistry};
