//! Ports between the grading core and its adapters.

mod image_source;
mod progress;
mod report_output;

pub use image_source::ImageSource;
pub use progress::{ProgressEvent, ProgressSink};
pub use report_output::ReportOutput;
