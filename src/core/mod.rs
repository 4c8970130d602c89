//! Core data handling for the ECG session client.
//!
//! This module contains:
//! - The sample type and the append-only session buffer
//! - Segmentation of the buffer into continuous chart panels
//! - Parsing of recorded datasets
//! - The summary metric table

pub mod dataset;
pub mod sample;
pub mod segmentation;
pub mod summary;

// Re-export commonly used types
pub use dataset::{parse_dataset, Dataset};
pub use sample::{BufferError, Sample, SampleBuffer};
pub use segmentation::{segments, Segment, WINDOW_SIZE};
pub use summary::{Metric, MetricValue, Summary};
