//! Splitting a sample sequence into chart-sized segments.
//!
//! The buffer is walked in non-overlapping strides of `window_size` samples.
//! Every segment after the first is prefixed with the last sample of the one
//! before it, so adjacent chart panels share a boundary point and the trace
//! reads as one continuous line.

use crate::core::sample::Sample;
use serde::{Deserialize, Serialize};

/// Default number of samples per chart panel.
pub const WINDOW_SIZE: usize = 300;

/// One renderable chunk of the buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Zero-based position in the segment sequence
    pub index: usize,
    /// Samples to plot, including the stitched boundary sample for index > 0
    pub samples: Vec<Sample>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// First and last timestamp of the panel.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        Some((self.first()?.timestamp, self.last()?.timestamp))
    }

    /// Lowest and highest amplitude, ignoring NaN rows.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.samples
            .iter()
            .map(|s| s.value)
            .filter(|v| !v.is_nan())
            .fold(None, |range, v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Partition `samples` into boundary-continuous segments.
///
/// Returns `ceil(len / window_size)` segments; an empty input yields none.
/// A `window_size` of zero is treated as one.
pub fn segments(samples: &[Sample], window_size: usize) -> Vec<Segment> {
    let window_size = window_size.max(1);
    let mut out: Vec<Segment> = Vec::with_capacity(samples.len().div_ceil(window_size));

    for (index, stride) in samples.chunks(window_size).enumerate() {
        let mut chunk = Vec::with_capacity(stride.len() + 1);
        if let Some(boundary) = out.last().and_then(Segment::last) {
            chunk.push(*boundary);
        }
        chunk.extend_from_slice(stride);
        out.push(Segment {
            index,
            samples: chunk,
        });
    }

    out
}
