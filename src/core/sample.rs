//! ECG samples and the append-only buffer that holds the current session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single (timestamp, amplitude) reading.
///
/// Rows that could not be parsed carry NaN fields rather than being dropped,
/// so `PartialEq` follows IEEE semantics for those.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds, as reported by the acquisition device
    pub timestamp: f64,
    /// Raw ADC amplitude
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Whether both fields parsed to real numbers.
    pub fn is_valid(&self) -> bool {
        !self.timestamp.is_nan() && !self.value.is_nan()
    }
}

/// Buffer errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BufferError {
    #[error("sample at t={received} arrived after t={previous}")]
    OutOfOrder { previous: f64, received: f64 },
}

/// Ordered store of samples for one session.
///
/// Samples are only ever appended in non-decreasing timestamp order, or the
/// whole contents are replaced at once.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    samples: Vec<Sample>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a streamed sample.
    ///
    /// A sample older than the current tail is rejected and the buffer is
    /// left as it was.
    pub fn append(&mut self, sample: Sample) -> Result<(), BufferError> {
        if let Some(last) = self.samples.last() {
            if sample.timestamp < last.timestamp {
                return Err(BufferError::OutOfOrder {
                    previous: last.timestamp,
                    received: sample.timestamp,
                });
            }
        }
        self.samples.push(sample);
        Ok(())
    }

    /// Swap in a complete dataset.
    pub fn replace(&mut self, samples: Vec<Sample>) {
        self.samples = samples;
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_arrival_order() {
        let mut buffer = SampleBuffer::new();
        buffer.append(Sample::new(0.0, 310.0)).unwrap();
        buffer.append(Sample::new(0.004, 312.0)).unwrap();
        buffer.append(Sample::new(0.004, 315.0)).unwrap();

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.as_slice()[2], Sample::new(0.004, 315.0));
    }

    #[test]
    fn test_out_of_order_sample_rejected() {
        let mut buffer = SampleBuffer::new();
        buffer.append(Sample::new(1.0, 300.0)).unwrap();

        let err = buffer.append(Sample::new(0.5, 301.0)).unwrap_err();
        assert_eq!(
            err,
            BufferError::OutOfOrder {
                previous: 1.0,
                received: 0.5
            }
        );
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_replace_and_clear() {
        let mut buffer = SampleBuffer::new();
        buffer.append(Sample::new(5.0, 1.0)).unwrap();

        // A replaced dataset may start before the old tail.
        buffer.replace(vec![Sample::new(0.0, 2.0), Sample::new(0.1, 3.0)]);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.last(), Some(&Sample::new(0.1, 3.0)));

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_nan_sample_is_invalid() {
        assert!(Sample::new(0.0, 1.0).is_valid());
        assert!(!Sample::new(f64::NAN, 1.0).is_valid());
        assert!(!Sample::new(0.0, f64::NAN).is_valid());
    }
}
