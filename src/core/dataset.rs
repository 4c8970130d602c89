//! Parsing of recorded datasets served as delimited text.
//!
//! The payload is one header row followed by `timestamp,value` rows, as
//! written by the acquisition service's logger. Parsing is permissive: a row
//! that does not hold two numbers still yields a sample (with NaN fields) and
//! the load carries on.

use crate::core::sample::Sample;
use crate::error::ParseError;

/// Field separator used by the dataset endpoint.
pub const FIELD_SEPARATOR: char = ',';

/// A parsed dataset plus the rows that did not parse cleanly.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// All data rows, in payload order
    pub samples: Vec<Sample>,
    /// One entry per row that produced a NaN field
    pub rejected: Vec<ParseError>,
}

impl Dataset {
    pub fn malformed_rows(&self) -> usize {
        self.rejected.len()
    }
}

/// Parse a dataset payload.
pub fn parse_dataset(payload: &str) -> Dataset {
    let mut dataset = Dataset::default();

    for (idx, line) in payload.split('\n').enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split(FIELD_SEPARATOR);
        let timestamp = parse_field(fields.next());
        let value = parse_field(fields.next());

        let sample = Sample::new(
            timestamp.unwrap_or(f64::NAN),
            value.unwrap_or(f64::NAN),
        );
        if !sample.is_valid() {
            dataset.rejected.push(ParseError {
                line: idx + 1,
                reason: format!("expected two numeric fields, got {line:?}"),
            });
        }
        dataset.samples.push(sample);
    }

    dataset
}

fn parse_field(field: Option<&str>) -> Option<f64> {
    field?.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_blank_lines_skipped() {
        let payload = "timestamp,ecg_value\n0.000,312\n\n0.004,318.5\n   \n";
        let dataset = parse_dataset(payload);

        assert_eq!(
            dataset.samples,
            vec![Sample::new(0.0, 312.0), Sample::new(0.004, 318.5)]
        );
        assert_eq!(dataset.malformed_rows(), 0);
    }

    #[test]
    fn test_crlf_payload() {
        let dataset = parse_dataset("timestamp,ecg_value\r\n1.0,400\r\n1.5,410\r\n");
        assert_eq!(
            dataset.samples,
            vec![Sample::new(1.0, 400.0), Sample::new(1.5, 410.0)]
        );
    }

    #[test]
    fn test_malformed_row_does_not_abort_load() {
        let mut payload = String::from("timestamp,ecg_value\n");
        for i in 0..5 {
            payload.push_str(&format!("{},{}\n", i as f64 * 0.01, 300 + i));
        }
        payload.push_str("garbage line\n");
        for i in 5..10 {
            payload.push_str(&format!("{},{}\n", i as f64 * 0.01, 300 + i));
        }

        let dataset = parse_dataset(&payload);

        assert_eq!(dataset.samples.len(), 11);
        assert_eq!(dataset.samples.iter().filter(|s| s.is_valid()).count(), 10);
        let bad = dataset.samples[5];
        assert!(bad.timestamp.is_nan());
        assert!(bad.value.is_nan());
        assert_eq!(dataset.rejected.len(), 1);
        assert_eq!(dataset.rejected[0].line, 7);
    }

    #[test]
    fn test_fields_parsed_independently() {
        let dataset = parse_dataset("h\n2.5,\n3.0,abc\n,7\n");

        assert_eq!(dataset.samples.len(), 3);
        assert_eq!(dataset.samples[0].timestamp, 2.5);
        assert!(dataset.samples[0].value.is_nan());
        assert_eq!(dataset.samples[1].timestamp, 3.0);
        assert!(dataset.samples[2].timestamp.is_nan());
        assert_eq!(dataset.samples[2].value, 7.0);
        assert_eq!(dataset.malformed_rows(), 3);
    }

    #[test]
    fn test_extra_columns_ignored() {
        let dataset = parse_dataset("t,v,note\n0.5,250,lead-II\n");
        assert_eq!(dataset.samples, vec![Sample::new(0.5, 250.0)]);
    }

    #[test]
    fn test_empty_and_header_only_payloads() {
        assert!(parse_dataset("").samples.is_empty());
        assert!(parse_dataset("timestamp,ecg_value").samples.is_empty());
        assert!(parse_dataset("timestamp,ecg_value\n").samples.is_empty());
    }
}
