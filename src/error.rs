//! Error types shared across the client.
//!
//! Every I/O failure is caught at the component that performed it and
//! converted into one of these values; none escape as panics.

use thiserror::Error;

/// The streaming channel could not be reached or dropped.
///
/// Never fatal: the ingestion client logs it, reports
/// [`ConnectionStatus::Disconnected`](crate::stream::ConnectionStatus) and
/// keeps retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("send failed: {0}")]
    Send(String),

    #[error("connection dropped: {0}")]
    Dropped(String),

    #[error("closed by server")]
    ClosedByServer,
}

/// A batch dataset or summary request failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("service returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("unreadable response: {0}")]
    Malformed(String),

    #[error("summary unavailable: {0}")]
    SummaryUnavailable(String),
}

impl FetchError {
    /// Whether the analysis service answered but had no summary to give.
    pub fn is_summary_unavailable(&self) -> bool {
        matches!(self, FetchError::SummaryUnavailable(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Malformed(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// A dataset row that could not be read as two numbers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    /// 1-based line number in the payload, header included
    pub line: usize,
    pub reason: String,
}
