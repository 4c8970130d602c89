//! Messages exchanged with the acquisition service over the live stream.
//!
//! Frames are JSON text of the form `{"event": <name>, "data": <payload>}`.

use crate::core::Sample;
use serde::{Deserialize, Serialize};

/// One-way commands sent to the acquisition service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamCommand {
    StartCollection,
    StopCollection,
}

impl StreamCommand {
    /// Event name on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamCommand::StartCollection => "start_ecg",
            StreamCommand::StopCollection => "stop_ecg",
        }
    }

    /// Encode as a text frame.
    pub fn to_frame(&self) -> String {
        serde_json::json!({ "event": self.event_name() }).to_string()
    }
}

/// Inbound event name carrying one live reading.
pub const SAMPLE_EVENT: &str = "live_ecg_data";

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LiveReading {
    time: f64,
    ecg: f64,
}

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Sample(Sample),
    /// Some other event the client does not act on
    Ignored(String),
}

/// Decode an inbound text frame.
pub fn decode_frame(text: &str) -> Result<InboundFrame, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(text)?;
    if envelope.event != SAMPLE_EVENT {
        return Ok(InboundFrame::Ignored(envelope.event));
    }
    let reading: LiveReading =
        serde_json::from_value(envelope.data.unwrap_or(serde_json::Value::Null))?;
    Ok(InboundFrame::Sample(Sample::new(reading.time, reading.ecg)))
}

/// State of the streaming connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No attempt has completed yet
    #[default]
    Connecting,
    Connected,
    /// Lost or unreachable; the client keeps retrying
    Disconnected(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// Events delivered from the ingestion client to its consumer, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Sample(Sample),
    Status(ConnectionStatus),
}
