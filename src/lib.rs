//! ECG Session Client - live collection and chart segmentation for a remote
//! ECG acquisition service.
//!
//! The client starts and stops collection sessions on the service, buffers
//! the streamed samples, reloads complete recordings, splits them into
//! continuous chart panels, and fetches summary metrics computed by the
//! service. It does no signal processing of its own.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ECG Session Client                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐    ┌──────────────────┐   ┌─────────────┐   │
//! │  │   Stream    │───▶│ Session runtime  │──▶│ Segmentation│   │
//! │  │ (websocket) │    │  └─ Controller   │   │ (300 / pane)│   │
//! │  └─────────────┘    │     └─ Buffer    │   └─────────────┘   │
//! │         ▲           └──────────────────┘                     │
//! │         │ start/stop          │ dataset / summary            │
//! │         │                     ▼                              │
//! │  ┌──────┴──────┐      ┌──────────────┐                       │
//! │  │  Deadline   │      │   Analysis   │                       │
//! │  │   (120 s)   │      │    (HTTP)    │                       │
//! │  └─────────────┘      └──────────────┘                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ecg_session_client::{
//!     stream, AnalysisClient, Config, Services, SessionController, SessionRuntime,
//!     SessionSettings, StreamSettings,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let client = stream::shared(&StreamSettings::from_config(&config));
//! let analysis = Arc::new(AnalysisClient::new(config.service.clone())?);
//!
//! let services = Services {
//!     channel: client.clone(),
//!     datasets: analysis.clone(),
//!     summaries: analysis,
//! };
//! let (controller, deadlines) =
//!     SessionController::new(services, SessionSettings::from_config(&config));
//! let (runtime, handle) = SessionRuntime::new(controller, deadlines, client.take_events());
//! tokio::spawn(runtime.run());
//!
//! handle.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod core;
pub mod error;
pub mod session;
pub mod stream;

// Re-export key types at crate root for convenience
pub use analysis::{AnalysisClient, DatasetSource, SummarySource};
pub use config::{CommandPolicy, Config, ConfigError, ServiceConfig};
pub use core::{parse_dataset, segments, Dataset, Sample, SampleBuffer, Segment, Summary};
pub use error::{ConnectionError, FetchError, ParseError};
pub use session::{
    Outcome, Services, SessionController, SessionError, SessionHandle, SessionRuntime,
    SessionSettings, SessionSnapshot, SessionState,
};
pub use stream::{CollectionChannel, ConnectionStatus, StreamEvent, StreamSettings, StreamingClient};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
