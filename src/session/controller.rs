//! Session lifecycle state machine.
//!
//! ```text
//!            start                       stop / deadline
//!   Idle ───────────▶ Collecting ─────────────────────────▶ Idle
//!     │                                                       │
//!     │ visualize            clear / start                    │ deadline load
//!     └──────────▶ Visualizing ─────────────▶ Idle / ...  ◀───┘
//! ```
//!
//! The controller is the only owner of the sample buffer and the summary.
//! Streamed samples, timer expiries and view operations all reach it as
//! method calls made one at a time by the session runtime.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::deadline::{DeadlineFired, DeadlineTimer};
use super::{Outcome, SessionState};
use crate::analysis::{DatasetSource, SummarySource};
use crate::config::Config;
use crate::core::{segments, Sample, SampleBuffer, Segment, Summary, WINDOW_SIZE};
use crate::error::FetchError;
use crate::stream::{CollectionChannel, ConnectionStatus, StreamEvent};

/// Tunables for the controller.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub window_size: usize,
    pub collection_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            collection_timeout: Duration::from_secs(120),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window_size: config.window_size,
            collection_timeout: config.collection_timeout,
        }
    }
}

/// External collaborators injected into the controller.
#[derive(Clone)]
pub struct Services {
    pub channel: Arc<dyn CollectionChannel>,
    pub datasets: Arc<dyn DatasetSource>,
    pub summaries: Arc<dyn SummarySource>,
}

/// Identity of the most recent collection session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// Everything the view layer reads, in one value.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session: Option<SessionInfo>,
    pub sample_count: usize,
    pub segments: Vec<Segment>,
    pub summary: Option<Summary>,
    pub last_error: Option<String>,
    pub connection: ConnectionStatus,
}

pub struct SessionController {
    state: SessionState,
    buffer: SampleBuffer,
    summary: Option<Summary>,
    last_error: Option<String>,
    connection: ConnectionStatus,
    session: Option<SessionInfo>,
    rejected_samples: u64,

    settings: SessionSettings,
    services: Services,

    deadline: Option<DeadlineTimer>,
    generation: u64,
    deadline_tx: mpsc::UnboundedSender<DeadlineFired>,
}

impl SessionController {
    /// Create a controller in `Idle`.
    ///
    /// The returned receiver yields deadline expiries; feed them back through
    /// [`on_deadline`](Self::on_deadline).
    pub fn new(
        services: Services,
        settings: SessionSettings,
    ) -> (Self, mpsc::UnboundedReceiver<DeadlineFired>) {
        let (deadline_tx, deadline_rx) = mpsc::unbounded_channel();
        let controller = Self {
            state: SessionState::Idle,
            buffer: SampleBuffer::new(),
            summary: None,
            last_error: None,
            connection: ConnectionStatus::default(),
            session: None,
            rejected_samples: 0,
            settings,
            services,
            deadline: None,
            generation: 0,
            deadline_tx,
        };
        (controller, deadline_rx)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn samples(&self) -> &[Sample] {
        self.buffer.as_slice()
    }

    /// Current chart segments, derived from the buffer.
    pub fn segments(&self) -> Vec<Segment> {
        segments(self.buffer.as_slice(), self.settings.window_size)
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// Message of the last failed fetch, until cleared or superseded.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn connection(&self) -> &ConnectionStatus {
        &self.connection
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    /// Streamed samples dropped for arriving out of order.
    pub fn rejected_samples(&self) -> u64 {
        self.rejected_samples
    }

    pub fn deadline_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            session: self.session.clone(),
            sample_count: self.buffer.len(),
            segments: self.segments(),
            summary: self.summary.clone(),
            last_error: self.last_error.clone(),
            connection: self.connection.clone(),
        }
    }

    /// Begin a collection session.
    pub fn start(&mut self) -> Outcome {
        if self.state == SessionState::Collecting {
            debug!("already collecting, start ignored");
            return Outcome::Ignored;
        }

        self.cancel_deadline();
        self.buffer.clear();
        self.last_error = None;
        self.state = SessionState::Collecting;
        self.services.channel.emit_start();
        self.arm_deadline();

        let info = SessionInfo {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        };
        info!(
            session = %info.id,
            timeout_secs = self.settings.collection_timeout.as_secs(),
            "collection started"
        );
        self.session = Some(info);
        Outcome::Applied
    }

    /// End the running collection.
    pub fn stop(&mut self) -> Outcome {
        if self.state != SessionState::Collecting {
            debug!(state = %self.state, "not collecting, stop ignored");
            return Outcome::Ignored;
        }
        self.finish_collection("stopped");
        Outcome::Applied
    }

    /// Load the recorded dataset for display.
    pub async fn visualize(&mut self) -> Result<Outcome, FetchError> {
        if self.state == SessionState::Collecting {
            warn!("visualize requested while collecting, ignored");
            return Ok(Outcome::Ignored);
        }
        self.load_dataset().await?;
        Ok(Outcome::Applied)
    }

    /// Drop buffered data, summary and error.
    ///
    /// A running collection keeps running; only its samples so far are
    /// discarded.
    pub fn clear(&mut self) -> Outcome {
        self.buffer.clear();
        self.summary = None;
        self.last_error = None;
        if self.state != SessionState::Collecting {
            self.state = SessionState::Idle;
        }
        debug!(state = %self.state, "cleared");
        Outcome::Applied
    }

    /// Fetch summary metrics for the current dataset.
    ///
    /// On failure the previous summary is kept.
    pub async fn summarize(&mut self) -> Result<Outcome, FetchError> {
        if self.buffer.is_empty() {
            debug!("buffer empty, summarize ignored");
            return Ok(Outcome::Ignored);
        }

        match self.services.summaries.fetch_summary().await {
            Ok(summary) => {
                info!(metrics = summary.metrics.len(), "summary received");
                self.summary = Some(summary);
                self.last_error = None;
                Ok(Outcome::Applied)
            }
            Err(err) => {
                warn!(error = %err, "summary request failed");
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Apply one event from the ingestion client.
    pub fn on_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Sample(sample) => {
                if self.state != SessionState::Collecting {
                    debug!(timestamp = sample.timestamp, "sample outside a collection dropped");
                    return;
                }
                if let Err(err) = self.buffer.append(sample) {
                    self.rejected_samples += 1;
                    warn!(error = %err, "streamed sample dropped");
                }
            }
            StreamEvent::Status(status) => {
                match &status {
                    ConnectionStatus::Connected => info!("acquisition stream connected"),
                    ConnectionStatus::Disconnected(reason) => {
                        warn!(%reason, "acquisition stream disconnected")
                    }
                    ConnectionStatus::Connecting => debug!("acquisition stream connecting"),
                }
                self.connection = status;
            }
        }
    }

    /// Handle an expired deadline.
    ///
    /// Stops the collection and loads the finished dataset. Fire messages
    /// from a cancelled or superseded timer are ignored.
    pub async fn on_deadline(&mut self, fired: DeadlineFired) -> Result<Outcome, FetchError> {
        let live = self.deadline.as_ref().is_some_and(|timer| timer.owns(fired));
        if !live || self.state != SessionState::Collecting {
            debug!(generation = fired.generation, "stale deadline ignored");
            return Ok(Outcome::Ignored);
        }

        info!(
            timeout_secs = self.settings.collection_timeout.as_secs(),
            "collection deadline reached"
        );
        self.finish_collection("deadline reached");
        self.load_dataset().await?;
        Ok(Outcome::Applied)
    }

    /// Stop a running collection before the controller goes away.
    pub fn close(&mut self) {
        if self.state == SessionState::Collecting {
            self.finish_collection("controller closed");
        }
        self.cancel_deadline();
    }

    fn finish_collection(&mut self, reason: &str) {
        self.cancel_deadline();
        self.services.channel.emit_stop();
        self.state = SessionState::Idle;
        info!(
            session = ?self.session.as_ref().map(|s| s.id),
            samples = self.buffer.len(),
            reason,
            "collection ended"
        );
    }

    async fn load_dataset(&mut self) -> Result<(), FetchError> {
        match self.services.datasets.fetch_dataset().await {
            Ok(dataset) => {
                if dataset.malformed_rows() > 0 {
                    warn!(malformed = dataset.malformed_rows(), "dataset has malformed rows");
                }
                info!(samples = dataset.samples.len(), "dataset loaded");
                self.buffer.replace(dataset.samples);
                self.state = SessionState::Visualizing;
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "dataset load failed");
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn arm_deadline(&mut self) {
        self.generation += 1;
        self.deadline = Some(DeadlineTimer::arm(
            self.settings.collection_timeout,
            self.generation,
            self.deadline_tx.clone(),
        ));
        debug!(generation = self.generation, "deadline armed");
    }

    fn cancel_deadline(&mut self) {
        if let Some(timer) = self.deadline.take() {
            debug!(generation = timer.generation(), "deadline cancelled");
            timer.cancel();
        }
    }
}
