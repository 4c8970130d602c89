//! Single-task event loop around the controller.
//!
//! View operations, deadline expiries and stream events are pulled from their
//! queues one at a time and applied to the controller in that task, so no two
//! mutations of the buffer ever interleave. Operations that perform I/O hold
//! the loop until they complete.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::controller::{SessionController, SessionSnapshot};
use super::deadline::DeadlineFired;
use super::{Outcome, SessionError};
use crate::error::FetchError;
use crate::stream::StreamEvent;

/// Capacity of the view operation queue.
const OPERATION_QUEUE: usize = 64;

enum Operation {
    Start(oneshot::Sender<Outcome>),
    Stop(oneshot::Sender<Outcome>),
    Visualize(oneshot::Sender<Result<Outcome, FetchError>>),
    Clear(oneshot::Sender<Outcome>),
    Summarize(oneshot::Sender<Result<Outcome, FetchError>>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Cloneable handle used by the view layer.
#[derive(Clone)]
pub struct SessionHandle {
    ops: mpsc::Sender<Operation>,
}

impl SessionHandle {
    pub async fn start(&self) -> Result<Outcome, SessionError> {
        self.request(Operation::Start).await
    }

    pub async fn stop(&self) -> Result<Outcome, SessionError> {
        self.request(Operation::Stop).await
    }

    pub async fn visualize(&self) -> Result<Outcome, SessionError> {
        Ok(self.request(Operation::Visualize).await??)
    }

    pub async fn clear(&self) -> Result<Outcome, SessionError> {
        self.request(Operation::Clear).await
    }

    pub async fn summarize(&self) -> Result<Outcome, SessionError> {
        Ok(self.request(Operation::Summarize).await??)
    }

    /// Current state, segments, summary and error.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(Operation::Snapshot).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Operation,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.ops
            .send(make(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}

/// Owns the controller and drives it from its input queues.
pub struct SessionRuntime {
    controller: SessionController,
    ops: mpsc::Receiver<Operation>,
    deadlines: mpsc::UnboundedReceiver<DeadlineFired>,
    stream: Option<mpsc::UnboundedReceiver<StreamEvent>>,
}

impl SessionRuntime {
    /// Wrap a controller. `stream` is the ingestion client's event queue,
    /// or `None` when no live stream is attached.
    pub fn new(
        controller: SessionController,
        deadlines: mpsc::UnboundedReceiver<DeadlineFired>,
        stream: Option<mpsc::UnboundedReceiver<StreamEvent>>,
    ) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::channel(OPERATION_QUEUE);
        let runtime = Self {
            controller,
            ops: rx,
            deadlines,
            stream,
        };
        (runtime, SessionHandle { ops: tx })
    }

    /// Process events until every [`SessionHandle`] is dropped.
    ///
    /// A running collection is stopped on the way out. Returns the controller
    /// for inspection.
    pub async fn run(mut self) -> SessionController {
        loop {
            tokio::select! {
                biased;

                Some(fired) = self.deadlines.recv() => {
                    if let Err(err) = self.controller.on_deadline(fired).await {
                        warn!(error = %err, "dataset load after deadline failed");
                    }
                }
                event = next_stream_event(&mut self.stream) => match event {
                    Some(event) => self.controller.on_stream_event(event),
                    None => {
                        debug!("stream event queue closed");
                        self.stream = None;
                    }
                },
                op = self.ops.recv() => match op {
                    Some(op) => self.apply(op).await,
                    None => break,
                },
            }
        }

        debug!("all session handles dropped, runtime exiting");
        self.controller.close();
        self.controller
    }

    async fn apply(&mut self, op: Operation) {
        // A dropped reply receiver only means the caller stopped waiting.
        match op {
            Operation::Start(reply) => {
                let _ = reply.send(self.controller.start());
            }
            Operation::Stop(reply) => {
                let _ = reply.send(self.controller.stop());
            }
            Operation::Visualize(reply) => {
                let _ = reply.send(self.controller.visualize().await);
            }
            Operation::Clear(reply) => {
                let _ = reply.send(self.controller.clear());
            }
            Operation::Summarize(reply) => {
                let _ = reply.send(self.controller.summarize().await);
            }
            Operation::Snapshot(reply) => {
                let _ = reply.send(self.controller.snapshot());
            }
        }
    }
}

async fn next_stream_event(
    stream: &mut Option<mpsc::UnboundedReceiver<StreamEvent>>,
) -> Option<StreamEvent> {
    match stream {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
