//! Session lifecycle: the controller state machine, its collection deadline
//! and the event loop that feeds it.

pub mod controller;
pub mod deadline;
pub mod runtime;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::FetchError;

// Re-export commonly used types
pub use controller::{SessionController, SessionInfo, SessionSettings, SessionSnapshot, Services};
pub use deadline::{DeadlineFired, DeadlineTimer};
pub use runtime::{SessionHandle, SessionRuntime};

/// Which mode the controller is in. Exactly one holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Collecting,
    Visualizing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Collecting => "collecting",
            SessionState::Visualizing => "visualizing",
        };
        f.write_str(name)
    }
}

/// Whether an operation changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    /// Not valid in the current state; nothing changed
    Ignored,
}

/// Errors returned through a [`SessionHandle`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("session runtime has shut down")]
    Closed,
}
