//! Single-shot collection deadline.
//!
//! Arming spawns a sleep that, on expiry, posts a [`DeadlineFired`] onto the
//! controller's queue. The controller owns the returned handle; cancelling or
//! dropping it aborts the sleep. Each timer carries a generation number so a
//! fire message that was already queued when the timer was cancelled can be
//! told apart from the live one.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Posted when a deadline expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineFired {
    pub generation: u64,
}

/// Handle to an armed deadline.
#[derive(Debug)]
pub struct DeadlineTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl DeadlineTimer {
    /// Arm a timer that fires once after `after`.
    pub fn arm(
        after: Duration,
        generation: u64,
        notify: mpsc::UnboundedSender<DeadlineFired>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = notify.send(DeadlineFired { generation });
        });
        Self { generation, handle }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `fired` came from this timer.
    pub fn owns(&self, fired: DeadlineFired) -> bool {
        fired.generation == self.generation
    }

    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
