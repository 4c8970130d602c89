//! Detached (noop) collection channel.
//!
//! Used when the controller only needs the HTTP endpoints, e.g. for a
//! retrospective `visualize` or `summarize`, so no websocket is opened.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::CollectionChannel;

/// A channel that accepts commands and sends them nowhere.
#[derive(Debug, Default)]
pub struct DetachedChannel {
    discarded: AtomicU64,
}

impl DetachedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands swallowed so far.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    fn discard(&self, command: &str) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        debug!(command, "no stream attached, command discarded");
    }
}

impl CollectionChannel for DetachedChannel {
    fn emit_start(&self) {
        self.discard("start_ecg");
    }

    fn emit_stop(&self) {
        self.discard("stop_ecg");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_are_counted() {
        let channel = DetachedChannel::new();
        channel.emit_start();
        channel.emit_stop();
        assert_eq!(channel.discarded(), 2);
    }
}
