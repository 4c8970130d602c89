//! Live stream from the acquisition service.
//!
//! The websocket client is process-wide: it is created on first use through
//! [`shared`], reused across sessions, and handed to the session controller as
//! a [`CollectionChannel`].

pub mod client;
pub mod noop;
pub mod types;

use std::sync::{Arc, OnceLock};

use tracing::warn;

// Re-export commonly used types
pub use client::{StreamSettings, StreamingClient};
pub use noop::DetachedChannel;
pub use types::{decode_frame, ConnectionStatus, InboundFrame, StreamCommand, StreamEvent};

/// Command side of the acquisition stream, as seen by the controller.
///
/// Both commands are fire-and-forget. Implementations must not block and must
/// never panic when the service is unreachable.
pub trait CollectionChannel: Send + Sync {
    fn emit_start(&self);
    fn emit_stop(&self);
}

static SHARED: OnceLock<Arc<StreamingClient>> = OnceLock::new();

/// Get the process-wide streaming client, connecting it on first call.
///
/// Later calls return the same client and ignore `settings`. Must be called
/// inside a tokio runtime.
pub fn shared(settings: &StreamSettings) -> Arc<StreamingClient> {
    let client = SHARED
        .get_or_init(|| Arc::new(StreamingClient::spawn(settings.clone())))
        .clone();
    if client.is_closed() {
        warn!(url = %client.url(), "shared stream client was shut down; commands will be discarded");
    }
    client
}

/// Close the process-wide client, if one was created.
///
/// This is final for the process: [`shared`] keeps returning the closed
/// client afterwards.
pub async fn shutdown_shared() {
    if let Some(client) = SHARED.get() {
        client.shutdown().await;
    }
}
