//! Websocket ingestion client.
//!
//! A single background task owns the connection. It forwards commands from
//! the client handle to the service, decodes inbound frames into
//! [`StreamEvent`]s in arrival order, and reconnects after a fixed delay when
//! the connection drops. Nothing here touches the sample buffer.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::types::{decode_frame, ConnectionStatus, InboundFrame, StreamCommand, StreamEvent};
use super::CollectionChannel;
use crate::config::{CommandPolicy, Config};
use crate::error::ConnectionError;

/// Connection settings for the ingestion client.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Websocket URL of the acquisition service
    pub url: String,
    pub reconnect_delay: Duration,
    /// Upper bound on one connect and handshake attempt
    pub connect_timeout: Duration,
    pub command_policy: CommandPolicy,
    pub max_queued_commands: usize,
}

impl StreamSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(10),
            command_policy: CommandPolicy::Queue,
            max_queued_commands: 16,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.service.stream_url(),
            reconnect_delay: config.reconnect_delay,
            connect_timeout: config.service.request_timeout,
            command_policy: config.command_policy,
            max_queued_commands: config.max_queued_commands,
        }
    }
}

/// Handle to the background connection task.
pub struct StreamingClient {
    url: String,
    commands: mpsc::UnboundedSender<StreamCommand>,
    events: Mutex<Option<mpsc::UnboundedReceiver<StreamEvent>>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamingClient {
    /// Spawn the connection task. Must be called inside a tokio runtime.
    pub fn spawn(settings: StreamSettings) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let url = settings.url.clone();
        let connection = Connection {
            settings,
            commands: command_rx,
            events: event_tx,
            pending: VecDeque::new(),
            status: ConnectionStatus::Connecting,
        };
        let task = tokio::spawn(connection.run(shutdown_rx));

        Self {
            url,
            commands: command_tx,
            events: Mutex::new(Some(event_rx)),
            shutdown: Mutex::new(Some(shutdown_tx)),
            task: Mutex::new(Some(task)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Take the inbound event queue. Only the first caller gets it.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<StreamEvent>> {
        self.events.lock().ok().and_then(|mut guard| guard.take())
    }

    /// Whether the connection task has exited. A closed client never
    /// reconnects; commands sent to it are discarded.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Queue a command for the service.
    pub fn send(&self, command: StreamCommand) {
        if self.commands.send(command).is_err() {
            warn!(command = command.event_name(), "stream task has stopped, command discarded");
        }
    }

    /// Close the connection and wait for the task to finish.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown.lock().ok().and_then(|mut guard| guard.take()) {
            let _ = tx.send(());
        }
        let task = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            let _ = task.await;
        }
        info!(url = %self.url, "stream client shut down");
    }
}

impl CollectionChannel for StreamingClient {
    fn emit_start(&self) {
        self.send(StreamCommand::StartCollection);
    }

    fn emit_stop(&self) {
        self.send(StreamCommand::StopCollection);
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a connected session ended.
enum PumpExit {
    Shutdown,
    Lost(ConnectionError),
}

struct Connection {
    settings: StreamSettings,
    commands: mpsc::UnboundedReceiver<StreamCommand>,
    events: mpsc::UnboundedSender<StreamEvent>,
    /// Commands held across a reconnect
    pending: VecDeque<StreamCommand>,
    status: ConnectionStatus,
}

impl Connection {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        loop {
            let attempt = match self.connect(&mut shutdown).await {
                Some(attempt) => attempt,
                None => break,
            };

            match attempt {
                Ok(socket) => {
                    info!(url = %self.settings.url, "stream connected");
                    self.set_status(ConnectionStatus::Connected);
                    match self.pump(socket, &mut shutdown).await {
                        PumpExit::Shutdown => break,
                        PumpExit::Lost(err) => {
                            warn!(error = %err, "stream connection lost");
                            self.set_status(ConnectionStatus::Disconnected(err.to_string()));
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "stream unreachable");
                    self.set_status(ConnectionStatus::Disconnected(err.to_string()));
                }
            }

            if !self.wait_before_retry(&mut shutdown).await {
                break;
            }
            debug!(url = %self.settings.url, "reconnecting stream");
        }
        debug!("stream task finished");
    }

    /// Make one connection attempt, bounded by the connect timeout.
    ///
    /// Commands issued meanwhile go through the command policy. Returns `None`
    /// when the client is going away.
    async fn connect(
        &mut self,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> Option<Result<Socket, ConnectionError>> {
        let url = self.settings.url.clone();
        let attempt =
            tokio::time::timeout(self.settings.connect_timeout, connect_async(url.as_str()));
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                _ = &mut *shutdown => return None,
                command = self.commands.recv() => match command {
                    Some(command) => self.hold(command),
                    None => return None,
                },
                result = &mut attempt => {
                    let reason = match result {
                        Ok(Ok((socket, _))) => return Some(Ok(socket)),
                        Ok(Err(e)) => e.to_string(),
                        Err(_) => format!(
                            "no handshake within {}ms",
                            self.settings.connect_timeout.as_millis()
                        ),
                    };
                    return Some(Err(ConnectionError::Connect {
                        url: self.settings.url.clone(),
                        reason,
                    }));
                }
            }
        }
    }

    /// Run one connected session until it drops or shutdown is requested.
    async fn pump(&mut self, socket: Socket, shutdown: &mut oneshot::Receiver<()>) -> PumpExit {
        let (mut write, mut read) = socket.split();

        while let Some(command) = self.pending.pop_front() {
            if let Err(err) = send_command(&mut write, command).await {
                self.pending.push_front(command);
                return PumpExit::Lost(err);
            }
            debug!(command = command.event_name(), "sent held command");
        }

        loop {
            tokio::select! {
                _ = &mut *shutdown => {
                    let _ = write.close().await;
                    return PumpExit::Shutdown;
                }
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Err(err) = send_command(&mut write, command).await {
                            self.hold(command);
                            return PumpExit::Lost(err);
                        }
                        debug!(command = command.event_name(), "sent command");
                    }
                    None => {
                        let _ = write.close().await;
                        return PumpExit::Shutdown;
                    }
                },
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.deliver(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => {
                        return PumpExit::Lost(ConnectionError::ClosedByServer);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return PumpExit::Lost(ConnectionError::Dropped(e.to_string())),
                },
            }
        }
    }

    /// Sleep out the reconnect delay, still accepting commands meanwhile.
    /// Returns false when the client is going away.
    async fn wait_before_retry(&mut self, shutdown: &mut oneshot::Receiver<()>) -> bool {
        let delay = tokio::time::sleep(self.settings.reconnect_delay);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                _ = &mut *shutdown => return false,
                _ = &mut delay => return true,
                command = self.commands.recv() => match command {
                    Some(command) => self.hold(command),
                    None => return false,
                },
            }
        }
    }

    fn deliver(&mut self, text: &str) {
        match decode_frame(text) {
            Ok(InboundFrame::Sample(sample)) => {
                if self.events.send(StreamEvent::Sample(sample)).is_err() {
                    debug!("no consumer for stream events");
                }
            }
            Ok(InboundFrame::Ignored(event)) => debug!(%event, "ignoring stream event"),
            Err(e) => warn!(error = %e, "unreadable stream frame"),
        }
    }

    fn hold(&mut self, command: StreamCommand) {
        match self.settings.command_policy {
            CommandPolicy::Queue if self.settings.max_queued_commands > 0 => {
                if self.pending.len() >= self.settings.max_queued_commands {
                    if let Some(dropped) = self.pending.pop_front() {
                        warn!(command = dropped.event_name(), "command queue full, dropped oldest");
                    }
                }
                self.pending.push_back(command);
                debug!(command = command.event_name(), held = self.pending.len(), "holding command until reconnect");
            }
            _ => {
                warn!(command = command.event_name(), "stream disconnected, command dropped");
            }
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            self.status = status.clone();
            let _ = self.events.send(StreamEvent::Status(status));
        }
    }
}

async fn send_command<S>(sink: &mut S, command: StreamCommand) -> Result<(), ConnectionError>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    sink.send(Message::text(command.to_frame()))
        .await
        .map_err(|e| ConnectionError::Send(e.to_string()))
}
