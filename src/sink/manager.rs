use crate::backoff::BackoffPolicy;
use crate::sink::{SinkConnection, SinkConnector};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Notifications from a sink connection manager
#[derive(Debug, Clone)]
pub enum SinkEvent {
    /// A usable connection is available for coupling
    Connected(SinkConnection),
    /// The current connection is gone; stop writing to it
    Disconnected,
    /// About to make reconnect attempt `n`
    Reconnecting(u32),
    /// A connect attempt failed; the manager keeps retrying
    Error(String),
}

/// Consumer side of a sink connection manager
///
/// Dropping the handle disconnects the sink.
#[derive(Debug)]
pub struct SinkHandle {
    events: mpsc::UnboundedReceiver<SinkEvent>,
    cancel: CancellationToken,
}

impl SinkHandle {
    pub fn new(events: mpsc::UnboundedReceiver<SinkEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Next notification, or `None` once the manager has stopped
    pub async fn next_event(&mut self) -> Option<SinkEvent> {
        self.events.recv().await
    }

    /// Tell the manager to close its connection and stop retrying
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    pub fn is_disconnected(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for SinkHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Reconnecting connection manager
///
/// Runs as its own task: connect, announce the connection, wait for it to
/// break, then retry with backoff until disconnected.
pub struct ReconnectingSink {
    connector: Arc<dyn SinkConnector>,
    backoff: BackoffPolicy,
    events: mpsc::UnboundedSender<SinkEvent>,
    cancel: CancellationToken,
}

impl ReconnectingSink {
    /// Start managing a connection through `connector`
    pub fn spawn(connector: Arc<dyn SinkConnector>, backoff: BackoffPolicy) -> SinkHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let manager = Self {
            connector,
            backoff,
            events: tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(manager.run());

        SinkHandle::new(rx, cancel)
    }

    fn emit(&self, event: SinkEvent) -> bool {
        self.events.send(event).is_ok()
    }

    async fn run(self) {
        let target = self.connector.describe();
        let mut attempt: u32 = 0;
        let mut generation: u64 = 0;

        loop {
            if attempt > 0 {
                if !self.emit(SinkEvent::Reconnecting(attempt)) {
                    return;
                }
                let delay = self.backoff.delay(attempt);
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.connector.connect() => result,
            };

            let writer = match connected {
                Ok(writer) => writer,
                Err(e) => {
                    if !self.emit(SinkEvent::Error(e.to_string())) {
                        return;
                    }
                    attempt = attempt.saturating_add(1);
                    continue;
                }
            };

            generation += 1;
            attempt = 0;
            let connection = SinkConnection::new(writer, generation);
            debug!("Connected to {} (connection {})", target, generation);

            if !self.emit(SinkEvent::Connected(connection.clone())) {
                connection.close().await;
                return;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    connection.close().await;
                    debug!("Disconnected from {}", target);
                    return;
                }
                _ = connection.broken() => {
                    debug!("Connection {} to {} broke", generation, target);
                    if !self.emit(SinkEvent::Disconnected) {
                        return;
                    }
                    attempt = 1;
                }
            }
        }
    }
}
