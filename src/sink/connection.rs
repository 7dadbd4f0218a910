use crate::error::{ForwarderError, Result};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Byte sink behind a connection
pub type SinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Handle to one live sink connection
///
/// Clones share the same writer. The first failed write marks the
/// connection broken; the manager that produced it watches for that and
/// starts reconnecting.
#[derive(Clone)]
pub struct SinkConnection {
    writer: Arc<Mutex<SinkWriter>>,
    broken: CancellationToken,
    generation: u64,
}

impl SinkConnection {
    pub fn new(writer: SinkWriter, generation: u64) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            broken: CancellationToken::new(),
            generation,
        }
    }

    /// Write and flush `buf`
    pub async fn write_all(&self, buf: &[u8]) -> Result<()> {
        if self.is_broken() {
            return Err(ForwarderError::SinkWriteError(
                "connection is closed".to_string(),
            ));
        }

        let mut writer = self.writer.lock().await;
        let written = async {
            writer.write_all(buf).await?;
            writer.flush().await
        }
        .await;

        written.map_err(|e| {
            self.broken.cancel();
            ForwarderError::SinkWriteError(e.to_string())
        })
    }

    pub fn mark_broken(&self) {
        self.broken.cancel();
    }

    pub fn is_broken(&self) -> bool {
        self.broken.is_cancelled()
    }

    /// Resolves once the connection has been marked broken
    pub async fn broken(&self) {
        self.broken.cancelled().await
    }

    /// Flush and shut down the writer, then mark the connection closed
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
        self.broken.cancel();
    }

    /// Sequence number of this connection within its manager
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for SinkConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkConnection")
            .field("generation", &self.generation)
            .field("broken", &self.is_broken())
            .finish()
    }
}
