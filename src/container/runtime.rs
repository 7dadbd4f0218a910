use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Live byte stream from a container, carrying the runtime's multiplexed
/// stdout/stderr framing
pub type SourceStream = Pin<Box<dyn AsyncRead + Send>>;

/// Container lifecycle notification from the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    Start { id: String, image: String },
    Stop { id: String },
}

impl RuntimeEvent {
    pub fn id(&self) -> &str {
        match self {
            RuntimeEvent::Start { id, .. } | RuntimeEvent::Stop { id } => id,
        }
    }
}

/// Result of inspecting a container
#[derive(Debug, Clone, Default)]
pub struct ContainerDetails {
    /// Raw `KEY=VALUE` environment entries, in declaration order
    pub env: Vec<String>,
}

/// Boundary to the container runtime
///
/// Discovery, inspection and stream transport live behind this trait so the
/// forwarding logic can run against Docker or an in-memory fake.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    async fn inspect(&self, id: &str) -> Result<ContainerDetails>;

    /// Open the combined stdout/stderr stream of a running container
    async fn attach(&self, id: &str) -> Result<SourceStream>;

    /// Run `cmd` inside the container and stream its output
    async fn exec(&self, id: &str, cmd: Vec<String>) -> Result<SourceStream>;

    /// Start events for containers that were already running
    async fn running(&self) -> Result<Vec<RuntimeEvent>>;

    /// Start/stop notifications for the lifetime of the process
    fn events(&self) -> BoxStream<'static, Result<RuntimeEvent>>;
}
