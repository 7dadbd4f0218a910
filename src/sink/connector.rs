use crate::backoff::BackoffPolicy;
use crate::container::ContainerIdentity;
use crate::error::{ForwarderError, Result};
use crate::sink::{ReconnectingSink, SinkHandle, SinkWriter};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::net::TcpStream;

/// Opens a fresh writer to a sink destination
#[async_trait]
pub trait SinkConnector: Send + Sync + 'static {
    /// Human readable destination, used in logs
    fn describe(&self) -> String;

    async fn connect(&self) -> Result<SinkWriter>;
}

/// Produces the sink connection manager for a container
pub trait SinkProvider: Send + Sync + 'static {
    /// Destination description for log lines
    fn describe(&self, identity: &ContainerIdentity, app_id: Option<&str>) -> String;

    fn open(&self, identity: &ContainerIdentity, app_id: Option<&str>) -> SinkHandle;
}

/// TCP log collector
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl SinkConnector for TcpConnector {
    fn describe(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }

    async fn connect(&self) -> Result<SinkWriter> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| ForwarderError::SinkConnectError(self.describe(), e.to_string()))?;
        stream
            .set_nodelay(true)
            .map_err(|e| ForwarderError::SinkConnectError(self.describe(), e.to_string()))?;

        Ok(Box::new(stream))
    }
}

/// Append-mode local file
#[derive(Debug, Clone)]
pub struct FileConnector {
    path: PathBuf,
}

impl FileConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SinkConnector for FileConnector {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn connect(&self) -> Result<SinkWriter> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ForwarderError::SinkConnectError(self.describe(), e.to_string()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ForwarderError::SinkConnectError(self.describe(), e.to_string()))?;

        Ok(Box::new(file))
    }
}

/// One reconnecting TCP connection per container, all to the same collector
#[derive(Debug, Clone)]
pub struct TcpSinkProvider {
    connector: TcpConnector,
    backoff: BackoffPolicy,
}

impl TcpSinkProvider {
    pub fn new(host: impl Into<String>, port: u16, backoff: BackoffPolicy) -> Self {
        Self {
            connector: TcpConnector::new(host, port),
            backoff,
        }
    }
}

impl SinkProvider for TcpSinkProvider {
    fn describe(&self, _identity: &ContainerIdentity, _app_id: Option<&str>) -> String {
        self.connector.describe()
    }

    fn open(&self, _identity: &ContainerIdentity, _app_id: Option<&str>) -> SinkHandle {
        ReconnectingSink::spawn(Arc::new(self.connector.clone()), self.backoff)
    }
}

/// Per-container log files under a directory
#[derive(Debug, Clone)]
pub struct FileSinkProvider {
    dir: PathBuf,
    backoff: BackoffPolicy,
}

/// File name for a container: `<app id>-<short id>.log`
pub fn file_name(identity: &ContainerIdentity, app_id: Option<&str>) -> String {
    // App ids such as Marathon's `/group/app` are not valid file names as-is
    let app = app_id
        .map(|id| id.trim_matches('/').replace('/', "_"))
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| "container".to_string());

    format!("{}-{}.log", app, identity.short_id())
}

impl FileSinkProvider {
    pub fn new(dir: impl Into<PathBuf>, backoff: BackoffPolicy) -> Self {
        Self {
            dir: dir.into(),
            backoff,
        }
    }

    pub fn path_for(&self, identity: &ContainerIdentity, app_id: Option<&str>) -> PathBuf {
        self.dir.join(file_name(identity, app_id))
    }
}

impl SinkProvider for FileSinkProvider {
    fn describe(&self, identity: &ContainerIdentity, app_id: Option<&str>) -> String {
        self.path_for(identity, app_id).display().to_string()
    }

    fn open(&self, identity: &ContainerIdentity, app_id: Option<&str>) -> SinkHandle {
        let connector = FileConnector::new(self.path_for(identity, app_id));
        ReconnectingSink::spawn(Arc::new(connector), self.backoff)
    }
}
