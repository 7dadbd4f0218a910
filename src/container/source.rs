use crate::container::{ContainerIdentity, ContainerRuntime, EnvironmentMap, SourceStream};
use crate::error::Result;
use std::sync::Arc;
use tracing::debug;

/// How a container's output is obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Raw attach to the container's stdout/stderr
    Attach,
    /// `tail -F` of a file inside the container
    TailFile(String),
}

impl SourceKind {
    /// Choose the source from the container environment. The environment
    /// never changes for a container, so every attempt selects the same kind.
    pub fn select(env: &EnvironmentMap, log_path_key: &str) -> Self {
        match env.non_empty(log_path_key) {
            Some(path) => SourceKind::TailFile(path.to_string()),
            None => SourceKind::Attach,
        }
    }
}

/// Command used to follow an in-container log file
pub fn tail_command(path: &str) -> Vec<String> {
    vec![
        "tail".to_string(),
        "-F".to_string(),
        "-n".to_string(),
        "0".to_string(),
        path.to_string(),
    ]
}

/// Opens source streams through the container runtime
#[derive(Clone)]
pub struct SourceAcquirer {
    runtime: Arc<dyn ContainerRuntime>,
    log_path_key: String,
}

impl SourceAcquirer {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, log_path_key: impl Into<String>) -> Self {
        Self {
            runtime,
            log_path_key: log_path_key.into(),
        }
    }

    pub fn select(&self, env: &EnvironmentMap) -> SourceKind {
        SourceKind::select(env, &self.log_path_key)
    }

    /// Acquire a live stream. Failures are returned as-is; retrying is the
    /// caller's decision.
    pub async fn acquire(
        &self,
        identity: &ContainerIdentity,
        env: &EnvironmentMap,
    ) -> Result<SourceStream> {
        match self.select(env) {
            SourceKind::Attach => {
                debug!("Attaching to container output");
                self.runtime.attach(identity.id()).await
            }
            SourceKind::TailFile(path) => {
                debug!("Following {} inside container", path);
                self.runtime.exec(identity.id(), tail_command(&path)).await
            }
        }
    }
}
