//! Docker implementation of the container runtime boundary, built on bollard
//!
//! bollard decodes the attach/exec framing itself and hands back
//! [`LogOutput`] chunks. Each chunk is re-encoded into a multiplexed frame so
//! every source stream reaching the forwarding path has the same wire format
//! regardless of which runtime produced it.

use crate::container::{ContainerDetails, ContainerRuntime, RuntimeEvent, SourceStream};
use crate::demux::{encode_frame, StreamKind};
use crate::error::{ForwarderError, Result};
use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{EventMessage, EventMessageTypeEnum};
use bollard::query_parameters::{
    AttachContainerOptionsBuilder, EventsOptions, InspectContainerOptions, ListContainersOptions,
};
use bollard::Docker;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::io;
use tokio_util::io::StreamReader;

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using DOCKER_HOST or the local socket
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

/// Turn bollard output chunks back into a framed byte stream
fn reframe<S>(output: S) -> SourceStream
where
    S: Stream<Item = std::result::Result<LogOutput, bollard::errors::Error>> + Send + 'static,
{
    let frames = output.map(|chunk| -> io::Result<Bytes> {
        match chunk {
            Ok(LogOutput::StdErr { message }) => Ok(encode_frame(StreamKind::Stderr, &message)),
            Ok(LogOutput::StdIn { message }) => Ok(encode_frame(StreamKind::Stdin, &message)),
            // TTY containers have no separate channels
            Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                Ok(encode_frame(StreamKind::Stdout, &message))
            }
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
        }
    });

    Box::pin(StreamReader::new(frames))
}

/// Map a Docker event to a lifecycle notification, if it is one we track
fn to_runtime_event(message: EventMessage) -> Option<RuntimeEvent> {
    if message.typ != Some(EventMessageTypeEnum::CONTAINER) {
        return None;
    }

    let actor = message.actor?;
    let id = actor.id?;

    match message.action.as_deref() {
        Some("start") => {
            let image = actor
                .attributes
                .and_then(|mut attrs| attrs.remove("image"))
                .unwrap_or_default();
            Some(RuntimeEvent::Start { id, image })
        }
        Some("die") => Some(RuntimeEvent::Stop { id }),
        _ => None,
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn inspect(&self, id: &str) -> Result<ContainerDetails> {
        let info = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| ForwarderError::InspectError(id.to_string(), e.to_string()))?;

        let config = info.config.unwrap_or_default();

        Ok(ContainerDetails {
            env: config.env.unwrap_or_default(),
        })
    }

    async fn attach(&self, id: &str) -> Result<SourceStream> {
        let options = AttachContainerOptionsBuilder::new()
            .stream(true)
            .stdout(true)
            .stderr(true)
            .build();

        let results = self
            .docker
            .attach_container(id, Some(options))
            .await
            .map_err(|e| ForwarderError::AttachError(id.to_string(), e.to_string()))?;

        Ok(reframe(results.output))
    }

    async fn exec(&self, id: &str, cmd: Vec<String>) -> Result<SourceStream> {
        let exec = self
            .docker
            .create_exec(
                id,
                CreateExecOptions {
                    cmd: Some(cmd),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| ForwarderError::ExecError(id.to_string(), e.to_string()))?;

        match self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| ForwarderError::ExecError(id.to_string(), e.to_string()))?
        {
            StartExecResults::Attached { output, .. } => Ok(reframe(output)),
            StartExecResults::Detached => Err(ForwarderError::ExecError(
                id.to_string(),
                "exec started detached".to_string(),
            )),
        }
    }

    async fn running(&self) -> Result<Vec<RuntimeEvent>> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: false,
                ..Default::default()
            }))
            .await?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                Some(RuntimeEvent::Start {
                    id,
                    image: c.image.unwrap_or_default(),
                })
            })
            .collect())
    }

    fn events(&self) -> BoxStream<'static, Result<RuntimeEvent>> {
        self.docker
            .events(None::<EventsOptions>)
            .filter_map(|message| async move {
                match message {
                    Ok(message) => to_runtime_event(message).map(Ok),
                    Err(e) => Some(Err(ForwarderError::RuntimeError(e.to_string()))),
                }
            })
            .boxed()
    }
}
