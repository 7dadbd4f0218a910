use crate::config::ForwarderConfig;
use crate::container::{ContainerIdentity, ContainerRuntime, RuntimeEvent};
use crate::error::{ForwarderError, Result};
use crate::handler::{Handler, HandlerContext, Registry};
use crate::sink::SinkProvider;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Routes runtime events to per-container handlers
pub struct Forwarder {
    runtime: Arc<dyn ContainerRuntime>,
    registry: Registry,
    ctx: HandlerContext,
}

impl Forwarder {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        sinks: Arc<dyn SinkProvider>,
        config: &ForwarderConfig,
    ) -> Self {
        let registry = Registry::new();
        let ctx = HandlerContext::new(Arc::clone(&runtime), sinks, registry.clone(), config);

        Self {
            runtime,
            registry,
            ctx,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle one start/stop notification
    pub async fn handle_event(&self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::Start { id, image } => self.start(id, image).await,
            RuntimeEvent::Stop { id } => self.stop(&id).await,
        }
    }

    async fn start(&self, id: String, image: String) {
        let identity = ContainerIdentity::new(id, image);
        let registration = self.registry.register(identity.id()).await;
        let handler = Handler::new(identity, registration.clone(), self.ctx.clone());

        let task = tokio::spawn(handler.run());
        self.registry.attach_task(&registration, task).await;
    }

    async fn stop(&self, id: &str) {
        match self.registry.lookup(id).await {
            Some(handler) => handler.stop(),
            None => debug!("Stop for untracked container {}", id),
        }
    }

    /// Forward logs until `shutdown` resolves or the event stream ends
    ///
    /// Containers already running are picked up first. On exit every handler
    /// is destroyed and awaited.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut events = self.runtime.events();

        match self.runtime.running().await {
            Ok(running) => {
                info!("Found {} running container(s)", running.len());
                for event in running {
                    self.handle_event(event).await;
                }
            }
            Err(e) => error!("Failed to list running containers: {}", e),
        }

        tokio::pin!(shutdown);
        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down");
                    break Ok(());
                }
                event = events.next() => match event {
                    Some(Ok(event)) => self.handle_event(event).await,
                    Some(Err(e)) => {
                        error!("Runtime event stream failed: {}", e);
                        break Err(e);
                    }
                    None => {
                        warn!("Runtime event stream ended");
                        break Err(ForwarderError::RuntimeError(
                            "event stream ended".to_string(),
                        ));
                    }
                },
            }
        };

        self.shutdown().await;
        result
    }

    /// Destroy every handler and wait for them to finish
    pub async fn shutdown(&self) {
        let tasks = self.registry.stop_all().await;
        debug!("Waiting for {} handler(s)", tasks.len());

        for task in tasks {
            if let Err(e) = task.await {
                error!("Handler task failed: {}", e);
            }
        }
    }
}
