use crate::backoff::{Backoff, BackoffPolicy};
use crate::config::ForwarderConfig;
use crate::container::{
    AdmissionFilter, ContainerIdentity, ContainerRuntime, EnvironmentMap, SourceAcquirer,
    SourceStream,
};
use crate::demux::{frames, relay, FrameReader, RelayEnd};
use crate::error::Result;
use crate::handler::{ExitReason, HandlerExit, HandlerState, Registration, Registry};
use crate::sink::{SinkConnection, SinkEvent, SinkHandle, SinkProvider};
use futures::future::{pending, BoxFuture};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, field, info, info_span, warn, Instrument, Span};

/// Collaborators shared by every handler
#[derive(Clone)]
pub struct HandlerContext {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub acquirer: SourceAcquirer,
    pub filter: Arc<AdmissionFilter>,
    pub sinks: Arc<dyn SinkProvider>,
    pub registry: Registry,
    /// Env key whose value labels the container in logs and file names
    pub app_id_key: String,
    /// Delay policy between re-attachments; `None` retries immediately
    pub reattach: Option<BackoffPolicy>,
}

impl HandlerContext {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        sinks: Arc<dyn SinkProvider>,
        registry: Registry,
        config: &ForwarderConfig,
    ) -> Self {
        Self {
            acquirer: SourceAcquirer::new(Arc::clone(&runtime), config.log_path_key.clone()),
            runtime,
            filter: Arc::new(AdmissionFilter::new(config.whitelist.iter().cloned())),
            sinks,
            registry,
            app_id_key: config.app_id_key.clone(),
            reattach: config.reattach.as_ref().map(BackoffPolicy::from_config),
        }
    }
}

type Acquisition = BoxFuture<'static, Result<SourceStream>>;

/// Forwarding actor for one container
///
/// Runs as a single task. Every transition happens inside that task, driven
/// by whichever of the stop token, the pending stream acquisition, the sink
/// manager's notifications or the relay finishes first.
pub struct Handler {
    identity: ContainerIdentity,
    registration: Registration,
    ctx: HandlerContext,
    state: HandlerState,
    env: EnvironmentMap,
    source: Option<FrameReader>,
    sink: Option<SinkConnection>,
    sink_handle: Option<SinkHandle>,
    sink_target: String,
    destroyed: bool,
    /// Set once source and sink have been coupled
    coupled_before: bool,
    reattach_backoff: Option<Backoff>,
    attachments: u32,
    forwarded: u64,
    forwarded_at_attach: u64,
}

impl Handler {
    pub fn new(
        identity: ContainerIdentity,
        registration: Registration,
        ctx: HandlerContext,
    ) -> Self {
        let reattach_backoff = ctx.reattach.map(Backoff::new);

        Self {
            identity,
            registration,
            ctx,
            state: HandlerState::Starting,
            env: EnvironmentMap::default(),
            source: None,
            sink: None,
            sink_handle: None,
            sink_target: String::new(),
            destroyed: false,
            coupled_before: false,
            reattach_backoff,
            attachments: 0,
            forwarded: 0,
            forwarded_at_attach: 0,
        }
    }

    pub fn identity(&self) -> &ContainerIdentity {
        &self.identity
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Drive the container from start event to teardown
    pub async fn run(mut self) -> HandlerExit {
        let span = info_span!(
            "container",
            id = %self.identity.short_id(),
            image = %self.identity.image(),
            app = field::Empty,
        );

        let reason = self.lifecycle().instrument(span.clone()).await;
        self.destroy().instrument(span).await;

        HandlerExit {
            reason,
            attachments: self.attachments,
            forwarded_frames: self.forwarded,
        }
    }

    async fn lifecycle(&mut self) -> ExitReason {
        info!("Started");

        let inspected = tokio::select! {
            biased;
            _ = self.registration.stop_token().cancelled() => {
                info!("Stopped");
                return ExitReason::Stopped;
            }
            result = self.ctx.runtime.inspect(self.identity.id()) => result,
        };

        let details = match inspected {
            Ok(details) => details,
            Err(e) => {
                error!("{}", e);
                return ExitReason::InspectFailed;
            }
        };

        self.state = HandlerState::Inspecting;
        self.env = EnvironmentMap::parse(&details.env);

        let app_id = self
            .env
            .non_empty(&self.ctx.app_id_key)
            .map(str::to_string);
        if let Some(app_id) = &app_id {
            Span::current().record("app", field::display(app_id));
        }

        if !self.ctx.filter.admits(&self.env) {
            info!(
                "Not whitelisted (missing {})",
                self.ctx.filter.missing(&self.env).join(", ")
            );
            self.state = HandlerState::Rejected;
            return ExitReason::Rejected;
        }

        self.state = HandlerState::Initializing;
        self.sink_target = self.ctx.sinks.describe(&self.identity, app_id.as_deref());
        self.sink_handle = Some(self.ctx.sinks.open(&self.identity, app_id.as_deref()));
        let mut acquiring = Some(self.acquisition(Duration::ZERO));

        loop {
            tokio::select! {
                biased;
                _ = self.registration.stop_token().cancelled() => {
                    info!("Stopped");
                    return ExitReason::Stopped;
                }
                result = poll_acquisition(&mut acquiring) => {
                    acquiring = None;
                    match result {
                        Ok(stream) => self.on_source(stream),
                        Err(e) => {
                            error!("{}", e);
                            return ExitReason::AcquireFailed;
                        }
                    }
                }
                event = next_sink_event(&mut self.sink_handle) => {
                    self.on_sink_event(event);
                }
                end = relay_coupled(&mut self.source, &self.sink, &mut self.forwarded) => {
                    match self.on_relay_end(end) {
                        Ok(Some(delay)) => acquiring = Some(self.acquisition(delay)),
                        Ok(None) => {}
                        Err(reason) => return reason,
                    }
                }
            }
        }
    }

    /// Start a stream acquisition that owns everything it needs
    ///
    /// Once the handler is destroyed the future is dropped unpolled, so a
    /// late result can never be acted on.
    fn acquisition(&mut self, delay: Duration) -> Acquisition {
        self.attachments += 1;
        self.forwarded_at_attach = self.forwarded;

        let acquirer = self.ctx.acquirer.clone();
        let identity = self.identity.clone();
        let env = self.env.clone();

        Box::pin(async move {
            if !delay.is_zero() {
                debug!("Waiting {:?} before re-attaching", delay);
                tokio::time::sleep(delay).await;
            }
            acquirer.acquire(&identity, &env).await
        })
    }

    fn on_source(&mut self, stream: SourceStream) {
        self.source = Some(frames(stream));
        info!("Streaming to {}", self.sink_target);
        self.refresh_state();
    }

    fn on_sink_event(&mut self, event: Option<SinkEvent>) {
        match event {
            Some(SinkEvent::Connected(connection)) => {
                info!("Connected to {}", self.sink_target);
                self.sink = Some(connection);
            }
            Some(SinkEvent::Disconnected) => {
                warn!("Disconnected from {}", self.sink_target);
                self.sink = None;
            }
            Some(SinkEvent::Reconnecting(attempt)) => {
                info!("Reconnecting to {} (attempt {})", self.sink_target, attempt);
            }
            Some(SinkEvent::Error(detail)) => {
                error!("Sink error: {}", detail);
            }
            None => {
                warn!("Sink manager for {} stopped", self.sink_target);
                self.sink = None;
                self.sink_handle = None;
            }
        }
        self.refresh_state();
    }

    /// Returns the delay before re-attaching when the source is gone, or the
    /// exit reason when the handler cannot continue
    fn on_relay_end(&mut self, end: RelayEnd) -> std::result::Result<Option<Duration>, ExitReason> {
        match end {
            RelayEnd::SinkFailed(e) => {
                // The manager sees the broken connection and reports the disconnect
                warn!("{}", e);
                self.sink = None;
                self.refresh_state();
                Ok(None)
            }
            RelayEnd::Malformed(e) => {
                error!("{}", e);
                Err(ExitReason::AcquireFailed)
            }
            RelayEnd::SourceEnded | RelayEnd::SourceFailed(_) => {
                if let RelayEnd::SourceFailed(e) = &end {
                    warn!("Stream read failed: {}", e);
                }
                warn!("Stream ended unexpectedly");

                self.source = None;
                self.refresh_state();

                let delivered = self.forwarded > self.forwarded_at_attach;
                let delay = match self.reattach_backoff.as_mut() {
                    Some(backoff) => {
                        if delivered {
                            backoff.reset();
                        }
                        backoff.next_delay()
                    }
                    None => Duration::ZERO,
                };
                Ok(Some(delay))
            }
        }
    }

    /// `Active` while coupled; otherwise `Initializing` until the first
    /// coupling and `Reattaching` after it
    fn refresh_state(&mut self) {
        let next = if self.source.is_some() && self.sink.is_some() {
            self.coupled_before = true;
            HandlerState::Active
        } else if self.coupled_before {
            HandlerState::Reattaching
        } else {
            HandlerState::Initializing
        };

        if next != self.state {
            debug!("{} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Release everything this handler holds and leave the registry
    ///
    /// Safe from any state and on resources that were never acquired.
    /// Returns false if the handler was already destroyed.
    pub async fn destroy(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.destroyed = true;
        self.state = HandlerState::Destroyed;

        if self.source.take().is_some() {
            debug!("Released source stream");
        }
        self.sink = None;
        if let Some(handle) = self.sink_handle.take() {
            handle.disconnect();
        }

        self.ctx.registry.release(&self.registration).await;
        true
    }
}

async fn poll_acquisition(acquiring: &mut Option<Acquisition>) -> Result<SourceStream> {
    match acquiring {
        Some(acquisition) => acquisition.await,
        None => pending().await,
    }
}

async fn next_sink_event(handle: &mut Option<SinkHandle>) -> Option<SinkEvent> {
    match handle {
        Some(handle) => handle.next_event().await,
        None => pending().await,
    }
}

/// Relay while both ends are present; otherwise wait forever
async fn relay_coupled(
    source: &mut Option<FrameReader>,
    sink: &Option<SinkConnection>,
    forwarded: &mut u64,
) -> RelayEnd {
    match (source.as_mut(), sink.as_ref()) {
        (Some(frames), Some(connection)) => relay(frames, connection, forwarded).await,
        _ => pending().await,
    }
}
