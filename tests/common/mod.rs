// Shared fakes for integration tests: an in-memory container runtime, a
// sink provider the test drives by hand, and a log capture.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use logfwd::container::{ContainerDetails, ContainerIdentity, ContainerRuntime, RuntimeEvent, SourceStream};
use logfwd::demux::{encode_frame, StreamKind};
use logfwd::error::{ForwarderError, Result};
use logfwd::handler::Registry;
use logfwd::sink::{SinkConnection, SinkEvent, SinkHandle, SinkProvider};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io::{self, Cursor};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

pub const TIMEOUT: Duration = Duration::from_secs(2);

/// What the next attach/exec call for a container returns
pub enum StreamPlan {
    /// A stream with these bytes that then ends
    Bytes(Vec<u8>),
    /// The read half of a pipe the test writes into
    Open(DuplexStream),
    /// The call fails
    Fail(String),
    /// The call blocks until the test releases it with the stream bytes
    Gate(oneshot::Receiver<Vec<u8>>),
    /// A stream that never produces anything
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Inspect(String),
    Attach(String),
    Exec(String, Vec<String>),
}

struct FakeContainer {
    env: std::result::Result<Vec<String>, String>,
    streams: VecDeque<StreamPlan>,
}

pub struct FakeRuntime {
    containers: Mutex<HashMap<String, FakeContainer>>,
    calls: Mutex<Vec<Call>>,
    running: Mutex<Vec<RuntimeEvent>>,
    events_tx: Mutex<Option<mpsc::UnboundedSender<RuntimeEvent>>>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<RuntimeEvent>>>,
    held: Mutex<Vec<DuplexStream>>,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            containers: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            running: Mutex::new(Vec::new()),
            events_tx: Mutex::new(Some(tx)),
            events_rx: Mutex::new(Some(rx)),
            held: Mutex::new(Vec::new()),
        })
    }

    pub fn add_container(&self, id: &str, env: &[&str]) {
        self.containers.lock().unwrap().insert(
            id.to_string(),
            FakeContainer {
                env: Ok(env.iter().map(|e| e.to_string()).collect()),
                streams: VecDeque::new(),
            },
        );
    }

    pub fn add_broken_container(&self, id: &str, error: &str) {
        self.containers.lock().unwrap().insert(
            id.to_string(),
            FakeContainer {
                env: Err(error.to_string()),
                streams: VecDeque::new(),
            },
        );
    }

    pub fn push_stream(&self, id: &str, plan: StreamPlan) {
        self.containers
            .lock()
            .unwrap()
            .get_mut(id)
            .expect("unknown fake container")
            .streams
            .push_back(plan);
    }

    pub fn set_running(&self, events: Vec<RuntimeEvent>) {
        *self.running.lock().unwrap() = events;
    }

    pub fn emit(&self, event: RuntimeEvent) {
        if let Some(tx) = self.events_tx.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// End the event stream
    pub fn close_events(&self) {
        self.events_tx.lock().unwrap().take();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stream_calls(&self, id: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| match call {
                Call::Attach(cid) | Call::Exec(cid, _) => cid == id,
                Call::Inspect(_) => false,
            })
            .collect()
    }

    async fn open(&self, id: &str) -> Result<SourceStream> {
        let plan = self
            .containers
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(|c| c.streams.pop_front())
            .unwrap_or(StreamPlan::Hang);

        match plan {
            StreamPlan::Bytes(bytes) => Ok(Box::pin(Cursor::new(bytes))),
            StreamPlan::Open(reader) => Ok(Box::pin(reader)),
            StreamPlan::Fail(message) => {
                Err(ForwarderError::AttachError(id.to_string(), message))
            }
            StreamPlan::Gate(rx) => match rx.await {
                Ok(bytes) => Ok(Box::pin(Cursor::new(bytes))),
                Err(_) => Err(ForwarderError::AttachError(
                    id.to_string(),
                    "gate dropped".to_string(),
                )),
            },
            StreamPlan::Hang => {
                let (writer, reader) = tokio::io::duplex(64);
                self.held.lock().unwrap().push(writer);
                Ok(Box::pin(reader))
            }
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn inspect(&self, id: &str) -> Result<ContainerDetails> {
        self.calls.lock().unwrap().push(Call::Inspect(id.to_string()));

        let env = self
            .containers
            .lock()
            .unwrap()
            .get(id)
            .map(|c| c.env.clone())
            .unwrap_or_else(|| Err("no such container".to_string()));

        match env {
            Ok(env) => Ok(ContainerDetails { env }),
            Err(e) => Err(ForwarderError::InspectError(id.to_string(), e)),
        }
    }

    async fn attach(&self, id: &str) -> Result<SourceStream> {
        self.calls.lock().unwrap().push(Call::Attach(id.to_string()));
        self.open(id).await
    }

    async fn exec(&self, id: &str, cmd: Vec<String>) -> Result<SourceStream> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Exec(id.to_string(), cmd));
        self.open(id).await
    }

    async fn running(&self) -> Result<Vec<RuntimeEvent>> {
        Ok(self.running.lock().unwrap().clone())
    }

    fn events(&self) -> BoxStream<'static, Result<RuntimeEvent>> {
        match self.events_rx.lock().unwrap().take() {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (Ok(event), rx))
            })
            .boxed(),
            None => stream::empty().boxed(),
        }
    }
}

/// One sink opened through [`FakeSinks`]
pub struct FakeSink {
    pub identity: ContainerIdentity,
    pub app_id: Option<String>,
    events: mpsc::UnboundedSender<SinkEvent>,
    cancel: CancellationToken,
    generation: u64,
}

/// Sink provider whose connection events are sent by the test
#[derive(Default)]
pub struct FakeSinks {
    opened: Mutex<Vec<FakeSink>>,
}

impl FakeSinks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opened(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn app_id(&self, index: usize) -> Option<String> {
        self.opened.lock().unwrap()[index].app_id.clone()
    }

    /// Announce a fresh connection on sink `index`; returns what it receives
    pub fn connect(&self, index: usize) -> DuplexStream {
        let (writer, reader) = tokio::io::duplex(4096);
        let mut opened = self.opened.lock().unwrap();
        let sink = &mut opened[index];
        sink.generation += 1;
        let _ = sink.events.send(SinkEvent::Connected(SinkConnection::new(
            Box::new(writer),
            sink.generation,
        )));
        reader
    }

    pub fn send(&self, index: usize, event: SinkEvent) {
        let _ = self.opened.lock().unwrap()[index].events.send(event);
    }

    pub fn is_disconnected(&self, index: usize) -> bool {
        self.opened.lock().unwrap()[index].cancel.is_cancelled()
    }
}

impl SinkProvider for FakeSinks {
    fn describe(&self, identity: &ContainerIdentity, _app_id: Option<&str>) -> String {
        format!("fake://{}", identity.short_id())
    }

    fn open(&self, identity: &ContainerIdentity, app_id: Option<&str>) -> SinkHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        self.opened.lock().unwrap().push(FakeSink {
            identity: identity.clone(),
            app_id: app_id.map(str::to_string),
            events: tx,
            cancel: cancel.clone(),
            generation: 0,
        });

        SinkHandle::new(rx, cancel)
    }
}

/// Collects formatted log output from the current thread
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Route this thread's log events here until the guard is dropped
    ///
    /// `#[tokio::test]` runs spawned tasks on the test thread, so handler
    /// output is captured too.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = logfwd::logging::subscriber(move || writer.clone(), EnvFilter::new("debug"));
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }
}

/// Frames for a sequence of (channel, payload) pairs
pub fn framed(parts: &[(StreamKind, &str)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (kind, payload) in parts {
        out.extend_from_slice(&encode_frame(*kind, payload.as_bytes()));
    }
    out
}

/// Poll `check` until it holds or the test times out
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !check().await {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn wait_for_removal(registry: &Registry, id: &str) {
    eventually(&format!("{} to leave the registry", id), || async {
        !registry.contains(id).await
    })
    .await;
}

/// Read exactly `len` bytes from a fake sink
pub async fn read_sink(reader: &mut DuplexStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(TIMEOUT, reader.read_exact(&mut buf))
        .await
        .expect("timed out reading sink")
        .expect("sink read failed");
    buf
}
