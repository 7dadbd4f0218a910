use crate::handler::HandlerExit;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// A handler's claim on a registry slot
///
/// Each registration gets a fresh generation so a handler that has been
/// replaced can never remove its successor's entry.
#[derive(Debug, Clone)]
pub struct Registration {
    id: String,
    generation: u64,
    stop: CancellationToken,
}

impl Registration {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Token cancelled when the handler must be destroyed
    pub fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }
}

/// Lookup result for a registered handler
#[derive(Debug, Clone)]
pub struct HandlerRef {
    generation: u64,
    stop: CancellationToken,
}

impl HandlerRef {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Ask the handler to destroy itself
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }
}

#[derive(Debug)]
struct Entry {
    generation: u64,
    stop: CancellationToken,
    task: Option<JoinHandle<HandlerExit>>,
}

/// Process-wide map from container id to its live handler
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    generations: Arc<AtomicU64>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `id`
    ///
    /// A handler already registered under the same id is told to stop before
    /// its entry is replaced, so there is never more than one live handler
    /// per container.
    pub async fn register(&self, id: &str) -> Registration {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let stop = CancellationToken::new();

        let previous = self.entries.write().await.insert(
            id.to_string(),
            Entry {
                generation,
                stop: stop.clone(),
                task: None,
            },
        );

        if let Some(previous) = previous {
            warn!(
                "Duplicate start for container {}; destroying previous handler",
                id
            );
            previous.stop.cancel();
        }

        Registration {
            id: id.to_string(),
            generation,
            stop,
        }
    }

    /// Remember the task running `registration`'s handler
    ///
    /// Returns false when the entry is already gone (handler finished or was
    /// replaced); the task then runs detached.
    pub async fn attach_task(
        &self,
        registration: &Registration,
        task: JoinHandle<HandlerExit>,
    ) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&registration.id) {
            Some(entry) if entry.generation == registration.generation => {
                entry.task = Some(task);
                true
            }
            _ => false,
        }
    }

    pub async fn lookup(&self, id: &str) -> Option<HandlerRef> {
        self.entries.read().await.get(id).map(|entry| HandlerRef {
            generation: entry.generation,
            stop: entry.stop.clone(),
        })
    }

    /// Remove the entry for `id` regardless of who owns it
    pub async fn remove(&self, id: &str) -> bool {
        self.entries.write().await.remove(id).is_some()
    }

    /// Remove the entry only if it still belongs to `registration`
    pub async fn release(&self, registration: &Registration) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(&registration.id) {
            Some(entry) if entry.generation == registration.generation => {
                entries.remove(&registration.id);
                true
            }
            _ => false,
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.entries.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Stop every handler and hand back their tasks for joining
    pub async fn stop_all(&self) -> Vec<JoinHandle<HandlerExit>> {
        let mut entries = self.entries.write().await;
        let mut tasks = Vec::new();

        for entry in entries.values_mut() {
            entry.stop.cancel();
            if let Some(task) = entry.task.take() {
                tasks.push(task);
            }
        }

        tasks
    }
}
