//! In-process ConfigMap store implementing the backend capability.
//!
//! ```text
//! put()/delete() ──► resources (DashMap)
//!        │
//!        └────────► watchers (DashMap<key, Vec<sender>>) ──► MemoryStream::receive()
//! ```
//!
//! Every write is pushed to the open streams of that resource as a full
//! snapshot, in write order. Streams are unregistered when closed or dropped.

use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::trace;

use super::BackendClient;
use super::BackendStream;
use super::ClientFactory;
use super::ConfigData;
use crate::BackendError;
use crate::ConstructionError;
use crate::SourceIdentity;

/// (namespace, name)
type ResourceKey = (String, String);

type StreamItem = std::result::Result<ConfigData, BackendError>;

struct StreamSender {
    id: u64,
    sender: mpsc::UnboundedSender<StreamItem>,
}

struct MemoryBackendInner {
    resources: DashMap<ResourceKey, ConfigData>,
    watchers: DashMap<ResourceKey, Vec<StreamSender>>,
    next_stream_id: AtomicU64,
    open_streams: AtomicUsize,
}

/// Cheaply cloneable handle; clones share the same store.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryBackendInner>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("resources", &self.inner.resources.len())
            .field("open_streams", &self.open_streams())
            .finish()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn resource_key(
    namespace: &str,
    name: &str,
) -> ResourceKey {
    (namespace.to_string(), name.to_string())
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryBackendInner {
                resources: DashMap::new(),
                watchers: DashMap::new(),
                next_stream_id: AtomicU64::new(1),
                open_streams: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates or replaces `namespace/name` and pushes the new content to
    /// every open stream of that resource.
    pub fn put(
        &self,
        namespace: &str,
        name: &str,
        data: ConfigData,
    ) {
        let key = resource_key(namespace, name);

        // The watcher entry stays locked across the store so the stored value
        // and the dispatch order agree under concurrent writers
        let mut watchers = self.inner.watchers.entry(key.clone()).or_default();
        self.inner.resources.insert(key, data.clone());

        // Receivers gone without close() are pruned here
        watchers.retain(|w| w.sender.send(Ok(data.clone())).is_ok());
        trace!(
            namespace,
            name,
            watchers = watchers.len(),
            "ConfigMap update dispatched"
        );
    }

    /// Removes `namespace/name`. Open streams of the resource end.
    pub fn delete(
        &self,
        namespace: &str,
        name: &str,
    ) {
        let key = resource_key(namespace, name);
        self.inner.resources.remove(&key);
        if let Some((_, watchers)) = self.inner.watchers.remove(&key) {
            debug!(
                namespace,
                name,
                watchers = watchers.len(),
                "ConfigMap deleted, ending watch streams"
            );
        }
    }

    /// Pushes `error` to every open stream of `namespace/name` and detaches
    /// them; each stream observes the error and then ends.
    pub fn fail_watchers(
        &self,
        namespace: &str,
        name: &str,
        error: BackendError,
    ) {
        if let Some((_, watchers)) = self.inner.watchers.remove(&resource_key(namespace, name)) {
            for w in watchers {
                let _ = w.sender.send(Err(error.clone()));
            }
        }
    }

    /// Number of streams opened and not yet closed
    pub fn open_streams(&self) -> usize {
        self.inner.open_streams.load(Ordering::Acquire)
    }

    /// Number of streams still registered for `namespace/name`
    pub fn watcher_count(
        &self,
        namespace: &str,
        name: &str,
    ) -> usize {
        self.inner
            .watchers
            .get(&resource_key(namespace, name))
            .map(|w| w.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl BackendClient for MemoryBackend {
    async fn get(
        &self,
        name: &str,
        namespace: &str,
    ) -> std::result::Result<ConfigData, BackendError> {
        self.inner
            .resources
            .get(&resource_key(namespace, name))
            .map(|data| data.value().clone())
            .ok_or_else(|| BackendError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn open_watch(
        &self,
        name: &str,
        namespace: &str,
    ) -> std::result::Result<Box<dyn BackendStream>, BackendError> {
        let id = self.inner.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let key = resource_key(namespace, name);
        let (sender, receiver) = mpsc::unbounded_channel();

        self.inner
            .watchers
            .entry(key.clone())
            .or_default()
            .push(StreamSender { id, sender });
        self.inner.open_streams.fetch_add(1, Ordering::AcqRel);

        trace!(stream_id = id, namespace, name, "Memory watch stream opened");

        Ok(Box::new(MemoryStream {
            id,
            key,
            receiver,
            inner: self.inner.clone(),
            closed: false,
        }))
    }
}

impl ClientFactory for MemoryBackend {
    /// Shares this store with the new source. A non-empty `config_path` must
    /// name a readable file, the way a kubeconfig would.
    fn connect(
        &self,
        identity: &SourceIdentity,
    ) -> std::result::Result<Arc<dyn BackendClient>, ConstructionError> {
        let path = identity.config_path();
        if !path.is_empty() {
            std::fs::metadata(Path::new(path)).map_err(|e| ConstructionError::AuthConfig {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(Arc::new(self.clone()))
    }
}

struct MemoryStream {
    id: u64,
    key: ResourceKey,
    receiver: mpsc::UnboundedReceiver<StreamItem>,
    inner: Arc<MemoryBackendInner>,
    closed: bool,
}

#[async_trait]
impl BackendStream for MemoryStream {
    async fn receive(&mut self) -> Option<std::result::Result<ConfigData, BackendError>> {
        if self.closed {
            return None;
        }
        self.receiver.recv().await
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.receiver.close();

        let id = self.id;
        self.inner.watchers.remove_if_mut(&self.key, |_key, watchers| {
            watchers.retain(|w| w.id != id);
            watchers.is_empty()
        });
        self.inner.open_streams.fetch_sub(1, Ordering::AcqRel);

        trace!(stream_id = id, "Memory watch stream closed");
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        self.close();
    }
}
