//! Watcher: turns one backend change stream into a cancellable sequence of
//! ChangeSets.
//!
//! # Architecture
//!
//! ```text
//! BackendStream::receive() ──► relay task ──► encode ──► mpsc (bounded) ──► Watcher::next()
//!                                  ▲                                             │
//!                                  └──────────── CancellationToken ◄──── Watcher::stop()
//! ```
//!
//! The relay task exclusively owns the backend stream and closes it on every
//! exit path: end of stream, backend error, encode failure, consumer gone, or
//! cancellation. Events reach the consumer in the order the backend produced
//! them; nothing is dropped, merged or reordered.
//!
//! # Terminal results
//!
//! `next()` ends with exactly one of three distinguishable reasons:
//! - [`StreamTerminated::EndOfStream`] - the backend closed the stream
//! - [`StreamTerminated::Backend`] / [`StreamTerminated::Encode`] - the stream failed
//! - [`Error::Cancelled`] - the consumer called `stop()` or dropped the watcher
//!
//! The reason is latched; later calls keep returning it.

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::backend::BackendStream;
use crate::backend::ConfigData;
use crate::encoder;
use crate::encoder::Snapshot;
use crate::ChangeSet;
use crate::EncodeError;
use crate::Error;
use crate::Result;
use crate::SourceIdentity;
use crate::StreamTerminated;
use crate::WatchConfig;
use crate::SOURCE_KIND;

/// Turns one backend event into a snapshot
type EncodeFn = fn(&ConfigData) -> std::result::Result<Snapshot, EncodeError>;

/// Message from the relay task to the consumer
#[derive(Debug)]
enum RelayEvent {
    Change(ChangeSet),
    Terminated(StreamTerminated),
}

/// Subscription to one ConfigMap, created by `ConfigMapSource::watch()`.
///
/// All methods take `&self`, so a watcher shared through `Arc` can be stopped
/// from one task while another is blocked in [`next`](Watcher::next).
/// Dropping the watcher cancels the relay, which then releases the backend
/// stream.
pub struct Watcher {
    watch_id: u64,
    identity: SourceIdentity,
    cancel: CancellationToken,
    events: tokio::sync::Mutex<mpsc::Receiver<RelayEvent>>,
    terminal: parking_lot::Mutex<Option<StreamTerminated>>,
    relay: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("watch_id", &self.watch_id)
            .field("identity", &self.identity)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Takes ownership of `stream` and starts the relay task.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(
        watch_id: u64,
        identity: SourceIdentity,
        stream: Box<dyn BackendStream>,
        config: &WatchConfig,
    ) -> Self {
        Self::spawn_with_encoder(watch_id, identity, stream, config, encoder::encode)
    }

    pub(crate) fn spawn_with_encoder(
        watch_id: u64,
        identity: SourceIdentity,
        stream: Box<dyn BackendStream>,
        config: &WatchConfig,
        encode: EncodeFn,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.event_buffer_size);
        let cancel = CancellationToken::new();

        info!(
            watch_id,
            name = identity.name(),
            namespace = identity.namespace(),
            "Watch stream started"
        );

        let handle = tokio::spawn(relay(watch_id, stream, encode, sender, cancel.clone()));

        Self {
            watch_id,
            identity,
            cancel,
            events: tokio::sync::Mutex::new(receiver),
            terminal: parking_lot::Mutex::new(None),
            relay: tokio::sync::Mutex::new(Some(handle)),
        }
    }

    /// Waits for the next change.
    ///
    /// # Returns
    /// - `Ok(ChangeSet)` for every backend event, in backend order
    /// - `Err(Error::StreamTerminated(_))` once the backend stream ended or failed
    /// - `Err(Error::Cancelled)` once `stop()` was called, even if events were
    ///   still buffered
    pub async fn next(&self) -> Result<ChangeSet> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(reason) = self.latched() {
            return Err(reason.into());
        }

        let mut events = self.events.lock().await;

        // Another next() may have consumed the terminal event while we waited
        if let Some(reason) = self.latched() {
            return Err(reason.into());
        }

        let received = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            received = events.recv() => received,
        };

        // stop() won the race against a value that was already buffered
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match received {
            Some(RelayEvent::Change(change_set)) => Ok(change_set),
            Some(RelayEvent::Terminated(reason)) => Err(self.latch(reason).into()),
            // Relay exited without a terminal event, e.g. it panicked
            None => Err(self.latch(StreamTerminated::EndOfStream).into()),
        }
    }

    /// Stops the watcher and releases the backend stream.
    ///
    /// When this returns, the relay task has exited and the backend stream has
    /// been closed. Safe to call concurrently with `next()` and any number of
    /// times; concurrent callers all return after the release completed.
    pub async fn stop(&self) {
        self.cancel.cancel();

        let mut relay = self.relay.lock().await;
        if let Some(handle) = relay.take() {
            if let Err(e) = handle.await {
                warn!(watch_id = self.watch_id, error = %e, "Watch relay task failed");
            }
            debug!(
                watch_id = self.watch_id,
                identity = %self.identity,
                "Watcher stopped"
            );
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    /// Adapts the watcher into a stream that yields every change and then the
    /// single terminal error before ending.
    pub fn into_stream(self) -> impl Stream<Item = Result<ChangeSet>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let watcher = state?;
            match watcher.next().await {
                Ok(change_set) => Some((Ok(change_set), Some(watcher))),
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    fn latched(&self) -> Option<StreamTerminated> {
        self.terminal.lock().clone()
    }

    fn latch(
        &self,
        reason: StreamTerminated,
    ) -> StreamTerminated {
        let mut terminal = self.terminal.lock();
        terminal.get_or_insert(reason).clone()
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        // The relay closes the backend stream once it observes cancellation
        self.cancel.cancel();
    }
}

/// Relay loop driving one backend stream.
///
/// Every await races the cancellation token so `stop()` never waits on the
/// backend or on a full consumer channel.
async fn relay(
    watch_id: u64,
    mut stream: Box<dyn BackendStream>,
    encode: EncodeFn,
    sender: mpsc::Sender<RelayEvent>,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(watch_id, "Watch relay cancelled");
                break;
            }
            received = stream.receive() => received,
        };

        let event = match received {
            Some(Ok(data)) => match encode(&data) {
                Ok(snapshot) => {
                    trace!(watch_id, checksum = %snapshot.checksum, keys = data.len(), "Received watch event");
                    RelayEvent::Change(ChangeSet::from_snapshot(snapshot, SOURCE_KIND))
                }
                Err(e) => {
                    warn!(watch_id, error = %e, "Failed to encode watch event");
                    RelayEvent::Terminated(StreamTerminated::Encode(e))
                }
            },
            Some(Err(e)) => {
                warn!(watch_id, error = %e, "Watch stream failed");
                RelayEvent::Terminated(StreamTerminated::Backend(e))
            }
            None => {
                info!(watch_id, "Watch stream ended by backend");
                RelayEvent::Terminated(StreamTerminated::EndOfStream)
            }
        };

        let terminal = matches!(event, RelayEvent::Terminated(_));
        if terminal {
            // Released before the consumer can observe the terminal result
            stream.close();
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(watch_id, "Watch relay cancelled while delivering");
                break;
            }
            sent = sender.send(event) => {
                if sent.is_err() {
                    debug!(watch_id, "Watch consumer dropped");
                    break;
                }
            }
        }

        if terminal {
            break;
        }
    }

    stream.close();
    info!(watch_id, "Watch stream ended (backend stream released)");
}
