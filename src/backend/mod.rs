//! Backend Client capability consumed by the source.
//!
//! The source never talks to a concrete cluster SDK. It sees a
//! [`BackendClient`] able to GET a named ConfigMap and open a push stream of
//! full-resource snapshots, and a [`ClientFactory`] that builds such a client
//! from the resolved [`SourceIdentity`]. Authentication and transport belong to
//! the implementor.
//!
//! [`MemoryBackend`] is an in-process implementation, used by tests and by
//! embedders that feed configuration from their own store.

mod memory;
pub use memory::*;

#[cfg(test)]
mod memory_test;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::BackendError;
use crate::ConstructionError;
use crate::SourceIdentity;

/// Raw key/value content of one ConfigMap
pub type ConfigData = HashMap<String, String>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait BackendClient: Send + Sync + 'static {
    /// Point-in-time fetch of `namespace/name`.
    ///
    /// # Errors
    /// - [`BackendError::NotFound`] when the resource does not exist
    /// - any other [`BackendError`] for transport or server failures
    async fn get(
        &self,
        name: &str,
        namespace: &str,
    ) -> std::result::Result<ConfigData, BackendError>;

    /// Opens a push stream for `namespace/name`.
    ///
    /// Every event carries the complete current mapping, not a diff. The
    /// returned stream is exclusively owned by the caller, who must
    /// [`close`](BackendStream::close) it.
    async fn open_watch(
        &self,
        name: &str,
        namespace: &str,
    ) -> std::result::Result<Box<dyn BackendStream>, BackendError>;
}

/// One open change stream.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BackendStream: Send + 'static {
    /// Waits for the next full snapshot.
    ///
    /// `None` means the backend ended the stream. An `Err` is terminal: callers
    /// must not call `receive` again after one.
    async fn receive(&mut self) -> Option<std::result::Result<ConfigData, BackendError>>;

    /// Releases backend resources held by the stream. Idempotent.
    fn close(&mut self);
}

/// Builds the backend client for a source. Invoked exactly once per source
/// construction.
#[cfg_attr(test, automock)]
pub trait ClientFactory: Send + Sync {
    fn connect(
        &self,
        identity: &SourceIdentity,
    ) -> std::result::Result<Arc<dyn BackendClient>, ConstructionError>;
}
