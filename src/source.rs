//! ConfigMap-backed configuration source.
//!
//! ```text
//! read()  ──► BackendClient::get() ──────► encode ──► ChangeSet
//! watch() ──► BackendClient::open_watch() ──► Watcher ──► next() ──► ChangeSet ...
//! ```
//!
//! # Construction modes
//!
//! - [`ConfigMapSource::try_new`] fails fast when the identity is invalid or the
//!   backend client cannot be built.
//! - [`ConfigMapSource::new`] never fails. The construction error is kept and
//!   returned by every later `read()`/`watch()` without touching the backend.
//!   Use it where sources must be built uniformly, e.g. from a registry of
//!   constructors.

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::backend::BackendClient;
use crate::backend::ClientFactory;
use crate::encoder;
use crate::ChangeSet;
use crate::ConstructionError;
use crate::Result;
use crate::SourceConfig;
use crate::SourceIdentity;
use crate::SourceOptions;
use crate::WatchConfig;
use crate::Watcher;
use crate::SOURCE_KIND;

/// A pollable and watchable configuration source.
///
/// Higher-level aggregators hold sources as `Arc<dyn Source>` and merge their
/// ChangeSets; this crate ships [`ConfigMapSource`].
#[async_trait]
pub trait Source: Send + Sync + 'static {
    /// Point-in-time snapshot. No retries; the caller owns the retry policy.
    async fn read(&self) -> Result<ChangeSet>;

    /// Opens a new subscription. Each call returns an independent watcher.
    async fn watch(&self) -> Result<Watcher>;

    /// Constant identifier of the source kind, stamped on every ChangeSet
    fn kind(&self) -> &'static str;
}

pub struct ConfigMapSource {
    identity: SourceIdentity,
    client: std::result::Result<Arc<dyn BackendClient>, ConstructionError>,
    watch_config: WatchConfig,
    next_watch_id: AtomicU64,
}

impl fmt::Debug for ConfigMapSource {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ConfigMapSource")
            .field("identity", &self.identity)
            .field("construction_error", &self.client.as_ref().err())
            .field("watch_config", &self.watch_config)
            .finish()
    }
}

impl ConfigMapSource {
    /// Builds a source whose construction failures surface on first use.
    ///
    /// Resolves the identity from `config` and `options`, validates it together
    /// with the watch settings and invokes `factory` once. Nothing else
    /// performs I/O.
    pub fn new(
        config: SourceConfig,
        options: SourceOptions,
        factory: &dyn ClientFactory,
    ) -> Self {
        let identity = options.resolve(&config);
        let client = config
            .watch
            .validate()
            .map_err(|e| ConstructionError::InvalidSettings(e.to_string()))
            .and_then(|_| identity.validate())
            .and_then(|_| factory.connect(&identity));

        if let Err(e) = &client {
            error!(
                name = identity.name(),
                namespace = identity.namespace(),
                error = %e,
                "Failed to create ConfigMap backend client; source will report it on use"
            );
        }

        Self {
            identity,
            client,
            watch_config: config.watch,
            next_watch_id: AtomicU64::new(1),
        }
    }

    /// Builds a source, failing immediately if the backend client cannot be
    /// created.
    pub fn try_new(
        config: SourceConfig,
        options: SourceOptions,
        factory: &dyn ClientFactory,
    ) -> Result<Self> {
        let source = Self::new(config, options, factory);
        if let Err(e) = &source.client {
            return Err(e.clone().into());
        }
        Ok(source)
    }

    pub fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    /// The captured construction error, if any
    pub fn construction_error(&self) -> Option<&ConstructionError> {
        self.client.as_ref().err()
    }

    fn client(&self) -> Result<&Arc<dyn BackendClient>> {
        self.client.as_ref().map_err(|e| e.clone().into())
    }
}

#[async_trait]
impl Source for ConfigMapSource {
    async fn read(&self) -> Result<ChangeSet> {
        let client = self.client()?;

        let data = client
            .get(self.identity.name(), self.identity.namespace())
            .await
            .map_err(|e| {
                warn!(identity = %self.identity, error = %e, "Failed to read ConfigMap");
                e
            })?;

        let snapshot = encoder::encode(&data)?;
        debug!(
            identity = %self.identity,
            checksum = %snapshot.checksum,
            keys = data.len(),
            "ConfigMap read"
        );

        Ok(ChangeSet::from_snapshot(snapshot, SOURCE_KIND))
    }

    async fn watch(&self) -> Result<Watcher> {
        let client = self.client()?;

        let stream = client
            .open_watch(self.identity.name(), self.identity.namespace())
            .await
            .map_err(|e| {
                warn!(identity = %self.identity, error = %e, "Failed to open ConfigMap watch");
                e
            })?;

        let watch_id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        Ok(Watcher::spawn(
            watch_id,
            self.identity.clone(),
            stream,
            &self.watch_config,
        ))
    }

    fn kind(&self) -> &'static str {
        SOURCE_KIND
    }
}

impl fmt::Display for ConfigMapSource {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(SOURCE_KIND)
    }
}
