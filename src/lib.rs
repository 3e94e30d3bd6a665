//! # configmap-source
//!
//! A configuration source backed by a cluster-managed key/value ConfigMap.
//!
//! - [`ConfigMapSource::read`] fetches the resource and returns a [`ChangeSet`]:
//!   canonical JSON (sorted keys) plus an MD5 checksum for cheap no-op
//!   detection.
//! - [`ConfigMapSource::watch`] opens the backend's change stream and returns a
//!   [`Watcher`] delivering one ChangeSet per backend event until the stream
//!   ends, fails, or the consumer stops it.
//!
//! The backend itself is abstracted behind [`BackendClient`],
//! [`BackendStream`] and [`ClientFactory`]; [`MemoryBackend`] is an in-process
//! implementation.
//!
//! ```ignore
//! use configmap_source::{ConfigMapSource, MemoryBackend, Source, SourceConfig, SourceOptions};
//!
//! let backend = MemoryBackend::new();
//! let source = ConfigMapSource::try_new(
//!     SourceConfig::new()?.validate()?,
//!     SourceOptions::new().name("payments").namespace("prod"),
//!     &backend,
//! )?;
//!
//! let snapshot = source.read().await?;
//! let watcher = source.watch().await?;
//! while let Ok(change) = watcher.next().await {
//!     println!("{} -> {}", change.checksum(), String::from_utf8_lossy(change.data()));
//! }
//! ```

pub mod backend;
mod changeset;
mod config;
mod constants;
pub mod encoder;
mod errors;
mod source;
mod watcher;

pub use backend::*;
pub use changeset::*;
pub use self::config::*;
pub use constants::*;
pub use errors::*;
pub use source::*;
pub use watcher::*;

#[cfg(test)]
mod changeset_test;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
