use std::time::SystemTime;

use bytes::Bytes;
use serde::Serialize;

use crate::encoder;
use crate::encoder::Snapshot;
use crate::FORMAT_JSON;

/// Immutable snapshot of configuration state at one instant
///
/// Built fresh on every `read()` and on every delivered watch event. Fields are
/// only reachable through accessors so a ChangeSet never changes after it is
/// handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    data: Bytes,
    checksum: String,
    format: String,
    source: String,
    timestamp: SystemTime,
}

impl ChangeSet {
    pub(crate) fn from_snapshot(
        snapshot: Snapshot,
        source: &str,
    ) -> Self {
        Self {
            data: snapshot.data,
            checksum: snapshot.checksum,
            format: FORMAT_JSON.to_string(),
            source: source.to_string(),
            timestamp: SystemTime::now(),
        }
    }

    /// Canonical JSON bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Hex MD5 of [`data`](ChangeSet::data)
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Serialization tag, always `"json"` for this source
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Kind of the source that produced this snapshot
    pub fn source(&self) -> &str {
        &self.source
    }

    /// When the snapshot was taken
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Recomputes the checksum over the held data.
    ///
    /// Equals [`checksum`](ChangeSet::checksum) for every ChangeSet built by
    /// this crate; useful for consumers verifying data they persisted.
    pub fn sum(&self) -> String {
        encoder::checksum(&self.data)
    }

    /// True when both snapshots carry the same content, regardless of when they
    /// were taken.
    pub fn is_same_content(
        &self,
        other: &ChangeSet,
    ) -> bool {
        self.checksum == other.checksum
    }
}
