//! Snapshot encoding: raw ConfigMap data to canonical JSON bytes plus checksum.
//!
//! Keys are emitted in lexicographic order so that two encodings of the same
//! content are byte-identical no matter how the input map iterates. The
//! checksum is the lowercase hex MD5 of the encoded bytes.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::backend::ConfigData;
use crate::EncodeError;

/// Canonical encoding of one ConfigMap state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub data: Bytes,
    pub checksum: String,
}

/// Encodes `raw` as a flat JSON object with sorted keys.
///
/// An empty map encodes as `{}`. Values are written as JSON strings with no
/// type coercion.
pub fn encode(raw: &ConfigData) -> std::result::Result<Snapshot, EncodeError> {
    let ordered: BTreeMap<&str, &str> = raw.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    let data = serde_json::to_vec(&ordered)?;
    let checksum = checksum(&data);

    Ok(Snapshot {
        data: Bytes::from(data),
        checksum,
    })
}

/// Lowercase hex MD5 digest of `data`
pub fn checksum(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}
