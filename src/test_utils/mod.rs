//! the test_utils folder here will share fakes and fixtures between unit
//! tests and integration tests
mod fake_stream;

pub use fake_stream::*;

use crate::backend::ConfigData;

/// Builds ConfigMap data from literal pairs
pub fn config_data(pairs: &[(&str, &str)]) -> ConfigData {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
