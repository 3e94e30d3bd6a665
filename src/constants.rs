/// Source kind reported by [`crate::ConfigMapSource`] and stamped on every ChangeSet
pub const SOURCE_KIND: &str = "configmap";

/// Serialization tag of ChangeSet data
pub const FORMAT_JSON: &str = "json";

pub const DEFAULT_NAME: &str = "micro";
pub const DEFAULT_NAMESPACE: &str = "default";
/// Empty means the backend factory falls back to its in-cluster credentials
pub const DEFAULT_CONFIG_PATH: &str = "";

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 10;

/// Environment variable naming an extra settings file
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
/// Prefix of settings environment variables, e.g. `CONFIGMAP__NAMESPACE`
pub const ENV_PREFIX: &str = "CONFIGMAP";
