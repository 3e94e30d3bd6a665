//! Configuration management for the ConfigMap source.
//!
//! Provides hierarchical settings loading and validation with:
//! - Compiled-in defaults as the base layer
//! - Configuration file named by `CONFIG_PATH`
//! - Environment variable overrides (`CONFIGMAP__*`, highest priority)
//!
//! Per-instance overrides on top of the loaded settings are expressed with
//! [`SourceOptions`] and resolved into a [`SourceIdentity`].
mod identity;
mod watch;
pub use identity::*;
pub use watch::*;


use std::env;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::CONFIG_PATH_ENV;
use crate::DEFAULT_CONFIG_PATH;
use crate::DEFAULT_NAME;
use crate::DEFAULT_NAMESPACE;
use crate::ENV_PREFIX;

/// Settings layer every source starts from
///
/// Combines hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SourceConfig {
    /// ConfigMap resource name
    /// Default: "micro"
    #[serde(default = "default_name")]
    pub name: String,

    /// Namespace holding the ConfigMap
    /// Default: "default"
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Auth config (kubeconfig) handed to the backend factory
    /// Default: "" (backend decides, usually in-cluster credentials)
    #[serde(default = "default_config_path")]
    pub config_path: String,

    /// Watch relay tuning
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            namespace: default_namespace(),
            config_path: default_config_path(),
            watch: WatchConfig::default(),
        }
    }
}

impl SourceConfig {
    /// Loads settings from hierarchical sources without validation.
    ///
    /// Sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `CONFIGMAP__` prefix (highest priority)
    ///
    /// # Note
    /// Validation is deferred so further overrides can be applied via
    /// `with_override_config()`. Callers should call `validate()` last.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIGMAP__NAMESPACE", "payments");
    /// let cfg = SourceConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_overrides());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_overrides())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates settings and returns the validated instance.
    ///
    /// # Errors
    /// - name is not a DNS-1123 subdomain
    /// - namespace is not a DNS-1123 label
    /// - watch buffer size is zero
    pub fn validate(self) -> Result<Self> {
        validate_resource_name(&self.name).map_err(invalid)?;
        validate_namespace(&self.namespace).map_err(invalid)?;
        self.watch.validate()?;
        Ok(self)
    }
}

fn env_overrides() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

fn invalid(msg: String) -> Error {
    Error::Config(ConfigError::Message(msg))
}

/// ConfigMap names follow DNS-1123 subdomain rules
pub(crate) fn validate_resource_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("ConfigMap name cannot be empty".into());
    }
    if name.len() > 253 {
        return Err(format!("ConfigMap name {name:?} exceeds 253 characters"));
    }
    if !name.split('.').all(is_dns_label) {
        return Err(format!(
            "ConfigMap name {name:?} must consist of lowercase alphanumerics, '-' or '.', and start and end with an alphanumeric"
        ));
    }
    Ok(())
}

/// Namespaces follow DNS-1123 label rules
pub(crate) fn validate_namespace(namespace: &str) -> std::result::Result<(), String> {
    if namespace.is_empty() {
        return Err("Namespace cannot be empty".into());
    }
    if namespace.len() > 63 {
        return Err(format!("Namespace {namespace:?} exceeds 63 characters"));
    }
    if !is_dns_label(namespace) {
        return Err(format!(
            "Namespace {namespace:?} must consist of lowercase alphanumerics or '-', and start and end with an alphanumeric"
        ));
    }
    Ok(())
}

fn is_dns_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        }
        _ => false,
    }
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
fn default_config_path() -> String {
    DEFAULT_CONFIG_PATH.to_string()
}
