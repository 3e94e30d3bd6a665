use std::fmt;

use tracing::debug;

use super::validate_namespace;
use super::validate_resource_name;
use super::SourceConfig;
use crate::ConstructionError;

/// Optional per-instance overrides applied on top of [`SourceConfig`]
///
/// Resolution order (later overrides earlier):
/// 1. `SourceConfig` values
/// 2. `prefix`
/// 3. `name`
/// 4. `namespace` / `config_path`
///
/// `prefix` and `name` both set the resource name; `name` wins when both are
/// present. `prefix` is kept for callers that configure every source through
/// one generic key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOptions {
    pub prefix: Option<String>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub config_path: Option<String>,
}

impl SourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(
        mut self,
        prefix: impl Into<String>,
    ) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn namespace(
        mut self,
        namespace: impl Into<String>,
    ) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn config_path(
        mut self,
        config_path: impl Into<String>,
    ) -> Self {
        self.config_path = Some(config_path.into());
        self
    }

    /// Resolves the identity a source is bound to. Performs no I/O and no
    /// validation; see [`SourceIdentity::validate`].
    pub fn resolve(
        &self,
        config: &SourceConfig,
    ) -> SourceIdentity {
        let mut name = config.name.clone();
        let mut namespace = config.namespace.clone();
        let mut config_path = config.config_path.clone();

        if let Some(prefix) = &self.prefix {
            name = prefix.clone();
        }
        if let Some(n) = &self.name {
            if self.prefix.is_some() {
                debug!(prefix = ?self.prefix, name = %n, "Both prefix and name set, name takes precedence");
            }
            name = n.clone();
        }
        if let Some(ns) = &self.namespace {
            namespace = ns.clone();
        }
        if let Some(path) = &self.config_path {
            config_path = path.clone();
        }

        SourceIdentity {
            name,
            namespace,
            config_path,
        }
    }
}

/// Resolved `(name, namespace, config_path)` a source is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentity {
    name: String,
    namespace: String,
    config_path: String,
}

impl SourceIdentity {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        config_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            config_path: config_path.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn config_path(&self) -> &str {
        &self.config_path
    }

    /// Checks the name and namespace against the backend's naming rules.
    pub fn validate(&self) -> std::result::Result<(), ConstructionError> {
        validate_resource_name(&self.name).map_err(ConstructionError::InvalidIdentity)?;
        validate_namespace(&self.namespace).map_err(ConstructionError::InvalidIdentity)?;
        Ok(())
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
