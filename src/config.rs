//! Adaptation configuration
//!
//! ```toml
//! default_format = "binary"
//!
//! [connection]
//! server_version = 90624
//! client_encoding = "UTF8"
//!
//! [[alias]]
//! oid = 16385      # a domain over text
//! like = "text"
//! ```

use crate::adapt::{AdaptContext, ConnectionInfo, Session, global_adapters};
use crate::error::{AdaptError, AdaptResult};
use crate::protocol::{Format, Oid, name_to_oid};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main adaptation configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdaptConfig {
    /// Server the adapted values are meant for
    pub connection: Option<ConnectionInfo>,

    /// Format used when none is given
    #[serde(default)]
    pub default_format: Format,

    /// Extra OIDs loaded like a known type
    #[serde(default, rename = "alias")]
    pub aliases: Vec<LoaderAlias>,
}

/// Load `oid` with the loaders of the type named `like`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoaderAlias {
    pub oid: Oid,
    pub like: String,
}

impl AdaptConfig {
    /// Create a new configuration builder
    pub fn builder() -> AdaptConfigBuilder {
        AdaptConfigBuilder::default()
    }

    /// `<config dir>/qail/adapt.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("qail").join("adapt.toml"))
    }

    /// Parse a TOML document.
    pub fn parse(content: &str) -> AdaptResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> AdaptResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        tracing::debug!("Loaded adaptation config from {}", path.display());
        Ok(config)
    }

    /// Read `path` if given, else the default location if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> AdaptResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Session over the global adapters with this configuration applied.
    pub fn to_session(&self) -> AdaptResult<Session> {
        let session = Session::with_parent(global_adapters(), self.connection.clone());
        self.apply(&session)?;
        Ok(session)
    }

    /// Register the aliases into the context's own map.
    pub fn apply(&self, context: &dyn AdaptContext) -> AdaptResult<()> {
        let adapters = Arc::clone(context.adapters());
        for alias in &self.aliases {
            let like = name_to_oid(&alias.like).ok_or_else(|| {
                AdaptError::Registration(format!(
                    "unknown type '{}' for alias of oid {}",
                    alias.like, alias.oid
                ))
            })?;
            adapters.alias_loader(alias.oid, like)?;
        }
        Ok(())
    }
}

/// Builder for AdaptConfig
#[derive(Debug, Default)]
pub struct AdaptConfigBuilder {
    config: AdaptConfig,
}

impl AdaptConfigBuilder {
    /// Set the server version
    pub fn server_version(mut self, version: i32) -> Self {
        let encoding = self.config.connection.take().map(|c| c.client_encoding);
        let mut connection = ConnectionInfo::new(version);
        if let Some(encoding) = encoding {
            connection.client_encoding = encoding;
        }
        self.config.connection = Some(connection);
        self
    }

    /// Set the connection details
    pub fn connection(mut self, connection: ConnectionInfo) -> Self {
        self.config.connection = Some(connection);
        self
    }

    /// Set the default format
    pub fn default_format(mut self, format: Format) -> Self {
        self.config.default_format = format;
        self
    }

    /// Load `oid` like the type named `like`
    pub fn alias(mut self, oid: Oid, like: impl Into<String>) -> Self {
        self.config.aliases.push(LoaderAlias {
            oid,
            like: like.into(),
        });
        self
    }

    /// Build the configuration
    pub fn build(self) -> AdaptConfig {
        self.config
    }
}
