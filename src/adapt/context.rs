//! Contexts dumpers and loaders are built in.

use super::{AdaptersMap, global_adapters};
use serde::Deserialize;
use std::sync::Arc;

/// Facts about the server connection that adaptation depends on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionInfo {
    /// Server version number, e.g. 100000 for 10.0 or 90624 for 9.6.24.
    pub server_version: i32,

    #[serde(default = "default_encoding")]
    pub client_encoding: String,
}

fn default_encoding() -> String {
    "UTF8".to_string()
}

impl ConnectionInfo {
    pub fn new(server_version: i32) -> Self {
        Self {
            server_version,
            client_encoding: default_encoding(),
        }
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.client_encoding = encoding.into();
        self
    }
}

/// Anything dumpers and loaders can be created from.
///
/// Codecs may read [`connection`](AdaptContext::connection) when they are
/// constructed; the adaptation machinery itself only reads the adapters.
pub trait AdaptContext {
    /// Effective map for this context.
    fn adapters(&self) -> &Arc<AdaptersMap>;

    fn connection(&self) -> Option<&ConnectionInfo>;
}

/// Per-connection context whose registrations shadow the global ones.
#[derive(Debug)]
pub struct Session {
    adapters: Arc<AdaptersMap>,
    connection: Option<ConnectionInfo>,
}

impl Session {
    /// Session layered on the global map.
    pub fn new(connection: Option<ConnectionInfo>) -> Self {
        Self::with_parent(global_adapters(), connection)
    }

    /// Session layered on an explicit map.
    pub fn with_parent(parent: Arc<AdaptersMap>, connection: Option<ConnectionInfo>) -> Self {
        Self {
            adapters: Arc::new(AdaptersMap::with_parent(parent)),
            connection,
        }
    }
}

impl AdaptContext for Session {
    fn adapters(&self) -> &Arc<AdaptersMap> {
        &self.adapters
    }

    fn connection(&self) -> Option<&ConnectionInfo> {
        self.connection.as_ref()
    }
}
