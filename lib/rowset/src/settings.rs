//! Connection settings.
//!
//! Provider names and connection strings are resolved outside this layer
//! and handed in as plain values: build a [`Settings`] once at process
//! start and pass it by reference to wherever controllers are constructed.

use crate::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Connection configuration for database backends.
///
/// This enum is extensible for future authentication methods.
#[derive(Debug, Clone)]
pub enum ConnectionConfig {
    /// Connect using a database URL string.
    Url(String),
}

impl From<&str> for ConnectionConfig {
    fn from(url: &str) -> Self {
        ConnectionConfig::Url(url.to_string())
    }
}

impl From<String> for ConnectionConfig {
    fn from(url: String) -> Self {
        ConnectionConfig::Url(url)
    }
}

impl From<&String> for ConnectionConfig {
    fn from(url: &String) -> Self {
        ConnectionConfig::Url(url.clone())
    }
}

/// Trait for database connection.
///
/// Abstracts the connection lifecycle so each backend (PostgreSQL,
/// SQLite) implements its own pool construction.
#[async_trait]
pub trait StoreConnection: Sized + Send + Sync {
    /// Connect to the database using the provided configuration.
    async fn connect(config: impl Into<ConnectionConfig> + Send) -> Result<Self, StoreError>;
}

/// One named connection entry: a provider name plus its connection string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionProfile {
    /// Entry name, e.g. `"main"`.
    pub name: String,
    /// Provider selector, e.g. `"postgres"` or `"sqlite"`.
    pub provider: String,
    /// Backend connection URL.
    pub url: String,
}

/// The process configuration: a list of named connection profiles.
///
/// Lookup mirrors the two resolutions the configuration surface needs:
/// by entry name and by provider name (first match wins).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    profiles: Vec<ConnectionProfile>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        serde_json::from_str(json).map_err(StoreError::Serialization)
    }

    /// Builder-style profile registration.
    pub fn with_profile(mut self, profile: ConnectionProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    pub fn push(&mut self, profile: ConnectionProfile) {
        self.profiles.push(profile);
    }

    pub fn profiles(&self) -> &[ConnectionProfile] {
        &self.profiles
    }

    /// The profile with the given entry name.
    pub fn profile(&self, name: &str) -> Option<&ConnectionProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Connection string for the given entry name.
    pub fn url_by_name(&self, name: &str) -> Option<&str> {
        self.profile(name).map(|p| p.url.as_str())
    }

    /// Connection string for the first profile using the given provider.
    pub fn url_by_provider(&self, provider: &str) -> Option<&str> {
        self.profiles
            .iter()
            .find(|p| p.provider == provider)
            .map(|p| p.url.as_str())
    }

    /// Like [`url_by_name`](Self::url_by_name), but failing to resolve is
    /// an error carrying the missing entry name.
    pub fn require_url(&self, name: &str) -> Result<&str, StoreError> {
        self.url_by_name(name)
            .ok_or_else(|| StoreError::Config(format!("no connection entry named {name}")))
    }
}
