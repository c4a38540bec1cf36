//! Inbox configuration module
//!
//! Provides the configuration for the inbox client: where the document
//! backend lives, which collections hold conversations and their display
//! data, and the limits the reconciliation loop runs with.
//!
//! Configuration is assembled in layers:
//!
//! 1. built-in defaults,
//! 2. a TOML file (`ROAMLY_CONFIG`, else `<config dir>/roamly/inbox.toml` when present),
//! 3. `ROAMLY_*` environment variables.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default backend endpoint
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/v1";
/// Default database id
pub const DEFAULT_DATABASE: &str = "main";
/// Default cap on conversations per fetch
pub const DEFAULT_FETCH_LIMIT: usize = 100;
/// Default capacity of the store's command queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
/// Default length of a last-message preview
pub const DEFAULT_PREVIEW_LEN: usize = 100;

/// Largest page the backend serves
const MAX_FETCH_LIMIT: usize = 5000;

/// Collection ids used by the inbox
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollectionIds {
    /// Conversation documents
    pub conversations: String,
    /// Tourist profiles (display name, avatar)
    pub users: String,
    /// Provider profiles (business name, logo)
    pub providers: String,
    /// Listings (title)
    pub listings: String,
}

impl Default for CollectionIds {
    fn default() -> Self {
        Self {
            conversations: "conversations".to_string(),
            users: "users".to_string(),
            providers: "providers".to_string(),
            listings: "listings".to_string(),
        }
    }
}

/// Inbox configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxConfig {
    /// Backend base URL
    pub endpoint: String,
    /// Project id sent with every request
    pub project: String,
    /// Database holding the collections
    pub database: String,
    /// Collection ids
    pub collections: CollectionIds,
    /// Cap on conversations per fetch
    pub fetch_limit: usize,
    /// Capacity of the store's command queue
    pub queue_capacity: usize,
    /// Length of a last-message preview
    pub preview_len: usize,
    /// Session token of the signed-in user
    pub session_token: Option<String>,
    /// Server API key (trusted environments only)
    pub api_key: Option<String>,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            collections: CollectionIds::default(),
            fetch_limit: DEFAULT_FETCH_LIMIT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            preview_len: DEFAULT_PREVIEW_LEN,
            session_token: None,
            api_key: None,
        }
    }
}

impl InboxConfig {
    /// Create a new InboxConfigBuilder
    pub fn builder() -> InboxConfigBuilder {
        InboxConfigBuilder::default()
    }

    /// Load from the default file location and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::builder();
        if let Some(path) = config_file_path() {
            tracing::info!("[Config] Loading {}", path.display());
            builder = builder.merge_file(&path)?;
        }
        builder.merge_env()?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.endpoint, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                self.endpoint,
                url.scheme()
            )));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::MissingValue("database"));
        }
        if self.collections.conversations.trim().is_empty() {
            return Err(ConfigError::MissingValue("collections.conversations"));
        }
        if self.fetch_limit == 0 || self.fetch_limit > MAX_FETCH_LIMIT {
            return Err(ConfigError::invalid(
                "fetch_limit",
                format!("must be between 1 and {}", MAX_FETCH_LIMIT),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid("queue_capacity", "must be positive"));
        }
        if self.preview_len == 0 {
            return Err(ConfigError::invalid("preview_len", "must be positive"));
        }
        Ok(())
    }

    /// Get the full URL for an API path
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    /// Realtime channel covering every conversation document
    pub fn conversations_channel(&self) -> String {
        crate::shared::event::collection_channel(&self.database, &self.collections.conversations)
    }
}

/// On-disk configuration; every key is optional
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    endpoint: Option<String>,
    project: Option<String>,
    database: Option<String>,
    collections: Option<CollectionIds>,
    fetch_limit: Option<usize>,
    queue_capacity: Option<usize>,
    preview_len: Option<usize>,
    session_token: Option<String>,
    api_key: Option<String>,
}

/// Builder for InboxConfig
#[derive(Debug, Default)]
pub struct InboxConfigBuilder {
    config: InboxConfig,
}

impl InboxConfigBuilder {
    /// Set the backend endpoint
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    /// Set the project id
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.config.project = project.into();
        self
    }

    /// Set the database id
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = database.into();
        self
    }

    /// Set the collection ids
    pub fn collections(mut self, collections: CollectionIds) -> Self {
        self.config.collections = collections;
        self
    }

    /// Set the fetch cap
    pub fn fetch_limit(mut self, limit: usize) -> Self {
        self.config.fetch_limit = limit;
        self
    }

    /// Set the command queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the preview length
    pub fn preview_len(mut self, len: usize) -> Self {
        self.config.preview_len = len;
        self
    }

    /// Set the session token
    pub fn session_token(mut self, token: Option<String>) -> Self {
        self.config.session_token = token;
        self
    }

    /// Set the API key
    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.config.api_key = key;
        self
    }

    /// Overlay the keys present in a TOML file
    pub fn merge_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let file: FileConfig = toml::from_str(&raw)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;

        let config = &mut self.config;
        if let Some(v) = file.endpoint {
            config.endpoint = v;
        }
        if let Some(v) = file.project {
            config.project = v;
        }
        if let Some(v) = file.database {
            config.database = v;
        }
        if let Some(v) = file.collections {
            config.collections = v;
        }
        if let Some(v) = file.fetch_limit {
            config.fetch_limit = v;
        }
        if let Some(v) = file.queue_capacity {
            config.queue_capacity = v;
        }
        if let Some(v) = file.preview_len {
            config.preview_len = v;
        }
        if file.session_token.is_some() {
            config.session_token = file.session_token;
        }
        if file.api_key.is_some() {
            config.api_key = file.api_key;
        }
        Ok(self)
    }

    /// Overlay the `ROAMLY_*` environment variables
    pub fn merge_env(mut self) -> Result<Self, ConfigError> {
        let config = &mut self.config;
        if let Ok(v) = std::env::var("ROAMLY_ENDPOINT") {
            config.endpoint = v;
        }
        if let Ok(v) = std::env::var("ROAMLY_PROJECT") {
            config.project = v;
        }
        if let Ok(v) = std::env::var("ROAMLY_DATABASE") {
            config.database = v;
        }
        if let Ok(v) = std::env::var("ROAMLY_SESSION") {
            config.session_token = Some(v);
        }
        if let Ok(v) = std::env::var("ROAMLY_API_KEY") {
            config.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("ROAMLY_FETCH_LIMIT") {
            config.fetch_limit = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("fetch_limit", format!("'{}' is not a number", v)))?;
        }
        Ok(self)
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<InboxConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Path of the config file to read, if any
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("ROAMLY_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("roamly").join("inbox.toml"))
        .filter(|path| path.exists())
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: &'static str, message: String },
    #[error("cannot read config: {0}")]
    Io(String),
    #[error("cannot parse config: {0}")]
    Parse(String),
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}
