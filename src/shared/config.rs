//! Application configuration module
//!
//! Provides configuration types for the messaging engine and its store
//! collaborators.

use thiserror::Error;

/// Default capacity of the insert-event broadcast buffer.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Default length of the message preview shown in conversation summaries.
pub const DEFAULT_PREVIEW_LENGTH: usize = 80;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection URL for the `postgres` store (unused by the
    /// in-memory store)
    pub database_url: Option<String>,
    /// Capacity of the insert-event broadcast buffer
    pub event_buffer: usize,
    /// Maximum length of summary previews
    pub preview_length: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
            preview_length: DEFAULT_PREVIEW_LENGTH,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Load configuration from the environment.
    ///
    /// Reads `MARKETCHAT_DATABASE_URL`, falling back to `DATABASE_URL`.
    pub fn from_env() -> Self {
        let database_url = std::env::var("MARKETCHAT_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .ok();
        Self {
            database_url,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_buffer == 0 {
            return Err(ConfigError::MissingValue("event_buffer"));
        }
        if self.preview_length == 0 {
            return Err(ConfigError::MissingValue("preview_length"));
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    database_url: Option<String>,
    event_buffer: Option<usize>,
    preview_length: Option<usize>,
}

impl AppConfigBuilder {
    /// Set the database URL
    pub fn database_url(mut self, url: String) -> Self {
        self.database_url = Some(url);
        self
    }

    /// Set the insert-event buffer capacity
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = Some(capacity);
        self
    }

    /// Set the summary preview length
    pub fn preview_length(mut self, length: usize) -> Self {
        self.preview_length = Some(length);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let config = AppConfig {
            database_url: self.database_url,
            event_buffer: self.event_buffer.unwrap_or(DEFAULT_EVENT_BUFFER),
            preview_length: self.preview_length.unwrap_or(DEFAULT_PREVIEW_LENGTH),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
}
