//! Client configuration structs
//!
//! Loads configuration from environment variables and an optional `.env` file.

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub relay: RelaySettings,
    pub presence: PresenceSettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
    #[serde(default)]
    pub log_json: bool,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Backend REST API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Signed-in user
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub current_user_id: String,
}

/// Polling relay settings
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
}

impl RelaySettings {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            page_size: default_page_size(),
            error_threshold: default_error_threshold(),
        }
    }
}

/// Presence cache settings
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceSettings {
    #[serde(default = "default_presence_refresh")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_presence_expiry")]
    pub expiry_secs: u64,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

impl PresenceSettings {
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    #[must_use]
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_presence_refresh(),
            expiry_secs: default_presence_expiry(),
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "chat-client".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_http_timeout() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    5
}

fn default_page_size() -> u32 {
    20
}

fn default_error_threshold() -> u32 {
    2
}

fn default_presence_refresh() -> u64 {
    60
}

fn default_presence_expiry() -> u64 {
    300 // 5 minutes
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("./.chat-client")
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            lookup(key)
                .map(|s| {
                    s.trim()
                        .parse::<u64>()
                        .map_err(|_| ConfigError::InvalidValue(key, s))
                })
                .transpose()
        };

        let page_size: u32 = match lookup("PAGE_SIZE") {
            Some(s) => s
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PAGE_SIZE", s))?,
            None => default_page_size(),
        };
        let error_threshold: u32 = match lookup("ERROR_THRESHOLD") {
            Some(s) => s
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("ERROR_THRESHOLD", s))?,
            None => default_error_threshold(),
        };

        let config = Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
                log_json: lookup("LOG_JSON")
                    .is_some_and(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes")),
            },
            api: ApiConfig {
                base_url: lookup("API_BASE_URL").ok_or(ConfigError::MissingVar("API_BASE_URL"))?,
                timeout_secs: parsed("HTTP_TIMEOUT_SECS")?.unwrap_or_else(default_http_timeout),
            },
            session: SessionConfig {
                current_user_id: lookup("CURRENT_USER_ID")
                    .ok_or(ConfigError::MissingVar("CURRENT_USER_ID"))?,
            },
            relay: RelaySettings {
                poll_interval_secs: parsed("POLL_INTERVAL_SECS")?
                    .unwrap_or_else(default_poll_interval),
                page_size,
                error_threshold,
            },
            presence: PresenceSettings {
                refresh_interval_secs: parsed("PRESENCE_REFRESH_SECS")?
                    .unwrap_or_else(default_presence_refresh),
                expiry_secs: parsed("PRESENCE_EXPIRY_SECS")?
                    .unwrap_or_else(default_presence_expiry),
                snapshot_dir: lookup("SNAPSHOT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_snapshot_dir),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the client misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidValue(
                "API_BASE_URL",
                self.api.base_url.clone(),
            ));
        }
        if self.session.current_user_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue("CURRENT_USER_ID", String::new()));
        }
        if self.relay.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("POLL_INTERVAL_SECS", "0".to_string()));
        }
        if self.relay.page_size == 0 {
            return Err(ConfigError::InvalidValue("PAGE_SIZE", "0".to_string()));
        }
        if self.presence.refresh_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "PRESENCE_REFRESH_SECS",
                "0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
