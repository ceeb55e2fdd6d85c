//! Client configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::session::reconnect::ReconnectPolicy;
use crate::{AppError, Result};

/// Timeout values (seconds) for non-streaming calls and connection setup.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// TCP/TLS connect timeout applied to every call.
    #[serde(default = "default_connect_seconds")]
    pub connect_seconds: u64,
    /// Whole-request timeout for plain request/response calls.
    ///
    /// Never applied to the message stream, which may stay open for as long
    /// as the agent keeps working.
    #[serde(default = "default_request_seconds")]
    pub request_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_seconds: default_connect_seconds(),
            request_seconds: default_request_seconds(),
        }
    }
}

fn default_connect_seconds() -> u64 {
    10
}

fn default_request_seconds() -> u64 {
    30
}

/// Backoff settings for the persistent push connection.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for any single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Attempts made before surfacing a terminal failure.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_event_buffer() -> usize {
    256
}

fn default_api_key_env() -> String {
    "AGENT_STREAM_API_KEY".into()
}

/// Client configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ClientConfig {
    /// Base URL of the agent service REST API.
    pub base_url: String,
    /// Base URL of the push socket; enables the persistent listener.
    #[serde(default)]
    pub socket_url: Option<String>,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Bearer token (populated at runtime, never read from the file).
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Capacity of the outbound domain event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Connection and request timeouts.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Persistent-connection reconnection policy.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration for `base_url` with every other field defaulted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `base_url` is not an http(s) URL.
    pub fn for_base_url(base_url: impl Into<String>) -> Result<Self> {
        let mut config = Self {
            base_url: base_url.into(),
            socket_url: None,
            api_key_env: default_api_key_env(),
            api_key: None,
            event_buffer: default_event_buffer(),
            timeouts: TimeoutConfig::default(),
            reconnect: ReconnectConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Read the bearer token from the configured environment variable.
    ///
    /// A missing or empty variable leaves `api_key` unset; unauthenticated
    /// services are allowed.
    pub fn load_credentials(&mut self) {
        match env::var(&self.api_key_env) {
            Ok(value) if !value.trim().is_empty() => self.api_key = Some(value),
            _ => {
                debug!(var = %self.api_key_env, "no api key in environment, continuing without auth");
                self.api_key = None;
            }
        }
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.connect_seconds)
    }

    /// Request timeout for non-streaming calls as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.request_seconds)
    }

    /// Reconnection policy derived from the `[reconnect]` table.
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect.base_delay_ms),
            Duration::from_millis(self.reconnect.max_delay_ms),
            self.reconnect.max_attempts,
        )
    }

    fn validate(&mut self) -> Result<()> {
        let base = Url::parse(&self.base_url)
            .map_err(|err| AppError::Config(format!("base_url invalid: {err}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "base_url must use http or https, got {}",
                base.scheme()
            )));
        }
        self.base_url = self.base_url.trim_end_matches('/').to_owned();

        if let Some(socket) = self.socket_url.as_mut() {
            let parsed = Url::parse(socket)
                .map_err(|err| AppError::Config(format!("socket_url invalid: {err}")))?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                return Err(AppError::Config(format!(
                    "socket_url must use ws or wss, got {}",
                    parsed.scheme()
                )));
            }
            *socket = socket.trim_end_matches('/').to_owned();
        }

        if self.event_buffer == 0 {
            return Err(AppError::Config(
                "event_buffer must be greater than zero".into(),
            ));
        }

        if self.reconnect.max_attempts == 0 {
            return Err(AppError::Config(
                "reconnect.max_attempts must be greater than zero".into(),
            ));
        }

        if self.reconnect.base_delay_ms > self.reconnect.max_delay_ms {
            return Err(AppError::Config(
                "reconnect.base_delay_ms must not exceed reconnect.max_delay_ms".into(),
            ));
        }

        Ok(())
    }
}
